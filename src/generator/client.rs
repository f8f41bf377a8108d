use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{GeneratedPage, GenerationRequest};
use super::PageGenerator;
use crate::config::{GeneratorConfig, RequestConfig};
use crate::error::{GeneratorError, GeneratorResult};

/// HTTP client for the page generation service.
///
/// One attempt per call; upstream failures are recorded per page by the
/// orchestrator rather than retried here.
#[derive(Clone)]
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl HttpGenerator {
    /// Create a new generator client
    pub fn new(config: &GeneratorConfig, request_config: RequestConfig) -> GeneratorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GeneratorError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PageGenerator for HttpGenerator {
    async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedPage> {
        let url = format!("{}/v1/pages/generate", self.base_url);
        let component = request.component_name.clone();
        let start = Instant::now();

        debug!(
            component = %component,
            spec_based = request.page_spec.is_some(),
            "Calling page generator"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    GeneratorError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(
                component = %component,
                status = status.as_u16(),
                latency_ms = start.elapsed().as_millis() as u64,
                "Generator call failed"
            );
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let page: GeneratedPage =
            response
                .json()
                .await
                .map_err(|e| GeneratorError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        info!(
            component = %component,
            latency_ms = start.elapsed().as_millis() as u64,
            code_len = page.code.len(),
            "Generator call succeeded"
        );

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = GeneratorConfig {
            api_key: "test_key".to_string(),
            base_url: "https://api.pagegen.dev/".to_string(),
        };

        let client = HttpGenerator::new(&config, RequestConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "https://api.pagegen.dev");
    }
}
