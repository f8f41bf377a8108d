use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub orchestrator: OrchestratorConfig,
    pub rate_limit: RateLimitConfig,
}

/// Page generator service configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration for generator calls
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Batch orchestration configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pages dispatched concurrently per batch
    pub batch_size: usize,
}

/// Cooldown gate configuration for creation/improvement endpoints
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub cooldown_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let generator = GeneratorConfig {
            api_key: env::var("GENERATOR_API_KEY").map_err(|_| AppError::Config {
                message: "GENERATOR_API_KEY is required".to_string(),
            })?,
            base_url: env::var("GENERATOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.pagegen.dev".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/funnels.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60000),
        };

        let orchestrator = OrchestratorConfig {
            batch_size: env::var("ORCHESTRATOR_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let rate_limit = RateLimitConfig {
            cooldown_ms: env::var("RATE_LIMIT_COOLDOWN_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
        };

        Ok(Config {
            generator,
            database,
            logging,
            request,
            orchestrator,
            rate_limit,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 60000 }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { batch_size: 5 }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { cooldown_ms: 30000 }
    }
}
