use serde::{Deserialize, Serialize};

/// Product metadata passed to every generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub name: String,
    pub description: String,
    pub target_audience: String,
}

/// Request to generate one page component
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub product: ProductInfo,
    /// Component name the generated code must export
    pub component_name: String,
    /// Stored page specification (spec-driven path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_spec: Option<String>,
    /// Legacy page type (type-driven path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_type: Option<String>,
    /// Whether a next funnel step exists (drives CTA navigation)
    pub has_next_step: bool,
    /// System prompt guiding the generation
    pub system: String,
    /// Extra context, e.g. current source and KPIs for improvement runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response payload from the generator service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPage {
    pub component_name: String,
    pub code: String,
}

impl GenerationRequest {
    /// Create a request with the required fields
    pub fn new(
        product: ProductInfo,
        component_name: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            product,
            component_name: component_name.into(),
            page_spec: None,
            page_type: None,
            has_next_step: false,
            system: system.into(),
            context: None,
        }
    }

    /// Set the stored page specification
    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.page_spec = Some(spec.into());
        self
    }

    /// Set the legacy page type
    pub fn with_page_type(mut self, page_type: impl Into<String>) -> Self {
        self.page_type = Some(page_type.into());
        self
    }

    /// Set whether a next funnel step exists
    pub fn with_next_step(mut self, has_next: bool) -> Self {
        self.has_next_step = has_next;
        self
    }

    /// Attach improvement context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ProductInfo {
        ProductInfo {
            name: "Acme Widget".to_string(),
            description: "A widget".to_string(),
            target_audience: "makers".to_string(),
        }
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new(product(), "Landing", "prompt")
            .with_page_type("landing")
            .with_next_step(true)
            .with_context("prior KPIs");

        assert_eq!(req.component_name, "Landing");
        assert_eq!(req.page_type.as_deref(), Some("landing"));
        assert!(req.has_next_step);
        assert!(req.page_spec.is_none());
    }

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let req = GenerationRequest::new(product(), "Landing", "prompt");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["componentName"], "Landing");
        assert!(json.get("pageSpec").is_none());
        assert!(json.get("pageType").is_none());
        assert!(json.get("context").is_none());
    }
}
