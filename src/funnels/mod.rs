//! Funnel repository operations: creation with page scaffolding, listing,
//! metadata updates, soft-delete, restore, and permanent deletion.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::storage::{Funnel, Page, PageType, SqliteStorage, Storage};

/// Page description supplied at funnel creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    pub component_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_spec: Option<String>,
}

/// Parameters for creating a funnel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunnelParams {
    pub product_name: String,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub target_audience: String,
    /// Explicit page list; defaults to the standard 4-step layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageInput>>,
}

/// Funnel repository handler
pub struct FunnelManager {
    storage: SqliteStorage,
}

impl FunnelManager {
    /// Create a new funnel manager
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Create a funnel with its ungenerated page records.
    pub async fn create(&self, params: CreateFunnelParams) -> AppResult<Funnel> {
        if params.product_name.trim().is_empty() {
            return Err(AppError::validation("productName", "cannot be empty"));
        }

        let pages = params.pages.unwrap_or_else(default_page_layout);
        if pages.iter().any(|p| p.component_name.trim().is_empty()) {
            return Err(AppError::validation("pages", "componentName cannot be empty"));
        }

        let funnel = Funnel::new(
            params.product_name.trim(),
            params.product_description,
            params.target_audience,
        );
        self.storage.create_funnel(&funnel).await?;

        for (index, input) in pages.iter().enumerate() {
            let mut page = Page::new(&funnel.id, input.component_name.trim(), index as i64);
            page.page_type = input.page_type.clone();
            page.page_spec = input.page_spec.clone();
            self.storage.upsert_page(&page).await?;
        }

        info!(funnel_id = %funnel.id, pages = pages.len(), "Funnel created");
        Ok(funnel)
    }

    /// Get a funnel by id.
    pub async fn get(&self, funnel_id: &str) -> AppResult<Funnel> {
        self.storage
            .get_funnel(funnel_id)
            .await?
            .ok_or_else(|| AppError::not_found("funnel", funnel_id))
    }

    /// List funnels, hidden ones excluded unless requested.
    pub async fn list(&self, include_hidden: bool) -> AppResult<Vec<Funnel>> {
        Ok(self.storage.list_funnels(include_hidden).await?)
    }

    /// Update product metadata on an existing funnel.
    pub async fn update(
        &self,
        funnel_id: &str,
        product_name: Option<String>,
        product_description: Option<String>,
        target_audience: Option<String>,
    ) -> AppResult<Funnel> {
        let mut funnel = self.get(funnel_id).await?;
        if let Some(name) = product_name {
            if name.trim().is_empty() {
                return Err(AppError::validation("productName", "cannot be empty"));
            }
            funnel.product_name = name.trim().to_string();
        }
        if let Some(description) = product_description {
            funnel.product_description = description;
        }
        if let Some(audience) = target_audience {
            funnel.target_audience = audience;
        }
        self.storage.update_funnel(&funnel).await?;
        Ok(funnel)
    }

    /// Soft-delete a funnel.
    pub async fn hide(&self, funnel_id: &str) -> AppResult<()> {
        Ok(self.storage.set_funnel_hidden(funnel_id, true).await?)
    }

    /// Undo a soft-delete.
    pub async fn restore(&self, funnel_id: &str) -> AppResult<()> {
        Ok(self.storage.set_funnel_hidden(funnel_id, false).await?)
    }

    /// Permanently delete a funnel with its pages and experiments.
    pub async fn delete(&self, funnel_id: &str) -> AppResult<()> {
        // Ensure a not-found surfaces before the cascade runs
        self.get(funnel_id).await?;
        self.storage.delete_funnel(funnel_id).await?;
        info!(funnel_id = %funnel_id, "Funnel permanently deleted");
        Ok(())
    }
}

/// Standard 4-step layout used when no explicit pages are supplied.
fn default_page_layout() -> Vec<PageInput> {
    [
        ("Landing", PageType::Landing),
        ("Sales", PageType::Sales),
        ("Checkout", PageType::Checkout),
        ("ThankYou", PageType::ThankYou),
    ]
    .into_iter()
    .map(|(name, page_type)| PageInput {
        component_name: name.to_string(),
        page_type: Some(page_type.to_string()),
        page_spec: None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_shape() {
        let layout = default_page_layout();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout[0].component_name, "Landing");
        assert_eq!(layout[1].page_type.as_deref(), Some("sales"));
        assert_eq!(layout[3].component_name, "ThankYou");
    }
}
