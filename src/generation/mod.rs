//! Batch page-generation orchestrator.
//!
//! Fans generation work out over every ungenerated page of a funnel in fixed
//! size batches, waiting for each batch to settle before issuing the next.
//! Failures are captured per page and never abort sibling work; a batch with
//! zero successes stops the run, since that pattern points at a systemic
//! upstream failure such as an exhausted quota.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::generator::{GenerationRequest, PageGenerator, ProductInfo};
use crate::prompts::{prompt_for_type, SPEC_PAGE_PROMPT};
use crate::storage::{Funnel, Page, PageType, SqliteStorage, Storage, EXPERIMENT_ORDER_BASE};

/// Marker prepended to generated source so downstream tooling skips
/// typechecking generated code.
pub const NO_TYPECHECK_MARKER: &str = "// @ts-nocheck";

/// How one page's generation call will be driven.
///
/// Resolved once per page before dispatch; exactly one path executes.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPlan {
    /// A stored page specification drives the generation.
    SpecBased(String),
    /// Legacy path: the page type is inferred from funnel position.
    TypeBased { page_type: PageType, has_next: bool },
}

/// One failed page within a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFailure {
    pub page: String,
    pub error: String,
}

/// Aggregate result of a batch generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    /// Whether any generation work was attempted this call
    pub generating: bool,
    /// Pages with source code after this call
    pub pages_ready: usize,
    /// Total pages in the funnel
    pub total_pages: usize,
    /// Pages generated by this call
    pub generated_now: usize,
    /// Per-page failures captured this call
    pub failures: Vec<PageFailure>,
    /// First failure message, surfaced when pages remain ungenerated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a single-page regeneration call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGenerationReport {
    pub component_name: String,
    pub generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch generation orchestrator
pub struct BatchOrchestrator {
    storage: SqliteStorage,
    generator: Arc<dyn PageGenerator>,
    batch_size: usize,
}

impl BatchOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        storage: SqliteStorage,
        generator: Arc<dyn PageGenerator>,
        batch_size: usize,
    ) -> Self {
        Self {
            storage,
            generator,
            batch_size: batch_size.max(1),
        }
    }

    /// Generate source for every page of the funnel lacking it.
    ///
    /// Safe to call repeatedly: pages already generated are never
    /// regenerated by this path.
    pub async fn generate_all_pages(&self, funnel_id: &str) -> AppResult<GenerationReport> {
        let funnel = self
            .storage
            .get_funnel(funnel_id)
            .await?
            .ok_or_else(|| AppError::not_found("funnel", funnel_id))?;

        let pages = self.storage.get_funnel_pages(funnel_id).await?;
        let total_pages = pages.len();
        let total_steps = pages
            .iter()
            .filter(|p| p.order_index < EXPERIMENT_ORDER_BASE)
            .count();

        let pending: Vec<Page> = pages.into_iter().filter(|p| !p.is_generated()).collect();

        if pending.is_empty() {
            debug!(funnel_id = %funnel_id, "All pages already generated");
            return Ok(GenerationReport {
                generating: false,
                pages_ready: total_pages,
                total_pages,
                generated_now: 0,
                failures: Vec::new(),
                error: None,
            });
        }

        info!(
            funnel_id = %funnel_id,
            pending = pending.len(),
            batch_size = self.batch_size,
            "Starting batch generation"
        );

        let mut generated_now = 0;
        let mut failures = Vec::new();

        for batch in pending.chunks(self.batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|page| self.generate_page(&funnel, page, total_steps)),
            )
            .await;

            let mut batch_successes = 0;
            for (page, result) in batch.iter().zip(results) {
                match result {
                    Ok(()) => {
                        generated_now += 1;
                        batch_successes += 1;
                    }
                    Err(message) => {
                        failures.push(PageFailure {
                            page: page.component_name.clone(),
                            error: message,
                        });
                    }
                }
            }

            // A fully failed batch points at a systemic upstream problem
            if batch_successes == 0 {
                warn!(
                    funnel_id = %funnel_id,
                    batch_len = batch.len(),
                    "Batch had zero successes, stopping run"
                );
                break;
            }
        }

        let still_remaining = pending.len() - generated_now;
        let pages_ready = total_pages - still_remaining;
        let error = if still_remaining > 0 {
            failures.first().map(|f| f.error.clone())
        } else {
            None
        };

        info!(
            funnel_id = %funnel_id,
            generated = generated_now,
            failed = failures.len(),
            pages_ready = pages_ready,
            total = total_pages,
            "Batch generation finished"
        );

        Ok(GenerationReport {
            generating: true,
            pages_ready,
            total_pages,
            generated_now,
            failures,
            error,
        })
    }

    /// Regenerate a single page by order index.
    ///
    /// Unlike the batch path this overwrites existing source; it is the
    /// explicit regeneration entry point.
    pub async fn generate_one_page(
        &self,
        funnel_id: &str,
        page_index: i64,
    ) -> AppResult<PageGenerationReport> {
        let funnel = self
            .storage
            .get_funnel(funnel_id)
            .await?
            .ok_or_else(|| AppError::not_found("funnel", funnel_id))?;

        let pages = self.storage.get_funnel_pages(funnel_id).await?;
        let total_steps = pages
            .iter()
            .filter(|p| p.order_index < EXPERIMENT_ORDER_BASE)
            .count();

        let page = pages
            .into_iter()
            .find(|p| p.order_index == page_index)
            .ok_or_else(|| AppError::not_found("page", format!("index {}", page_index)))?;

        let component_name = page.component_name.clone();
        match self.generate_page(&funnel, &page, total_steps).await {
            Ok(()) => Ok(PageGenerationReport {
                component_name,
                generated: true,
                error: None,
            }),
            Err(message) => Ok(PageGenerationReport {
                component_name,
                generated: false,
                error: Some(message),
            }),
        }
    }

    /// Generate and persist one page. Errors are reduced to the message that
    /// gets recorded against the page.
    async fn generate_page(
        &self,
        funnel: &Funnel,
        page: &Page,
        total_steps: usize,
    ) -> Result<(), String> {
        let plan = resolve_plan(page, total_steps);
        let request = build_request(funnel, page, &plan);

        match self.generator.generate(request).await {
            Ok(generated) => {
                let code = with_no_typecheck_marker(&generated.code);
                self.storage
                    .set_page_source(&page.funnel_id, &page.component_name, &code)
                    .await
                    .map_err(|e| e.to_string())?;

                // Independent second write; the stored source stands even if
                // clearing the stale error fails.
                if let Err(e) = self
                    .storage
                    .set_page_error(&page.funnel_id, &page.component_name, None)
                    .await
                {
                    warn!(
                        page = %page.component_name,
                        error = %e,
                        "Failed to clear generation error after success"
                    );
                }

                debug!(page = %page.component_name, "Page generated");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();

                // Both failure writes are best-effort; the error column or
                // log table may be absent mid-migration.
                if let Err(store_err) = self
                    .storage
                    .set_page_error(&page.funnel_id, &page.component_name, Some(&message))
                    .await
                {
                    warn!(
                        page = %page.component_name,
                        error = %store_err,
                        "Failed to record generation error on page"
                    );
                }
                if let Err(log_err) = self
                    .storage
                    .append_generation_failure(&page.funnel_id, &page.component_name, &message)
                    .await
                {
                    warn!(
                        page = %page.component_name,
                        error = %log_err,
                        "Failed to append generation failure log"
                    );
                }

                Err(message)
            }
        }
    }
}

/// Resolve the generation plan for a page. Exactly one path applies.
pub fn resolve_plan(page: &Page, total_steps: usize) -> GenerationPlan {
    if let Some(spec) = &page.page_spec {
        return GenerationPlan::SpecBased(spec.clone());
    }

    let position = page.order_index.max(0) as usize;
    let has_next = position + 1 < total_steps;
    let page_type = page
        .page_type
        .as_deref()
        .and_then(|t| legacy_page_type(t))
        .unwrap_or_else(|| infer_page_type(position, total_steps));

    GenerationPlan::TypeBased {
        page_type,
        has_next,
    }
}

/// Map a stored legacy type tag, including the fallback for 4-page funnels
/// whose second step used the since-removed "quiz" type.
fn legacy_page_type(tag: &str) -> Option<PageType> {
    match tag {
        "quiz" => Some(PageType::Sales),
        other => PageType::from_str(other).ok(),
    }
}

/// Infer the page type from funnel position for legacy 3-4 page funnels.
fn infer_page_type(position: usize, total_steps: usize) -> PageType {
    if total_steps <= 3 {
        match position {
            0 => PageType::Landing,
            1 => PageType::Checkout,
            _ => PageType::ThankYou,
        }
    } else {
        match position {
            0 => PageType::Landing,
            1 => PageType::Sales,
            2 => PageType::Checkout,
            _ => PageType::ThankYou,
        }
    }
}

/// Build the generator request for a page according to its plan.
fn build_request(funnel: &Funnel, page: &Page, plan: &GenerationPlan) -> GenerationRequest {
    let product = ProductInfo {
        name: funnel.product_name.clone(),
        description: funnel.product_description.clone(),
        target_audience: funnel.target_audience.clone(),
    };

    match plan {
        GenerationPlan::SpecBased(spec) => {
            GenerationRequest::new(product, &page.component_name, SPEC_PAGE_PROMPT)
                .with_spec(spec.clone())
        }
        GenerationPlan::TypeBased {
            page_type,
            has_next,
        } => GenerationRequest::new(product, &page.component_name, prompt_for_type(*page_type))
            .with_page_type(page_type.to_string())
            .with_next_step(*has_next),
    }
}

/// Prefix the no-typecheck marker when the source does not carry it yet.
fn with_no_typecheck_marker(code: &str) -> String {
    if code.starts_with(NO_TYPECHECK_MARKER) {
        code.to_string()
    } else {
        format!("{}\n{}", NO_TYPECHECK_MARKER, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(order_index: i64) -> Page {
        Page::new("fn-1", format!("Page{}", order_index), order_index)
    }

    #[test]
    fn test_spec_plan_wins_over_type() {
        let p = page(1).with_spec("a hero section").with_type(PageType::Sales);
        assert_eq!(
            resolve_plan(&p, 4),
            GenerationPlan::SpecBased("a hero section".to_string())
        );
    }

    #[test]
    fn test_three_page_legacy_inference() {
        assert_eq!(
            resolve_plan(&page(0), 3),
            GenerationPlan::TypeBased {
                page_type: PageType::Landing,
                has_next: true
            }
        );
        assert_eq!(
            resolve_plan(&page(1), 3),
            GenerationPlan::TypeBased {
                page_type: PageType::Checkout,
                has_next: true
            }
        );
        assert_eq!(
            resolve_plan(&page(2), 3),
            GenerationPlan::TypeBased {
                page_type: PageType::ThankYou,
                has_next: false
            }
        );
    }

    #[test]
    fn test_four_page_legacy_inference() {
        let types: Vec<PageType> = (0..4)
            .map(|i| match resolve_plan(&page(i), 4) {
                GenerationPlan::TypeBased { page_type, .. } => page_type,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            types,
            vec![
                PageType::Landing,
                PageType::Sales,
                PageType::Checkout,
                PageType::ThankYou
            ]
        );
    }

    #[test]
    fn test_removed_quiz_type_falls_back_to_sales() {
        let mut p = page(1);
        p.page_type = Some("quiz".to_string());
        assert_eq!(
            resolve_plan(&p, 4),
            GenerationPlan::TypeBased {
                page_type: PageType::Sales,
                has_next: true
            }
        );
    }

    #[test]
    fn test_stored_type_tag_overrides_position() {
        let p = page(0).with_type(PageType::Checkout);
        assert_eq!(
            resolve_plan(&p, 4),
            GenerationPlan::TypeBased {
                page_type: PageType::Checkout,
                has_next: true
            }
        );
    }

    #[test]
    fn test_marker_applied_once() {
        let code = "export default function Landing() {}";
        let marked = with_no_typecheck_marker(code);
        assert!(marked.starts_with(NO_TYPECHECK_MARKER));
        assert_eq!(with_no_typecheck_marker(&marked), marked);
    }

    #[test]
    fn test_batch_count_bound() {
        // ceil(N/B) batches at most, by construction of chunks()
        for (n, b, expected) in [(11usize, 5usize, 3usize), (10, 5, 2), (1, 5, 1), (0, 5, 0)] {
            let items: Vec<usize> = (0..n).collect();
            assert_eq!(items.chunks(b).count(), expected);
        }
    }
}
