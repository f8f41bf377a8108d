//! Experiment lifecycle: creation, traffic assignment, conclusion, and
//! winner promotion.
//!
//! States run none -> running -> concluded; conclusion is terminal. At most
//! one running experiment may exist per (funnel, page) pair.

pub mod assignment;

pub use assignment::{assign, ensure_session_token};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, StorageError};
use crate::generation::NO_TYPECHECK_MARKER;
use crate::generator::{GenerationRequest, PageGenerator, ProductInfo};
use crate::prompts::IMPROVEMENT_PROMPT;
use crate::storage::{
    Experiment, ExperimentStatus, ImprovementLog, Page, SqliteStorage, Storage, Variant,
    EXPERIMENT_ORDER_BASE,
};

/// Default fraction of traffic routed to the control arm.
pub const DEFAULT_TRAFFIC_SPLIT: f64 = 0.5;

/// Result of creating an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperimentResult {
    pub experiment_id: String,
    pub page_name: String,
    pub test_name: String,
    pub version: i64,
    pub traffic_split: f64,
}

/// Result of concluding an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcludeExperimentResult {
    pub experiment_id: String,
    pub winner: Variant,
    /// Whether the test source was promoted into the control slot
    pub promoted: bool,
}

/// Experiment lifecycle handler
pub struct ExperimentEngine {
    storage: SqliteStorage,
    generator: Arc<dyn PageGenerator>,
}

impl ExperimentEngine {
    /// Create a new experiment engine
    pub fn new(storage: SqliteStorage, generator: Arc<dyn PageGenerator>) -> Self {
        Self { storage, generator }
    }

    /// Create a running experiment for a page slot.
    ///
    /// Fails with a conflict naming the existing experiment when one is
    /// already running for the pair. The check is read-then-write; the store
    /// backs it with a uniqueness constraint on running experiments.
    pub async fn create(
        &self,
        funnel_id: &str,
        page_name: &str,
        reasoning: Option<String>,
    ) -> AppResult<CreateExperimentResult> {
        if page_name.trim().is_empty() {
            return Err(AppError::validation("pageName", "cannot be empty"));
        }

        let funnel = self
            .storage
            .get_funnel(funnel_id)
            .await?
            .ok_or_else(|| AppError::not_found("funnel", funnel_id))?;

        let page = self
            .storage
            .get_page(funnel_id, page_name)
            .await?
            .ok_or_else(|| AppError::not_found("page", page_name))?;

        if let Some(existing) = self
            .storage
            .get_running_experiment(funnel_id, page_name)
            .await?
        {
            return Err(AppError::conflict(format!(
                "experiment {} is already running for page {}",
                existing.id, page_name
            )));
        }

        let version = 1 + self
            .storage
            .count_page_experiments(funnel_id, page_name)
            .await?;
        let test_name = format!("{}_v{}", page_name, version);

        debug!(
            funnel_id = %funnel_id,
            page = %page_name,
            test = %test_name,
            "Generating test variant"
        );

        let kpi_snapshot = serde_json::to_value(&funnel.kpis).unwrap_or_default();
        let context = format!(
            "Current source:\n{}\n\nFunnel KPIs:\n{}",
            page.source_code.as_deref().unwrap_or("(not generated)"),
            kpi_snapshot
        );

        let product = ProductInfo {
            name: funnel.product_name.clone(),
            description: funnel.product_description.clone(),
            target_audience: funnel.target_audience.clone(),
        };
        let mut request =
            GenerationRequest::new(product, &test_name, IMPROVEMENT_PROMPT).with_context(context);
        if let Some(spec) = &page.page_spec {
            request = request.with_spec(spec.clone());
        }
        if let Some(page_type) = &page.page_type {
            request = request.with_page_type(page_type.clone());
        }

        let generated = self.generator.generate(request).await?;

        // Reserved range keeps the variant out of step navigation
        let test_page = Page::new(funnel_id, &test_name, EXPERIMENT_ORDER_BASE + version)
            .with_source(with_no_typecheck_marker(&generated.code));
        self.storage.upsert_page(&test_page).await?;

        let experiment = Experiment::new(funnel_id, page_name, &test_name, DEFAULT_TRAFFIC_SPLIT);
        self.storage
            .create_experiment(&experiment)
            .await
            .map_err(|err| match err {
                StorageError::RunningExperimentExists { page_name, .. } => AppError::conflict(
                    format!("an experiment is already running for page {}", page_name),
                ),
                other => other.into(),
            })?;

        // Log versions are monotonic across the whole funnel, unlike the
        // page-scoped version baked into the test component name
        let log_version =
            1 + self.storage.get_funnel_improvements(funnel_id).await?.len() as i64;
        let log = ImprovementLog::new(
            funnel_id,
            log_version,
            page_name,
            reasoning.unwrap_or_else(|| "requested improvement".to_string()),
            kpi_snapshot,
        );
        self.storage.append_improvement(&log).await?;

        info!(
            experiment_id = %experiment.id,
            funnel_id = %funnel_id,
            page = %page_name,
            version = version,
            "Experiment created"
        );

        Ok(CreateExperimentResult {
            experiment_id: experiment.id,
            page_name: page_name.to_string(),
            test_name,
            version,
            traffic_split: DEFAULT_TRAFFIC_SPLIT,
        })
    }

    /// Conclude an experiment with an explicit winner. Terminal.
    ///
    /// A test winner promotes the variant source into the control slot after
    /// renaming every whole-word occurrence of the test component name.
    pub async fn conclude(
        &self,
        experiment_id: &str,
        winner: Variant,
    ) -> AppResult<ConcludeExperimentResult> {
        let mut experiment = self
            .storage
            .get_experiment(experiment_id)
            .await?
            .ok_or_else(|| AppError::not_found("experiment", experiment_id))?;

        if experiment.status == ExperimentStatus::Concluded {
            return Err(AppError::conflict(format!(
                "experiment {} is already concluded",
                experiment_id
            )));
        }

        let promoted = match winner {
            Variant::Test => {
                let test_page = self
                    .storage
                    .get_page(&experiment.funnel_id, &experiment.test_name)
                    .await?
                    .ok_or_else(|| AppError::not_found("page", &experiment.test_name))?;

                let source = test_page.source_code.ok_or_else(|| AppError::Internal {
                    message: format!(
                        "test page {} has no source to promote",
                        experiment.test_name
                    ),
                })?;

                let promoted_source =
                    rename_identifier(&source, &experiment.test_name, &experiment.control_name);
                self.storage
                    .set_page_source(
                        &experiment.funnel_id,
                        &experiment.control_name,
                        &promoted_source,
                    )
                    .await?;
                true
            }
            Variant::Control => false,
        };

        experiment.status = ExperimentStatus::Concluded;
        experiment.winner = Some(winner);
        experiment.concluded_at = Some(Utc::now());
        self.storage.update_experiment(&experiment).await?;

        info!(
            experiment_id = %experiment_id,
            winner = %winner,
            promoted = promoted,
            "Experiment concluded"
        );

        Ok(ConcludeExperimentResult {
            experiment_id: experiment_id.to_string(),
            winner,
            promoted,
        })
    }

    /// Resolve the arm for a visitor on a page, if an experiment is running.
    ///
    /// Returns the resolved component name alongside the arm so the caller
    /// can serve the right source.
    pub async fn resolve_variant(
        &self,
        funnel_id: &str,
        page_name: &str,
        session_id: &str,
    ) -> AppResult<Option<(Variant, String)>> {
        let experiment = match self
            .storage
            .get_running_experiment(funnel_id, page_name)
            .await?
        {
            Some(e) => e,
            None => return Ok(None),
        };

        let arm = assign(session_id, &experiment.id, experiment.traffic_split);
        let component = match arm {
            Variant::Control => experiment.control_name,
            Variant::Test => experiment.test_name,
        };

        Ok(Some((arm, component)))
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

/// Replace every whole-word occurrence of `from` with `to`.
///
/// Word boundaries are identifier boundaries: a match does not touch
/// occurrences embedded in a longer identifier. Any unrelated identifier that
/// exactly equals `from` is renamed as well; that matches the promotion
/// semantics, which preserve internal self-references by renaming all exact
/// uses of the test component name.
pub fn rename_identifier(source: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return source.to_string();
    }

    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < source.len() {
        if source[i..].starts_with(from) {
            let end = i + from.len();
            let boundary_before = i == 0 || !is_ident_byte(bytes[i - 1]);
            let boundary_after = end >= bytes.len() || !is_ident_byte(bytes[end]);
            if boundary_before && boundary_after {
                out.push_str(to);
                i = end;
                continue;
            }
        }
        match source[i..].chars().next() {
            Some(c) => {
                out.push(c);
                i += c.len_utf8();
            }
            None => break,
        }
    }

    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_whole_word_only() {
        let source = "function Landing_v2() { return <Landing_v2Props x={Landing_v2} />; }";
        let renamed = rename_identifier(source, "Landing_v2", "Landing");

        assert_eq!(
            renamed,
            "function Landing() { return <Landing_v2Props x={Landing} />; }"
        );
        // Longer identifiers sharing the prefix survive
        assert!(renamed.contains("Landing_v2Props"));
    }

    #[test]
    fn test_rename_leaves_no_residual_occurrences() {
        let source = "const Checkout_v3 = () => {};\nexport default Checkout_v3;\n// Checkout_v3 notes";
        let renamed = rename_identifier(source, "Checkout_v3", "Checkout");

        assert!(!renamed.contains("Checkout_v3"));
        assert_eq!(renamed.matches("Checkout").count(), 3);
    }

    #[test]
    fn test_rename_at_string_edges() {
        assert_eq!(rename_identifier("Sales_v1", "Sales_v1", "Sales"), "Sales");
        assert_eq!(
            rename_identifier("x Sales_v1", "Sales_v1", "Sales"),
            "x Sales"
        );
        assert_eq!(
            rename_identifier("Sales_v1 x", "Sales_v1", "Sales"),
            "Sales x"
        );
    }

    #[test]
    fn test_rename_handles_non_ascii_neighbors() {
        let source = "été Landing_v2 été";
        assert_eq!(
            rename_identifier(source, "Landing_v2", "Landing"),
            "été Landing été"
        );
    }

    #[test]
    fn test_rename_empty_needle_is_noop() {
        assert_eq!(rename_identifier("abc", "", "x"), "abc");
    }

    #[test]
    fn test_marker_prefix_idempotent() {
        let marked = with_no_typecheck_marker("const x = 1;");
        assert!(marked.starts_with(NO_TYPECHECK_MARKER));
        assert_eq!(with_no_typecheck_marker(&marked), marked);
    }
}
