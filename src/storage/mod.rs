//! Storage layer for funnel persistence.
//!
//! This module provides SQLite-based storage for funnels, pages, experiments,
//! visitor events, and improvement-log records. It is the single source of
//! truth for "is this page generated".

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// Order indexes at or above this value belong to experiment test variants and
/// never appear in step navigation or analytics step ordering.
pub const EXPERIMENT_ORDER_BASE: i64 = 99;

/// A marketing funnel: a named, ordered sequence of generated pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    /// Immutable identifier: product-name slug plus a random suffix.
    pub id: String,
    /// Product being sold through the funnel.
    pub product_name: String,
    /// Product description given to the generator.
    pub product_description: String,
    /// Audience description given to the generator.
    pub target_audience: String,
    /// Soft-delete flag; hidden funnels are excluded from listings.
    pub hidden: bool,
    /// Denormalized aggregate counters, updated by event ingestion.
    pub kpis: FunnelKpis,
    /// When the funnel was created.
    pub created_at: DateTime<Utc>,
}

/// Denormalized funnel-level KPI counters.
///
/// Updated as events arrive, never recomputed transactionally; the analytics
/// aggregator is the authoritative read path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelKpis {
    pub visitors: i64,
    pub cta_clicks: i64,
    pub email_captures: i64,
    pub purchases: i64,
    pub avg_scroll_depth: f64,
    pub conversion_rate: f64,
}

/// One step of a funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Unique page identifier.
    pub id: String,
    /// Owning funnel.
    pub funnel_id: String,
    /// Component name, unique within the funnel.
    pub component_name: String,
    /// Step sequence position; experiment variants use the reserved range
    /// starting at [`EXPERIMENT_ORDER_BASE`].
    pub order_index: i64,
    /// Legacy page type tag for type-driven generation.
    pub page_type: Option<String>,
    /// Stored page specification for spec-driven generation.
    pub page_spec: Option<String>,
    /// Generated source code; `None` until generation succeeds.
    pub source_code: Option<String>,
    /// Last generation error; cleared on success.
    pub generation_error: Option<String>,
    /// When the page record was created.
    pub created_at: DateTime<Utc>,
}

/// Legacy page type, inferred from position for older 3-4 page funnels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Landing,
    Sales,
    Checkout,
    ThankYou,
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageType::Landing => write!(f, "landing"),
            PageType::Sales => write!(f, "sales"),
            PageType::Checkout => write!(f, "checkout"),
            PageType::ThankYou => write!(f, "thank_you"),
        }
    }
}

impl std::str::FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "landing" => Ok(PageType::Landing),
            "sales" => Ok(PageType::Sales),
            "checkout" => Ok(PageType::Checkout),
            "thank_you" | "thankyou" => Ok(PageType::ThankYou),
            _ => Err(format!("Unknown page type: {}", s)),
        }
    }
}

/// An A/B experiment attached to one page slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    /// Unique experiment identifier.
    pub id: String,
    /// Owning funnel.
    pub funnel_id: String,
    /// Target page name; the control component name equals this.
    pub page_name: String,
    /// Current lifecycle state.
    pub status: ExperimentStatus,
    /// Control component name (the original page).
    pub control_name: String,
    /// Versioned test component name, e.g. `Landing_v2`.
    pub test_name: String,
    /// Fraction of traffic routed to the control arm, in (0,1).
    pub traffic_split: f64,
    /// Visitors assigned to control.
    pub control_visitors: i64,
    /// Conversions recorded for control.
    pub control_conversions: i64,
    /// Visitors assigned to test.
    pub test_visitors: i64,
    /// Conversions recorded for test.
    pub test_conversions: i64,
    /// Winner once concluded.
    pub winner: Option<Variant>,
    /// When the experiment started running.
    pub started_at: DateTime<Utc>,
    /// When the experiment was concluded.
    pub concluded_at: Option<DateTime<Utc>>,
}

/// Experiment lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Experiment is live and assigning traffic.
    #[default]
    Running,
    /// Experiment has been concluded; terminal.
    Concluded,
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentStatus::Running => write!(f, "running"),
            ExperimentStatus::Concluded => write!(f, "concluded"),
        }
    }
}

impl std::str::FromStr for ExperimentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(ExperimentStatus::Running),
            "concluded" => Ok(ExperimentStatus::Concluded),
            _ => Err(format!("Unknown experiment status: {}", s)),
        }
    }
}

/// Experiment arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Original page.
    Control,
    /// Candidate improvement.
    Test,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Control => write!(f, "control"),
            Variant::Test => write!(f, "test"),
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "control" => Ok(Variant::Control),
            "test" => Ok(Variant::Test),
            _ => Err(format!("Unknown variant: {}", s)),
        }
    }
}

/// An immutable visitor behavior event.
///
/// Event types are open-ended strings; constants exist for the well-known
/// ones. No foreign keys are enforced, so events referencing deleted funnels
/// are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier.
    pub id: String,
    /// Funnel the event belongs to.
    pub funnel_id: String,
    /// Resolved variant name the visitor actually saw.
    pub page_name: String,
    /// Client-held session token.
    pub session_id: String,
    /// Visitor identity; dedup falls back to `session_id` when absent.
    pub visitor_id: Option<String>,
    /// Event type, e.g. `page_view`, `cta_click`.
    pub event_type: String,
    /// Optional numeric payload (scroll depth, purchase value).
    pub value: Option<f64>,
    /// Experiment arm tag, when the page was under experiment.
    pub variant: Option<String>,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Well-known event type names.
pub mod event_types {
    pub const PAGE_VIEW: &str = "page_view";
    pub const CTA_CLICK: &str = "cta_click";
    pub const EMAIL_CAPTURE: &str = "email_capture";
    pub const PURCHASE: &str = "purchase";
    pub const SCROLL_DEPTH: &str = "scroll_depth";
}

/// Append-only record of one improvement attempt; audit history only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementLog {
    /// Unique log entry identifier.
    pub id: String,
    /// Owning funnel.
    pub funnel_id: String,
    /// Version number, monotonic per funnel.
    pub version: i64,
    /// Page targeted by the improvement.
    pub page_name: String,
    /// Reasoning text behind the improvement.
    pub reasoning: String,
    /// KPI counters at the time of the request.
    pub kpi_snapshot: serde_json::Value,
    /// When the attempt was logged.
    pub created_at: DateTime<Utc>,
}

impl Funnel {
    /// Create a new funnel with a slugged id derived from the product name
    pub fn new(
        product_name: impl Into<String>,
        product_description: impl Into<String>,
        target_audience: impl Into<String>,
    ) -> Self {
        let product_name = product_name.into();
        Self {
            id: build_funnel_id(&product_name),
            product_name,
            product_description: product_description.into(),
            target_audience: target_audience.into(),
            hidden: false,
            kpis: FunnelKpis::default(),
            created_at: Utc::now(),
        }
    }
}

/// Build a funnel id: lowercase slug of the name plus a random 6-char suffix.
fn build_funnel_id(product_name: &str) -> String {
    let mut slug = String::with_capacity(product_name.len());
    let mut last_dash = true;
    for c in product_name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "funnel" } else { slug };
    let suffix: String = Uuid::new_v4().simple().to_string()[..6].to_string();
    format!("{}-{}", slug, suffix)
}

impl Page {
    /// Create a new ungenerated page
    pub fn new(
        funnel_id: impl Into<String>,
        component_name: impl Into<String>,
        order_index: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            funnel_id: funnel_id.into(),
            component_name: component_name.into(),
            order_index,
            page_type: None,
            page_spec: None,
            source_code: None,
            generation_error: None,
            created_at: Utc::now(),
        }
    }

    /// Set the legacy page type
    pub fn with_type(mut self, page_type: PageType) -> Self {
        self.page_type = Some(page_type.to_string());
        self
    }

    /// Set the stored page specification
    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.page_spec = Some(spec.into());
        self
    }

    /// Set the source code
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_code = Some(source.into());
        self
    }

    /// Whether generation has produced source for this page
    pub fn is_generated(&self) -> bool {
        self.source_code.is_some()
    }

    /// Whether this page is an experiment test variant rather than a real step
    pub fn is_experiment_variant(&self) -> bool {
        self.order_index >= EXPERIMENT_ORDER_BASE
    }
}

impl Experiment {
    /// Create a new running experiment for a page slot
    pub fn new(
        funnel_id: impl Into<String>,
        page_name: impl Into<String>,
        test_name: impl Into<String>,
        traffic_split: f64,
    ) -> Self {
        let page_name = page_name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            funnel_id: funnel_id.into(),
            control_name: page_name.clone(),
            page_name,
            status: ExperimentStatus::Running,
            test_name: test_name.into(),
            traffic_split,
            control_visitors: 0,
            control_conversions: 0,
            test_visitors: 0,
            test_conversions: 0,
            winner: None,
            started_at: Utc::now(),
            concluded_at: None,
        }
    }
}

impl Event {
    /// Create a new event
    pub fn new(
        funnel_id: impl Into<String>,
        page_name: impl Into<String>,
        session_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            funnel_id: funnel_id.into(),
            page_name: page_name.into(),
            session_id: session_id.into(),
            visitor_id: None,
            event_type: event_type.into(),
            value: None,
            variant: None,
            created_at: Utc::now(),
        }
    }

    /// Set the visitor identity
    pub fn with_visitor(mut self, visitor_id: impl Into<String>) -> Self {
        self.visitor_id = Some(visitor_id.into());
        self
    }

    /// Set the numeric payload
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the experiment arm tag
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Identity used for unique-visitor dedup
    pub fn visitor_key(&self) -> &str {
        self.visitor_id.as_deref().unwrap_or(&self.session_id)
    }
}

impl ImprovementLog {
    /// Create a new improvement log entry
    pub fn new(
        funnel_id: impl Into<String>,
        version: i64,
        page_name: impl Into<String>,
        reasoning: impl Into<String>,
        kpi_snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            funnel_id: funnel_id.into(),
            version,
            page_name: page_name.into(),
            reasoning: reasoning.into(),
            kpi_snapshot,
            created_at: Utc::now(),
        }
    }
}

/// Storage trait for database operations.
///
/// Defines all persistence operations for funnels, pages, experiments,
/// events, and improvement logs.
#[async_trait]
pub trait Storage: Send + Sync {
    // Funnel operations

    /// Create a new funnel.
    async fn create_funnel(&self, funnel: &Funnel) -> StorageResult<()>;
    /// Get a funnel by ID.
    async fn get_funnel(&self, id: &str) -> StorageResult<Option<Funnel>>;
    /// List funnels, optionally including hidden ones.
    async fn list_funnels(&self, include_hidden: bool) -> StorageResult<Vec<Funnel>>;
    /// Update funnel metadata and KPI counters.
    async fn update_funnel(&self, funnel: &Funnel) -> StorageResult<()>;
    /// Set or clear the hidden flag.
    async fn set_funnel_hidden(&self, id: &str, hidden: bool) -> StorageResult<()>;
    /// Permanently delete a funnel and its pages and experiments.
    /// Events are left orphaned by design.
    async fn delete_funnel(&self, id: &str) -> StorageResult<()>;
    /// Apply one event to the denormalized KPI counters. Best-effort.
    async fn bump_funnel_kpis(
        &self,
        funnel_id: &str,
        event_type: &str,
        value: Option<f64>,
    ) -> StorageResult<()>;

    // Page operations

    /// Insert or replace a page, keyed on (funnel_id, component_name).
    async fn upsert_page(&self, page: &Page) -> StorageResult<()>;
    /// Get a page by funnel and component name.
    async fn get_page(&self, funnel_id: &str, component_name: &str)
        -> StorageResult<Option<Page>>;
    /// Get all pages of a funnel ordered by order index.
    async fn get_funnel_pages(&self, funnel_id: &str) -> StorageResult<Vec<Page>>;
    /// Persist generated source code for a page.
    async fn set_page_source(
        &self,
        funnel_id: &str,
        component_name: &str,
        source: &str,
    ) -> StorageResult<()>;
    /// Set or clear the per-page generation error.
    async fn set_page_error(
        &self,
        funnel_id: &str,
        component_name: &str,
        error: Option<&str>,
    ) -> StorageResult<()>;

    // Experiment operations

    /// Create a new experiment record.
    async fn create_experiment(&self, experiment: &Experiment) -> StorageResult<()>;
    /// Get an experiment by ID.
    async fn get_experiment(&self, id: &str) -> StorageResult<Option<Experiment>>;
    /// Get the running experiment for a (funnel, page) pair, if any.
    async fn get_running_experiment(
        &self,
        funnel_id: &str,
        page_name: &str,
    ) -> StorageResult<Option<Experiment>>;
    /// Count all experiments, running or concluded, for a page slot.
    async fn count_page_experiments(
        &self,
        funnel_id: &str,
        page_name: &str,
    ) -> StorageResult<i64>;
    /// Get all experiments for a funnel, oldest first.
    async fn get_funnel_experiments(&self, funnel_id: &str) -> StorageResult<Vec<Experiment>>;
    /// Update an experiment record.
    async fn update_experiment(&self, experiment: &Experiment) -> StorageResult<()>;

    // Event operations

    /// Append one event. Events are immutable once written.
    async fn append_event(&self, event: &Event) -> StorageResult<()>;
    /// Get all events for a funnel, oldest first.
    async fn get_funnel_events(&self, funnel_id: &str) -> StorageResult<Vec<Event>>;

    // Improvement log operations

    /// Append an improvement log entry.
    async fn append_improvement(&self, entry: &ImprovementLog) -> StorageResult<()>;
    /// Get a funnel's improvement history, oldest first.
    async fn get_funnel_improvements(&self, funnel_id: &str)
        -> StorageResult<Vec<ImprovementLog>>;

    /// Append to the independent generation failure log. Callers treat this
    /// as best-effort and must tolerate failure.
    async fn append_generation_failure(
        &self,
        funnel_id: &str,
        page_name: &str,
        error: &str,
    ) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_funnel_id_slug() {
        let funnel = Funnel::new("Acme Widget Pro!", "desc", "makers");
        assert!(funnel.id.starts_with("acme-widget-pro-"));
        assert_eq!(funnel.id.len(), "acme-widget-pro-".len() + 6);

        let odd = Funnel::new("***", "desc", "makers");
        assert!(odd.id.starts_with("funnel-"));
    }

    #[test]
    fn test_page_builders() {
        let page = Page::new("fn-1", "Landing", 0).with_type(PageType::Landing);
        assert!(!page.is_generated());
        assert!(!page.is_experiment_variant());
        assert_eq!(page.page_type.as_deref(), Some("landing"));

        let variant = Page::new("fn-1", "Landing_v2", EXPERIMENT_ORDER_BASE + 2);
        assert!(variant.is_experiment_variant());
    }

    #[test]
    fn test_experiment_new_defaults() {
        let exp = Experiment::new("fn-1", "Landing", "Landing_v1", 0.5);
        assert_eq!(exp.status, ExperimentStatus::Running);
        assert_eq!(exp.control_name, "Landing");
        assert_eq!(exp.test_name, "Landing_v1");
        assert!(exp.winner.is_none());
        assert!(exp.concluded_at.is_none());
    }

    #[test]
    fn test_event_visitor_key_fallback() {
        let event = Event::new("fn-1", "Landing", "sess-1", event_types::PAGE_VIEW);
        assert_eq!(event.visitor_key(), "sess-1");

        let event = event.with_visitor("vis-1");
        assert_eq!(event.visitor_key(), "vis-1");
    }

    #[test]
    fn test_enum_round_trips() {
        assert_eq!(PageType::from_str("thank_you").unwrap(), PageType::ThankYou);
        assert_eq!(PageType::ThankYou.to_string(), "thank_you");
        assert_eq!(
            ExperimentStatus::from_str("concluded").unwrap(),
            ExperimentStatus::Concluded
        );
        assert_eq!(Variant::from_str("test").unwrap(), Variant::Test);
        assert!(Variant::from_str("champion").is_err());
    }
}
