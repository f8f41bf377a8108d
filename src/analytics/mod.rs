//! Analytics aggregation: raw visitor events to per-step conversion and
//! drop-off figures plus a funnel-wide summary.
//!
//! Steps come from the funnel's canonical page list; experiment variants are
//! excluded, and events are matched by canonical page name so control and
//! test traffic for a step merge into one set of figures.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::storage::{event_types, Event, SqliteStorage, Storage, EXPERIMENT_ORDER_BASE};

/// Metrics for one funnel step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetrics {
    pub page_name: String,
    pub order_index: i64,
    /// Unique visitors (visitor id, falling back to session id) on page views
    pub visitors: u64,
    pub cta_clicks: u64,
    pub email_captures: u64,
    pub purchases: u64,
    /// Percent of first-step visitors reaching this step
    pub conversion_pct: i64,
    /// Percent lost versus the previous step; `None` for the first step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_off_pct: Option<i64>,
}

/// Funnel-wide summary across all events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSummary {
    pub total_visitors: u64,
    pub total_purchases: u64,
    pub overall_conversion_pct: i64,
}

/// Full analytics response for one funnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub steps: Vec<StepMetrics>,
    pub summary: Option<FunnelSummary>,
}

/// Analytics aggregation engine
pub struct AnalyticsAggregator {
    storage: SqliteStorage,
}

impl AnalyticsAggregator {
    /// Create a new aggregator
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Compute per-step metrics and the funnel summary from the event stream.
    ///
    /// A funnel with no pages or no events yields an empty step list and no
    /// summary; that is not an error.
    pub async fn get_analytics(&self, funnel_id: &str) -> AppResult<AnalyticsReport> {
        self.storage
            .get_funnel(funnel_id)
            .await?
            .ok_or_else(|| AppError::not_found("funnel", funnel_id))?;

        let pages = self.storage.get_funnel_pages(funnel_id).await?;
        let events = self.storage.get_funnel_events(funnel_id).await?;

        let step_pages: Vec<(String, i64)> = pages
            .into_iter()
            .filter(|p| p.order_index < EXPERIMENT_ORDER_BASE)
            .map(|p| (p.component_name, p.order_index))
            .collect();

        // Events recorded against a test component name fold back into the
        // canonical step they were an arm of, running or concluded alike
        let variant_steps: HashMap<String, String> = self
            .storage
            .get_funnel_experiments(funnel_id)
            .await?
            .into_iter()
            .map(|e| (e.test_name, e.page_name))
            .collect();

        debug!(
            funnel_id = %funnel_id,
            steps = step_pages.len(),
            events = events.len(),
            variants = variant_steps.len(),
            "Aggregating analytics"
        );

        Ok(aggregate(&step_pages, &events, &variant_steps))
    }
}

/// Pure aggregation over an ordered step list and an event stream.
///
/// `variant_steps` maps test component names to their canonical step so that
/// control and test traffic merge into one set of figures.
pub fn aggregate(
    step_pages: &[(String, i64)],
    events: &[Event],
    variant_steps: &HashMap<String, String>,
) -> AnalyticsReport {
    if step_pages.is_empty() || events.is_empty() {
        return AnalyticsReport {
            steps: Vec::new(),
            summary: None,
        };
    }

    let mut steps = Vec::with_capacity(step_pages.len());
    for (page_name, order_index) in step_pages {
        let mut visitor_set: HashSet<&str> = HashSet::new();
        let mut cta_clicks = 0u64;
        let mut email_captures = 0u64;
        let mut purchases = 0u64;

        for event in events
            .iter()
            .filter(|e| canonical_step(variant_steps, e) == page_name)
        {
            match event.event_type.as_str() {
                event_types::PAGE_VIEW => {
                    visitor_set.insert(event.visitor_key());
                }
                event_types::CTA_CLICK => cta_clicks += 1,
                event_types::EMAIL_CAPTURE => email_captures += 1,
                event_types::PURCHASE => purchases += 1,
                _ => {}
            }
        }

        steps.push(StepMetrics {
            page_name: page_name.clone(),
            order_index: *order_index,
            visitors: visitor_set.len() as u64,
            cta_clicks,
            email_captures,
            purchases,
            conversion_pct: 0,
            drop_off_pct: None,
        });
    }

    // Conversion is always relative to the first step; drop-off to the
    // immediately preceding one.
    let first_visitors = steps[0].visitors;
    for i in 0..steps.len() {
        steps[i].conversion_pct = ratio_pct(steps[i].visitors, first_visitors);
        if i > 0 {
            let prev = steps[i - 1].visitors;
            let lost = prev.saturating_sub(steps[i].visitors);
            steps[i].drop_off_pct = Some(ratio_pct(lost, prev));
        }
    }

    // Summary dedups across every page_view in the funnel, not just step pages
    let total_visitors = events
        .iter()
        .filter(|e| e.event_type == event_types::PAGE_VIEW)
        .map(|e| e.visitor_key())
        .collect::<HashSet<&str>>()
        .len() as u64;
    let total_purchases: u64 = steps.iter().map(|s| s.purchases).sum();

    AnalyticsReport {
        summary: Some(FunnelSummary {
            total_visitors,
            total_purchases,
            overall_conversion_pct: ratio_pct(total_purchases, total_visitors),
        }),
        steps,
    }
}

/// The step an event belongs to: its canonical page when it was recorded
/// against a test component name, its own page name otherwise.
fn canonical_step<'a>(variant_steps: &'a HashMap<String, String>, event: &'a Event) -> &'a str {
    variant_steps
        .get(&event.page_name)
        .map(String::as_str)
        .unwrap_or(&event.page_name)
}

/// round(100 * numerator / denominator), 0 on a zero denominator.
fn ratio_pct(numerator: u64, denominator: u64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    (100.0 * numerator as f64 / denominator as f64).round() as i64
}
