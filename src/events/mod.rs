//! Event ingress: validated append-only writes of visitor behavior events.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::storage::{Event, SqliteStorage, Storage};

/// Incoming event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub funnel_id: String,
    pub page_name: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Acknowledgement for a recorded event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub event_id: String,
}

/// Event store accessor for the ingress path
pub struct EventIngress {
    storage: SqliteStorage,
}

impl EventIngress {
    /// Create a new ingress handler
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Validate and append one event.
    ///
    /// Rejects when funnel id, event type, or session id is missing. No
    /// foreign keys are checked; events for deleted funnels are accepted
    /// and tolerated downstream.
    pub async fn record(&self, input: EventInput) -> AppResult<RecordedEvent> {
        if input.funnel_id.trim().is_empty() {
            return Err(AppError::validation("funnelId", "cannot be empty"));
        }
        if input.event_type.trim().is_empty() {
            return Err(AppError::validation("type", "cannot be empty"));
        }
        if input.session_id.trim().is_empty() {
            return Err(AppError::validation("sessionId", "cannot be empty"));
        }

        let mut event = Event::new(
            &input.funnel_id,
            &input.page_name,
            &input.session_id,
            &input.event_type,
        );
        event.visitor_id = input.visitor_id;
        event.value = input.value;
        event.variant = input.variant;

        self.storage.append_event(&event).await?;

        // Denormalized counters; the event stream remains authoritative, so
        // a failed bump is logged rather than surfaced.
        if let Err(e) = self
            .storage
            .bump_funnel_kpis(&input.funnel_id, &input.event_type, input.value)
            .await
        {
            warn!(
                funnel_id = %input.funnel_id,
                event_type = %input.event_type,
                error = %e,
                "Failed to bump funnel KPI counters"
            );
        }

        debug!(
            funnel_id = %input.funnel_id,
            page = %input.page_name,
            event_type = %input.event_type,
            "Event recorded"
        );

        Ok(RecordedEvent { event_id: event.id })
    }
}

impl EventInput {
    /// Create an input with the required fields
    pub fn new(
        funnel_id: impl Into<String>,
        page_name: impl Into<String>,
        session_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            funnel_id: funnel_id.into(),
            page_name: page_name.into(),
            session_id: session_id.into(),
            visitor_id: None,
            event_type: event_type.into(),
            value: None,
            variant: None,
        }
    }
}
