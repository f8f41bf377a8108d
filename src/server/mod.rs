//! Server module for JSON-RPC 2.0 handling over stdio.
//!
//! This module provides:
//! - JSON-RPC 2.0 server implementation over stdio
//! - Method handlers and routing
//! - Shared application state management

mod handlers;
mod rpc;

pub use handlers::*;
pub use rpc::*;

use std::sync::Arc;
use std::time::Duration;

use crate::analytics::AnalyticsAggregator;
use crate::config::Config;
use crate::events::EventIngress;
use crate::experiments::ExperimentEngine;
use crate::funnels::FunnelManager;
use crate::generation::BatchOrchestrator;
use crate::generator::PageGenerator;
use crate::ratelimit::CooldownGate;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
///
/// Contains all subsystem handlers and the shared resources needed to
/// process funnel requests.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Funnel repository handler.
    pub funnels: FunnelManager,
    /// Batch page-generation orchestrator.
    pub orchestrator: BatchOrchestrator,
    /// Experiment lifecycle handler.
    pub experiments: ExperimentEngine,
    /// Analytics aggregation handler.
    pub analytics: AnalyticsAggregator,
    /// Visitor event ingress.
    pub events: EventIngress,
    /// Cooldown gate for creation endpoints.
    pub cooldowns: CooldownGate,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage, generator: Arc<dyn PageGenerator>) -> Self {
        tracing::info!(
            batch_size = config.orchestrator.batch_size,
            cooldown_ms = config.rate_limit.cooldown_ms,
            "AppState initializing"
        );

        let funnels = FunnelManager::new(storage.clone());
        let orchestrator = BatchOrchestrator::new(
            storage.clone(),
            Arc::clone(&generator),
            config.orchestrator.batch_size,
        );
        let experiments = ExperimentEngine::new(storage.clone(), Arc::clone(&generator));
        let analytics = AnalyticsAggregator::new(storage.clone());
        let events = EventIngress::new(storage.clone());
        let cooldowns = CooldownGate::new(Duration::from_millis(config.rate_limit.cooldown_ms));

        Self {
            config,
            storage,
            funnels,
            orchestrator,
            experiments,
            analytics,
            events,
            cooldowns,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
