//! # FunnelForge
//!
//! A marketing-funnel engine exposed as a JSON-RPC 2.0 service over stdio.
//! Funnels are ordered sequences of pages whose source code is produced by an
//! external generative text service; the engine orchestrates batch page
//! generation, runs A/B experiments on individual pages, and aggregates
//! visitor events into per-step analytics.
//!
//! ## Features
//!
//! - **Funnel repository**: create, list, update, hide/restore, and delete
//!   funnels with their page scaffolds
//! - **Batch generation**: concurrent page generation in fixed-size batches
//!   with per-page failure isolation
//! - **Experiments**: versioned test variants, deterministic traffic
//!   assignment, and winner promotion into the control slot
//! - **Analytics**: per-step visitor deduplication, conversion, and drop-off
//!   computed from the raw event stream
//!
//! ## Architecture
//!
//! ```text
//! RPC Client → JSON-RPC Server (Rust) → Page Generator API (HTTP)
//!                     ↓
//!               SQLite (State)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use funnelforge::{AppState, Config, RpcServer};
//! use funnelforge::generator::HttpGenerator;
//! use funnelforge::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let generator = Arc::new(HttpGenerator::new(&config.generator, config.request.clone())?);
//!     let state = Arc::new(AppState::new(config, storage, generator));
//!     let server = RpcServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Analytics aggregation over the visitor event stream.
pub mod analytics;
/// Configuration management for the service.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Visitor event ingestion.
pub mod events;
/// A/B experiment lifecycle and traffic assignment.
pub mod experiments;
/// Funnel repository operations.
pub mod funnels;
/// Batch page-generation orchestration.
pub mod generation;
/// Page generator API client and types.
pub mod generator;
/// System prompts for page generation.
pub mod prompts;
/// Cooldown-based rate limiting for creation endpoints.
pub mod ratelimit;
/// JSON-RPC server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, RpcServer, SharedState};
