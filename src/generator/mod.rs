//! Client for the external page generation service.
//!
//! The generator turns product metadata plus a page specification (or a legacy
//! page type) into component source code. It is consumed through the
//! [`PageGenerator`] trait so orchestration code can be exercised without the
//! network.

mod client;
mod types;

pub use client::HttpGenerator;
pub use types::{GeneratedPage, GenerationRequest, ProductInfo};

use async_trait::async_trait;

use crate::error::GeneratorResult;

/// Interface to the external generative text service.
///
/// A call may fail with a human-readable message; the caller performs no
/// retries, so a failure surfaces as a per-page error on the batch path.
#[async_trait]
pub trait PageGenerator: Send + Sync {
    /// Generate source code for one page component.
    async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedPage>;
}
