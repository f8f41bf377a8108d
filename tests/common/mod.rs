//! Shared test fixtures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use funnelforge::error::{GeneratorError, GeneratorResult};
use funnelforge::generator::{GeneratedPage, GenerationRequest, PageGenerator};
use funnelforge::storage::SqliteStorage;

/// Create an in-memory storage instance for testing
pub async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

/// Scripted generator double: succeeds with a canned component unless the
/// requested component name is in the failure set.
#[derive(Default)]
pub struct ScriptedGenerator {
    fail_components: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failing_all() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn failing_for(components: &[&str]) -> Self {
        Self {
            fail_components: components.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all || self.fail_components.contains(&request.component_name) {
            return Err(GeneratorError::Api {
                status: 429,
                message: "quota exhausted".to_string(),
            });
        }

        Ok(GeneratedPage {
            component_name: request.component_name.clone(),
            code: format!(
                "export default function {}() {{ return null; }}",
                request.component_name
            ),
        })
    }
}
