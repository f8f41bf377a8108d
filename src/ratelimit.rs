//! Process-local cooldown gate for expensive creation/improvement endpoints.
//!
//! A keyed last-action timestamp compared against a fixed cooldown; requests
//! arriving too soon are rejected with the remaining wait. Not a queue, and
//! deliberately scoped to one process instance: it does not coordinate
//! across concurrent deployments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{AppError, AppResult};

/// Reject-if-too-soon gate keyed by operation name.
pub struct CooldownGate {
    cooldown: Duration,
    last_action: Mutex<HashMap<String, Instant>>,
}

impl CooldownGate {
    /// Create a gate with the given cooldown
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_action: Mutex::new(HashMap::new()),
        }
    }

    /// Check the gate for a key, claiming the slot on success.
    ///
    /// Returns `RateLimited` with the remaining wait when the cooldown for
    /// this key has not elapsed.
    pub fn check(&self, key: &str) -> AppResult<()> {
        let mut last_action = self
            .last_action
            .lock()
            .map_err(|_| AppError::Internal {
                message: "cooldown gate lock poisoned".to_string(),
            })?;

        if let Some(last) = last_action.get(key) {
            let elapsed = last.elapsed();
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(AppError::RateLimited {
                    retry_after_ms: remaining.as_millis() as u64,
                });
            }
        }

        last_action.insert(key.to_string(), Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_passes() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        assert!(gate.check("experiment.create:fn-1").is_ok());
    }

    #[test]
    fn test_second_call_within_cooldown_rejected() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        gate.check("op").unwrap();

        let err = gate.check("op").unwrap_err();
        match err {
            AppError::RateLimited { retry_after_ms } => {
                assert!(retry_after_ms > 0 && retry_after_ms <= 60_000);
            }
            other => panic!("expected RateLimited, got {other}"),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let gate = CooldownGate::new(Duration::from_secs(60));
        gate.check("op:fn-1").unwrap();
        assert!(gate.check("op:fn-2").is_ok());
    }

    #[test]
    fn test_passes_after_cooldown() {
        let gate = CooldownGate::new(Duration::from_millis(10));
        gate.check("op").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(gate.check("op").is_ok());
    }
}
