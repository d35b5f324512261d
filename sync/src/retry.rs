//! Bounded exponential backoff for durable-storage writes.

use crate::SyncError;
use edgevote_store::StoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, warn};

/// Retry settings for storage calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time up
    /// to `max_backoff_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` until it succeeds or `max_attempts` is reached.
    ///
    /// `on_retry` is called before each sleep. Exhaustion is reported as
    /// [`SyncError::StorageExhausted`] carrying the last storage error.
    pub async fn run<T>(
        &self,
        what: &'static str,
        mut op: impl FnMut() -> Result<T, StoreError>,
        mut on_retry: impl FnMut(),
    ) -> Result<T, SyncError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(source) if attempt >= attempts => {
                    error!(what, attempts, error = %source, "storage retries exhausted");
                    return Err(SyncError::StorageExhausted { attempts, source });
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    warn!(what, attempt, delay_ms = delay.as_millis() as u64, error = %err, "storage call failed, retrying");
                    on_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(50));
        assert_eq!(p.backoff(2), Duration::from_millis(100));
        assert_eq!(p.backoff(3), Duration::from_millis(200));
        assert_eq!(p.backoff(10), Duration::from_millis(2_000));
        assert_eq!(p.backoff(80), Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let retries = Cell::new(0);
        let out = RetryPolicy::default()
            .run(
                "test",
                || {
                    calls.set(calls.get() + 1);
                    if calls.get() < 3 {
                        Err(StoreError::Unavailable("flaky".into()))
                    } else {
                        Ok(7)
                    }
                },
                || retries.set(retries.get() + 1),
            )
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(retries.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let err = RetryPolicy::default()
            .run(
                "test",
                || -> Result<(), StoreError> {
                    calls.set(calls.get() + 1);
                    Err(StoreError::Unavailable("down".into()))
                },
                || {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StorageExhausted { attempts: 5, .. }));
        assert_eq!(calls.get(), 5);
    }
}
