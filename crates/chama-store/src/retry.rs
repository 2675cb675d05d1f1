// SPDX-License-Identifier: Apache-2.0

//! Bounded retries for record-store and RPC reads.

use std::future::Future;
use std::time::Duration;

/// Attempt budget for one logical read; the wait grows by
/// `base_backoff_ms` after each transient failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `failed + 1`.
    #[must_use]
    pub fn backoff_after(&self, failed: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(u64::from(failed)))
    }

    /// Calls `op` until it succeeds or fails in a way `is_retryable` rejects.
    /// The final error is passed through untouched.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &'static str,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let budget = self.max_attempts.max(1);
        let mut failed = 0_u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            failed += 1;
            if failed >= budget || !is_retryable(&err) {
                if failed > 1 {
                    tracing::debug!(op = label, attempts = failed, error = %err, "giving up");
                }
                return Err(err);
            }
            let wait = self.backoff_after(failed);
            tracing::warn!(
                op = label,
                attempt = failed,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient failure; retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
