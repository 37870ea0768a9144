//! Retry with exponential backoff for transient MusicBrainz faults
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is transient and retries remain: log WARN, back off, retry
//! 4. Otherwise return the error
//!
//! **Backoff Strategy:**
//! - Initial delay: `initial_backoff`
//! - Multiplier: 2.0 (exponential)
//! - Capped at `max_backoff`

use std::future::Future;
use std::time::Duration;

use crate::services::musicbrainz_client::MBError;

/// Retry limits and backoff timing
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Run `operation`, retrying transient failures per `policy`.
///
/// Returns the last error once retries are exhausted.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, MBError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MBError>>,
{
    let mut retry = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if retry > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        retries = retry,
                        "MusicBrainz request succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let backoff = policy.backoff_for(retry);

                tracing::warn!(
                    operation = operation_name,
                    retry,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient MusicBrainz error, will retry after backoff"
                );

                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(
                        operation = operation_name,
                        retries = retry,
                        error = %err,
                        "MusicBrainz request failed: retries exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
