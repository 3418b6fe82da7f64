//! Backoff for store requests.
//!
//! Reads are retried on transport trouble and throttling. Conditional writes
//! (update-if-unchanged, create-if-absent) are retried the same way, with one
//! twist: once an attempt has failed in transit, a later "precondition failed"
//! or "already exists" answer may be the echo of our own earlier write. Such
//! answers come back as [`WriteAttempt::Ambiguous`] and the caller re-reads.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info_span, warn, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_retry;

/// How one failed attempt is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Network failure, 429 or 5xx; back off and go again.
    Transient,
    /// The store answered a conditional request with "no".
    Rejected,
    Fatal,
}

impl Disposition {
    pub fn of(error: &StoreError) -> Self {
        if error.is_precondition_failed() || error.is_already_exists() {
            Disposition::Rejected
        } else if error.is_retryable() {
            Disposition::Transient
        } else {
            Disposition::Fatal
        }
    }
}

/// Result of a conditional write run under a [`RetryPolicy`].
#[derive(Debug)]
pub enum WriteAttempt<T> {
    Done(T),
    /// Rejected with no earlier attempt in flight: a lost race.
    Rejected(StoreError),
    /// Rejected after an earlier attempt failed in transit; that attempt may
    /// have been applied.
    Ambiguous(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

fn env_millis(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl RetryPolicy {
    /// `FIRESTORE_RETRY_BASE_MS` / `FIRESTORE_RETRY_MAX_MS` over the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_delay_ms: env_millis("FIRESTORE_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_millis("FIRESTORE_RETRY_MAX_MS", defaults.max_delay_ms),
            ..defaults
        }
    }

    /// Run a read, retrying transient failures.
    pub async fn read<T, F, Fut>(&self, operation: &str, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        self.drive(operation, op).await.0
    }

    /// Run a conditional write, retrying transient failures and telling a
    /// lost race apart from a possibly-landed earlier attempt.
    pub async fn conditional_write<T, F, Fut>(
        &self,
        operation: &str,
        op: F,
    ) -> StoreResult<WriteAttempt<T>>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let (result, interrupted) = self.drive(operation, op).await;
        match result {
            Ok(value) => Ok(WriteAttempt::Done(value)),
            Err(e) if Disposition::of(&e) == Disposition::Rejected => {
                if interrupted {
                    warn!(operation = %operation, "Conditional write rejected after an interrupted attempt: {}", e);
                    Ok(WriteAttempt::Ambiguous(e))
                } else {
                    debug!(operation = %operation, "Conditional write rejected: {}", e);
                    Ok(WriteAttempt::Rejected(e))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the final result and whether any transient failure preceded it.
    async fn drive<T, F, Fut>(&self, operation: &str, op: F) -> (StoreResult<T>, bool)
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let mut interrupted = false;
        let mut attempt = 0;
        loop {
            let span = info_span!("store_attempt", operation = %operation, attempt = attempt + 1);
            let err = match op().instrument(span).await {
                Ok(value) => return (Ok(value), interrupted),
                Err(e) => e,
            };

            if Disposition::of(&err) != Disposition::Transient || attempt >= self.max_retries {
                return (Err(err), interrupted);
            }

            let delay = self.delay(attempt, err.retry_after_ms());
            warn!(
                operation = %operation,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Store request failed, backing off: {}",
                err
            );
            record_retry(operation);
            interrupted = true;
            attempt += 1;
            tokio::time::sleep(delay).await;
        }
    }

    /// Server-requested delay if any, otherwise capped exponential backoff
    /// with jitter, never below the base delay.
    fn delay(&self, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
        if let Some(after) = retry_after_ms {
            return Duration::from_millis(after);
        }
        let ceiling = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(jitter(ceiling).max(self.base_delay_ms))
    }
}

/// Uniform-ish value in `0..=ceiling` from the clock's sub-second nanos.
fn jitter(ceiling: u64) -> u64 {
    if ceiling == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    ceiling.saturating_mul(nanos % 1001) / 1000
}
