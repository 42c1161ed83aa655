//! Bounded retry with exponential backoff.
//!
//! Every external call in the pipeline goes through a [`RetryExecutor`]
//! so each call site's failure policy is explicit and testable in
//! isolation. Two retryable classes exist with independent budgets:
//!
//! - **Transient** transport failures ([`ResearchError::is_transient`])
//!   are resent after an exponential backoff delay.
//! - **Malformed output** ([`ResearchError::is_malformed_output`]) is
//!   retried with a corrective re-prompt through
//!   [`RetryExecutor::execute_with_reprompt`], under the smaller
//!   `parse_retries` budget.
//!
//! Backoff suspends only the calling task; sibling tasks keep running.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::metrics::{CallKind, MetricsCollector};
use crate::error::ResearchError;

/// Default transient retry attempts after the initial call.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default first backoff delay.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Default backoff ceiling.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
/// Default backoff multiplier.
const DEFAULT_EXPONENTIAL_BASE: f64 = 2.0;

/// Backoff policy for transient failures.
///
/// Attempt `i` (0-based) that fails transiently is followed by a delay
/// of `min(max_delay, initial_delay * exponential_base^i)` before the
/// next attempt. `max_retries` bounds the number of delays, so a call
/// makes at most `max_retries + 1` attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Backoff multiplier per attempt.
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            exponential_base: DEFAULT_EXPONENTIAL_BASE,
        }
    }
}

impl RetryPolicy {
    /// Computes the backoff delay for a 0-based attempt index.
    ///
    /// Pure function of the policy, fully deterministic.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Validates the policy fields.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidConfig`] if `exponential_base`
    /// is below 1.0 or `max_delay` is below `initial_delay`.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.exponential_base < 1.0 {
            return Err(ResearchError::InvalidConfig {
                message: format!(
                    "exponential_base must be >= 1.0, got {}",
                    self.exponential_base
                ),
            });
        }
        if self.max_delay < self.initial_delay {
            return Err(ResearchError::InvalidConfig {
                message: "max_delay must be >= initial_delay".to_string(),
            });
        }
        Ok(())
    }
}

/// Wraps fallible external calls with bounded retry.
///
/// Cheap to clone: holds the policy by value and the metrics collector
/// by handle.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    parse_retries: u32,
    metrics: Arc<MetricsCollector>,
}

impl RetryExecutor {
    /// Creates an executor with the given policy and re-prompt budget.
    #[must_use]
    pub fn new(policy: RetryPolicy, parse_retries: u32, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            policy,
            parse_retries,
            metrics,
        }
    }

    /// Executes `operation` with transient-failure retry.
    ///
    /// On success the attempt's timing is recorded under `name`. A
    /// non-transient error returns immediately. A transient error is
    /// resent after backoff until the budget is exhausted, at which
    /// point the last error is returned inside
    /// [`ResearchError::RetriesExhausted`] tagged with the attempt
    /// count, and a retry-exhaustion event is recorded.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, wrapped as described above.
    pub async fn execute<T, F, Fut>(
        &self,
        kind: CallKind,
        name: &str,
        mut operation: F,
    ) -> Result<T, ResearchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResearchError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = {
                let _span = self.metrics.timer(name);
                operation().await
            };

            match result {
                Ok(value) => {
                    self.metrics.record_call(kind, true);
                    if attempt > 0 {
                        debug!(operation = name, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    self.metrics.record_call(kind, false);
                    self.metrics.record_retry(kind);
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "transient failure, backing off"
                    );
                    // Suspends only this task; siblings keep running.
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    self.metrics.record_call(kind, false);
                    let attempts = attempt + 1;
                    self.metrics
                        .error(&format!("{name} exhausted {attempts} attempts: {err}"));
                    return Err(ResearchError::RetriesExhausted {
                        operation: name.to_string(),
                        attempts,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    self.metrics.record_call(kind, false);
                    return Err(err);
                }
            }
        }
    }

    /// Executes an LLM call whose structured output may need a
    /// corrective re-prompt.
    ///
    /// `operation` receives the previous parse failure's message
    /// (`None` on the first attempt) so the call site can append a
    /// corrective instruction rather than plainly resending. Transient
    /// failures within each attempt are handled by [`Self::execute`]
    /// under the normal backoff budget; only malformed-output errors
    /// consume the separate `parse_retries` budget.
    ///
    /// # Errors
    ///
    /// Returns the last error once both budgets are exhausted.
    pub async fn execute_with_reprompt<T, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
    ) -> Result<T, ResearchError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ResearchError>>,
    {
        let mut hint: Option<String> = None;
        let mut attempt: u32 = 0;
        loop {
            let current_hint = hint.clone();
            let result = self
                .execute(CallKind::Llm, name, || operation(current_hint.clone()))
                .await;

            match result {
                Ok(value) => return Ok(value),
                Err(ResearchError::ResponseParse { message, content })
                    if attempt < self.parse_retries =>
                {
                    self.metrics.record_parse_failure();
                    warn!(
                        operation = name,
                        attempt,
                        error = %message,
                        "malformed output, re-prompting"
                    );
                    debug!(operation = name, content = %content, "unparsable response content");
                    hint = Some(message);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_malformed_output() {
                        self.metrics.record_parse_failure();
                        self.metrics.error(&format!(
                            "{name} output unparsable after {} attempts",
                            attempt + 1
                        ));
                    }
                    return Err(err);
                }
            }
        }
    }

    /// The transient backoff policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn executor(policy: RetryPolicy, parse_retries: u32) -> RetryExecutor {
        RetryExecutor::new(policy, parse_retries, Arc::new(MetricsCollector::new()))
    }

    fn transient() -> ResearchError {
        ResearchError::ApiRequest {
            message: "connection reset".to_string(),
            status: None,
        }
    }

    #[test]
    fn test_delay_sequence_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(9), Duration::from_secs(30));
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        let bad_base = RetryPolicy {
            exponential_base: 0.5,
            ..RetryPolicy::default()
        };
        assert!(bad_base.validate().is_err());
        let inverted = RetryPolicy {
            initial_delay: Duration::from_secs(60),
            ..RetryPolicy::default()
        };
        assert!(inverted.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_delay_never_exceeds_cap(attempt in 0u32..64, base in 1.0f64..4.0, initial_ms in 1u64..5_000) {
            let policy = RetryPolicy {
                max_retries: 10,
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_secs(30),
                exponential_base: base,
            };
            prop_assert!(policy.delay_for(attempt) <= Duration::from_secs(30));
        }

        #[test]
        fn prop_delay_monotonic_nondecreasing(attempt in 0u32..32) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.delay_for(attempt) <= policy.delay_for(attempt + 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let exec = executor(RetryPolicy::default(), 2);
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = exec
            .execute(CallKind::Llm, "op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap_or_default(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retried_then_succeeds() {
        let exec = executor(RetryPolicy::default(), 2);
        let calls = AtomicU32::new(0);
        let result: Result<&str, _> = exec
            .execute(CallKind::Llm, "op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_max_retries_plus_one_attempts() {
        let metrics = Arc::new(MetricsCollector::new());
        let exec = RetryExecutor::new(
            RetryPolicy {
                max_retries: 3,
                ..RetryPolicy::default()
            },
            2,
            Arc::clone(&metrics),
        );
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute(CallKind::Llm, "doomed", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(ResearchError::RetriesExhausted {
                operation,
                attempts,
                ..
            }) => {
                assert_eq!(operation, "doomed");
                assert_eq!(attempts, 4);
            }
            _ => unreachable!("expected RetriesExhausted"),
        }
        let snapshot = metrics.drain();
        assert_eq!(snapshot.llm_retries, 3);
        assert_eq!(snapshot.llm_failures, 4);
        assert_eq!(snapshot.errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_observed() {
        // With base 2.0 and initial 1s, three retries sleep 1 + 2 + 4 = 7s.
        let exec = executor(
            RetryPolicy {
                max_retries: 3,
                ..RetryPolicy::default()
            },
            0,
        );
        let start = Instant::now();
        let _result: Result<(), _> = exec
            .execute(CallKind::Search, "op", || async { Err(transient()) })
            .await;
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_not_retried() {
        let exec = executor(RetryPolicy::default(), 2);
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute(CallKind::Llm, "op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ResearchError::ApiRequest {
                        message: "unauthorized".to_string(),
                        status: Some(401),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reprompt_passes_hint_and_counts_separately() {
        let metrics = Arc::new(MetricsCollector::new());
        let exec = RetryExecutor::new(RetryPolicy::default(), 2, Arc::clone(&metrics));
        let calls = AtomicU32::new(0);

        let result: Result<&str, _> = exec
            .execute_with_reprompt("parse_op", |hint| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        assert!(hint.is_none());
                        Err(ResearchError::ResponseParse {
                            message: "missing field `queries`".to_string(),
                            content: "{}".to_string(),
                        })
                    } else {
                        assert_eq!(hint.as_deref(), Some("missing field `queries`"));
                        Ok("parsed")
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let snapshot = metrics.drain();
        assert_eq!(snapshot.parse_failures, 1);
        // Parse retries never consume the transient backoff budget.
        assert_eq!(snapshot.llm_retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reprompt_budget_exhaustion() {
        let exec = executor(RetryPolicy::default(), 2);
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute_with_reprompt("parse_op", |_hint| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ResearchError::ResponseParse {
                        message: "still not json".to_string(),
                        content: "nope".to_string(),
                    })
                }
            })
            .await;
        // Initial attempt + parse_retries re-prompts.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ResearchError::ResponseParse { .. })
        ));
    }
}
