//! Thread-safe run metrics.
//!
//! A [`MetricsCollector`] is constructed per run and shared by handle
//! across every component that makes an external call. There is no
//! ambient global state: the collector is passed explicitly. All record
//! paths take `&self` and are safe from any number of concurrent tasks;
//! the single read path is [`MetricsCollector::drain`], which returns an
//! immutable [`MetricsSnapshot`] and resets the accumulator.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Maximum retained error/warning entries. Oldest are evicted first so
/// memory stays bounded under sustained failure.
const MAX_LOG_ENTRIES: usize = 50;

/// Maximum stored length of a single error message.
const MAX_ERROR_LEN: usize = 200;

/// Which class of external call a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Language-model inference call.
    Llm,
    /// Retrieval (search) call.
    Search,
}

#[derive(Debug, Default)]
struct OpStats {
    count: u64,
    total: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    ops: HashMap<String, OpStats>,
    llm_calls: u64,
    llm_failures: u64,
    llm_retries: u64,
    parse_failures: u64,
    api_calls: u64,
    api_failures: u64,
    api_retries: u64,
    urls_found: u64,
    urls_crawled: u64,
    urls_succeeded: u64,
    urls_failed: u64,
    chars_retrieved: u64,
    errors: VecDeque<LoggedEvent>,
    warnings: VecDeque<LoggedEvent>,
}

/// A timestamped log entry, offset from run start.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    /// Seconds since the collector was created.
    pub at_secs: f64,
    /// The message.
    pub message: String,
}

/// Collects counters, timings, and bounded error logs for one run.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    inner: Mutex<Inner>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates an empty collector stamped with the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn with_inner(&self, f: impl FnOnce(&mut Inner)) {
        // A poisoned lock means a panic mid-record; metrics are best
        // effort, so keep accepting updates on the recovered state.
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Records one attempted external call and its outcome.
    pub fn record_call(&self, kind: CallKind, success: bool) {
        self.with_inner(|inner| match kind {
            CallKind::Llm => {
                inner.llm_calls += 1;
                if !success {
                    inner.llm_failures += 1;
                }
            }
            CallKind::Search => {
                inner.api_calls += 1;
                if !success {
                    inner.api_failures += 1;
                }
            }
        });
    }

    /// Records one backoff-and-retry event.
    pub fn record_retry(&self, kind: CallKind) {
        self.with_inner(|inner| match kind {
            CallKind::Llm => inner.llm_retries += 1,
            CallKind::Search => inner.api_retries += 1,
        });
    }

    /// Records one malformed-output event (corrective re-prompt class).
    pub fn record_parse_failure(&self) {
        self.with_inner(|inner| inner.parse_failures += 1);
    }

    /// Accumulates a duration sample under an operation name.
    pub fn record_duration(&self, operation: &str, elapsed: Duration) {
        self.with_inner(|inner| {
            let stats = inner.ops.entry(operation.to_string()).or_default();
            stats.count += 1;
            stats.total += elapsed;
        });
    }

    /// Starts a scoped timing span. The duration is recorded when the
    /// returned guard drops.
    #[must_use]
    pub fn timer(&self, operation: &str) -> OpTimer<'_> {
        OpTimer {
            collector: self,
            operation: operation.to_string(),
            started: Instant::now(),
        }
    }

    /// Records URL-level retrieval outcomes for one search call.
    pub fn record_urls(&self, found: u64, crawled: u64, succeeded: u64, failed: u64) {
        self.with_inner(|inner| {
            inner.urls_found += found;
            inner.urls_crawled += crawled;
            inner.urls_succeeded += succeeded;
            inner.urls_failed += failed;
        });
    }

    /// Adds to the total characters of retrieved content.
    pub fn record_chars(&self, count: u64) {
        self.with_inner(|inner| inner.chars_retrieved += count);
    }

    /// Appends a truncated error message to the bounded error log.
    pub fn error(&self, message: &str) {
        let event = self.event(message, MAX_ERROR_LEN);
        self.with_inner(|inner| {
            if inner.errors.len() == MAX_LOG_ENTRIES {
                inner.errors.pop_front();
            }
            inner.errors.push_back(event);
        });
    }

    /// Appends a warning to the bounded warning log.
    pub fn warning(&self, message: &str) {
        let event = self.event(message, MAX_ERROR_LEN);
        self.with_inner(|inner| {
            if inner.warnings.len() == MAX_LOG_ENTRIES {
                inner.warnings.pop_front();
            }
            inner.warnings.push_back(event);
        });
    }

    fn event(&self, message: &str, max_len: usize) -> LoggedEvent {
        let mut message = message.to_string();
        if message.len() > max_len {
            let mut cut = max_len;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        LoggedEvent {
            at_secs: self.started.elapsed().as_secs_f64(),
            message,
        }
    }

    /// Drains the collector into an immutable snapshot.
    ///
    /// This is the only read path. The accumulator is reset, so calling
    /// `drain` twice yields an empty second snapshot.
    #[must_use]
    pub fn drain(&self) -> MetricsSnapshot {
        let inner = match self.inner.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let total_duration = self.started.elapsed();
        let timed_total: Duration = inner.ops.values().map(|s| s.total).sum();

        let mut operations: Vec<OperationStats> = inner
            .ops
            .into_iter()
            .map(|(name, stats)| OperationStats {
                share: if timed_total.is_zero() {
                    0.0
                } else {
                    stats.total.as_secs_f64() / timed_total.as_secs_f64()
                },
                name,
                count: stats.count,
                total_secs: stats.total.as_secs_f64(),
            })
            .collect();
        // Descending by share of total time; name as tiebreak for
        // deterministic output.
        operations.sort_by(|a, b| {
            b.total_secs
                .total_cmp(&a.total_secs)
                .then_with(|| a.name.cmp(&b.name))
        });

        let crawl_success_rate = if inner.urls_crawled == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = inner.urls_succeeded as f64 / inner.urls_crawled as f64;
            Some(rate)
        };

        MetricsSnapshot {
            total_secs: total_duration.as_secs_f64(),
            operations,
            llm_calls: inner.llm_calls,
            llm_failures: inner.llm_failures,
            llm_retries: inner.llm_retries,
            parse_failures: inner.parse_failures,
            api_calls: inner.api_calls,
            api_failures: inner.api_failures,
            api_retries: inner.api_retries,
            urls_found: inner.urls_found,
            urls_crawled: inner.urls_crawled,
            urls_succeeded: inner.urls_succeeded,
            urls_failed: inner.urls_failed,
            chars_retrieved: inner.chars_retrieved,
            crawl_success_rate,
            errors: inner.errors.into_iter().collect(),
            warnings: inner.warnings.into_iter().collect(),
        }
    }
}

/// Scoped timing span. Records its elapsed time on drop.
#[derive(Debug)]
pub struct OpTimer<'a> {
    collector: &'a MetricsCollector,
    operation: String,
    started: Instant,
}

impl Drop for OpTimer<'_> {
    fn drop(&mut self) {
        self.collector
            .record_duration(&self.operation, self.started.elapsed());
    }
}

/// Cumulative duration and count for one operation name.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    /// Operation name.
    pub name: String,
    /// Number of recorded spans.
    pub count: u64,
    /// Cumulative duration in seconds.
    pub total_secs: f64,
    /// Share of total timed duration (0.0–1.0).
    pub share: f64,
}

/// Immutable snapshot of a run's metrics, produced once by
/// [`MetricsCollector::drain`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Wall-clock duration of the run in seconds.
    pub total_secs: f64,
    /// Per-operation timings, sorted descending by share of total time.
    pub operations: Vec<OperationStats>,
    /// Language-model calls attempted.
    pub llm_calls: u64,
    /// Language-model calls that failed.
    pub llm_failures: u64,
    /// Backoff retries of language-model calls.
    pub llm_retries: u64,
    /// Malformed-output events (corrective re-prompt class).
    pub parse_failures: u64,
    /// Retrieval calls attempted.
    pub api_calls: u64,
    /// Retrieval calls that failed.
    pub api_failures: u64,
    /// Backoff retries of retrieval calls.
    pub api_retries: u64,
    /// URLs returned across all searches.
    pub urls_found: u64,
    /// URLs whose content was fetched.
    pub urls_crawled: u64,
    /// URLs that yielded usable content.
    pub urls_succeeded: u64,
    /// URLs that failed to yield content.
    pub urls_failed: u64,
    /// Total characters of retrieved content.
    pub chars_retrieved: u64,
    /// `urls_succeeded / urls_crawled`, when anything was crawled.
    pub crawl_success_rate: Option<f64>,
    /// Bounded error log, oldest first.
    pub errors: Vec<LoggedEvent>,
    /// Bounded warning log, oldest first.
    pub warnings: Vec<LoggedEvent>,
}

impl MetricsSnapshot {
    /// Renders a human-readable session summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Session summary ({:.1}s total)", self.total_secs);
        let _ = writeln!(
            out,
            "  LLM: {} calls, {} failures, {} retries, {} parse failures",
            self.llm_calls, self.llm_failures, self.llm_retries, self.parse_failures
        );
        let _ = writeln!(
            out,
            "  Search: {} calls, {} failures, {} retries",
            self.api_calls, self.api_failures, self.api_retries
        );
        let _ = writeln!(
            out,
            "  URLs: {} found, {} crawled, {} succeeded, {} failed ({} chars)",
            self.urls_found,
            self.urls_crawled,
            self.urls_succeeded,
            self.urls_failed,
            self.chars_retrieved
        );
        if let Some(rate) = self.crawl_success_rate {
            let _ = writeln!(out, "  Crawl success rate: {:.0}%", rate * 100.0);
        }
        if !self.operations.is_empty() {
            let _ = writeln!(out, "  Time breakdown:");
            for op in &self.operations {
                let _ = writeln!(
                    out,
                    "    {:<24} {:>5.1}s ({:>4.1}%, {} calls)",
                    op.name,
                    op.total_secs,
                    op.share * 100.0,
                    op.count
                );
            }
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "  Errors ({}):", self.errors.len());
            for err in &self.errors {
                let _ = writeln!(out, "    [{:>6.1}s] {}", err.at_secs, err.message);
            }
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "  Warnings ({}):", self.warnings.len());
            for warn in &self.warnings {
                let _ = writeln!(out, "    [{:>6.1}s] {}", warn.at_secs, warn.message);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let metrics = MetricsCollector::new();
        metrics.record_call(CallKind::Llm, true);
        metrics.record_call(CallKind::Llm, false);
        metrics.record_call(CallKind::Search, true);
        metrics.record_retry(CallKind::Llm);
        metrics.record_parse_failure();
        metrics.record_urls(10, 3, 2, 1);
        metrics.record_chars(1234);

        let snapshot = metrics.drain();
        assert_eq!(snapshot.llm_calls, 2);
        assert_eq!(snapshot.llm_failures, 1);
        assert_eq!(snapshot.llm_retries, 1);
        assert_eq!(snapshot.parse_failures, 1);
        assert_eq!(snapshot.api_calls, 1);
        assert_eq!(snapshot.urls_found, 10);
        assert_eq!(snapshot.chars_retrieved, 1234);
        assert_eq!(snapshot.crawl_success_rate, Some(2.0 / 3.0));
    }

    #[test]
    fn test_drain_resets() {
        let metrics = MetricsCollector::new();
        metrics.record_call(CallKind::Llm, true);
        let first = metrics.drain();
        assert_eq!(first.llm_calls, 1);
        let second = metrics.drain();
        assert_eq!(second.llm_calls, 0);
    }

    #[test]
    fn test_error_log_bounded() {
        let metrics = MetricsCollector::new();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            metrics.error(&format!("error {i}"));
        }
        let snapshot = metrics.drain();
        assert_eq!(snapshot.errors.len(), MAX_LOG_ENTRIES);
        // Oldest evicted first
        assert_eq!(snapshot.errors[0].message, "error 10");
    }

    #[test]
    fn test_error_message_truncated() {
        let metrics = MetricsCollector::new();
        metrics.error(&"x".repeat(MAX_ERROR_LEN + 100));
        let snapshot = metrics.drain();
        assert_eq!(snapshot.errors[0].message.len(), MAX_ERROR_LEN);
    }

    #[test]
    fn test_duration_breakdown_sorted_descending() {
        let metrics = MetricsCollector::new();
        metrics.record_duration("fast", Duration::from_millis(10));
        metrics.record_duration("slow", Duration::from_millis(500));
        metrics.record_duration("medium", Duration::from_millis(100));

        let snapshot = metrics.drain();
        let names: Vec<&str> = snapshot.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "medium", "fast"]);
        let total_share: f64 = snapshot.operations.iter().map(|o| o.share).sum();
        assert!((total_share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_timer_records_on_drop() {
        let metrics = MetricsCollector::new();
        {
            let _span = metrics.timer("scoped");
        }
        {
            let _span = metrics.timer("scoped");
        }
        let snapshot = metrics.drain();
        assert_eq!(snapshot.operations.len(), 1);
        assert_eq!(snapshot.operations[0].count, 2);
    }

    #[test]
    fn test_concurrent_increments_no_lost_updates() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for _ in 0..5 {
            let m = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    m.record_call(CallKind::Llm, true);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap_or_else(|_| unreachable!());
        }
        let snapshot = metrics.drain();
        assert_eq!(snapshot.llm_calls, 50);
    }

    #[tokio::test]
    async fn test_concurrent_tasks_stress() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let m = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    m.record_call(CallKind::Search, true);
                    m.record_urls(1, 1, 1, 0);
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        let snapshot = metrics.drain();
        assert_eq!(snapshot.api_calls, 1600);
        assert_eq!(snapshot.urls_found, 1600);
    }

    #[test]
    fn test_render_contains_sections() {
        let metrics = MetricsCollector::new();
        metrics.record_call(CallKind::Llm, true);
        metrics.record_urls(5, 3, 3, 0);
        metrics.warning("slow response");
        let rendered = metrics.drain().render();
        assert!(rendered.contains("LLM: 1 calls"));
        assert!(rendered.contains("Crawl success rate: 100%"));
        assert!(rendered.contains("Warnings (1):"));
    }
}
