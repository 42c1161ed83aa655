//! One-way progress notification.
//!
//! The research run reports stage transitions through an injected
//! [`ProgressSink`]. Delivery is best-effort and synchronous from the
//! caller's point of view: implementations must not block, and nothing
//! they do can fail the run. The default [`NullProgress`] drops
//! everything.

/// One-way, best-effort stage notification.
pub trait ProgressSink: Send + Sync {
    /// Reports a human-readable stage description.
    ///
    /// Implementations must be non-blocking and infallible from the
    /// caller's perspective; delivery failures are swallowed.
    fn notify(&self, stage: &str);
}

/// Sink that discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn notify(&self, _stage: &str) {}
}

/// Sink that forwards stage descriptions to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify(&self, stage: &str) {
        tracing::info!(stage, "progress");
    }
}
