use tracing::warn;

use crate::models::Signal;

/// Receives the events the pipeline drops instead of reporting to a caller.
///
/// Both workers call into the observer from their own task, so
/// implementations must be cheap and must not block.
pub trait DropObserver: Send + Sync {
    /// An increment arrived for a key that has no quota.
    fn unknown_key(&self, key: &str);

    /// A block or clear signal could not be queued for the overage tracker.
    fn signal_dropped(&self, key: &str, signal: Signal);
}

// Default observer - writes drops to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DropObserver for TracingObserver {
    fn unknown_key(&self, key: &str) {
        warn!(key, "can't increment non-existent quota");
    }

    fn signal_dropped(&self, key: &str, signal: Signal) {
        warn!(key, %signal, "overage signal queue is full, signal dropped");
    }
}
