//! Progress reporting for long backtests.
//!
//! The harness only knows how many days it has to evaluate and when each one
//! finishes. Rendering (progress bars, log lines, nothing at all) is up to
//! the caller.

use std::sync::Arc;

/// Receives progress updates from a backtest.
///
/// Implementations must be `Send + Sync`; days finish on rayon worker
/// threads.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of days to evaluate.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` days.
    fn inc(&self, delta: u64);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
