//! Batch progress reporting and cancellation.
//!
//! [`ProgressCallback`] observes a batch as verdicts come in, and
//! [`CancellationToken`] lets another thread stop outstanding inspections.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playcheck::{
//!     BatchScheduler, FfmpegFrameSource, InspectOptions, LumaClassifier,
//!     ProgressCallback, ProgressInfo, VideoTask,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}/{} videos inspected", info.completed, info.total);
//!     }
//! }
//!
//! let options = InspectOptions::new().with_progress(Arc::new(PrintProgress));
//! let scheduler = BatchScheduler::new(FfmpegFrameSource::new(), Arc::new(LumaClassifier::new()))
//!     .with_options(options);
//! let verdicts: Vec<_> = scheduler.run(vec![VideoTask::new("a.mp4")])?.collect();
//! # Ok::<(), playcheck::PlaycheckError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::label::Classification;

/// A snapshot of batch progress, delivered after each verdict.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Videos with a verdict so far.
    pub completed: u64,
    /// Videos submitted to the batch.
    pub total: u64,
    /// Completion percentage (0.0 – 100.0).
    pub percentage: f32,
    /// Wall-clock time since the batch started.
    pub elapsed: Duration,
    /// Estimated time until the last verdict, from current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Source of the verdict that triggered this report.
    pub last_source: String,
    /// Classification of that verdict.
    pub last_classification: Classification,
}

/// Receives progress updates while a batch runs.
///
/// Callbacks observe but cannot halt the batch; use [`CancellationToken`] for
/// that.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation flag shared between clones.
///
/// Inspections check the token before each frame. A cancelled inspection
/// still produces a verdict (`unknown-error`), so a batch keeps its one
/// verdict per task guarantee.
///
/// ```
/// use playcheck::CancellationToken;
///
/// let token = CancellationToken::new();
/// let clone = token.clone();
/// token.cancel();
/// assert!(clone.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks batch timing and emits callbacks. Lives on the consuming side of a
/// batch, so it needs no synchronisation.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    completed: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: u64) -> Self {
        Self {
            callback,
            total,
            completed: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one verdict and report.
    pub(crate) fn advance(&mut self, source: &str, classification: Classification) {
        self.completed += 1;

        let elapsed = self.start_time.elapsed();
        let percentage = if self.total > 0 {
            (self.completed as f32 / self.total as f32) * 100.0
        } else {
            100.0
        };
        let remaining = self.total.saturating_sub(self.completed);
        let estimated_remaining = u32::try_from(self.completed)
            .ok()
            .filter(|&done| done > 0)
            .and_then(|done| u32::try_from(remaining).ok().map(|left| elapsed / done * left));

        self.callback.on_progress(&ProgressInfo {
            completed: self.completed,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            last_source: source.to_string(),
            last_classification: classification,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording(Mutex<Vec<(u64, u64, f32)>>);

    impl ProgressCallback for Recording {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0
                .lock()
                .unwrap()
                .push((info.completed, info.total, info.percentage));
        }
    }

    #[test]
    fn tracker_reports_every_verdict() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let mut tracker = ProgressTracker::new(recording.clone(), 4);
        tracker.advance("a.mp4", Classification::Normal);
        tracker.advance("b.mp4", Classification::Black);

        let seen = recording.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (2, 4, 50.0));
    }

    #[test]
    fn token_defaults_to_not_cancelled() {
        assert!(!CancellationToken::default().is_cancelled());
    }
}
