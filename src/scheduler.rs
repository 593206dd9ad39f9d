//! Concurrent inspection of many videos.
//!
//! [`BatchScheduler`] runs a [`VideoInspector`] per task on a dedicated
//! [`rayon`] thread pool of bounded size. Each worker owns its video handle,
//! label window and sampling state; the only things shared are the read-only
//! classifier and frame source. Verdicts are streamed back through a channel
//! and surface from [`BatchRun`] in completion order, as soon as each
//! inspection finishes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playcheck::{BatchScheduler, FfmpegFrameSource, LumaClassifier, scan_folder};
//!
//! let tasks = scan_folder("videos", "mp4")?;
//! let scheduler = BatchScheduler::new(FfmpegFrameSource::new(), Arc::new(LumaClassifier::new()))
//!     .with_workers(5);
//!
//! for verdict in scheduler.run(tasks)? {
//!     println!("{}", verdict.to_json());
//! }
//! # Ok::<(), playcheck::PlaycheckError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::classifier::FrameClassifier;
use crate::configuration::InspectOptions;
use crate::discovery::VideoTask;
use crate::error::PlaycheckError;
use crate::inspector::VideoInspector;
use crate::progress::ProgressTracker;
use crate::source::FrameSource;
use crate::verdict::VideoVerdict;

/// Default number of concurrent inspections.
pub const DEFAULT_WORKERS: usize = 5;

/// Runs inspections over a bounded worker pool.
pub struct BatchScheduler<S> {
    inspector: VideoInspector<S>,
    workers: usize,
}

impl<S> Debug for BatchScheduler<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BatchScheduler")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl<S: FrameSource + 'static> BatchScheduler<S> {
    /// Create a scheduler with default options and [`DEFAULT_WORKERS`] workers.
    pub fn new(source: S, classifier: Arc<dyn FrameClassifier>) -> Self {
        Self::from_shared(Arc::new(source), classifier)
    }

    /// Like [`new`](Self::new) for a source that is already shared.
    pub fn from_shared(source: Arc<S>, classifier: Arc<dyn FrameClassifier>) -> Self {
        Self {
            inspector: VideoInspector::new(source, classifier, InspectOptions::new()),
            workers: DEFAULT_WORKERS,
        }
    }

    /// Maximum number of videos inspected at once.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_options(self, options: InspectOptions) -> Self {
        Self {
            inspector: self.inspector.with_options(options),
            workers: self.workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn inspector(&self) -> &VideoInspector<S> {
        &self.inspector
    }

    /// Submit every task and return a stream of their verdicts.
    ///
    /// The returned [`BatchRun`] yields exactly one verdict per task, in
    /// completion order.
    ///
    /// # Errors
    ///
    /// - [`PlaycheckError::InvalidWorkerCount`] if the worker count is zero.
    /// - [`PlaycheckError::WorkerPool`] if the thread pool cannot be built.
    pub fn run<I>(&self, tasks: I) -> Result<BatchRun, PlaycheckError>
    where
        I: IntoIterator,
        I::Item: Into<VideoTask>,
    {
        if self.workers == 0 {
            return Err(PlaycheckError::InvalidWorkerCount);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("playcheck-worker-{index}"))
            .build()
            .map_err(|error| PlaycheckError::WorkerPool(error.to_string()))?;

        let (sender, receiver) = mpsc::channel();
        let mut outstanding = Vec::new();

        for (index, task) in tasks.into_iter().map(Into::into).enumerate() {
            outstanding.push(Some(task.source().to_string()));
            let inspector = self.inspector.clone();
            let sender = sender.clone();
            pool.spawn(move || {
                let verdict = inspector.inspect(&task);
                // The receiver is gone when the caller dropped the run.
                let _ = sender.send((index, verdict));
            });
        }
        drop(sender);

        log::debug!(
            "submitted {} video(s) to {} worker(s), classifier {}",
            outstanding.len(),
            self.workers,
            self.inspector.classifier().name()
        );

        let tracker = ProgressTracker::new(
            Arc::clone(&self.inspector.options().progress),
            outstanding.len() as u64,
        );

        Ok(BatchRun {
            receiver,
            remaining: outstanding.len(),
            outstanding,
            tracker,
            _pool: pool,
        })
    }
}

/// Lazy stream of verdicts for one batch, in completion order.
///
/// Dropping the run before it is exhausted lets in-flight inspections finish
/// in the background; their verdicts are discarded.
pub struct BatchRun {
    receiver: Receiver<(usize, VideoVerdict)>,
    /// Source of each task still waiting for a verdict, by submission index.
    outstanding: Vec<Option<String>>,
    remaining: usize,
    tracker: ProgressTracker,
    _pool: ThreadPool,
}

impl BatchRun {
    /// Number of verdicts not yet yielded.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn deliver(&mut self, verdict: VideoVerdict) -> VideoVerdict {
        self.remaining -= 1;
        self.tracker.advance(&verdict.source, verdict.classification);
        verdict
    }
}

impl Iterator for BatchRun {
    type Item = VideoVerdict;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match self.receiver.recv() {
            Ok((index, verdict)) => {
                if let Some(slot) = self.outstanding.get_mut(index) {
                    *slot = None;
                }
                Some(self.deliver(verdict))
            }
            Err(_) => {
                // Every worker is gone; report the tasks that never answered.
                let source = self.outstanding.iter_mut().find_map(Option::take)?;
                let error =
                    PlaycheckError::WorkerPool("worker exited without a verdict".to_string());
                log::warn!("{source}: {error}");
                Some(self.deliver(VideoVerdict::failed(&source, &error, 0, 0)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for BatchRun {}
