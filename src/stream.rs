//! Async verdict streaming.
//!
//! [`VerdictStream`] is the Tokio counterpart of [`BatchRun`](crate::BatchRun).
//! Inspections run on `tokio::task::spawn_blocking` threads, at most
//! `workers` at a time (bounded by a [`Semaphore`]), and verdicts are
//! delivered through a bounded channel in completion order.
//!
//! With a timeout configured in [`InspectOptions`](crate::InspectOptions) each
//! inspection is wrapped in `tokio::time::timeout`; an expired task is reported
//! as `unknown-error` right away. The abandoned blocking thread stops at its
//! next frame boundary because the inspector enforces the same limit, and
//! keeps its worker slot until then.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_stream::StreamExt;
//!
//! use playcheck::{BatchScheduler, FfmpegFrameSource, LumaClassifier, VideoTask};
//!
//! # async fn example() -> Result<(), playcheck::PlaycheckError> {
//! let scheduler = BatchScheduler::new(FfmpegFrameSource::new(), Arc::new(LumaClassifier::new()));
//! let mut stream = scheduler.stream(vec![VideoTask::new("a.mp4"), VideoTask::new("b.mp4")])?;
//!
//! while let Some(verdict) = stream.next().await {
//!     println!("{verdict}");
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::discovery::VideoTask;
use crate::error::PlaycheckError;
use crate::progress::ProgressTracker;
use crate::scheduler::BatchScheduler;
use crate::source::FrameSource;
use crate::verdict::VideoVerdict;

/// Bounded channel capacity between workers and the consumer.
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Stream of verdicts produced by background inspections.
///
/// Dropping the stream closes the channel; inspections already running finish
/// but their verdicts are discarded, and no new ones start.
pub struct VerdictStream {
    receiver: Receiver<VideoVerdict>,
    tracker: ProgressTracker,
    remaining: usize,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl VerdictStream {
    /// Number of verdicts not yet yielded.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Stream for VerdictStream {
    type Item = VideoVerdict;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.receiver.poll_recv(cx);
        if let Poll::Ready(Some(verdict)) = &polled {
            self.remaining = self.remaining.saturating_sub(1);
            self.tracker.advance(&verdict.source, verdict.classification);
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<S: FrameSource + 'static> BatchScheduler<S> {
    /// Submit every task to the Tokio blocking pool and stream the verdicts.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::InvalidWorkerCount`] if the worker count is
    /// zero.
    pub fn stream<I>(&self, tasks: I) -> Result<VerdictStream, PlaycheckError>
    where
        I: IntoIterator,
        I::Item: Into<VideoTask>,
    {
        if self.workers() == 0 {
            return Err(PlaycheckError::InvalidWorkerCount);
        }

        let tasks: Vec<VideoTask> = tasks.into_iter().map(Into::into).collect();
        let total = tasks.len();
        let inspector = self.inspector().clone();
        let timeout = inspector.options().timeout();
        let semaphore = Arc::new(Semaphore::new(self.workers()));
        let (sender, receiver) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut running = JoinSet::new();

            for task in tasks {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                if sender.is_closed() {
                    break;
                }

                let inspector = inspector.clone();
                let sender = sender.clone();
                running.spawn(async move {
                    let source = task.source().to_string();
                    // Held until the blocking inspection returns, timed out or not.
                    let blocking = tokio::task::spawn_blocking(move || {
                        let verdict = inspector.inspect(&task);
                        drop(permit);
                        verdict
                    });

                    let verdict = match timeout {
                        Some(limit) => match tokio::time::timeout(limit, blocking).await {
                            Ok(joined) => joined_verdict(joined, &source),
                            Err(_) => {
                                let error = PlaycheckError::TimedOut(limit);
                                log::warn!("{source}: {error}");
                                VideoVerdict::failed(&source, &error, 0, 0)
                            }
                        },
                        None => joined_verdict(blocking.await, &source),
                    };

                    let _ = sender.send(verdict).await;
                });
            }

            while running.join_next().await.is_some() {}
        });

        let tracker = ProgressTracker::new(
            Arc::clone(&self.inspector().options().progress),
            total as u64,
        );

        Ok(VerdictStream {
            receiver,
            tracker,
            remaining: total,
            handle,
        })
    }
}

fn joined_verdict(joined: Result<VideoVerdict, JoinError>, source: &str) -> VideoVerdict {
    joined.unwrap_or_else(|error| {
        let error = PlaycheckError::WorkerPool(error.to_string());
        VideoVerdict::failed(source, &error, 0, 0)
    })
}
