//! Single-video inspection.
//!
//! [`VideoInspector`] drives one video end to end: open it through the
//! [`FrameSource`], sample frames with the [`SamplingPolicy`](crate::SamplingPolicy),
//! classify the sampled frames, and feed the labels to a fresh
//! [`VerdictAggregator`]. Reading stops as soon as the aggregator decides.
//!
//! Every call to [`inspect`](VideoInspector::inspect) returns exactly one
//! [`VideoVerdict`]. Errors and panics raised by the source or the classifier
//! are caught here and reported as `unknown-error`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playcheck::{FfmpegFrameSource, InspectOptions, LumaClassifier, VideoInspector, VideoTask};
//!
//! let inspector = VideoInspector::new(
//!     Arc::new(FfmpegFrameSource::new()),
//!     Arc::new(LumaClassifier::new()),
//!     InspectOptions::new(),
//! );
//! let verdict = inspector.inspect(&VideoTask::new("input.mp4"));
//! println!("{}", verdict.classification);
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use image::imageops::FilterType;

use crate::aggregator::VerdictAggregator;
use crate::classifier::FrameClassifier;
use crate::configuration::InspectOptions;
use crate::discovery::VideoTask;
use crate::error::PlaycheckError;
use crate::label::Classification;
use crate::sampling::SamplingState;
use crate::source::{FrameCount, FrameSource, VideoFrames};
use crate::verdict::VideoVerdict;

/// Runs the full inspection of one video at a time.
///
/// The inspector itself is immutable and can be cloned into worker threads;
/// all per-video state lives on the stack of [`inspect`](Self::inspect).
pub struct VideoInspector<S> {
    source: Arc<S>,
    classifier: Arc<dyn FrameClassifier>,
    options: InspectOptions,
}

impl<S> Clone for VideoInspector<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            classifier: Arc::clone(&self.classifier),
            options: self.options.clone(),
        }
    }
}

/// Frame counters visible to the failure path.
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    read: u64,
    classified: u64,
}

impl<S: FrameSource> VideoInspector<S> {
    pub fn new(
        source: Arc<S>,
        classifier: Arc<dyn FrameClassifier>,
        options: InspectOptions,
    ) -> Self {
        Self {
            source,
            classifier,
            options,
        }
    }

    pub fn options(&self) -> &InspectOptions {
        &self.options
    }

    pub fn classifier(&self) -> &dyn FrameClassifier {
        self.classifier.as_ref()
    }

    pub(crate) fn with_options(mut self, options: InspectOptions) -> Self {
        self.options = options;
        self
    }

    /// Inspect one video and return its verdict. Never fails.
    pub fn inspect(&self, task: &VideoTask) -> VideoVerdict {
        let mut counters = Counters::default();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.drive(task, &mut counters)));

        let error = match outcome {
            Ok(Ok(verdict)) => {
                log::debug!("{}: {}", task.source(), verdict.classification);
                return verdict;
            }
            Ok(Err(error)) => error,
            Err(payload) => PlaycheckError::Panicked(panic_message(payload.as_ref())),
        };

        log::warn!("{}: inspection failed: {error}", task.source());
        VideoVerdict::failed(task.source(), &error, counters.read, counters.classified)
    }

    fn drive(
        &self,
        task: &VideoTask,
        counters: &mut Counters,
    ) -> Result<VideoVerdict, PlaycheckError> {
        let started = Instant::now();
        let source = task.source();

        let mut video = match self.source.open(source) {
            Ok(video) => video,
            Err(error) => {
                log::warn!("{source}: cannot be opened: {error}");
                return Ok(VideoVerdict::inspected(source, Classification::Unreadable, 0, 0));
            }
        };

        log::debug!("{source}: frame count {}", video.frame_count().as_i64());

        let total_frames = match video.frame_count() {
            FrameCount::NoVideoStream => {
                return Ok(VideoVerdict::inspected(source, Classification::NoSignal, 0, 0));
            }
            FrameCount::Frames(0) => {
                return Ok(VideoVerdict::inspected(source, Classification::Unreadable, 0, 0));
            }
            FrameCount::Frames(count) => count,
        };

        let mut sampling = SamplingState::new(self.options.sampling, total_frames);
        let mut aggregator = VerdictAggregator::new();

        while !aggregator.is_decided() {
            self.check_limits(started)?;

            let evaluate = sampling.advance();
            if !evaluate {
                if !video.skip_frame()? {
                    sampling.rewind(false);
                    break;
                }
                counters.read = sampling.frames_read();
                continue;
            }

            let Some(frame) = video.next_frame()? else {
                sampling.rewind(true);
                break;
            };
            counters.read = sampling.frames_read();

            let frame = if self.options.compressed {
                downscale_half(&frame)
            } else {
                frame
            };

            let label = self.classifier.classify(&frame, &self.options.device)?;
            counters.classified = sampling.frames_evaluated();
            log::trace!("{source}: frame {} -> {label}", sampling.frames_read());

            aggregator.push(label);
        }

        let classification = aggregator.finish();
        Ok(VideoVerdict::inspected(
            source,
            classification,
            sampling.frames_read(),
            sampling.frames_evaluated(),
        ))
    }

    fn check_limits(&self, started: Instant) -> Result<(), PlaycheckError> {
        if self.options.is_cancelled() {
            return Err(PlaycheckError::Cancelled);
        }
        if let Some(limit) = self.options.timeout {
            if started.elapsed() >= limit {
                return Err(PlaycheckError::TimedOut(limit));
            }
        }
        Ok(())
    }
}

fn downscale_half(frame: &DynamicImage) -> DynamicImage {
    let width = (frame.width() / 2).max(1);
    let height = (frame.height() / 2).max(1);
    frame.resize_exact(width, height, FilterType::Triangle)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
