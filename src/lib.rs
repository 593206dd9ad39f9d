//! # playcheck
//!
//! Detect playback faults in video files: black screens and visual
//! distortion, flicker, or noise.
//!
//! `playcheck` decodes each video with FFmpeg (via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)), samples frames,
//! labels every sampled frame with a [`FrameClassifier`], and folds the labels
//! into a single verdict with a bounded sliding window. Many videos are
//! inspected concurrently on a bounded worker pool and verdicts stream back
//! as each inspection completes.
//!
//! ## Quick Start
//!
//! ### Inspect One Video
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
//! println!("{}", verdict.to_json());
//! ```
//!
//! ### Inspect a Folder
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playcheck::{BatchScheduler, FfmpegFrameSource, InspectOptions, LumaClassifier, scan_folder};
//!
//! let options = InspectOptions::new().with_skip_interval(4)?.with_compressed(true);
//! let scheduler = BatchScheduler::new(FfmpegFrameSource::new(), Arc::new(LumaClassifier::new()))
//!     .with_workers(5)
//!     .with_options(options);
//!
//! for verdict in scheduler.run(scan_folder("videos", "mp4")?)? {
//!     println!("{verdict}");
//! }
//! # Ok::<(), playcheck::PlaycheckError>(())
//! ```
//!
//! ## How a Verdict Is Reached
//!
//! - Videos with more than `interval × 22` frames are sampled every
//!   `interval` frames; shorter ones are inspected frame by frame.
//! - The last 21 labels are kept. From 19 labels on, if none of them is
//!   `normal`, the video is faulty: `black` unless `distort` out-votes
//!   `black` by more than 5.
//! - Reading stops at the first decision. A video that reaches its end
//!   without one played normally.
//! - Empty or undecodable videos are `unreadable`, containers without a video
//!   stream are `no-signal`, and any failure during inspection becomes
//!   `unknown-error`. Every submitted video gets exactly one verdict.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `model` (default) | `ModelClassifier`, a ViT frame classifier run with Candle |
//! | `cuda` | Run `ModelClassifier` on NVIDIA GPUs |
//! | `metal` | Run `ModelClassifier` on Apple GPUs |
//! | `async` | `VerdictStream` for async batches via Tokio, with hard per-video timeouts |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod aggregator;
pub mod classifier;
pub mod configuration;
pub mod discovery;
pub mod error;
pub mod ffmpeg;
pub mod ffmpeg_source;
pub mod inspector;
pub mod label;
#[cfg(feature = "model")]
pub mod model;
pub mod progress;
pub mod sampling;
pub mod scheduler;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
pub mod verdict;

pub use aggregator::{
    AggregatorState, DECISION_THRESHOLD, DISTORT_BIAS, Fault, LabelWindow, VerdictAggregator,
    WINDOW_CAPACITY, WindowEntry,
};
pub use classifier::{DeviceHint, FrameClassifier, LumaClassifier};
pub use configuration::InspectOptions;
pub use discovery::{VideoTask, parse_source_list, scan_folder};
pub use error::PlaycheckError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use ffmpeg_source::{FfmpegFrameSource, FfmpegVideo};
pub use inspector::VideoInspector;
pub use label::{Classification, FrameLabel};
#[cfg(feature = "model")]
pub use model::ModelClassifier;
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use sampling::{SamplingPolicy, SamplingState, should_evaluate};
pub use scheduler::{BatchRun, BatchScheduler, DEFAULT_WORKERS};
pub use source::{FrameCount, FrameSource, VideoFrames};
#[cfg(feature = "async")]
pub use stream::VerdictStream;
pub use verdict::{VerdictStatus, VideoVerdict};
