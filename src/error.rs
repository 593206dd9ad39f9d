//! Error types for the `playcheck` crate.
//!
//! This module defines [`PlaycheckError`], the unified error type returned by
//! all fallible operations in the crate. Per-video errors never escape an
//! inspection: [`VideoInspector`](crate::VideoInspector) folds them into a
//! [`VideoVerdict`](crate::VideoVerdict). They surface directly only from
//! setup calls (building a scheduler, parsing options, opening a source by
//! hand).

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `playcheck` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaycheckError {
    /// The video could not be opened by the frame source.
    #[error("Failed to open video at {path}: {reason}")]
    FileOpen {
        /// Path or URL that was passed to the frame source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container holds no video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A frame could not be decoded mid-stream.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The frame classifier failed on a frame.
    #[error("Frame classification failed: {0}")]
    InferenceError(String),

    /// A skip interval of zero was provided.
    #[error("Skip interval must be greater than zero")]
    InvalidInterval,

    /// A worker pool size of zero was provided.
    #[error("Worker count must be greater than zero")]
    InvalidWorkerCount,

    /// A classifier model could not be loaded.
    #[error("Failed to load model at {path}: {reason}")]
    ModelLoad {
        /// Model directory or weights file.
        path: PathBuf,
        /// Underlying reason the load failed.
        reason: String,
    },

    /// A device hint string could not be parsed.
    #[error("Invalid device hint: {0}")]
    InvalidDevice(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while scanning or reading files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The inspection was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Inspection cancelled")]
    Cancelled,

    /// The inspection ran past its per-task time limit.
    #[error("Inspection timed out after {0:?}")]
    TimedOut(Duration),

    /// The worker pool could not be built or lost a worker.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// A collaborator panicked while inspecting a video.
    #[error("Inspection panicked: {0}")]
    Panicked(String),
}

impl From<FfmpegError> for PlaycheckError {
    fn from(error: FfmpegError) -> Self {
        PlaycheckError::FfmpegError(error.to_string())
    }
}
