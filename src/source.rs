//! Frame source abstraction.
//!
//! A [`FrameSource`] opens videos; the returned [`VideoFrames`] handle reports
//! the frame count and yields decoded frames in decode order. Closing happens
//! on drop, so every exit path of an inspection releases the decoder.
//!
//! [`FfmpegFrameSource`](crate::FfmpegFrameSource) is the production
//! implementation. Tests plug in scripted sources.

use image::DynamicImage;

use crate::error::PlaycheckError;

/// Frame count reported by an opened video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCount {
    /// The container holds no video stream.
    NoVideoStream,
    /// Number of frames in the video stream. `Frames(0)` means empty or
    /// corrupt.
    Frames(u64),
}

impl FrameCount {
    /// Legacy integer form: `-1` for no video stream, otherwise the count.
    pub fn as_i64(self) -> i64 {
        match self {
            FrameCount::NoVideoStream => -1,
            FrameCount::Frames(count) => count as i64,
        }
    }
}

/// Opens videos for inspection.
///
/// Implementations must be shareable across worker threads; each call to
/// [`open`](FrameSource::open) returns an independent handle.
pub trait FrameSource: Send + Sync {
    /// Handle type for one opened video.
    type Video: VideoFrames;

    /// Open the video at `source` (path or URL).
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::FileOpen`] if the input cannot be opened.
    fn open(&self, source: &str) -> Result<Self::Video, PlaycheckError>;
}

/// An opened video. Dropping the handle closes it.
pub trait VideoFrames {
    /// Frame count as reported by the container.
    fn frame_count(&self) -> FrameCount;

    /// Decode the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, PlaycheckError>;

    /// Advance past the next frame without producing an image.
    ///
    /// Returns `false` at end of stream. Sources that can skip pixel
    /// conversion should override this.
    fn skip_frame(&mut self) -> Result<bool, PlaycheckError> {
        Ok(self.next_frame()?.is_some())
    }
}
