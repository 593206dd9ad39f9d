//! FFmpeg-backed [`FrameSource`].
//!
//! [`FfmpegFrameSource`] opens a file or URL with `ffmpeg-next`, locates the
//! best video stream, and decodes it sequentially. Frames handed to the
//! classifier are converted to RGB8 [`DynamicImage`] values; skipped frames are
//! decoded but never converted.
//!
//! Inputs with no known length, such as live RTSP or HLS streams, report
//! `FrameCount::Frames(0)` and are therefore verdicted `unreadable` without
//! being decoded.
//!
//! # Example
//!
//! ```no_run
//! use playcheck::{FfmpegFrameSource, FrameSource, VideoFrames};
//!
//! let mut video = FfmpegFrameSource::new().open("input.mp4")?;
//! println!("{:?}", video.frame_count());
//! while let Some(frame) = video.next_frame()? {
//!     println!("{}x{}", frame.width(), frame.height());
//! }
//! # Ok::<(), playcheck::PlaycheckError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input, stream::Stream},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::error::PlaycheckError;
use crate::source::{FrameCount, FrameSource, VideoFrames};

/// Consecutive demuxer read errors tolerated before giving up on a stream.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 64;

/// Opens videos through FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameSource;

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for FfmpegFrameSource {
    type Video = FfmpegVideo;

    fn open(&self, source: &str) -> Result<Self::Video, PlaycheckError> {
        FfmpegVideo::open(source)
    }
}

/// One opened video. The demuxer and decoder are freed on drop.
pub struct FfmpegVideo {
    input_context: Input,
    stream: Option<StreamDecoder>,
    frame_count: FrameCount,
    path: PathBuf,
}

impl Debug for FfmpegVideo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegVideo")
            .field("path", &self.path)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

/// Decoder state for the selected video stream.
struct StreamDecoder {
    index: usize,
    decoder: VideoDecoder,
    scaler: Option<(ScalingContext, Pixel, u32, u32)>,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
}

impl FfmpegVideo {
    /// Open `source` and prepare a decoder for its best video stream.
    ///
    /// A container without a video stream opens successfully and reports
    /// [`FrameCount::NoVideoStream`].
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::FileOpen`] if FFmpeg cannot open the input
    /// or cannot build a decoder for its video stream.
    pub fn open(source: &str) -> Result<Self, PlaycheckError> {
        let path = PathBuf::from(source);

        log::debug!("Opening video: {source}");

        ffmpeg_next::init().map_err(|error| PlaycheckError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| PlaycheckError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        let container_seconds = if input_context.duration() > 0 {
            input_context.duration() as f64 / 1_000_000.0
        } else {
            0.0
        };

        let Some(video_stream) = input_context.streams().best(Type::Video) else {
            log::debug!("{source} has no video stream");
            return Ok(Self {
                input_context,
                stream: None,
                frame_count: FrameCount::NoVideoStream,
                path,
            });
        };

        let index = video_stream.index();
        let frame_count = FrameCount::Frames(estimate_frame_count(&video_stream, container_seconds));
        let decoder = CodecContext::from_parameters(video_stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| PlaycheckError::FileOpen {
                path: path.clone(),
                reason: format!("Failed to create video decoder for stream {index}: {error}"),
            })?;

        log::debug!("{source}: stream {index}, {frame_count:?}");

        Ok(Self {
            input_context,
            stream: Some(StreamDecoder {
                index,
                decoder,
                scaler: None,
                decoded_frame: VideoFrame::empty(),
                rgb_frame: VideoFrame::empty(),
                eof_sent: false,
                done: false,
            }),
            frame_count,
            path,
        })
    }

    /// Decode the next frame into the stream's `decoded_frame` buffer.
    ///
    /// Returns `false` once the decoder is drained.
    fn decode_next(&mut self) -> Result<bool, PlaycheckError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(PlaycheckError::NoVideoStream);
        };
        if stream.done {
            return Ok(false);
        }

        let mut read_errors = 0;
        loop {
            if stream.decoder.receive_frame(&mut stream.decoded_frame).is_ok() {
                return Ok(true);
            }

            if stream.eof_sent {
                stream.done = true;
                return Ok(false);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    read_errors = 0;
                    if packet.stream() == stream.index {
                        stream.decoder.send_packet(&packet).map_err(|error| {
                            stream.done = true;
                            PlaycheckError::VideoDecodeError(error.to_string())
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    stream.decoder.send_eof()?;
                    stream.eof_sent = true;
                }
                Err(error) => {
                    read_errors += 1;
                    if read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        stream.done = true;
                        return Err(PlaycheckError::VideoDecodeError(format!(
                            "{}: repeated read failures, last: {error}",
                            self.path.display()
                        )));
                    }
                }
            }
        }
    }
}

impl StreamDecoder {
    /// Convert the current `decoded_frame` to an RGB8 image.
    fn convert_current(&mut self) -> Result<DynamicImage, PlaycheckError> {
        let format = self.decoded_frame.format();
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        let stale = !matches!(
            &self.scaler,
            Some((_, f, w, h)) if *f == format && *w == width && *h == height
        );
        if stale {
            let context = ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((context, format, width, height));
        }

        if let Some((scaler, ..)) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        }

        let buffer = frame_to_rgb_buffer(&self.rgb_frame, width, height);
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            PlaycheckError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }
}

impl VideoFrames for FfmpegVideo {
    fn frame_count(&self) -> FrameCount {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>, PlaycheckError> {
        if !self.decode_next()? {
            return Ok(None);
        }
        match self.stream.as_mut() {
            Some(stream) => stream.convert_current().map(Some),
            None => Err(PlaycheckError::NoVideoStream),
        }
    }

    fn skip_frame(&mut self) -> Result<bool, PlaycheckError> {
        self.decode_next()
    }
}

/// Frame count from the stream header, falling back to duration × frame rate.
///
/// Zero when neither is known, which is the case for live streams.
fn estimate_frame_count(stream: &Stream, container_seconds: f64) -> u64 {
    let frames = stream.frames();
    if frames > 0 {
        return frames as u64;
    }

    let frames_per_second = rational_to_f64(stream.avg_frame_rate())
        .or_else(|| rational_to_f64(stream.rate()))
        .unwrap_or(0.0);

    let stream_seconds = rational_to_f64(stream.time_base())
        .filter(|_| stream.duration() > 0)
        .map(|seconds_per_tick| stream.duration() as f64 * seconds_per_tick);

    let seconds = stream_seconds.unwrap_or(container_seconds);
    (seconds * frames_per_second).max(0.0) as u64
}

fn rational_to_f64(value: Rational) -> Option<f64> {
    if value.denominator() == 0 || value.numerator() == 0 {
        None
    } else {
        Some(value.numerator() as f64 / value.denominator() as f64)
    }
}

/// Copy an RGB24 plane into a tightly-packed buffer, dropping row padding.
fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_bytes]);
        }
        buffer
    }
}
