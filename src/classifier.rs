//! Frame classification.
//!
//! [`FrameClassifier`] is the seam between `playcheck` and whatever model
//! labels frames. One classifier instance is shared read-only by every worker
//! (as an `Arc<dyn FrameClassifier>`), so implementations must be
//! [`Send`] + [`Sync`] and must not rely on per-call mutable state.
//!
//! [`LumaClassifier`] is a model-free implementation based on simple image
//! statistics. It recognises black frames by mean luminance and noisy or
//! broken frames by the energy of neighbouring-pixel differences.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use image::DynamicImage;

use crate::error::PlaycheckError;
use crate::label::FrameLabel;

/// Where a classifier should run inference.
///
/// Parsed from the same strings ML tooling usually accepts: `"cpu"`, a bare
/// GPU index such as `"0"`, or `"cuda:1"` / `"gpu:1"`. Defaults to the first
/// GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceHint {
    Cpu,
    Gpu(u32),
}

impl Default for DeviceHint {
    fn default() -> Self {
        DeviceHint::Gpu(0)
    }
}

impl FromStr for DeviceHint {
    type Err = PlaycheckError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        let parse_index = |index: &str| {
            index
                .parse::<u32>()
                .map(DeviceHint::Gpu)
                .map_err(|_| PlaycheckError::InvalidDevice(value.to_string()))
        };

        match lowered.as_str() {
            "cpu" => Ok(DeviceHint::Cpu),
            "cuda" | "gpu" => Ok(DeviceHint::Gpu(0)),
            other => match other.split_once(':') {
                Some(("cuda" | "gpu", index)) => parse_index(index),
                Some(_) => Err(PlaycheckError::InvalidDevice(value.to_string())),
                None => parse_index(other),
            },
        }
    }
}

impl Display for DeviceHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeviceHint::Cpu => f.write_str("cpu"),
            DeviceHint::Gpu(index) => write!(f, "cuda:{index}"),
        }
    }
}

/// Labels a single frame.
pub trait FrameClassifier: Send + Sync {
    /// Classify `frame`, preferably on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::InferenceError`] (or any other variant) if
    /// the frame cannot be classified. The inspection of that video ends with
    /// an `unknown-error` verdict.
    fn classify(&self, frame: &DynamicImage, device: &DeviceHint)
    -> Result<FrameLabel, PlaycheckError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Default mean-luminance ceiling for a black frame (0–255 scale).
pub const DEFAULT_BLACK_LUMA: f32 = 16.0;

/// Default mean absolute neighbour difference above which a frame is
/// considered distorted (0–255 scale).
pub const DEFAULT_NOISE_ENERGY: f32 = 40.0;

/// Statistics-based classifier that needs no model weights.
///
/// Runs on the CPU regardless of the [`DeviceHint`].
#[derive(Debug, Clone, Copy)]
pub struct LumaClassifier {
    black_threshold: f32,
    noise_threshold: f32,
}

impl Default for LumaClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LumaClassifier {
    pub fn new() -> Self {
        Self {
            black_threshold: DEFAULT_BLACK_LUMA,
            noise_threshold: DEFAULT_NOISE_ENERGY,
        }
    }

    /// Mean luminance at or below which a frame is labelled `black`.
    #[must_use]
    pub fn with_black_threshold(mut self, threshold: f32) -> Self {
        self.black_threshold = threshold;
        self
    }

    /// Neighbour-difference energy above which a frame is labelled `distort`.
    #[must_use]
    pub fn with_noise_threshold(mut self, threshold: f32) -> Self {
        self.noise_threshold = threshold;
        self
    }
}

impl FrameClassifier for LumaClassifier {
    fn classify(
        &self,
        frame: &DynamicImage,
        _device: &DeviceHint,
    ) -> Result<FrameLabel, PlaycheckError> {
        let luma = frame.to_luma8();
        let (width, height) = luma.dimensions();
        if width == 0 || height == 0 {
            return Err(PlaycheckError::InferenceError(
                "frame has no pixels".to_string(),
            ));
        }

        let pixel_count = (width as u64) * (height as u64);
        let total: u64 = luma.pixels().map(|pixel| pixel.0[0] as u64).sum();
        let mean = total as f32 / pixel_count as f32;

        if mean <= self.black_threshold {
            return Ok(FrameLabel::Black);
        }

        let mut difference_sum = 0_u64;
        let mut difference_count = 0_u64;
        for row in luma.rows() {
            let mut previous: Option<u8> = None;
            for pixel in row {
                let value = pixel.0[0];
                if let Some(last) = previous {
                    difference_sum += value.abs_diff(last) as u64;
                    difference_count += 1;
                }
                previous = Some(value);
            }
        }

        let energy = if difference_count == 0 {
            0.0
        } else {
            difference_sum as f32 / difference_count as f32
        };

        log::trace!("luma mean={mean:.1} energy={energy:.1}");

        if energy > self.noise_threshold {
            Ok(FrameLabel::Distort)
        } else {
            Ok(FrameLabel::Normal)
        }
    }

    fn name(&self) -> &str {
        "luma"
    }
}
