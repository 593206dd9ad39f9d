//! Frame labels and video-level classifications.
//!
//! A [`FrameLabel`] is what a [`FrameClassifier`](crate::FrameClassifier)
//! returns for one frame. A [`Classification`] is the tag carried by the final
//! [`VideoVerdict`](crate::VideoVerdict) for a whole video.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Label assigned to a single sampled frame.
///
/// The label set is defined by the classifier. `playcheck` only attaches
/// meaning to `normal`, `black`, and `distort`; any other class name is kept
/// verbatim in [`FrameLabel::Other`] and counts as neither a normal frame nor a
/// fault vote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameLabel {
    /// The frame looks like regular picture content.
    Normal,
    /// The frame is (almost) entirely black.
    Black,
    /// The frame shows distortion, flicker, blocking, or noise.
    Distort,
    /// Any other class the classifier knows about.
    Other(String),
}

impl FrameLabel {
    /// The class name as the classifier spells it.
    pub fn as_str(&self) -> &str {
        match self {
            FrameLabel::Normal => "normal",
            FrameLabel::Black => "black",
            FrameLabel::Distort => "distort",
            FrameLabel::Other(name) => name,
        }
    }

    /// Map a raw class name to a label. Matching is case-insensitive and
    /// ignores surrounding whitespace.
    pub fn from_class_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "normal" => FrameLabel::Normal,
            "black" => FrameLabel::Black,
            "distort" => FrameLabel::Distort,
            _ => FrameLabel::Other(trimmed.to_string()),
        }
    }
}

impl Display for FrameLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FrameLabel {
    fn from(name: &str) -> Self {
        FrameLabel::from_class_name(name)
    }
}

/// Video-level classification carried by a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Playback looked normal until the end of the stream.
    Normal,
    /// A black screen fault was detected.
    Black,
    /// A distortion / flicker / noise fault was detected.
    Distort,
    /// The video could not be decoded or has no frames.
    Unreadable,
    /// The container has no video stream.
    NoSignal,
    /// Inspection failed internally.
    UnknownError,
}

impl Classification {
    /// Stable tag used in machine-readable output.
    pub fn tag(self) -> &'static str {
        match self {
            Classification::Normal => "normal",
            Classification::Black => "black",
            Classification::Distort => "distort",
            Classification::Unreadable => "unreadable",
            Classification::NoSignal => "no-signal",
            Classification::UnknownError => "unknown-error",
        }
    }

    /// Returns `true` for the two playback fault classes.
    pub fn is_fault(self) -> bool {
        matches!(self, Classification::Black | Classification::Distort)
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.tag())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "normal" => Ok(Classification::Normal),
            "black" => Ok(Classification::Black),
            "distort" => Ok(Classification::Distort),
            "unreadable" => Ok(Classification::Unreadable),
            "no-signal" | "nosignal" => Ok(Classification::NoSignal),
            "unknown-error" => Ok(Classification::UnknownError),
            other => Err(format!("unknown classification: {other}")),
        }
    }
}
