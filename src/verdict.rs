//! Per-video verdict records.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde_json::{Value, json};

use crate::error::PlaycheckError;
use crate::label::Classification;

/// Whether the inspection itself ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    /// The video was inspected; the classification is meaningful.
    Success,
    /// Inspection failed internally; the classification is `unknown-error`.
    InternalError,
}

impl VerdictStatus {
    /// Numeric status code: `1` for success, `0` for an internal error.
    pub fn code(self) -> u8 {
        match self {
            VerdictStatus::Success => 1,
            VerdictStatus::InternalError => 0,
        }
    }
}

/// Final result for one video.
///
/// Exactly one verdict is produced per submitted [`VideoTask`](crate::VideoTask),
/// whatever happened during inspection.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoVerdict {
    /// Path or URL of the inspected video.
    pub source: String,
    pub status: VerdictStatus,
    /// Human-readable summary.
    pub message: String,
    pub classification: Classification,
    /// Frames read from the source before the inspection ended.
    pub frames_read: u64,
    /// Frames handed to the classifier.
    pub frames_classified: u64,
}

impl VideoVerdict {
    /// Verdict for an inspection that ran to a classification.
    pub(crate) fn inspected(
        source: &str,
        classification: Classification,
        frames_read: u64,
        frames_classified: u64,
    ) -> Self {
        let message = match classification {
            Classification::Normal => format!("{source} played normally"),
            Classification::Black => format!("{source} black screen detected"),
            Classification::Distort => {
                format!("{source} distortion, flicker or noise detected")
            }
            Classification::Unreadable => {
                format!("{source} inspection failed: video cannot be decoded or played")
            }
            Classification::NoSignal => format!("{source} inspection failed: no picture"),
            Classification::UnknownError => format!("{source} inspection error"),
        };

        let status = if classification == Classification::UnknownError {
            VerdictStatus::InternalError
        } else {
            VerdictStatus::Success
        };

        Self {
            source: source.to_string(),
            status,
            message,
            classification,
            frames_read,
            frames_classified,
        }
    }

    /// Verdict for an inspection that failed with `error`.
    pub(crate) fn failed(
        source: &str,
        error: &PlaycheckError,
        frames_read: u64,
        frames_classified: u64,
    ) -> Self {
        Self {
            source: source.to_string(),
            status: VerdictStatus::InternalError,
            message: format!("{source} inspection error: {error}"),
            classification: Classification::UnknownError,
            frames_read,
            frames_classified,
        }
    }

    /// Machine-readable form, one object per video.
    pub fn to_json(&self) -> Value {
        json!({
            "source": self.source,
            "code": self.status.code(),
            "msg": self.message,
            "class": self.classification.tag(),
            "frames_read": self.frames_read,
            "frames_classified": self.frames_classified,
        })
    }
}

impl Display for VideoVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] {}", self.classification, self.message)
    }
}
