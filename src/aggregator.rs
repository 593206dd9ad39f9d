//! Temporal aggregation of frame labels into a video-level decision.
//!
//! [`VerdictAggregator`] keeps a bounded [`LabelWindow`] of the most recent
//! labels for one video. Once the window holds at least
//! [`DECISION_THRESHOLD`] entries and none of them is `normal`, the black and
//! distort votes are compared and a fault is decided:
//!
//! ```text
//! black > distort - DISTORT_BIAS  => black
//! otherwise                        => distort
//! ```
//!
//! Black is the preferred explanation; distortion needs to out-vote it by more
//! than [`DISTORT_BIAS`]. Deciding pushes a fault marker into the window and
//! moves the aggregator to [`AggregatorState::Decided`], after which the driver
//! stops reading frames.
//!
//! # Example
//!
//! ```
//! use playcheck::{AggregatorState, Classification, FrameLabel, VerdictAggregator};
//!
//! let mut aggregator = VerdictAggregator::new();
//! for _ in 0..19 {
//!     aggregator.push(FrameLabel::Black);
//! }
//! assert!(aggregator.is_decided());
//! assert_eq!(aggregator.finish(), Classification::Black);
//! ```

use std::collections::VecDeque;

use crate::label::{Classification, FrameLabel};

/// Maximum number of entries kept in the window.
pub const WINDOW_CAPACITY: usize = 21;

/// Minimum window length before a decision is attempted.
pub const DECISION_THRESHOLD: usize = 19;

/// Extra distort votes needed before distortion wins over black.
pub const DISTORT_BIAS: i64 = 5;

/// One slot of a [`LabelWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEntry {
    /// A classifier label.
    Label(FrameLabel),
    /// Sentinel recorded when a fault was decided.
    FaultMarker,
}

/// Fixed-capacity FIFO of recent window entries.
///
/// Pushing into a full window evicts the oldest entry, so
/// [`len`](LabelWindow::len) never exceeds [`capacity`](LabelWindow::capacity).
#[derive(Debug, Clone)]
pub struct LabelWindow {
    entries: VecDeque<WindowEntry>,
    capacity: usize,
}

impl Default for LabelWindow {
    fn default() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }
}

impl LabelWindow {
    /// Create an empty window holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one if the window is full.
    pub fn push(&mut self, entry: WindowEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries equal to `label`.
    pub fn count(&self, label: &FrameLabel) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, WindowEntry::Label(l) if l == label))
            .count()
    }

    /// Returns `true` if `label` occurs anywhere in the window.
    pub fn contains(&self, label: &FrameLabel) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, WindowEntry::Label(l) if l == label))
    }

    /// Returns `true` once a fault decision has been recorded.
    pub fn has_fault_marker(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, WindowEntry::FaultMarker))
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }
}

/// Fault class chosen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Black,
    Distort,
}

impl From<Fault> for Classification {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Black => Classification::Black,
            Fault::Distort => Classification::Distort,
        }
    }
}

/// State of a [`VerdictAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// Still collecting labels.
    Accumulating,
    /// A fault was decided; no more labels are needed.
    Decided(Fault),
    /// The label stream ended without a decision.
    Exhausted,
}

/// Sliding-window decision state machine for one video.
#[derive(Debug, Clone)]
pub struct VerdictAggregator {
    window: LabelWindow,
    state: AggregatorState,
}

impl Default for VerdictAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictAggregator {
    pub fn new() -> Self {
        Self {
            window: LabelWindow::default(),
            state: AggregatorState::Accumulating,
        }
    }

    /// Feed the next label and return the resulting state.
    ///
    /// Labels arriving after a terminal state are ignored.
    pub fn push(&mut self, label: FrameLabel) -> AggregatorState {
        if self.state != AggregatorState::Accumulating {
            return self.state;
        }

        self.window.push(WindowEntry::Label(label));

        if self.window.len() < DECISION_THRESHOLD || self.window.contains(&FrameLabel::Normal) {
            return self.state;
        }

        let black = self.window.count(&FrameLabel::Black) as i64;
        let distort = self.window.count(&FrameLabel::Distort) as i64;
        let fault = if black > distort - DISTORT_BIAS {
            Fault::Black
        } else {
            Fault::Distort
        };

        log::debug!("fault decided: {fault:?} (black={black}, distort={distort})");

        self.window.push(WindowEntry::FaultMarker);
        self.state = AggregatorState::Decided(fault);
        self.state
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Returns `true` once a fault has been decided.
    pub fn is_decided(&self) -> bool {
        matches!(self.state, AggregatorState::Decided(_))
    }

    pub fn window(&self) -> &LabelWindow {
        &self.window
    }

    /// Close the label stream and return the video-level classification.
    ///
    /// Without a recorded fault marker the video played normally; otherwise
    /// the decided fault is returned.
    pub fn finish(&mut self) -> Classification {
        if self.state == AggregatorState::Accumulating {
            self.state = AggregatorState::Exhausted;
        }
        match self.state {
            AggregatorState::Decided(fault) if self.window.has_fault_marker() => fault.into(),
            _ => Classification::Normal,
        }
    }
}
