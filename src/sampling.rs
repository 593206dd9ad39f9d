//! Frame sampling.
//!
//! Long videos are down-sampled to every `skip_interval`-th frame to bound the
//! number of classifier calls. Short videos are inspected frame by frame so a
//! brief artifact is not skipped over.

use crate::error::PlaycheckError;

/// Default stride between evaluated frames for long videos.
pub const DEFAULT_SKIP_INTERVAL: u64 = 4;

/// A video is "long" once it has more than `skip_interval * LONG_VIDEO_FACTOR`
/// frames.
pub const LONG_VIDEO_FACTOR: u64 = 22;

/// Decides which frames of a video are handed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    skip_interval: u64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            skip_interval: DEFAULT_SKIP_INTERVAL,
        }
    }
}

impl SamplingPolicy {
    /// Create a policy with the given stride.
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::InvalidInterval`] if `skip_interval` is zero.
    pub fn new(skip_interval: u64) -> Result<Self, PlaycheckError> {
        if skip_interval == 0 {
            return Err(PlaycheckError::InvalidInterval);
        }
        Ok(Self { skip_interval })
    }

    /// The configured stride.
    pub fn skip_interval(&self) -> u64 {
        self.skip_interval
    }

    /// Returns `true` if the frame at `frame_index` (1-based count of frames
    /// read so far) should be classified.
    pub fn should_evaluate(&self, frame_index: u64, total_frame_count: u64) -> bool {
        should_evaluate(frame_index, total_frame_count, self.skip_interval)
    }
}

/// Free-function form of [`SamplingPolicy::should_evaluate`].
///
/// A `skip_interval` of zero disables down-sampling instead of dividing by
/// zero; [`SamplingPolicy::new`] rejects it up front.
pub fn should_evaluate(frame_index: u64, total_frame_count: u64, skip_interval: u64) -> bool {
    if skip_interval == 0 {
        return true;
    }
    if total_frame_count > skip_interval.saturating_mul(LONG_VIDEO_FACTOR) {
        frame_index % skip_interval == 0
    } else {
        true
    }
}

/// Per-video sampling counters.
///
/// Owned and mutated by exactly one inspection.
#[derive(Debug, Clone)]
pub struct SamplingState {
    policy: SamplingPolicy,
    total_frames: u64,
    frames_read: u64,
    frames_evaluated: u64,
}

impl SamplingState {
    pub(crate) fn new(policy: SamplingPolicy, total_frames: u64) -> Self {
        Self {
            policy,
            total_frames,
            frames_read: 0,
            frames_evaluated: 0,
        }
    }

    /// Account for the next frame and report whether it must be classified.
    pub(crate) fn advance(&mut self) -> bool {
        self.frames_read += 1;
        let evaluate = self
            .policy
            .should_evaluate(self.frames_read, self.total_frames);
        if evaluate {
            self.frames_evaluated += 1;
        }
        evaluate
    }

    /// Undo the last [`advance`](Self::advance) when the frame turned out not
    /// to exist (end of stream).
    pub(crate) fn rewind(&mut self, was_evaluated: bool) {
        self.frames_read = self.frames_read.saturating_sub(1);
        if was_evaluated {
            self.frames_evaluated = self.frames_evaluated.saturating_sub(1);
        }
    }

    /// Frames read from the source so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Frames handed to the classifier so far.
    pub fn frames_evaluated(&self) -> u64 {
        self.frames_evaluated
    }

    /// Frame count reported by the source.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_videos_are_fully_evaluated() {
        // 88 = 4 * 22 is not "long".
        assert!((1..=88).all(|index| should_evaluate(index, 88, 4)));
    }

    #[test]
    fn long_videos_keep_every_nth_frame() {
        let kept: Vec<u64> = (1..=20).filter(|&i| should_evaluate(i, 89, 4)).collect();
        assert_eq!(kept, vec![4, 8, 12, 16, 20]);
    }

    #[test]
    fn interval_of_one_keeps_everything() {
        assert!((1..=100).all(|index| should_evaluate(index, 1000, 1)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            SamplingPolicy::new(0),
            Err(PlaycheckError::InvalidInterval)
        ));
    }

    #[test]
    fn state_counts_read_and_evaluated_frames() {
        let mut state = SamplingState::new(SamplingPolicy::new(2).unwrap(), 100);
        let decisions: Vec<bool> = (0..4).map(|_| state.advance()).collect();
        assert_eq!(decisions, vec![false, true, false, true]);
        assert_eq!(state.frames_read(), 4);
        assert_eq!(state.frames_evaluated(), 2);

        state.rewind(true);
        assert_eq!(state.frames_read(), 3);
        assert_eq!(state.frames_evaluated(), 1);
    }
}
