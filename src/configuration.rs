//! Inspection configuration.
//!
//! [`InspectOptions`] is a builder that carries sampling, device, timeout,
//! cancellation, and progress settings through the inspector and the batch
//! scheduler.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use playcheck::{CancellationToken, DeviceHint, InspectOptions};
//!
//! let options = InspectOptions::new()
//!     .with_skip_interval(8)?
//!     .with_compressed(false)
//!     .with_device(DeviceHint::Cpu)
//!     .with_timeout(Duration::from_secs(120))
//!     .with_cancellation(CancellationToken::new());
//! assert_eq!(options.sampling().skip_interval(), 8);
//! # Ok::<(), playcheck::PlaycheckError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::DeviceHint;
use crate::error::PlaycheckError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::sampling::SamplingPolicy;

/// Settings for inspecting videos.
///
/// Defaults: skip interval 4, compression on, device `cuda:0`, no timeout,
/// no cancellation, no progress callback.
#[derive(Clone)]
pub struct InspectOptions {
    pub(crate) sampling: SamplingPolicy,
    /// Halve frame resolution before classification.
    pub(crate) compressed: bool,
    pub(crate) device: DeviceHint,
    /// Per-video time limit.
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for InspectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InspectOptions")
            .field("sampling", &self.sampling)
            .field("compressed", &self.compressed)
            .field("device", &self.device)
            .field("timeout", &self.timeout)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectOptions {
    pub fn new() -> Self {
        Self {
            sampling: SamplingPolicy::default(),
            compressed: true,
            device: DeviceHint::default(),
            timeout: None,
            cancellation: None,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Classify only every `interval`-th frame of long videos.
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::InvalidInterval`] if `interval` is zero.
    pub fn with_skip_interval(mut self, interval: u64) -> Result<Self, PlaycheckError> {
        self.sampling = SamplingPolicy::new(interval)?;
        Ok(self)
    }

    /// Downscale frames by half before classification.
    #[must_use]
    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Device hint forwarded to the classifier.
    #[must_use]
    pub fn with_device(mut self, device: DeviceHint) -> Self {
        self.device = device;
        self
    }

    /// Give up on a single video after `timeout`; it is reported as
    /// `unknown-error`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Callback invoked by the scheduler after each verdict.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    pub fn sampling(&self) -> SamplingPolicy {
        self.sampling
    }

    pub fn compressed(&self) -> bool {
        self.compressed
    }

    pub fn device(&self) -> DeviceHint {
        self.device
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
