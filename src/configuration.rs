//! Extraction configuration.
//!
//! [`ExtractOptions`] is a builder that threads the sampling rate, image
//! naming, decode-retry tolerance, and progress reporting through a session
//! without widening every function signature.
//!
//! # Example
//!
//! ```no_run
//! use gpsframes::{ExtractOptions, SkippedFramePolicy};
//!
//! let options = ExtractOptions::new()
//!     .with_frame_rate(2.0)
//!     .with_image_extension("png")
//!     .with_max_decode_retries(20)
//!     .with_skipped_frame_policy(SkippedFramePolicy::Skip);
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use crate::{
    error::ExtractorError,
    progress::{NoOpProgress, ProgressCallback},
};

/// Default sampling rate in frames per second.
pub const DEFAULT_FRAME_RATE: f64 = 1.0;

/// Default number of extra read attempts after an empty decode.
///
/// Decoders occasionally land between frames right after a seek; fifty
/// further reads has been enough to get past that in practice.
pub const DEFAULT_MAX_DECODE_RETRIES: u32 = 50;

/// Default extension (and therefore encoding) of written frames.
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// What the sampling loop does when a frame cannot be decoded after every
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkippedFramePolicy {
    /// Abort the whole session with [`ExtractorError::SkippedFrame`].
    #[default]
    Abort,
    /// Drop that sample and keep going. Frame names stay contiguous.
    Skip,
}

/// Configuration for a frame/telemetry extraction session.
///
/// A default-constructed value samples at 1 Hz, writes JPEG frames, retries
/// empty decodes 50 times, and aborts on a frame that never decodes.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) frame_rate: f64,
    pub(crate) image_extension: String,
    pub(crate) max_decode_retries: u32,
    pub(crate) skipped_frame_policy: SkippedFramePolicy,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) batch_size: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("frame_rate", &self.frame_rate)
            .field("image_extension", &self.image_extension)
            .field("max_decode_retries", &self.max_decode_retries)
            .field("skipped_frame_policy", &self.skipped_frame_policy)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with the default settings.
    pub fn new() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            max_decode_retries: DEFAULT_MAX_DECODE_RETRIES,
            skipped_frame_policy: SkippedFramePolicy::Abort,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Set the sampling rate in frames per second.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Set the extension of written frames (`jpg`, `png`, ...).
    ///
    /// A leading dot is stripped and the value lowercased.
    #[must_use]
    pub fn with_image_extension(mut self, extension: &str) -> Self {
        self.image_extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self
    }

    /// Set how many extra reads follow an empty decode before giving up.
    #[must_use]
    pub fn with_max_decode_retries(mut self, retries: u32) -> Self {
        self.max_decode_retries = retries;
        self
    }

    /// Choose between aborting and skipping on an undecodable frame.
    #[must_use]
    pub fn with_skipped_frame_policy(mut self, policy: SkippedFramePolicy) -> Self {
        self.skipped_frame_policy = policy;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires (every N items).
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured sampling rate.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// The configured image extension.
    pub fn image_extension(&self) -> &str {
        &self.image_extension
    }

    /// The configured retry count.
    pub fn max_decode_retries(&self) -> u32 {
        self.max_decode_retries
    }

    /// The configured skipped-frame policy.
    pub fn skipped_frame_policy(&self) -> SkippedFramePolicy {
        self.skipped_frame_policy
    }

    /// Check the options before any file is touched.
    ///
    /// # Errors
    ///
    /// - [`ExtractorError::InvalidFrameRate`] if the rate is not a positive
    ///   finite number.
    /// - [`ExtractorError::InvalidOption`] if the image extension is empty.
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(ExtractorError::InvalidFrameRate(self.frame_rate));
        }
        if self.image_extension.is_empty() {
            return Err(ExtractorError::InvalidOption(
                "image extension cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
