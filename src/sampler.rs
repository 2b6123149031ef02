//! Frame sampling by timestamp.
//!
//! [`FrameSampler`] wraps a [`VideoSource`] and answers one question: which
//! frame is nearest to a requested time, and when was it really captured?
//! Decoders rarely land exactly on the requested instant after a seek, so the
//! decoder-reported position is returned alongside the image and is what
//! interpolation must use.

use image::DynamicImage;

use crate::{configuration::ExtractOptions, error::ExtractorError, video_source::VideoSource};

/// A frame located by [`FrameSampler::get_frame`].
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Real capture time in seconds, as reported by the decoder.
    pub timestamp: f64,
    /// File name derived from the frame index, e.g. `000042.jpg`.
    pub name: String,
    /// Decoded pixels.
    pub image: DynamicImage,
}

/// Name of the frame with global `index`: six zero-padded digits and the
/// extension.
pub fn frame_name(index: u64, extension: &str) -> String {
    format!("{index:06}.{extension}")
}

/// Locates frames of one video by timestamp.
///
/// The sampler owns the video source; dropping it closes the decoder.
#[derive(Debug)]
pub struct FrameSampler<V> {
    video: V,
    duration: f64,
    max_decode_retries: u32,
    image_extension: String,
}

impl<V: VideoSource> FrameSampler<V> {
    /// Wrap an opened video, computing its duration as
    /// `frame_count / frames_per_second`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::InvalidStructure`] if the source reports a
    /// non-positive frame rate.
    pub fn new(video: V, options: &ExtractOptions) -> Result<Self, ExtractorError> {
        let frames = video.frame_count();
        let fps = video.frames_per_second();
        if !(fps > 0.0) {
            return Err(ExtractorError::InvalidStructure(format!(
                "video reports {fps} frames per second"
            )));
        }
        let duration = frames.max(0.0) / fps;
        log::debug!("Video has {frames} frames at {fps:.3} fps, {duration:.3}s");

        Ok(Self {
            video,
            duration,
            max_decode_retries: options.max_decode_retries,
            image_extension: options.image_extension.clone(),
        })
    }

    /// Duration of the video in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Decode the frame nearest `timestamp` (seconds) and name it after
    /// `index`.
    ///
    /// An empty read is retried up to the configured number of times,
    /// re-reading the decoder position before each attempt.
    ///
    /// # Errors
    ///
    /// - [`ExtractorError::OutOfBounds`] if `timestamp` is at or past the
    ///   end of the video. Callers treat this as the end of sampling.
    /// - [`ExtractorError::SkippedFrame`] if every read came back empty.
    /// - Any decoder error.
    pub fn get_frame(&mut self, timestamp: f64, index: u64) -> Result<SampledFrame, ExtractorError> {
        if timestamp >= self.duration {
            log::debug!("Frame at {timestamp:.5}s is out of bounds");
            return Err(ExtractorError::OutOfBounds {
                timestamp,
                duration: self.duration,
            });
        }

        let requested_ms = timestamp * 1_000.0;
        self.video.seek_ms(requested_ms)?;
        let mut position_ms = self.video.position_ms();
        log::debug!("Requested {requested_ms:.5}ms, decoder at {position_ms:.5}ms");

        let mut image = self.video.read_frame()?;
        let mut attempts = 1;
        while image.is_none() && attempts <= self.max_decode_retries {
            log::debug!("Empty frame, retry {attempts}: decoder at {position_ms:.5}ms");
            position_ms = self.video.position_ms();
            image = self.video.read_frame()?;
            attempts += 1;
        }

        let Some(image) = image else {
            log::warn!("Skipping frame at {position_ms:.3}ms after {attempts} attempts");
            return Err(ExtractorError::SkippedFrame {
                position_ms,
                attempts,
            });
        };

        Ok(SampledFrame {
            timestamp: position_ms / 1_000.0,
            name: frame_name(index, &self.image_extension),
            image,
        })
    }

    /// Release the sampler, returning the video source.
    pub fn into_inner(self) -> V {
        self.video
    }
}
