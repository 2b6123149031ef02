//! Pairing sampled frames with GPS readings.
//!
//! [`align`] walks one video at the configured rate, hands every decoded
//! frame to an [`ImageSink`], and then gives each resulting
//! [`FrameRecord`] the reading interpolated at its real capture time.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::{
    configuration::{ExtractOptions, SkippedFramePolicy},
    database::FrameRecord,
    error::ExtractorError,
    interpolation,
    progress::ProgressTracker,
    sampler::FrameSampler,
    telemetry::{GPS_COMPONENTS, TelemetrySeries},
    video_source::VideoSource,
};

/// Destination for extracted frame images.
pub trait ImageSink {
    /// Store `image` under file name `name`.
    fn write(&mut self, name: &str, image: &DynamicImage) -> Result<(), ExtractorError>;
}

/// Saves frames as files in a directory, encoded by file extension.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ImageSink for DirectorySink {
    fn write(&mut self, name: &str, image: &DynamicImage) -> Result<(), ExtractorError> {
        let path = self.directory.join(name);
        image.save(&path)?;
        log::trace!("Saved {}", path.display());
        Ok(())
    }
}

impl<K: ImageSink + ?Sized> ImageSink for &mut K {
    fn write(&mut self, name: &str, image: &DynamicImage) -> Result<(), ExtractorError> {
        (**self).write(name, image)
    }
}

/// Frames of one file, ready to join the session database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedFrames {
    /// One record per written frame, in capture order.
    pub records: Vec<FrameRecord>,
    /// Number of frame names consumed; the next file starts this far on.
    pub frame_count: u64,
}

/// Sample one video and attach interpolated GPS readings.
///
/// Frames are requested at `k / frame_rate` seconds for `k = 0, 1, ...`
/// until the sampler reports the end of the video. Names continue from
/// `start_index`. A frame that cannot be decoded either aborts the file or
/// is left out, depending on the [`SkippedFramePolicy`]; left-out frames do
/// not consume a name.
///
/// # Errors
///
/// Returns the first sampler or sink error, and
/// [`ExtractorError::SkippedFrame`] under [`SkippedFramePolicy::Abort`].
pub fn align<V, K>(
    series: &TelemetrySeries,
    sampler: &mut FrameSampler<V>,
    sink: &mut K,
    start_index: u64,
    options: &ExtractOptions,
) -> Result<AlignedFrames, ExtractorError>
where
    V: VideoSource,
    K: ImageSink + ?Sized,
{
    align_tracked(series, sampler, sink, start_index, options, None)
}

pub(crate) fn align_tracked<V, K>(
    series: &TelemetrySeries,
    sampler: &mut FrameSampler<V>,
    sink: &mut K,
    start_index: u64,
    options: &ExtractOptions,
    mut tracker: Option<&mut ProgressTracker>,
) -> Result<AlignedFrames, ExtractorError>
where
    V: VideoSource,
    K: ImageSink + ?Sized,
{
    options.validate()?;

    let mut records = Vec::new();
    let mut produced: u64 = 0;

    for step in 0_u64.. {
        let requested = step as f64 / options.frame_rate;
        let frame = match sampler.get_frame(requested, start_index + produced) {
            Ok(frame) => frame,
            Err(ExtractorError::OutOfBounds { .. }) => break,
            Err(error @ ExtractorError::SkippedFrame { .. })
                if options.skipped_frame_policy == SkippedFramePolicy::Skip =>
            {
                log::warn!("Leaving out frame requested at {requested:.3}s: {error}");
                continue;
            }
            Err(error) => return Err(error),
        };

        sink.write(&frame.name, &frame.image)?;
        log::debug!(
            "Frame {} requested at {requested:.5}s, captured at {:.5}s",
            frame.name,
            frame.timestamp
        );
        records.push(FrameRecord::new(frame.name, frame.timestamp));
        produced += 1;

        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.advance(Some(frame.timestamp));
        }
    }

    if series.is_empty() && !records.is_empty() {
        log::warn!("No GPS samples; {} frames get zeroed readings", records.len());
    }

    for record in &mut records {
        record.gps = match interpolation::bracket(series, record.timestamp) {
            Some(bracket) => {
                log::debug!(
                    "{} at {:.5}s: prev {:.5}s, next {:.5}s",
                    record.name,
                    record.timestamp,
                    bracket.prev.timestamp,
                    bracket.next.timestamp
                );
                let values = bracket.value_at(record.timestamp);
                log::debug!("  prev {:?}", bracket.prev.values);
                log::debug!("  next {:?}", bracket.next.values);
                log::debug!("  interpolated {values:?}");
                values
            }
            None => [0.0; GPS_COMPONENTS],
        };
    }

    Ok(AlignedFrames {
        records,
        frame_count: produced,
    })
}
