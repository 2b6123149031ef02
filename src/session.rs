//! Multi-file sessions.
//!
//! A GoPro recording is often split across several chapter files. A
//! [`Session`] processes them in order, numbering frames continuously so the
//! output reads as one sequence, and merges every file's records into a
//! single [`SessionDatabase`].

use std::path::Path;

use crate::{
    align::{self, DirectorySink, ImageSink},
    configuration::ExtractOptions,
    database::SessionDatabase,
    error::ExtractorError,
    progress::{FileContext, OperationType, ProgressTracker},
    sampler::FrameSampler,
    telemetry::{self, Mp4TelemetrySource, TelemetrySource},
    video_source::{FfmpegVideoSource, VideoSource},
};

/// Opens the telemetry and video readers of a media file.
pub trait MediaBackend {
    type Telemetry: TelemetrySource;
    type Video: VideoSource;

    /// Open the telemetry track of `path`.
    fn open_telemetry(&self, path: &Path) -> Result<Self::Telemetry, ExtractorError>;

    /// Open the video stream of `path`.
    fn open_video(&self, path: &Path) -> Result<Self::Video, ExtractorError>;
}

/// Reads MP4 files with FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    type Telemetry = Mp4TelemetrySource;
    type Video = FfmpegVideoSource;

    fn open_telemetry(&self, path: &Path) -> Result<Self::Telemetry, ExtractorError> {
        Mp4TelemetrySource::open(path)
    }

    fn open_video(&self, path: &Path) -> Result<Self::Video, ExtractorError> {
        FfmpegVideoSource::open(path)
    }
}

/// Extracts frames and GPS metadata from an ordered list of files.
///
/// # Example
///
/// ```no_run
/// use gpsframes::{ExtractOptions, Session};
///
/// let options = ExtractOptions::new().with_frame_rate(2.0);
/// let mut session = Session::new("frames", options);
/// let database = session.run(&["GH010042.MP4", "GH020042.MP4"])?;
/// println!("{} frames", database.len());
/// # Ok::<(), gpsframes::ExtractorError>(())
/// ```
#[derive(Debug)]
pub struct Session<B = FfmpegBackend, K = DirectorySink> {
    backend: B,
    sink: K,
    options: ExtractOptions,
}

impl Session {
    /// A session that decodes with FFmpeg and writes images to
    /// `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P, options: ExtractOptions) -> Self {
        Self::with_backend(FfmpegBackend, DirectorySink::new(output_dir), options)
    }
}

impl<B: MediaBackend, K: ImageSink> Session<B, K> {
    pub fn with_backend(backend: B, sink: K, options: ExtractOptions) -> Self {
        Self {
            backend,
            sink,
            options,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Release the session, returning its image sink.
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Process `files` in order and return the merged database.
    ///
    /// Frame names run on from one file to the next. Processing stops at
    /// the first failing file and nothing is returned for the session.
    ///
    /// # Errors
    ///
    /// - [`ExtractorError::InvalidFrameRate`] or
    ///   [`ExtractorError::InvalidOption`] for bad options.
    /// - [`ExtractorError::InvalidStructure`] if `files` is empty.
    /// - Any error raised while processing a file.
    pub fn run<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<SessionDatabase, ExtractorError> {
        self.options.validate()?;
        if files.is_empty() {
            return Err(ExtractorError::InvalidStructure(
                "no input files".to_string(),
            ));
        }

        let mut database = SessionDatabase::new();
        let mut offset: u64 = 0;

        for (index, path) in files.iter().enumerate() {
            let path = path.as_ref();
            log::info!(
                "Processing file {}/{}: {}",
                index + 1,
                files.len(),
                path.display()
            );
            let context = FileContext {
                path: path.to_path_buf(),
                index,
                count: files.len(),
            };

            let aligned = self.process_file(context, offset).inspect_err(|error| {
                log::error!("Failed on {}: {error}", path.display());
            })?;

            log::info!(
                "{} frames from {} (names {} to {})",
                aligned.frame_count,
                path.display(),
                offset,
                (offset + aligned.frame_count).saturating_sub(1)
            );
            offset += aligned.frame_count;
            database.extend(aligned.records);
        }

        log::info!("Session complete: {} frames", database.len());
        Ok(database)
    }

    fn process_file(
        &mut self,
        context: FileContext,
        offset: u64,
    ) -> Result<align::AlignedFrames, ExtractorError> {
        let path = context.path.clone();

        // The telemetry reader is closed before the video is opened.
        let series = {
            let mut source = self.backend.open_telemetry(&path)?;
            let mut tracker = ProgressTracker::new(
                self.options.progress.clone(),
                OperationType::TelemetryExtraction,
                context.clone(),
                Some(source.payload_count() as u64),
                1,
            );
            let series = telemetry::extract_with(&mut source, |_, end| {
                tracker.advance(Some(end));
            })?;
            tracker.finish();
            series
        };

        let video = self.backend.open_video(&path)?;
        let mut sampler = FrameSampler::new(video, &self.options)?;
        let expected = (sampler.duration() * self.options.frame_rate).ceil().max(0.0) as u64;
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::FrameSampling,
            context,
            Some(expected),
            self.options.batch_size,
        );

        let aligned = align::align_tracked(
            &series,
            &mut sampler,
            &mut self.sink,
            offset,
            &self.options,
            Some(&mut tracker),
        )?;
        tracker.finish();
        Ok(aligned)
    }
}
