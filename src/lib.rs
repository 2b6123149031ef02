//! # gpsframes
//!
//! Extract still frames from GoPro recordings and tag each one with the GPS
//! position the camera recorded at that instant.
//!
//! GoPro cameras store GPS readings in a GPMF telemetry track inside the MP4
//! container, at a rate that has nothing to do with the video frame rate.
//! `gpsframes` samples the video at a chosen rate, asks the decoder when
//! each frame was really captured, and linearly interpolates the GPS track
//! at that time. Decoding is done by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gpsframes::{ExtractOptions, Session, SessionHeader, database, paths};
//!
//! let inputs = paths::collect_inputs("recordings/")?;
//! paths::prepare_output_dir("frames")?;
//!
//! let options = ExtractOptions::new().with_frame_rate(2.0);
//! let mut session = Session::new("frames", options);
//! let frames = session.run(&inputs)?;
//!
//! let header = SessionHeader {
//!     source: "recordings/".to_string(),
//!     frame_rate: 2.0,
//! };
//! database::write(&frames, &header, "frames")?;
//! # Ok::<(), gpsframes::ExtractorError>(())
//! ```
//!
//! ## Pieces
//!
//! - [`gpmf`] parses raw GPMF payloads into KLV entries and scaled channels.
//! - [`telemetry`] turns a file's payloads into a sorted [`TelemetrySeries`].
//! - [`sampler`] locates the frame nearest a timestamp and reports its real
//!   capture time.
//! - [`interpolation`] brackets a timestamp in the series and interpolates.
//! - [`align`] runs the sampling loop for one file.
//! - [`session`] chains files with continuous frame numbering.
//! - [`database`] writes `metadata.json`.
//!
//! Telemetry and video access sit behind the [`TelemetrySource`] and
//! [`VideoSource`] traits, so everything above the decoders can run on
//! in-memory data.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod align;
pub mod configuration;
mod conversion;
pub mod database;
pub mod error;
pub mod gpmf;
pub mod interpolation;
pub mod paths;
pub mod progress;
pub mod sampler;
pub mod session;
pub mod telemetry;
pub mod video_source;

pub use align::{AlignedFrames, DirectorySink, ImageSink};
pub use configuration::{ExtractOptions, SkippedFramePolicy};
pub use database::{FrameRecord, GpsFix, SessionDatabase, SessionHeader};
pub use error::ExtractorError;
pub use gpmf::{FourCc, GpmfError};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use sampler::{FrameSampler, SampledFrame};
pub use session::{FfmpegBackend, MediaBackend, Session};
pub use telemetry::{GpsVector, Mp4TelemetrySource, TelemetrySample, TelemetrySeries, TelemetrySource};
pub use video_source::{FfmpegVideoSource, VideoSource};
