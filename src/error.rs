//! Error types for the `gpsframes` crate.
//!
//! [`ExtractorError`] is the unified error returned by every fallible
//! operation in the crate. Variants map one-to-one onto the failure classes
//! a caller needs to tell apart (missing input, unusable telemetry,
//! undecodable video, output problems), and carry the path or timestamp
//! involved so call sites do not need to log extra context.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `gpsframes` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractorError {
    /// The input file or directory does not exist.
    #[error("Input not found: {path}")]
    InputMissing {
        /// The path that was given as input.
        path: PathBuf,
    },

    /// The output directory could not be cleared for reuse.
    #[error("Output directory {path} is unusable: {reason}")]
    OutputMissing {
        /// The output directory.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The output directory or database file could not be created.
    #[error("Cannot create output at {path}: {reason}")]
    CannotCreateOutput {
        /// The path that could not be created.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The telemetry track is missing, empty, or structurally corrupt.
    #[error("No usable telemetry payload: {0}")]
    NoPayload(String),

    /// The video stream could not be opened for decoding.
    #[error("Cannot open video {path}: {reason}")]
    CannotOpenVideo {
        /// The video file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The requested timestamp lies past the end of the video.
    ///
    /// The sampling loop treats this as the normal end of a file.
    #[error("Timestamp {timestamp:.3}s is out of bounds (video lasts {duration:.3}s)")]
    OutOfBounds {
        /// Requested timestamp in seconds.
        timestamp: f64,
        /// Video duration in seconds.
        duration: f64,
    },

    /// No frame could be decoded at a timestamp after all retries.
    #[error("Skipped frame at {position_ms:.3}ms after {attempts} decode attempts")]
    SkippedFrame {
        /// Last decoder position in milliseconds.
        position_ms: f64,
        /// Number of read attempts made.
        attempts: u32,
    },

    /// The input is structurally unusable (e.g. a directory with no videos,
    /// or a file with no video stream).
    #[error("Invalid input structure: {0}")]
    InvalidStructure(String),

    /// The sampling frame rate is not a positive finite number.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// An option value is unusable.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while building or saving a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The frame database could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] JsonError),
}

impl From<FfmpegError> for ExtractorError {
    fn from(error: FfmpegError) -> Self {
        ExtractorError::FfmpegError(error.to_string())
    }
}
