//! Video decoding.
//!
//! [`VideoSource`] is the decoder interface the frame sampler drives:
//! stream metadata, millisecond seeking, the decoder's current position, and
//! single-frame reads. [`FfmpegVideoSource`] implements it with FFmpeg.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{conversion, error::ExtractorError};

/// A seekable source of decoded frames.
pub trait VideoSource {
    /// Number of frames in the stream, as reported by the container.
    fn frame_count(&self) -> f64;

    /// Nominal frames per second.
    fn frames_per_second(&self) -> f64;

    /// Move the decoder to the frame nearest `position_ms`.
    fn seek_ms(&mut self, position_ms: f64) -> Result<(), ExtractorError>;

    /// Presentation time, in milliseconds, of the frame the next
    /// [`read_frame`](VideoSource::read_frame) will return.
    fn position_ms(&self) -> f64;

    /// Decode the frame at the current position and advance.
    ///
    /// `Ok(None)` is an empty read: nothing could be decoded at this
    /// position.
    fn read_frame(&mut self) -> Result<Option<DynamicImage>, ExtractorError>;
}

/// The best video stream of a file, decoded to RGB8 by FFmpeg.
pub struct FfmpegVideoSource {
    path: PathBuf,
    input_context: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    frames_per_second: f64,
    frame_count: f64,
    width: u32,
    height: u32,
    /// The frame located by the last seek, not yet returned.
    pending: Option<(f64, VideoFrame)>,
    position_ms: f64,
    eof_sent: bool,
}

impl Debug for FfmpegVideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegVideoSource")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("frames_per_second", &self.frames_per_second)
            .field("frame_count", &self.frame_count)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("position_ms", &self.position_ms)
            .finish_non_exhaustive()
    }
}

impl FfmpegVideoSource {
    /// Open the best video stream of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::CannotOpenVideo`] if the container cannot
    /// be opened, has no video stream, or its decoder cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractorError> {
        let path = path.as_ref().to_path_buf();
        let cannot_open = |reason: String| ExtractorError::CannotOpenVideo {
            path: path.clone(),
            reason,
        };

        ffmpeg_next::init().map_err(|error| cannot_open(format!("FFmpeg init failed: {error}")))?;
        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| cannot_open(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| cannot_open("no video stream".to_string()))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let mut frames_per_second = conversion::rational_to_f64(stream.avg_frame_rate());
        if frames_per_second <= 0.0 {
            frames_per_second = conversion::rational_to_f64(stream.rate());
        }
        if frames_per_second <= 0.0 {
            return Err(cannot_open("frame rate is unknown".to_string()));
        }

        let frame_count = if stream.frames() > 0 {
            stream.frames() as f64
        } else {
            let duration = if stream.duration() > 0 {
                conversion::pts_to_seconds(stream.duration(), time_base)
            } else {
                input_context.duration().max(0) as f64 / 1_000_000.0
            };
            (duration * frames_per_second).floor()
        };

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| cannot_open(format!("codec parameters: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| cannot_open(format!("decoder: {error}")))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| cannot_open(format!("scaler: {error}")))?;

        log::debug!(
            "Opened video {}: stream {stream_index}, {width}x{height}, {frames_per_second:.3} fps, {frame_count} frames",
            path.display()
        );

        Ok(Self {
            path,
            input_context,
            decoder,
            scaler,
            stream_index,
            time_base,
            frames_per_second,
            frame_count,
            width,
            height,
            pending: None,
            position_ms: 0.0,
            eof_sent: false,
        })
    }

    /// The file this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next frame in presentation order, with its time in
    /// seconds. `None` once the stream is drained.
    fn decode_next(&mut self) -> Result<Option<(f64, VideoFrame)>, ExtractorError> {
        let mut decoded = VideoFrame::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.timestamp().or(decoded.pts()).unwrap_or(0);
                let seconds = conversion::pts_to_seconds(pts, self.time_base);
                return Ok(Some((seconds, decoded)));
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    log::debug!("Skipping unreadable packet: {error}");
                }
            }
        }
    }

    fn convert_frame(&mut self, frame: &VideoFrame) -> Result<DynamicImage, ExtractorError> {
        let mut rgb_frame = VideoFrame::empty();
        self.scaler.run(frame, &mut rgb_frame)?;
        let buffer = conversion::frame_to_buffer(&rgb_frame, self.width, self.height, 3);
        let image = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            ExtractorError::FfmpegError(
                "decoded frame does not fill an RGB image".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(image))
    }
}

impl VideoSource for FfmpegVideoSource {
    fn frame_count(&self) -> f64 {
        self.frame_count
    }

    fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    /// Seeks to the keyframe before the target, then decodes forward to the
    /// first frame within half a frame interval of it. A target past the
    /// last frame lands on the last frame.
    fn seek_ms(&mut self, position_ms: f64) -> Result<(), ExtractorError> {
        let target = position_ms / 1_000.0;
        let seek_timestamp = conversion::milliseconds_to_seek_timestamp(position_ms);
        self.input_context
            .seek(seek_timestamp, ..seek_timestamp)?;
        self.decoder.flush();
        self.eof_sent = false;
        self.pending = None;

        let tolerance = 0.5 / self.frames_per_second;
        let mut last = None;
        while let Some((seconds, frame)) = self.decode_next()? {
            if seconds + tolerance >= target {
                self.pending = Some((seconds, frame));
                break;
            }
            last = Some((seconds, frame));
        }
        if self.pending.is_none() {
            self.pending = last;
        }

        if let Some((seconds, _)) = &self.pending {
            self.position_ms = seconds * 1_000.0;
        }
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        self.position_ms
    }

    fn read_frame(&mut self) -> Result<Option<DynamicImage>, ExtractorError> {
        let next = match self.pending.take() {
            Some(pending) => Some(pending),
            None => self.decode_next()?,
        };
        let Some((seconds, frame)) = next else {
            return Ok(None);
        };
        self.position_ms = seconds * 1_000.0;
        self.convert_frame(&frame).map(Some)
    }
}
