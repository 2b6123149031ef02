//! Telemetry extraction.
//!
//! A [`TelemetrySource`] is an owned handle over one file's telemetry track:
//! its duration and its payloads with their time ranges.
//! [`Mp4TelemetrySource`] reads the GoPro `gpmd` track through FFmpeg.
//! [`extract`] walks every payload of a source and collects the GPS channel
//! into a [`TelemetrySeries`].
//!
//! # Example
//!
//! ```no_run
//! use gpsframes::telemetry::{self, Mp4TelemetrySource};
//!
//! let mut source = Mp4TelemetrySource::open("GH010042.MP4")?;
//! let series = telemetry::extract(&mut source)?;
//! println!("{} GPS samples", series.len());
//! # Ok::<(), gpsframes::ExtractorError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{Error as FfmpegError, Packet, Rational, format::context::Input, media::Type};
use ffmpeg_sys_next::AVCodecParameters;

use crate::{
    conversion,
    error::ExtractorError,
    gpmf::{self, FourCc},
};

/// Number of components in a GPS reading: latitude (deg), longitude (deg),
/// altitude (m), 2D ground speed (m/s), 3D speed (m/s).
pub const GPS_COMPONENTS: usize = 5;

/// One GPS reading.
pub type GpsVector = [f64; GPS_COMPONENTS];

/// The channel carrying [`GpsVector`] samples.
pub const GPS_CHANNEL: FourCc = FourCc::GPS5;

/// Access to one file's telemetry payloads.
///
/// Implementations own whatever decoder state they need; dropping the value
/// releases it.
pub trait TelemetrySource {
    /// Total duration covered by the telemetry, in seconds. Zero or negative
    /// means the file carries no telemetry.
    fn duration(&self) -> f64;

    /// Number of payloads.
    fn payload_count(&self) -> usize;

    /// Raw bytes of payload `index`, `None` if it cannot be read.
    fn payload(&mut self, index: usize) -> Option<&[u8]>;

    /// The `[start, end)` interval payload `index` covers, in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::NoPayload`] when the index is out of range
    /// or the interval is empty or reversed.
    fn payload_time_range(&self, index: usize) -> Result<(f64, f64), ExtractorError>;
}

/// One decoded telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Seconds from the start of the file.
    pub timestamp: f64,
    /// The GPS reading.
    pub values: GpsVector,
}

/// Telemetry samples ordered by timestamp, with unique timestamps.
///
/// Inserting at an existing timestamp overwrites the earlier values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySeries {
    samples: Vec<TelemetrySample>,
}

impl TelemetrySeries {
    /// An empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sample, keeping the series sorted.
    ///
    /// Samples normally arrive in order, so this is an append.
    pub fn insert(&mut self, timestamp: f64, values: GpsVector) {
        let sample = TelemetrySample { timestamp, values };
        match self.samples.last() {
            Some(last) if last.timestamp < timestamp => self.samples.push(sample),
            None => self.samples.push(sample),
            Some(_) => {
                match self
                    .samples
                    .binary_search_by(|existing| existing.timestamp.total_cmp(&timestamp))
                {
                    Ok(position) => self.samples[position] = sample,
                    Err(position) => self.samples.insert(position, sample),
                }
            }
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in ascending timestamp order.
    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    /// Values stored at exactly `timestamp`.
    pub fn get(&self, timestamp: f64) -> Option<&GpsVector> {
        self.samples
            .binary_search_by(|existing| existing.timestamp.total_cmp(&timestamp))
            .ok()
            .map(|position| &self.samples[position].values)
    }

    /// Earliest and latest timestamps.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((self.samples.first()?.timestamp, self.samples.last()?.timestamp))
    }
}

impl FromIterator<(f64, GpsVector)> for TelemetrySeries {
    fn from_iter<I: IntoIterator<Item = (f64, GpsVector)>>(iter: I) -> Self {
        let mut series = TelemetrySeries::new();
        for (timestamp, values) in iter {
            series.insert(timestamp, values);
        }
        series
    }
}

/// Build the GPS series of one file.
///
/// Payloads are visited in order. A payload without a GPS channel adds
/// nothing. A GPS channel whose data cannot be decoded is skipped. In debug
/// logging every stream of every payload is described.
///
/// # Errors
///
/// Returns [`ExtractorError::NoPayload`] if the source has no telemetry, a
/// payload cannot be read, its time range is unusable, or its bytes are not
/// valid GPMF.
pub fn extract<S: TelemetrySource + ?Sized>(
    source: &mut S,
) -> Result<TelemetrySeries, ExtractorError> {
    extract_with(source, |_, _| {})
}

/// [`extract`] with a callback invoked after each payload with its index and
/// end time.
pub(crate) fn extract_with<S, F>(
    source: &mut S,
    mut on_payload: F,
) -> Result<TelemetrySeries, ExtractorError>
where
    S: TelemetrySource + ?Sized,
    F: FnMut(usize, f64),
{
    let duration = source.duration();
    if !(duration > 0.0) {
        return Err(ExtractorError::NoPayload(
            "telemetry track is empty".to_string(),
        ));
    }

    let payload_count = source.payload_count();
    log::info!("Found {duration:.3}s of telemetry in {payload_count} payloads");

    let mut series = TelemetrySeries::new();
    for index in 0..payload_count {
        let (start, end) = source.payload_time_range(index)?;
        if !(end > start) {
            return Err(ExtractorError::NoPayload(format!(
                "payload {index} has an empty time range ({start:.3}s to {end:.3}s)"
            )));
        }
        log::debug!("Payload {index} covers {start:.3}s to {end:.3}s");

        let buffer = source.payload(index).ok_or_else(|| {
            ExtractorError::NoPayload(format!("payload {index} could not be read"))
        })?;
        let entries = gpmf::parse(buffer)
            .map_err(|error| ExtractorError::NoPayload(format!("payload {index}: {error}")))?;

        if log::log_enabled!(log::Level::Debug) {
            for stream in gpmf::describe_streams(&entries) {
                log::debug!(
                    "  STRM {} ({}) of type {} with {} sample{} -- {} element{} per sample",
                    stream.key,
                    stream.name.as_deref().unwrap_or("unnamed"),
                    stream.type_label,
                    stream.samples,
                    if stream.samples == 1 { "" } else { "s" },
                    stream.elements,
                    if stream.elements == 1 { "" } else { "s" },
                );
            }
        }

        if let Some(channel) = gpmf::find_channel(&entries, GPS_CHANNEL) {
            match read_gps_samples(&channel, start, end) {
                Ok(samples) => {
                    let units = channel.units();
                    for (timestamp, values) in samples {
                        log::trace!("{timestamp:.3}s: {}", format_reading(&values, &units));
                        series.insert(timestamp, values);
                    }
                }
                Err(error) => {
                    log::debug!("Skipping {GPS_CHANNEL} in payload {index}: {error}");
                }
            }
        } else {
            log::debug!("Payload {index} has no {GPS_CHANNEL} channel");
        }

        on_payload(index, end);
    }

    log::info!("Collected {} GPS samples", series.len());
    Ok(series)
}

/// Timestamped readings of one payload's GPS channel.
///
/// Sample `i` is placed at `start + i / rate` with
/// `rate = samples / (end - start)`.
fn read_gps_samples(
    channel: &gpmf::Channel<'_, '_>,
    start: f64,
    end: f64,
) -> Result<Vec<(f64, GpsVector)>, gpmf::GpmfError> {
    let samples = channel.sample_count();
    let elements = channel.elements();
    if samples == 0 {
        return Ok(Vec::new());
    }
    if elements < GPS_COMPONENTS {
        return Err(gpmf::GpmfError::Unscalable {
            key: channel.key(),
            reason: format!("{elements} elements per sample, expected {GPS_COMPONENTS}"),
        });
    }

    let values = channel.scaled_samples()?;
    let rate = samples as f64 / (end - start);

    Ok(values
        .chunks_exact(elements)
        .enumerate()
        .map(|(i, sample)| {
            let mut reading = [0.0; GPS_COMPONENTS];
            reading.copy_from_slice(&sample[..GPS_COMPONENTS]);
            (start + i as f64 / rate, reading)
        })
        .collect())
}

fn format_reading(values: &GpsVector, units: &[String]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(j, value)| {
            let unit = if units.is_empty() {
                ""
            } else {
                units[j % units.len()].as_str()
            };
            format!("{value:.6}{unit}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A payload read from the telemetry track.
struct Payload {
    data: Vec<u8>,
    start: f64,
    end: f64,
}

/// The GoPro telemetry track of an MP4 file, read through FFmpeg.
///
/// All payloads are demuxed when the source is opened; the demuxer is closed
/// before `open` returns.
pub struct Mp4TelemetrySource {
    path: PathBuf,
    payloads: Vec<Payload>,
    duration: f64,
}

impl Debug for Mp4TelemetrySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Mp4TelemetrySource")
            .field("path", &self.path)
            .field("payloads", &self.payloads.len())
            .field("duration", &self.duration)
            .finish()
    }
}

/// `gpmd`, the codec tag of GoPro telemetry tracks, as stored by FFmpeg.
const GPMD_CODEC_TAG: u32 = u32::from_le_bytes(*b"gpmd");

impl Mp4TelemetrySource {
    /// Open `path` and demux its telemetry track.
    ///
    /// A file with no telemetry track opens successfully and reports a zero
    /// duration, which [`extract`] turns into [`ExtractorError::NoPayload`].
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::NoPayload`] if the container cannot be
    /// opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractorError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening telemetry track of {}", path.display());

        ffmpeg_next::init()?;
        let mut input = ffmpeg_next::format::input(&path).map_err(|error| {
            ExtractorError::NoPayload(format!("cannot open {}: {error}", path.display()))
        })?;

        let Some((stream_index, time_base)) = find_telemetry_stream(&input) else {
            log::warn!("{} has no telemetry track", path.display());
            return Ok(Self {
                path,
                payloads: Vec::new(),
                duration: 0.0,
            });
        };

        let payloads = read_payloads(&mut input, stream_index, time_base)?;
        let duration = payloads.last().map(|payload| payload.end).unwrap_or(0.0);

        log::debug!(
            "Telemetry stream {stream_index}: {} payloads, {duration:.3}s",
            payloads.len()
        );

        Ok(Self {
            path,
            payloads,
            duration,
        })
    }

    /// The file this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn find_telemetry_stream(input: &Input) -> Option<(usize, Rational)> {
    input
        .streams()
        .find(|stream| {
            let parameters = stream.parameters();
            if parameters.medium() != Type::Data {
                return false;
            }
            let codec_tag = unsafe {
                let raw: *const AVCodecParameters = parameters.as_ptr();
                (*raw).codec_tag
            };
            codec_tag == GPMD_CODEC_TAG
                || stream
                    .metadata()
                    .get("handler_name")
                    .is_some_and(|name| name.contains("GoPro MET"))
        })
        .map(|stream| (stream.index(), stream.time_base()))
}

fn read_payloads(
    input: &mut Input,
    stream_index: usize,
    time_base: Rational,
) -> Result<Vec<Payload>, ExtractorError> {
    let mut payloads = Vec::new();
    loop {
        let mut packet = Packet::empty();
        match packet.read(input) {
            Ok(()) => {
                if packet.stream() != stream_index {
                    continue;
                }
                let Some(pts) = packet.pts().or(packet.dts()) else {
                    return Err(ExtractorError::NoPayload(format!(
                        "payload {} has no timestamp",
                        payloads.len()
                    )));
                };
                let start = conversion::pts_to_seconds(pts, time_base);
                let end = conversion::pts_to_seconds(pts + packet.duration(), time_base);
                payloads.push(Payload {
                    data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                    start,
                    end,
                });
            }
            Err(FfmpegError::Eof) => break,
            Err(error) => return Err(ExtractorError::from(error)),
        }
    }
    Ok(payloads)
}

impl TelemetrySource for Mp4TelemetrySource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn payload_count(&self) -> usize {
        self.payloads.len()
    }

    fn payload(&mut self, index: usize) -> Option<&[u8]> {
        self.payloads
            .get(index)
            .map(|payload| payload.data.as_slice())
            .filter(|data| !data.is_empty())
    }

    fn payload_time_range(&self, index: usize) -> Result<(f64, f64), ExtractorError> {
        let payload = self
            .payloads
            .get(index)
            .ok_or_else(|| ExtractorError::NoPayload(format!("payload {index} does not exist")))?;
        if !(payload.end > payload.start) {
            return Err(ExtractorError::NoPayload(format!(
                "payload {index} has an empty time range ({:.3}s to {:.3}s)",
                payload.start, payload.end
            )));
        }
        Ok((payload.start, payload.end))
    }
}
