//! In-memory telemetry, video, and image stand-ins shared by the
//! integration tests.

#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use gpsframes::{
    ExtractorError, GpsVector, ImageSink, MediaBackend, TelemetrySource, VideoSource,
};
use image::DynamicImage;

/// Divisors GoPro cameras write in the `SCAL` of a `GPS5` stream.
pub const GPS_SCALE: [i32; 5] = [10_000_000, 10_000_000, 1_000, 1_000, 100];

/// Encode one KLV entry, padded to a 4-byte boundary.
pub fn klv(key: &[u8; 4], type_byte: u8, struct_size: u8, repeat: u16, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(key);
    out.push(type_byte);
    out.push(struct_size);
    out.extend_from_slice(&repeat.to_be_bytes());
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

/// Wrap `children` in a nested container entry.
pub fn nest(key: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let body = children.concat();
    klv(key, 0, 1, body.len() as u16, &body)
}

fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

/// A `DEVC/STRM` payload holding a scaled `GPS5` channel with `readings`.
pub fn gps_payload(readings: &[GpsVector]) -> Vec<u8> {
    let raw: Vec<i32> = readings
        .iter()
        .flat_map(|reading| {
            reading
                .iter()
                .zip(GPS_SCALE)
                .map(|(value, scale)| (value * f64::from(scale)).round() as i32)
        })
        .collect();

    let stream = nest(
        b"STRM",
        &[
            klv(b"STNM", b'c', 1, 43, b"GPS (Lat., Long., Alt., 2D speed, 3D speed)"),
            klv(b"UNIT", b'c', 3, 5, b"degdegm  m/sm/s"),
            klv(b"SCAL", b'l', 4, 5, &i32_bytes(&GPS_SCALE)),
            klv(b"GPS5", b'l', 20, readings.len() as u16, &i32_bytes(&raw)),
        ],
    );
    nest(b"DEVC", &[klv(b"DVNM", b'c', 1, 6, b"Camera"), stream])
}

/// A valid payload whose only stream is an accelerometer.
pub fn accelerometer_payload() -> Vec<u8> {
    let samples: Vec<u8> = [100_i16, -200, 980, 101, -199, 981]
        .iter()
        .flat_map(|value| value.to_be_bytes())
        .collect();
    let stream = nest(
        b"STRM",
        &[
            klv(b"STNM", b'c', 1, 13, b"Accelerometer"),
            klv(b"SCAL", b's', 2, 1, &100_i16.to_be_bytes()),
            klv(b"ACCL", b's', 6, 2, &samples),
        ],
    );
    nest(b"DEVC", &[stream])
}

#[derive(Debug, Clone)]
struct MockPayload {
    data: Vec<u8>,
    start: f64,
    end: f64,
}

/// Telemetry served from byte buffers.
#[derive(Debug, Clone, Default)]
pub struct MockTelemetry {
    payloads: Vec<MockPayload>,
}

impl MockTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self, data: Vec<u8>, start: f64, end: f64) -> Self {
        self.payloads.push(MockPayload { data, start, end });
        self
    }

    /// One GPS payload per second, one reading each.
    pub fn one_per_second(readings: &[GpsVector]) -> Self {
        readings
            .iter()
            .enumerate()
            .fold(Self::new(), |telemetry, (second, reading)| {
                let start = second as f64;
                telemetry.with_payload(gps_payload(&[*reading]), start, start + 1.0)
            })
    }
}

impl TelemetrySource for MockTelemetry {
    fn duration(&self) -> f64 {
        self.payloads.last().map(|payload| payload.end).unwrap_or(0.0)
    }

    fn payload_count(&self) -> usize {
        self.payloads.len()
    }

    fn payload(&mut self, index: usize) -> Option<&[u8]> {
        self.payloads.get(index).map(|payload| payload.data.as_slice())
    }

    fn payload_time_range(&self, index: usize) -> Result<(f64, f64), ExtractorError> {
        self.payloads
            .get(index)
            .map(|payload| (payload.start, payload.end))
            .ok_or_else(|| ExtractorError::NoPayload(format!("payload {index} does not exist")))
    }
}

/// A constant-frame-rate video whose frames are tiny solid images.
///
/// Seeking snaps to the nearest frame, so the reported position is always a
/// multiple of the frame interval.
#[derive(Debug, Clone)]
pub struct MockVideo {
    frame_count: usize,
    fps: f64,
    index: usize,
    unreadable: BTreeSet<usize>,
    /// Number of `read_frame` calls so far.
    pub reads: usize,
}

impl MockVideo {
    pub fn new(frame_count: usize, fps: f64) -> Self {
        Self {
            frame_count,
            fps,
            index: 0,
            unreadable: BTreeSet::new(),
            reads: 0,
        }
    }

    /// Frame `index` never decodes.
    pub fn with_unreadable(mut self, index: usize) -> Self {
        self.unreadable.insert(index);
        self
    }
}

impl VideoSource for MockVideo {
    fn frame_count(&self) -> f64 {
        self.frame_count as f64
    }

    fn frames_per_second(&self) -> f64 {
        self.fps
    }

    fn seek_ms(&mut self, position_ms: f64) -> Result<(), ExtractorError> {
        let nearest = (position_ms / 1_000.0 * self.fps).round().max(0.0) as usize;
        self.index = nearest.min(self.frame_count.saturating_sub(1));
        Ok(())
    }

    fn position_ms(&self) -> f64 {
        self.index as f64 * 1_000.0 / self.fps
    }

    fn read_frame(&mut self) -> Result<Option<DynamicImage>, ExtractorError> {
        self.reads += 1;
        if self.index >= self.frame_count || self.unreadable.contains(&self.index) {
            return Ok(None);
        }
        let shade = (self.index % 256) as u8;
        let image = image::RgbImage::from_pixel(2, 2, image::Rgb([shade, shade, shade]));
        self.index += 1;
        Ok(Some(DynamicImage::ImageRgb8(image)))
    }
}

/// Keeps the names and sizes of written images.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub written: Vec<(String, u32, u32)>,
}

impl ImageSink for MemorySink {
    fn write(&mut self, name: &str, image: &DynamicImage) -> Result<(), ExtractorError> {
        self.written
            .push((name.to_string(), image.width(), image.height()));
        Ok(())
    }
}

impl MemorySink {
    pub fn names(&self) -> Vec<&str> {
        self.written.iter().map(|(name, _, _)| name.as_str()).collect()
    }
}

/// Serves mock media by file path.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    files: HashMap<PathBuf, (MockTelemetry, MockVideo)>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<P: AsRef<Path>>(
        mut self,
        path: P,
        telemetry: MockTelemetry,
        video: MockVideo,
    ) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), (telemetry, video));
        self
    }

    fn lookup(&self, path: &Path) -> Result<&(MockTelemetry, MockVideo), ExtractorError> {
        self.files.get(path).ok_or_else(|| ExtractorError::InputMissing {
            path: path.to_path_buf(),
        })
    }
}

impl MediaBackend for MockBackend {
    type Telemetry = MockTelemetry;
    type Video = MockVideo;

    fn open_telemetry(&self, path: &Path) -> Result<Self::Telemetry, ExtractorError> {
        self.lookup(path).map(|(telemetry, _)| telemetry.clone())
    }

    fn open_video(&self, path: &Path) -> Result<Self::Video, ExtractorError> {
        self.lookup(path).map(|(_, video)| video.clone())
    }
}

/// Component-wise comparison within `1e-9`.
pub fn assert_reading_eq(actual: GpsVector, expected: GpsVector) {
    for (component, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() < 1e-9,
            "component {component}: got {a}, expected {e} ({actual:?} vs {expected:?})"
        );
    }
}
