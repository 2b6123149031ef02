//! The per-frame metadata database.
//!
//! A [`SessionDatabase`] maps frame file names to [`FrameRecord`]s in
//! capture order. [`write`] serializes it to `metadata.json` together with a
//! [`SessionHeader`] describing the run:
//!
//! ```json
//! {
//!   "source": "GH010042.MP4",
//!   "frame_rate": 1.0,
//!   "frames": {
//!     "000000.jpg": {
//!       "ts": 0.0,
//!       "gps": { "lat": 46.1, "long": 7.2, "alt": 1520.3, "2dv": 3.1, "3dv": 3.2 }
//!     }
//!   }
//! }
//! ```

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::{
    error::ExtractorError,
    telemetry::{GPS_COMPONENTS, GpsVector},
};

/// File name of the database inside the output directory.
pub const DATABASE_FILE_NAME: &str = "metadata.json";

/// One extracted frame and its interpolated GPS reading.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Image file name, e.g. `000042.jpg`.
    pub name: String,
    /// Real capture time in seconds from the start of its file.
    pub timestamp: f64,
    /// Interpolated reading; zero until interpolation runs.
    pub gps: GpsVector,
}

impl FrameRecord {
    /// A record with no reading yet.
    pub fn new(name: String, timestamp: f64) -> Self {
        Self {
            name,
            timestamp,
            gps: [0.0; GPS_COMPONENTS],
        }
    }
}

/// A GPS reading with named components, as stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub long: f64,
    /// Altitude in metres.
    pub alt: f64,
    /// 2D ground speed in m/s.
    #[serde(rename = "2dv")]
    pub speed_2d: f64,
    /// 3D speed in m/s.
    #[serde(rename = "3dv")]
    pub speed_3d: f64,
}

impl From<GpsVector> for GpsFix {
    fn from(values: GpsVector) -> Self {
        let [lat, long, alt, speed_2d, speed_3d] = values;
        Self {
            lat,
            long,
            alt,
            speed_2d,
            speed_3d,
        }
    }
}

#[derive(Serialize)]
struct RecordEntry {
    ts: f64,
    gps: GpsFix,
}

/// Frame records of a whole session, in capture order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDatabase {
    records: Vec<FrameRecord>,
}

impl SessionDatabase {
    /// An empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records after the existing ones.
    pub fn extend<I: IntoIterator<Item = FrameRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when no frame has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in capture order.
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// The record for frame `name`.
    pub fn get(&self, name: &str) -> Option<&FrameRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    /// Frame names in capture order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }
}

impl Serialize for SessionDatabase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(
                &record.name,
                &RecordEntry {
                    ts: record.timestamp,
                    gps: GpsFix::from(record.gps),
                },
            )?;
        }
        map.end()
    }
}

/// Session-level facts written alongside the frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHeader {
    /// Description of the input (a file or directory path).
    pub source: String,
    /// Sampling rate used for the session.
    pub frame_rate: f64,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(flatten)]
    header: &'a SessionHeader,
    frames: &'a SessionDatabase,
}

/// Render the database and header as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ExtractorError::SerializationError`] if serialization fails.
pub fn to_json_string(
    database: &SessionDatabase,
    header: &SessionHeader,
) -> Result<String, ExtractorError> {
    let document = Document {
        header,
        frames: database,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Write the database into `output_dir`, returning the file path.
///
/// # Errors
///
/// - [`ExtractorError::CannotCreateOutput`] if the file cannot be created.
/// - [`ExtractorError::SerializationError`] or
///   [`ExtractorError::IoError`] if writing fails.
pub fn write<P: AsRef<Path>>(
    database: &SessionDatabase,
    header: &SessionHeader,
    output_dir: P,
) -> Result<PathBuf, ExtractorError> {
    let path = output_dir.as_ref().join(DATABASE_FILE_NAME);
    let file = File::create(&path).map_err(|error| ExtractorError::CannotCreateOutput {
        path: path.clone(),
        reason: error.to_string(),
    })?;

    let mut writer = BufWriter::new(file);
    let document = Document {
        header,
        frames: database,
    };
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    log::info!(
        "Wrote {} frame records to {}",
        database.len(),
        path.display()
    );
    Ok(path)
}
