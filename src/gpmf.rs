//! GPMF payload decoding.
//!
//! GoPro cameras embed telemetry in a dedicated MP4 track whose samples are
//! GPMF payloads: trees of key-length-value entries. Every entry starts with
//! an 8-byte header (FourCC key, type byte, struct size, big-endian repeat
//! count) followed by `struct_size * repeat` bytes of data padded to a
//! 32-bit boundary. Type `0` marks a nested container (`DEVC`, `STRM`).
//!
//! This module parses a payload into borrowed [`Entry`] values and exposes
//! what the telemetry extractor needs: locating a channel by FourCC, its
//! sample and element counts, its values scaled by the stream's `SCAL`, and
//! a description of every stream for diagnostics.
//!
//! # Example
//!
//! ```no_run
//! use gpsframes::gpmf::{self, FourCc};
//!
//! # let payload: Vec<u8> = Vec::new();
//! let entries = gpmf::parse(&payload)?;
//! if let Some(channel) = gpmf::find_channel(&entries, FourCc::GPS5) {
//!     let values = channel.scaled_samples()?;
//!     println!("{} samples of {} elements", channel.sample_count(), channel.elements());
//!     # let _ = values;
//! }
//! # Ok::<(), gpsframes::gpmf::GpmfError>(())
//! ```

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    io::Cursor,
};

use binrw::{BinRead, BinReaderExt};
use thiserror::Error;

const HEADER_LEN: usize = 8;

/// Errors raised while decoding a GPMF payload or one of its channels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpmfError {
    /// The payload holds no entries.
    #[error("payload is empty")]
    Empty,
    /// A key contains bytes that are not printable ASCII.
    #[error("invalid key {key} at offset {offset}")]
    InvalidKey {
        /// The offending key.
        key: FourCc,
        /// Byte offset of the entry header.
        offset: usize,
    },
    /// An entry declares a type byte GPMF does not define.
    #[error("unknown sample type {type_byte:#04x} in {key}")]
    UnknownType {
        /// The entry key.
        key: FourCc,
        /// The raw type byte.
        type_byte: u8,
    },
    /// An entry header could not be read.
    #[error("cannot read entry header at offset {offset}: {reason}")]
    Header {
        /// Byte offset of the entry header.
        offset: usize,
        /// The underlying read error.
        reason: String,
    },
    /// An entry's declared length runs past the end of its container.
    #[error("entry {key} at offset {offset} is truncated")]
    Truncated {
        /// The entry key.
        key: FourCc,
        /// Byte offset of the entry header.
        offset: usize,
    },
    /// The channel's type or layout cannot be turned into numbers.
    #[error("channel {key} cannot be scaled: {reason}")]
    Unscalable {
        /// The channel key.
        key: FourCc,
        /// Why scaling failed.
        reason: String,
    },
}

/// A four-character GPMF key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BinRead)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Device container.
    pub const DEVICE: FourCc = FourCc(*b"DEVC");
    /// Stream container.
    pub const STREAM: FourCc = FourCc(*b"STRM");
    /// Stream display name.
    pub const STREAM_NAME: FourCc = FourCc(*b"STNM");
    /// Divisors applied to raw sample values.
    pub const SCALE: FourCc = FourCc(*b"SCAL");
    /// Layout string of a complex structure.
    pub const TYPE: FourCc = FourCc(*b"TYPE");
    /// Display units.
    pub const UNITS: FourCc = FourCc(*b"UNIT");
    /// SI units.
    pub const SI_UNITS: FourCc = FourCc(*b"SIUN");
    /// Five-component GPS record (latitude, longitude, altitude, 2D speed,
    /// 3D speed), recorded by HERO5 and later.
    pub const GPS5: FourCc = FourCc(*b"GPS5");

    fn is_valid(&self) -> bool {
        self.0
            .iter()
            .all(|&byte| byte.is_ascii_alphanumeric() || byte == b' ')
    }

    fn is_terminator(&self) -> bool {
        self.0 == [0; 4]
    }
}

impl Display for FourCc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl Debug for FourCc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "FourCc({self})")
    }
}

/// The fixed 8-byte header in front of every entry.
#[derive(Debug, Clone, Copy, BinRead)]
#[br(big)]
struct KlvHeader {
    key: FourCc,
    type_byte: u8,
    struct_size: u8,
    repeat: u16,
}

/// The storage type of an entry's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// `b`: signed 8-bit integer.
    Int8,
    /// `B`: unsigned 8-bit integer.
    UInt8,
    /// `c`: ASCII character.
    Char,
    /// `d`: 64-bit float.
    Double,
    /// `f`: 32-bit float.
    Float,
    /// `F`: FourCC.
    FourCc,
    /// `G`: 128-bit identifier.
    Guid,
    /// `j`: signed 64-bit integer.
    Int64,
    /// `J`: unsigned 64-bit integer.
    UInt64,
    /// `l`: signed 32-bit integer.
    Int32,
    /// `L`: unsigned 32-bit integer.
    UInt32,
    /// `q`: Q15.16 fixed point.
    Fixed32,
    /// `Q`: Q31.32 fixed point.
    Fixed64,
    /// `s`: signed 16-bit integer.
    Int16,
    /// `S`: unsigned 16-bit integer.
    UInt16,
    /// `U`: UTC date string `yymmddhhmmss.sss`.
    UtcDate,
    /// `?`: structure described by a sibling `TYPE` entry.
    Complex,
    /// `0`: nested entries.
    Nested,
}

impl SampleType {
    /// Decode a header type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            b'b' => SampleType::Int8,
            b'B' => SampleType::UInt8,
            b'c' => SampleType::Char,
            b'd' => SampleType::Double,
            b'f' => SampleType::Float,
            b'F' => SampleType::FourCc,
            b'G' => SampleType::Guid,
            b'j' => SampleType::Int64,
            b'J' => SampleType::UInt64,
            b'l' => SampleType::Int32,
            b'L' => SampleType::UInt32,
            b'q' => SampleType::Fixed32,
            b'Q' => SampleType::Fixed64,
            b's' => SampleType::Int16,
            b'S' => SampleType::UInt16,
            b'U' => SampleType::UtcDate,
            b'?' => SampleType::Complex,
            0 => SampleType::Nested,
            _ => return None,
        })
    }

    /// The header byte for this type.
    pub fn code(self) -> u8 {
        match self {
            SampleType::Int8 => b'b',
            SampleType::UInt8 => b'B',
            SampleType::Char => b'c',
            SampleType::Double => b'd',
            SampleType::Float => b'f',
            SampleType::FourCc => b'F',
            SampleType::Guid => b'G',
            SampleType::Int64 => b'j',
            SampleType::UInt64 => b'J',
            SampleType::Int32 => b'l',
            SampleType::UInt32 => b'L',
            SampleType::Fixed32 => b'q',
            SampleType::Fixed64 => b'Q',
            SampleType::Int16 => b's',
            SampleType::UInt16 => b'S',
            SampleType::UtcDate => b'U',
            SampleType::Complex => b'?',
            SampleType::Nested => 0,
        }
    }

    /// Size in bytes of one element, `None` for layouts without a fixed size.
    pub fn size(self) -> Option<usize> {
        match self {
            SampleType::Int8 | SampleType::UInt8 | SampleType::Char => Some(1),
            SampleType::Int16 | SampleType::UInt16 => Some(2),
            SampleType::Float
            | SampleType::FourCc
            | SampleType::Int32
            | SampleType::UInt32
            | SampleType::Fixed32 => Some(4),
            SampleType::Double
            | SampleType::Int64
            | SampleType::UInt64
            | SampleType::Fixed64 => Some(8),
            SampleType::Guid | SampleType::UtcDate => Some(16),
            SampleType::Complex | SampleType::Nested => None,
        }
    }

    fn is_numeric(self) -> bool {
        !matches!(
            self,
            SampleType::Char
                | SampleType::FourCc
                | SampleType::Guid
                | SampleType::UtcDate
                | SampleType::Complex
                | SampleType::Nested
        )
    }

    /// Read one big-endian element as `f64`, `None` when `bytes` is too
    /// short or the type is not numeric.
    fn read(self, bytes: &[u8]) -> Option<f64> {
        let mut cursor = Cursor::new(bytes);
        let value = match self {
            SampleType::Int8 => f64::from(cursor.read_be::<i8>().ok()?),
            SampleType::UInt8 => f64::from(cursor.read_be::<u8>().ok()?),
            SampleType::Int16 => f64::from(cursor.read_be::<i16>().ok()?),
            SampleType::UInt16 => f64::from(cursor.read_be::<u16>().ok()?),
            SampleType::Int32 => f64::from(cursor.read_be::<i32>().ok()?),
            SampleType::UInt32 => f64::from(cursor.read_be::<u32>().ok()?),
            SampleType::Int64 => cursor.read_be::<i64>().ok()? as f64,
            SampleType::UInt64 => cursor.read_be::<u64>().ok()? as f64,
            SampleType::Float => f64::from(cursor.read_be::<f32>().ok()?),
            SampleType::Double => cursor.read_be::<f64>().ok()?,
            SampleType::Fixed32 => f64::from(cursor.read_be::<i32>().ok()?) / 65_536.0,
            SampleType::Fixed64 => cursor.read_be::<i64>().ok()? as f64 / 4_294_967_296.0,
            _ => return None,
        };
        Some(value)
    }
}

/// One key-length-value entry, borrowing its data from the payload.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    /// The entry key.
    pub key: FourCc,
    /// Storage type of the values.
    pub sample_type: SampleType,
    /// Size in bytes of one sample (structure).
    pub struct_size: u8,
    /// Number of samples.
    pub repeat: u16,
    /// Unpadded data bytes.
    pub data: &'a [u8],
    /// Child entries when `sample_type` is [`SampleType::Nested`].
    pub children: Vec<Entry<'a>>,
}

impl Entry<'_> {
    /// Number of elements in one sample; 1 for types without a fixed size.
    pub fn elements(&self) -> usize {
        match self.sample_type.size() {
            Some(size) if usize::from(self.struct_size) >= size => {
                usize::from(self.struct_size) / size
            }
            _ => 1,
        }
    }

    /// Character data as text, one string per sample, NUL padding removed.
    pub fn strings(&self) -> Vec<String> {
        let width = usize::from(self.struct_size).max(1);
        self.data
            .chunks(width)
            .map(|chunk| {
                String::from_utf8_lossy(chunk)
                    .trim_end_matches('\0')
                    .to_string()
            })
            .collect()
    }

    /// Character data as one string.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.data)
            .trim_end_matches('\0')
            .to_string()
    }

    /// Every element as `f64`, in storage order.
    fn numbers(&self) -> Option<Vec<f64>> {
        let size = self.sample_type.size()?;
        if !self.sample_type.is_numeric() {
            return None;
        }
        self.data
            .chunks_exact(size)
            .map(|chunk| self.sample_type.read(chunk))
            .collect()
    }
}

/// Parse a raw payload into its top-level entries.
///
/// # Errors
///
/// Returns a [`GpmfError`] when the payload is empty or any entry, at any
/// depth, has an invalid key, an unknown type, or a length that runs past
/// its container.
pub fn parse(buffer: &[u8]) -> Result<Vec<Entry<'_>>, GpmfError> {
    let entries = parse_level(buffer, 0)?;
    if entries.is_empty() {
        return Err(GpmfError::Empty);
    }
    Ok(entries)
}

fn parse_level(buffer: &[u8], base_offset: usize) -> Result<Vec<Entry<'_>>, GpmfError> {
    let mut cursor = Cursor::new(buffer);
    let mut entries = Vec::new();

    loop {
        let offset = cursor.position() as usize;
        if offset + HEADER_LEN > buffer.len() {
            break;
        }

        let header = KlvHeader::read(&mut cursor).map_err(|error| GpmfError::Header {
            offset: base_offset + offset,
            reason: error.to_string(),
        })?;
        let key = header.key;
        // Zero padding ends a level.
        if key.is_terminator() {
            break;
        }
        if !key.is_valid() {
            return Err(GpmfError::InvalidKey {
                key,
                offset: base_offset + offset,
            });
        }

        let sample_type =
            SampleType::from_byte(header.type_byte).ok_or(GpmfError::UnknownType {
                key,
                type_byte: header.type_byte,
            })?;

        let length = usize::from(header.struct_size) * usize::from(header.repeat);
        let start = offset + HEADER_LEN;
        let end = start + length;
        if end > buffer.len() {
            return Err(GpmfError::Truncated {
                key,
                offset: base_offset + offset,
            });
        }

        let data = &buffer[start..end];
        let children = if sample_type == SampleType::Nested {
            parse_level(data, base_offset + start)?
        } else {
            Vec::new()
        };

        entries.push(Entry {
            key,
            sample_type,
            struct_size: header.struct_size,
            repeat: header.repeat,
            data,
            children,
        });

        cursor.set_position(start.saturating_add(length.next_multiple_of(4)) as u64);
    }

    Ok(entries)
}

/// A data-carrying entry together with the stream it lives in.
///
/// Sibling entries that precede it (`SCAL`, `UNIT`, `SIUN`, `TYPE`) describe
/// how to read it.
#[derive(Debug, Clone, Copy)]
pub struct Channel<'e, 'a> {
    siblings: &'e [Entry<'a>],
    index: usize,
}

impl<'e, 'a> Channel<'e, 'a> {
    /// The data entry.
    pub fn entry(&self) -> &'e Entry<'a> {
        &self.siblings[self.index]
    }

    /// The channel key.
    pub fn key(&self) -> FourCc {
        self.entry().key
    }

    /// Number of samples in this payload.
    pub fn sample_count(&self) -> usize {
        usize::from(self.entry().repeat)
    }

    /// Number of elements per sample.
    pub fn elements(&self) -> usize {
        let entry = self.entry();
        if entry.sample_type == SampleType::Complex {
            return self
                .preceding(FourCc::TYPE)
                .map(|layout| layout.text().len())
                .unwrap_or(1);
        }
        entry.elements()
    }

    /// The nearest preceding sibling with `key`.
    fn preceding(&self, key: FourCc) -> Option<&'e Entry<'a>> {
        self.siblings[..self.index]
            .iter()
            .rev()
            .find(|entry| entry.key == key)
    }

    /// Display units of each element, SI units preferred.
    pub fn units(&self) -> Vec<String> {
        self.preceding(FourCc::SI_UNITS)
            .or_else(|| self.preceding(FourCc::UNITS))
            .map(Entry::strings)
            .unwrap_or_default()
    }

    /// Human-readable type: the `TYPE` layout for complex channels, the
    /// type character otherwise.
    pub fn type_label(&self) -> String {
        let entry = self.entry();
        match entry.sample_type {
            SampleType::Complex => self
                .preceding(FourCc::TYPE)
                .map(|layout| layout.text())
                .unwrap_or_else(|| "?".to_string()),
            SampleType::Nested => "nested".to_string(),
            other => (other.code() as char).to_string(),
        }
    }

    /// Every value of the channel divided by its `SCAL` divisors, as a
    /// row-major `sample_count() * elements()` buffer.
    ///
    /// One divisor applies to every element; several apply per element.
    /// Missing `SCAL` means no scaling.
    ///
    /// # Errors
    ///
    /// Returns [`GpmfError::Unscalable`] for non-numeric types, layouts
    /// whose struct size is not a whole number of elements, or an
    /// unreadable `SCAL`.
    pub fn scaled_samples(&self) -> Result<Vec<f64>, GpmfError> {
        let entry = self.entry();
        let unscalable = |reason: &str| GpmfError::Unscalable {
            key: entry.key,
            reason: reason.to_string(),
        };

        let size = entry
            .sample_type
            .size()
            .filter(|_| entry.sample_type.is_numeric())
            .ok_or_else(|| unscalable("type is not numeric"))?;
        let struct_size = usize::from(entry.struct_size);
        if struct_size == 0 || struct_size % size != 0 {
            return Err(unscalable("struct size is not a multiple of the type size"));
        }

        let divisors = match self.preceding(FourCc::SCALE) {
            Some(scale) => scale
                .numbers()
                .filter(|values| !values.is_empty())
                .ok_or_else(|| unscalable("SCAL is not numeric"))?,
            None => vec![1.0],
        };

        let elements = struct_size / size;
        let mut values = Vec::with_capacity(entry.data.len() / size);
        for sample in entry.data.chunks_exact(struct_size) {
            for (element, bytes) in sample.chunks_exact(size).enumerate() {
                let raw = entry
                    .sample_type
                    .read(bytes)
                    .ok_or_else(|| unscalable("short element"))?;
                let divisor = if divisors.len() == 1 {
                    divisors[0]
                } else {
                    divisors.get(element).copied().unwrap_or(1.0)
                };
                values.push(if divisor != 0.0 { raw / divisor } else { raw });
            }
        }

        debug_assert_eq!(values.len(), self.sample_count() * elements);
        Ok(values)
    }
}

/// Find the first data entry with `key`, searching nested containers depth
/// first.
pub fn find_channel<'e, 'a>(entries: &'e [Entry<'a>], key: FourCc) -> Option<Channel<'e, 'a>> {
    for (index, entry) in entries.iter().enumerate() {
        if entry.sample_type == SampleType::Nested {
            if let Some(channel) = find_channel(&entry.children, key) {
                return Some(channel);
            }
        } else if entry.key == key {
            return Some(Channel {
                siblings: entries,
                index,
            });
        }
    }
    None
}

/// Summary of one `STRM` container, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescription {
    /// Key of the data entry (the last entry in the stream).
    pub key: FourCc,
    /// `STNM` display name, if present.
    pub name: Option<String>,
    /// Type character, or the `TYPE` layout for complex data.
    pub type_label: String,
    /// Number of samples in this payload.
    pub samples: usize,
    /// Elements per sample.
    pub elements: usize,
}

/// Describe every stream in a parsed payload.
///
/// A stream's data is its last entry; streams holding no samples are
/// omitted.
pub fn describe_streams(entries: &[Entry<'_>]) -> Vec<StreamDescription> {
    let mut descriptions = Vec::new();
    collect_streams(entries, &mut descriptions);
    descriptions
}

fn collect_streams(entries: &[Entry<'_>], descriptions: &mut Vec<StreamDescription>) {
    for entry in entries {
        if entry.sample_type != SampleType::Nested {
            continue;
        }
        if entry.key != FourCc::STREAM {
            collect_streams(&entry.children, descriptions);
            continue;
        }
        let Some(index) = entry.children.len().checked_sub(1) else {
            continue;
        };
        let channel = Channel {
            siblings: &entry.children,
            index,
        };
        if channel.sample_count() == 0 {
            continue;
        }
        descriptions.push(StreamDescription {
            key: channel.key(),
            name: channel.preceding(FourCc::STREAM_NAME).map(Entry::text),
            type_label: channel.type_label(),
            samples: channel.sample_count(),
            elements: channel.elements(),
        });
    }
}
