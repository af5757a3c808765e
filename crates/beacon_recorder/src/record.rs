//! Beacon record line format.
//!
//! Each record is one line of comma-separated fields, in this fixed order:
//!
//! ```text
//! frame_id,ansi_id,lat,lon,alt,height,lat_start,lon_start,speed,bearing,last_seen,first_seen\n
//! ```
//!
//! Integers are written in decimal. Downstream parsers depend on the exact
//! byte layout, so encoding is deterministic and [`BeaconRecord::parse_line`]
//! reads back exactly what [`BeaconRecord::encode_into`] writes.
//!
//! Encoding never allocates: it writes into a caller-provided scratch buffer
//! of [`MAX_RECORD_LEN`] bytes, which is the length of the widest record the
//! field types allow.

use crate::error::RecordError;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Maximum length of the French frame identifier.
pub const FRAME_ID_MAX: usize = 30;

/// Maximum length of the ANSI/CTA-2063 serial number.
pub const ANSI_ID_MAX: usize = 20;

/// Number of fields per line.
pub const FIELD_COUNT: usize = 12;

const I16_WIDTH: usize = 6; // "-32768"
const U16_WIDTH: usize = 5; // "65535"
const I32_WIDTH: usize = 11; // "-2147483648"
const U64_WIDTH: usize = 20; // "18446744073709551615"

/// Length in bytes of the longest possible encoded record, newline included.
pub const MAX_RECORD_LEN: usize = FRAME_ID_MAX
    + ANSI_ID_MAX
    + 4 * I32_WIDTH // lat, lon, lat_start, lon_start
    + 2 * I16_WIDTH // alt, height
    + 2 * U16_WIDTH // speed, bearing
    + 2 * U64_WIDTH // last_seen, first_seen
    + (FIELD_COUNT - 1)
    + 1;

const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "frame_id",
    "ansi_id",
    "lat",
    "lon",
    "alt",
    "height",
    "lat_start",
    "lon_start",
    "speed",
    "bearing",
    "last_seen",
    "first_seen",
];

/// A bounded ASCII identifier that is safe to embed in a log line.
///
/// Holds at most `N` printable ASCII bytes and never a comma, so it cannot
/// break the field layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeaconId<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

/// Identifier carried in the French regulatory beacon frame.
pub type FrameId = BeaconId<FRAME_ID_MAX>;

/// ANSI/CTA-2063 serial number.
pub type AnsiId = BeaconId<ANSI_ID_MAX>;

impl<const N: usize> BeaconId<N> {
    /// Creates an identifier from text.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidId`] if `text` is longer than `N` bytes
    /// or contains anything other than printable ASCII without commas.
    pub fn new(text: &str) -> Result<Self, RecordError> {
        if text.len() > N {
            return Err(RecordError::InvalidId {
                reason: format!("{} bytes exceeds the limit of {N}", text.len()),
            });
        }
        if let Some(bad) = text.bytes().find(|b| !is_id_byte(*b)) {
            return Err(RecordError::InvalidId {
                reason: format!("forbidden byte 0x{bad:02x}"),
            });
        }

        let mut bytes = [0u8; N];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self {
            bytes,
            len: text.len(),
        })
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only printable ASCII is ever stored.
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the identifier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn is_id_byte(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) && b != b','
}

impl<const N: usize> Default for BeaconId<N> {
    fn default() -> Self {
        Self {
            bytes: [0u8; N],
            len: 0,
        }
    }
}

impl<const N: usize> fmt::Debug for BeaconId<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BeaconId({:?})", self.as_str())
    }
}

impl<const N: usize> fmt::Display for BeaconId<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> FromStr for BeaconId<N> {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// One decoded drone beacon, as stored in the log.
///
/// Field semantics belong to the radio decoder; the recorder only cares
/// about the encoded line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeaconRecord {
    /// French frame identifier.
    pub frame_id: FrameId,
    /// ANSI/CTA-2063 serial number.
    pub ansi_id: AnsiId,
    /// Latitude in 1e-5 degrees.
    pub lat: i32,
    /// Longitude in 1e-5 degrees.
    pub lon: i32,
    /// Altitude above sea level in metres.
    pub alt: i16,
    /// Height above take-off in metres.
    pub height: i16,
    /// Take-off latitude in 1e-5 degrees.
    pub lat_start: i32,
    /// Take-off longitude in 1e-5 degrees.
    pub lon_start: i32,
    /// Ground speed in m/s.
    pub speed: u16,
    /// Route over ground in degrees.
    pub bearing: u16,
    /// Time the beacon was last received, in microseconds.
    pub last_seen: u64,
    /// Time the beacon was first received, in microseconds.
    pub first_seen: u64,
}

/// `fmt::Write` over a fixed slice; fails instead of growing.
struct ScratchWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for ScratchWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

impl BeaconRecord {
    /// Encodes the record as one log line into `buf`.
    ///
    /// Returns the number of bytes written. A buffer of [`MAX_RECORD_LEN`]
    /// bytes always suffices.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::TooLong`] if the line does not fit in `buf`;
    /// the contents of `buf` are then unspecified.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, RecordError> {
        let capacity = buf.len();
        let mut w = ScratchWriter { buf, pos: 0 };
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            self.frame_id,
            self.ansi_id,
            self.lat,
            self.lon,
            self.alt,
            self.height,
            self.lat_start,
            self.lon_start,
            self.speed,
            self.bearing,
            self.last_seen,
            self.first_seen,
        )
        .map_err(|_| RecordError::TooLong { capacity })?;
        Ok(w.pos)
    }

    /// Encodes the record into a new `String`. Convenience for tools; the
    /// recorder itself uses [`BeaconRecord::encode_into`].
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut buf = [0u8; MAX_RECORD_LEN];
        match self.encode_into(&mut buf) {
            Ok(len) => String::from_utf8_lossy(&buf[..len]).into_owned(),
            Err(_) => String::new(),
        }
    }

    /// Parses one log line, with or without its trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the field count is wrong or any field is out of
    /// range for its type.
    pub fn parse_line(line: &str) -> Result<Self, RecordError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        let mut fields = [""; FIELD_COUNT];
        let mut found = 0;
        for field in line.split(',') {
            if found < FIELD_COUNT {
                fields[found] = field;
            }
            found += 1;
        }
        if found != FIELD_COUNT {
            return Err(RecordError::FieldCount {
                expected: FIELD_COUNT,
                found,
            });
        }

        Ok(Self {
            frame_id: parse_field(fields[0], 0)?,
            ansi_id: parse_field(fields[1], 1)?,
            lat: parse_field(fields[2], 2)?,
            lon: parse_field(fields[3], 3)?,
            alt: parse_field(fields[4], 4)?,
            height: parse_field(fields[5], 5)?,
            lat_start: parse_field(fields[6], 6)?,
            lon_start: parse_field(fields[7], 7)?,
            speed: parse_field(fields[8], 8)?,
            bearing: parse_field(fields[9], 9)?,
            last_seen: parse_field(fields[10], 10)?,
            first_seen: parse_field(fields[11], 11)?,
        })
    }
}

fn parse_field<T: FromStr>(value: &str, index: usize) -> Result<T, RecordError> {
    value.parse().map_err(|_| RecordError::InvalidField {
        field: FIELD_NAMES[index],
        value: value.to_owned(),
    })
}

/// Iterator over the records of a log file's contents.
///
/// Yields one result per non-empty line.
///
/// ```rust
/// use beacon_recorder::{BeaconRecord, LogLines};
///
/// let data = b"A,B,1,2,3,4,5,6,7,8,9,10\n";
/// let records: Vec<BeaconRecord> = LogLines::new(data).collect::<Result<_, _>>().unwrap();
/// assert_eq!(records[0].lat, 1);
/// ```
#[derive(Debug, Clone)]
pub struct LogLines<'a> {
    rest: &'a [u8],
}

impl<'a> LogLines<'a> {
    /// Creates an iterator over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl Iterator for LogLines<'_> {
    type Item = Result<BeaconRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.rest.is_empty() {
                return None;
            }
            let (line, rest) = match self.rest.iter().position(|b| *b == b'\n') {
                Some(pos) => (&self.rest[..pos], &self.rest[pos + 1..]),
                None => (self.rest, &self.rest[self.rest.len()..]),
            };
            self.rest = rest;
            if line.is_empty() {
                continue;
            }
            return Some(match std::str::from_utf8(line) {
                Ok(text) => BeaconRecord::parse_line(text),
                Err(_) => Err(RecordError::InvalidUtf8),
            });
        }
    }
}
