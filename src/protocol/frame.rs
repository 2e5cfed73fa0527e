//! Measurement frame encoding and decoding.
//!
//! # Frame Format
//!
//! ```text
//! +---------+------+--------+----------+--------+---------+---------+-----------+
//! | version | slot | device | reserved | status | ts kind | data    | timestamp |
//! | (u8)    | (u8) | (u8)   | (u8)     | (u32)  | (u8)    | kind u8 | (u64 ns)  |
//! +---------+------+--------+----------+--------+---------+---------+-----------+
//! | point records: x (i32 mm) | y (i32 mm) | z (i32 mm) | intensity (u8) | ...  |
//! +-----------------------------------------------------------------------------+
//! ```
//!
//! There is no in-band point count. The data kind fixes how many records
//! follow the header, so both sides have to agree on it.
//!
//! # Error Handling
//!
//! Decoding never panics. Short, truncated or mis-sized buffers come back as
//! a [`DecodeError`] so a receive loop can log them and move on to the next
//! datagram.

use super::constants::{HEADER_LEN, POINT_LEN};
use crate::error::{DecodeError, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};

/// Coordinate/return-type selector carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataKind {
    /// Cartesian, single return.
    Cartesian,
    /// Extended Cartesian, single return.
    ExtendedCartesian,
    /// Cartesian, dual return.
    DualReturn,
}

impl DataKind {
    /// Number of point records a frame of this kind carries.
    pub fn point_count(self) -> usize {
        match self {
            DataKind::Cartesian => 100,
            DataKind::ExtendedCartesian => 96,
            DataKind::DualReturn => 48,
        }
    }

    /// Total encoded length of a frame of this kind.
    pub fn frame_len(self) -> usize {
        HEADER_LEN + self.point_count() * POINT_LEN
    }
}

impl TryFrom<u8> for DataKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DataKind::Cartesian),
            2 => Ok(DataKind::ExtendedCartesian),
            4 => Ok(DataKind::DualReturn),
            other => Err(DecodeError::UnknownDataKind(other)),
        }
    }
}

impl From<DataKind> for u8 {
    fn from(kind: DataKind) -> u8 {
        match kind {
            DataKind::Cartesian => 0,
            DataKind::ExtendedCartesian => 2,
            DataKind::DualReturn => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub slot: u8,
    pub device_id: u8,
    pub reserved: u8,
    pub status_code: u32,
    pub timestamp_kind: u8,
    pub data_kind: DataKind,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
}

impl FrameHeader {
    /// Frame timestamp in seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1e9
    }
}

/// One sensor-relative point, coordinates in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub points: Vec<Point>,
}

/// Serialize a header and its points into one datagram.
///
/// Fails with [`EncodeError::PointCount`] if `points` does not hold exactly
/// as many records as the header's data kind carries.
pub fn encode_frame(header: &FrameHeader, points: &[Point]) -> Result<Vec<u8>, EncodeError> {
    let expected = header.data_kind.point_count();
    if points.len() != expected {
        return Err(EncodeError::PointCount {
            expected,
            found: points.len(),
        });
    }

    let mut buf = Vec::with_capacity(header.data_kind.frame_len());
    buf.write_u8(header.version)?;
    buf.write_u8(header.slot)?;
    buf.write_u8(header.device_id)?;
    buf.write_u8(header.reserved)?;
    buf.write_u32::<LittleEndian>(header.status_code)?;
    buf.write_u8(header.timestamp_kind)?;
    buf.write_u8(header.data_kind.into())?;
    buf.write_u64::<LittleEndian>(header.timestamp_ns)?;

    for point in points {
        buf.write_i32::<LittleEndian>(point.x)?;
        buf.write_i32::<LittleEndian>(point.y)?;
        buf.write_i32::<LittleEndian>(point.z)?;
        buf.write_u8(point.intensity)?;
    }

    Ok(buf)
}

/// Parse one datagram into a [`Frame`].
///
/// # Returns
///
/// * `Err(DecodeError::TooShort)` - fewer than [`HEADER_LEN`] bytes
/// * `Err(DecodeError::Truncated)` - payload is not whole point records
/// * `Err(DecodeError::UnknownDataKind)` - data kind byte is not recognized
/// * `Err(DecodeError::PointCount)` - whole records, wrong count for the kind
pub fn decode_frame(data: &[u8]) -> Result<Frame, DecodeError> {
    if data.len() < HEADER_LEN {
        return Err(DecodeError::TooShort {
            len: data.len(),
            min: HEADER_LEN,
        });
    }

    let payload = &data[HEADER_LEN..];
    let truncated = || DecodeError::Truncated { len: data.len() };
    if payload.len() % POINT_LEN != 0 {
        return Err(truncated());
    }

    let mut cursor = Cursor::new(data);
    let header = read_header(&mut cursor).map_err(|e| match e {
        HeaderError::Io => truncated(),
        HeaderError::DataKind(e) => e,
    })?;

    let found = payload.len() / POINT_LEN;
    let expected = header.data_kind.point_count();
    if found != expected {
        return Err(DecodeError::PointCount { expected, found });
    }

    let points = (0..found)
        .map(|_| read_point(&mut cursor))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|_| truncated())?;

    Ok(Frame { header, points })
}

enum HeaderError {
    Io,
    DataKind(DecodeError),
}

impl From<io::Error> for HeaderError {
    fn from(_: io::Error) -> Self {
        HeaderError::Io
    }
}

/// Read the fixed header. The caller has already checked the length, so in
/// practice the only failure left is the data kind byte.
fn read_header(cursor: &mut Cursor<&[u8]>) -> Result<FrameHeader, HeaderError> {
    let version = cursor.read_u8()?;
    let slot = cursor.read_u8()?;
    let device_id = cursor.read_u8()?;
    let reserved = cursor.read_u8()?;
    let status_code = cursor.read_u32::<LittleEndian>()?;
    let timestamp_kind = cursor.read_u8()?;
    let data_kind = DataKind::try_from(cursor.read_u8()?).map_err(HeaderError::DataKind)?;
    let timestamp_ns = cursor.read_u64::<LittleEndian>()?;

    Ok(FrameHeader {
        version,
        slot,
        device_id,
        reserved,
        status_code,
        timestamp_kind,
        data_kind,
        timestamp_ns,
    })
}

fn read_point(cursor: &mut Cursor<&[u8]>) -> io::Result<Point> {
    Ok(Point {
        x: cursor.read_i32::<LittleEndian>()?,
        y: cursor.read_i32::<LittleEndian>()?,
        z: cursor.read_i32::<LittleEndian>()?,
        intensity: cursor.read_u8()?,
    })
}
