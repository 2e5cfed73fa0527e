//! Wire constants for the sensor protocol.
//!
//! Measurement frames and command packets are both little-endian. A frame is
//! a fixed header followed by a fixed number of point records; the number of
//! records is implied by the header's data kind.

/// Size of a measurement frame header in bytes.
///
/// version(1) + slot(1) + device id(1) + reserved(1) + status(4)
/// + timestamp kind(1) + data kind(1) + timestamp(8)
pub const HEADER_LEN: usize = 18;

/// Size of one point record in bytes: x, y, z as `i32` plus intensity `u8`.
pub const POINT_LEN: usize = 13;

/// Protocol version written by the simulated device.
pub const PROTOCOL_VERSION: u8 = 5;

/// Timestamp kind for nanoseconds since the Unix epoch.
pub const TIMESTAMP_NANOS: u8 = 0;

/// Number of leading bytes that identify a command.
pub const COMMAND_PREFIX_LEN: usize = 11;

/// Start streaming (Controller->Device)
pub const CMD_DATA_START: [u8; COMMAND_PREFIX_LEN] =
    [0xaa, 0x01, 0x14, 0x00, 0x00, 0x00, 0x00, 0xb5, 0xed, 0x01, 0x01];

/// Stop streaming (Controller->Device)
pub const CMD_DATA_STOP: [u8; COMMAND_PREFIX_LEN] =
    [0xaa, 0x01, 0x14, 0x00, 0x00, 0x00, 0x00, 0xb5, 0xed, 0x01, 0x00];

/// Largest datagram the receive loops read.
pub const MAX_DATAGRAM_LEN: usize = 2048;
