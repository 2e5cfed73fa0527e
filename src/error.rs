//! Error types for the berthing telemetry core.
//!
//! Every failure is scoped to one sensor's session or one computation. None
//! of these errors is fatal to the process; callers log them, or turn them
//! into an [`ErrorReport`] when they need to surface them to an operator.

use serde::Serialize;
use std::fmt;
use std::io;

/// Coarse classification of a failure, used in structured reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bind, send or receive failure on a socket.
    Transport,
    /// Malformed inbound bytes.
    Decode,
    /// Outbound frame could not be built.
    Encode,
    /// Operation invoked from a session state that does not allow it.
    State,
    /// Sample rejected by the estimator.
    Input,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::Encode => "encode",
            ErrorKind::State => "state",
            ErrorKind::Input => "input",
        };
        f.write_str(name)
    }
}

/// A failure as shown to a user: kind plus a human message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Errors raised while decoding a measurement frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Fewer bytes than a frame header.
    #[error("frame too short: {len} bytes, header needs {min}")]
    TooShort { len: usize, min: usize },
    /// Payload is not a whole number of point records.
    #[error("frame truncated: {len} bytes is not a header plus whole point records")]
    Truncated { len: usize },
    /// Whole records, but not as many as the data kind carries.
    #[error("frame carries {found} points, data kind expects {expected}")]
    PointCount { expected: usize, found: usize },
    /// Data kind byte outside the known set.
    #[error("unknown data kind 0x{0:02x}")]
    UnknownDataKind(u8),
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Decode
    }
}

/// Errors raised while encoding a measurement frame.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("data kind expects {expected} points, got {found}")]
    PointCount { expected: usize, found: usize },
    #[error("failed to write frame: {0}")]
    Io(#[from] io::Error),
}

impl EncodeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Encode
    }
}

/// Errors raised by a device session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot {op} while {state}")]
    State { op: &'static str, state: &'static str },
}

impl SessionError {
    pub fn transport(context: impl Into<String>, source: io::Error) -> Self {
        SessionError::Transport {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Transport { .. } => ErrorKind::Transport,
            SessionError::State { .. } => ErrorKind::State,
        }
    }
}

/// Why the estimator dropped a sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleRejected {
    #[error("timestamp {timestamp} is not after the last recorded {last}")]
    NonMonotonic { timestamp: f64, last: f64 },
    #[error("timestamp {0} is not finite")]
    InvalidTimestamp(f64),
    #[error("distance {0} is not a finite non-negative value")]
    InvalidDistance(f64),
}

impl SampleRejected {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Input
    }
}

macro_rules! impl_report {
    ($($ty:ty),*) => {
        $(
            impl From<&$ty> for ErrorReport {
                fn from(err: &$ty) -> Self {
                    ErrorReport::new(err.kind(), err.to_string())
                }
            }
        )*
    };
}

impl_report!(DecodeError, EncodeError, SessionError, SampleRejected);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_report() {
        let err = SessionError::State {
            op: "start streaming",
            state: "streaming",
        };
        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, ErrorKind::State);
        assert_eq!(report.message, "cannot start streaming while streaming");
        assert_eq!(report.to_string(), "state error: cannot start streaming while streaming");
    }

    #[test]
    fn test_report_serializes_kind_in_snake_case() {
        let report = ErrorReport::from(&SampleRejected::InvalidDistance(-1.0));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "input");
    }

    #[test]
    fn test_transport_kind() {
        let err = SessionError::transport(
            "bind command socket",
            io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        );
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().starts_with("bind command socket"));
    }
}
