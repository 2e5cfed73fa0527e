//! Berthing telemetry core.
//!
//! Range-finding sensors at a berth stream measurement frames over UDP. This
//! crate decodes those frames, reduces each to one stable distance, derives
//! approach speed from the distance history and classifies the berth's
//! status for operator display.
//!
//! * [`protocol`] - frame codec and command packets
//! * [`session`] - simulated device, command client, frame receiver
//! * [`estimator`] - distance history and speed estimates
//! * [`berthing`] - movement phase and berth status
//! * [`telemetry`] - shared per-sensor handle and display view

pub mod berthing;
pub mod config;
pub mod error;
pub mod estimator;
pub mod protocol;
pub mod reducer;
pub mod session;
pub mod telemetry;

pub use config::Config;
pub use error::{DecodeError, EncodeError, ErrorKind, ErrorReport, SampleRejected, SessionError};
