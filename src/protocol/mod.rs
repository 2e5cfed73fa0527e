mod command;
mod constants;
mod frame;


pub use command::{CommandKind, encode_command, match_command};
pub use constants::*;
pub use frame::{DataKind, Frame, FrameHeader, Point, decode_frame, encode_frame};
