pub mod control;
mod device;
mod listener;
mod producer;
pub mod receiver;
pub mod scene;
mod worker;

#[cfg(test)]
mod tests;

pub use control::CommandClient;
pub use device::{DeviceSession, SessionState};
pub use receiver::{DataReceiver, ReceiverStats};
pub use scene::Scene;
