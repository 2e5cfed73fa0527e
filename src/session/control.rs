//! Controller-side command client.

use crate::error::SessionError;
use crate::protocol::{CommandKind, encode_command};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::debug;

/// Sends start/stop commands to one device's command socket. There is no
/// acknowledgement; a sent command is fire-and-forget.
pub struct CommandClient {
    socket: UdpSocket,
    device: SocketAddr,
}

impl CommandClient {
    pub async fn bind(local: SocketAddr, device: SocketAddr) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| SessionError::transport(format!("bind command client on {local}"), e))?;
        Ok(Self { socket, device })
    }

    pub fn device(&self) -> SocketAddr {
        self.device
    }

    pub async fn start(&self) -> Result<(), SessionError> {
        self.send(CommandKind::Start).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send(CommandKind::Stop).await
    }

    /// `CommandKind::Unknown` has no encoding and sends nothing.
    pub async fn send(&self, kind: CommandKind) -> Result<(), SessionError> {
        match encode_command(kind) {
            Some(bytes) => self.send_raw(&bytes).await,
            None => Ok(()),
        }
    }

    /// Send arbitrary bytes, e.g. a command with a trailing checksum.
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<(), SessionError> {
        debug!(device = %self.device, bytes = %hex::encode(bytes), "sending command");
        self.socket
            .send_to(bytes, self.device)
            .await
            .map_err(|e| SessionError::transport(format!("send command to {}", self.device), e))?;
        Ok(())
    }
}
