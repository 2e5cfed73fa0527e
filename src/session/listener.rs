//! Wire-facing command interpreter.
//!
//! Decodes datagrams on the command socket and drives the same transitions
//! as the direct control API. Refused transitions and unknown commands are
//! logged and the loop keeps listening.

use super::device::Inner;
use crate::protocol::{CommandKind, MAX_DATAGRAM_LEN, match_command};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub(crate) async fn run(
    inner: Weak<Inner>,
    socket: Arc<UdpSocket>,
    poll: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    loop {
        let received = tokio::select! {
            biased;
            _ = stop.changed() => break,
            received = tokio::time::timeout(poll, socket.recv_from(&mut buf)) => received,
        };

        let (len, peer) = match received {
            Err(_) => continue,
            Ok(Ok(datagram)) => datagram,
            Ok(Err(e)) => {
                error!(error = %e, "command socket receive failed, listener stopping");
                break;
            }
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };
        interpret(&inner, &buf[..len], peer).await;
    }

    debug!("command listener exited");
}

async fn interpret(inner: &Inner, data: &[u8], peer: SocketAddr) {
    match match_command(data) {
        CommandKind::Start => {
            info!(sensor = %inner.sensor_id(), %peer, "received start command");
            if let Err(e) = inner.begin_streaming().await {
                warn!(sensor = %inner.sensor_id(), error = %e, "start command refused");
            }
        }
        CommandKind::Stop => {
            info!(sensor = %inner.sensor_id(), %peer, "received stop command");
            inner.end_streaming().await;
        }
        CommandKind::Unknown => {
            debug!(
                sensor = %inner.sensor_id(),
                %peer,
                bytes = %hex::encode(data),
                "ignoring unknown command"
            );
        }
    }
}
