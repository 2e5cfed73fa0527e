//! Application-side frame receiver.
//!
//! Decodes measurement frames from a data port, reduces each to one stable
//! distance with the caller's [`DistanceReducer`] and records it into a
//! sensor's telemetry. Malformed datagrams are counted, logged and skipped.

use super::worker::Worker;
use crate::error::SessionError;
use crate::protocol::{MAX_DATAGRAM_LEN, decode_frame};
use crate::reducer::DistanceReducer;
use crate::telemetry::SensorTelemetry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    malformed: AtomicU64,
    unreduced: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of a receiver's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverStats {
    /// Frames that decoded.
    pub frames: u64,
    /// Datagrams that did not decode.
    pub malformed: u64,
    /// Frames the reducer found no distance in.
    pub unreduced: u64,
    /// Distances the estimator dropped.
    pub rejected: u64,
}

pub struct DataReceiver {
    local_addr: SocketAddr,
    counters: Arc<Counters>,
    worker: Worker,
}

impl DataReceiver {
    pub async fn bind(
        addr: SocketAddr,
        telemetry: SensorTelemetry,
        reducer: Arc<dyn DistanceReducer>,
        poll: Duration,
    ) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| SessionError::transport(format!("bind data receiver on {addr}"), e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| SessionError::transport("read data receiver address", e))?;

        info!(sensor = %telemetry.sensor_id(), %local_addr, "data receiver listening");

        let counters = Arc::new(Counters::default());
        let worker = Worker::spawn("data receiver", {
            let counters = Arc::clone(&counters);
            move |stop| run(socket, telemetry, reducer, counters, poll, stop)
        });

        Ok(Self {
            local_addr,
            counters,
            worker,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            frames: self.counters.frames.load(Ordering::SeqCst),
            malformed: self.counters.malformed.load(Ordering::SeqCst),
            unreduced: self.counters.unreduced.load(Ordering::SeqCst),
            rejected: self.counters.rejected.load(Ordering::SeqCst),
        }
    }

    pub async fn shutdown(self, timeout: Duration) {
        self.worker.shutdown(timeout).await;
    }
}

async fn run(
    socket: UdpSocket,
    telemetry: SensorTelemetry,
    reducer: Arc<dyn DistanceReducer>,
    counters: Arc<Counters>,
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
                error!(
                    sensor = %telemetry.sensor_id(),
                    error = %e,
                    "data socket receive failed, receiver stopping"
                );
                break;
            }
        };

        let frame = match decode_frame(&buf[..len]) {
            Ok(frame) => frame,
            Err(e) => {
                counters.malformed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    sensor = %telemetry.sensor_id(),
                    %peer,
                    error = %e,
                    "skipping malformed frame"
                );
                continue;
            }
        };
        counters.frames.fetch_add(1, Ordering::SeqCst);

        let Some(distance) = reducer.reduce(&frame) else {
            counters.unreduced.fetch_add(1, Ordering::SeqCst);
            debug!(sensor = %telemetry.sensor_id(), "no stable distance in frame");
            continue;
        };

        if telemetry
            .record(frame.header.timestamp_secs(), distance)
            .is_err()
        {
            counters.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }

    debug!(sensor = %telemetry.sensor_id(), "data receiver exited");
}
