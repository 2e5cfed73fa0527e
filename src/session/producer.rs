use super::scene::Scene;
use crate::protocol::{DataKind, FrameHeader, PROTOCOL_VERSION, TIMESTAMP_NANOS, encode_frame};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub(crate) struct Producer {
    pub sensor_id: String,
    pub socket: Arc<UdpSocket>,
    pub target: SocketAddr,
    pub interval: Duration,
    pub data_kind: DataKind,
    pub scene: Scene,
    pub frames_sent: Arc<AtomicU64>,
}

impl Producer {
    fn header(&self) -> FrameHeader {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        FrameHeader {
            version: PROTOCOL_VERSION,
            slot: 0,
            device_id: 0,
            reserved: 0,
            status_code: 0,
            timestamp_kind: TIMESTAMP_NANOS,
            data_kind: self.data_kind,
            timestamp_ns,
        }
    }
}

/// Emit one frame per tick until stopped. A failed send ends the loop; the
/// session reports itself idle once the task has finished.
pub(crate) async fn run(producer: Producer, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(producer.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let started = Instant::now();
    let mut frame_index: u64 = 0;

    info!(sensor = %producer.sensor_id, target = %producer.target, "streaming started");

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }

        let points = producer
            .scene
            .points(started.elapsed().as_secs_f64(), frame_index);
        let bytes = match encode_frame(&producer.header(), &points) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(sensor = %producer.sensor_id, error = %e, "failed to encode frame");
                break;
            }
        };

        if let Err(e) = producer.socket.send_to(&bytes, producer.target).await {
            error!(
                sensor = %producer.sensor_id,
                target = %producer.target,
                error = %e,
                "failed to send frame, producer stopping"
            );
            break;
        }

        frame_index += 1;
        producer.frames_sent.fetch_add(1, Ordering::SeqCst);
    }

    info!(sensor = %producer.sensor_id, frames = frame_index, "streaming stopped");
}
