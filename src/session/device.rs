//! Simulated sensor device.
//!
//! A [`DeviceSession`] owns one sensor's data and command sockets. It can be
//! driven directly through its methods, or remotely by sending it start/stop
//! command packets; both paths end up in the same transition functions on
//! [`Inner`], serialized by the state lock.

use super::listener;
use super::producer::{self, Producer};
use super::scene::Scene;
use super::worker::Worker;
use crate::config::{SceneConfig, SessionConfig};
use crate::error::SessionError;
use crate::estimator::EstimatorConfig;
use crate::telemetry::SensorTelemetry;
use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::info;

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Idle,
    Streaming,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
        }
    }
}

/// Resources held while connected.
struct Link {
    params: SessionConfig,
    data_socket: Arc<UdpSocket>,
    command_socket: Arc<UdpSocket>,
    listener: Worker,
    producer: Option<Worker>,
    telemetry: SensorTelemetry,
}

impl Link {
    fn is_streaming(&self) -> bool {
        self.producer.as_ref().is_some_and(|p| !p.is_finished())
    }
}

enum State {
    Disconnected,
    Connected(Link),
}

impl State {
    fn public(&self) -> SessionState {
        match self {
            State::Disconnected => SessionState::Disconnected,
            State::Connected(link) if link.is_streaming() => SessionState::Streaming,
            State::Connected(_) => SessionState::Idle,
        }
    }
}

pub(crate) struct Inner {
    sensor_id: String,
    scene: SceneConfig,
    estimator: EstimatorConfig,
    state: Mutex<State>,
    frames_sent: Arc<AtomicU64>,
}

impl Inner {
    pub(crate) fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    async fn connect(self: &Arc<Self>, params: SessionConfig) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if let State::Connected(_) = *state {
            return Err(SessionError::State {
                op: "connect",
                state: state.public().name(),
            });
        }

        let data_bind = SocketAddr::new(params.local_address, 0);
        let data_socket = UdpSocket::bind(data_bind)
            .await
            .map_err(|e| SessionError::transport(format!("bind data socket on {data_bind}"), e))?;

        // The data socket is dropped, and so closed, if this bind fails.
        let command_bind = params.command_bind();
        let command_socket = UdpSocket::bind(command_bind).await.map_err(|e| {
            SessionError::transport(format!("bind command socket on {command_bind}"), e)
        })?;

        let data_socket = Arc::new(data_socket);
        let command_socket = Arc::new(command_socket);

        let listener = Worker::spawn("command listener", {
            let inner = Arc::downgrade(self);
            let socket = Arc::clone(&command_socket);
            let poll = params.poll_interval();
            move |stop| listener::run(inner, socket, poll, stop)
        });

        info!(
            sensor = %self.sensor_id,
            command = ?command_socket.local_addr().ok(),
            data_target = %params.data_target(),
            "connected"
        );

        *state = State::Connected(Link {
            params,
            data_socket,
            command_socket,
            listener,
            producer: None,
            telemetry: SensorTelemetry::new(&self.sensor_id, self.estimator.clone()),
        });
        Ok(())
    }

    pub(crate) async fn begin_streaming(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        let current = state.public();
        let State::Connected(link) = &mut *state else {
            return Err(SessionError::State {
                op: "start streaming",
                state: current.name(),
            });
        };
        if current == SessionState::Streaming {
            return Err(SessionError::State {
                op: "start streaming",
                state: current.name(),
            });
        }

        // A producer that died on a send error is reaped before replacing it.
        if let Some(dead) = link.producer.take() {
            dead.shutdown(link.params.stop_timeout()).await;
        }

        link.telemetry.clear();
        let producer = Producer {
            sensor_id: self.sensor_id.clone(),
            socket: Arc::clone(&link.data_socket),
            target: link.params.data_target(),
            interval: link.params.frame_interval(),
            data_kind: link.params.data_kind,
            scene: Scene::new(self.scene.clone(), link.params.data_kind),
            frames_sent: Arc::clone(&self.frames_sent),
        };
        link.producer = Some(Worker::spawn("frame producer", move |stop| {
            producer::run(producer, stop)
        }));
        Ok(())
    }

    /// Stop the producer and wait for it. No-op when not streaming.
    pub(crate) async fn end_streaming(&self) {
        let mut state = self.state.lock().await;
        let State::Connected(link) = &mut *state else {
            return;
        };
        if let Some(producer) = link.producer.take() {
            producer.shutdown(link.params.stop_timeout()).await;
            link.telemetry.clear();
        }
    }

    async fn disconnect(&self) {
        let link = {
            let mut state = self.state.lock().await;
            match mem::replace(&mut *state, State::Disconnected) {
                State::Disconnected => return,
                State::Connected(link) => link,
            }
        };

        let timeout = link.params.stop_timeout();
        if let Some(producer) = link.producer {
            producer.shutdown(timeout).await;
        }
        link.listener.shutdown(timeout).await;

        // Both loops have exited, so these are the last socket handles.
        drop(link.data_socket);
        drop(link.command_socket);
        info!(sensor = %self.sensor_id, "disconnected");
    }
}

/// One simulated sensor.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<Inner>,
}

impl DeviceSession {
    pub fn new(sensor_id: &str, scene: SceneConfig, estimator: EstimatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sensor_id: sensor_id.to_string(),
                scene,
                estimator,
                state: Mutex::new(State::Disconnected),
                frames_sent: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    pub fn sensor_id(&self) -> &str {
        self.inner.sensor_id()
    }

    /// Bind both sockets and start listening for commands.
    pub async fn connect(&self, params: SessionConfig) -> Result<(), SessionError> {
        self.inner.connect(params).await
    }

    pub async fn start_streaming(&self) -> Result<(), SessionError> {
        self.inner.begin_streaming().await
    }

    /// Returns once the producer has exited, aborting it if it misses the
    /// stop timeout. Safe to call when idle or disconnected.
    pub async fn stop_streaming(&self) {
        self.inner.end_streaming().await;
    }

    /// Stop everything and release both sockets. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    pub async fn state(&self) -> SessionState {
        self.inner.state.lock().await.public()
    }

    pub async fn is_streaming(&self) -> bool {
        self.state().await == SessionState::Streaming
    }

    /// Where the device listens for commands.
    pub async fn command_addr(&self) -> Option<SocketAddr> {
        match &*self.inner.state.lock().await {
            State::Connected(link) => link.command_socket.local_addr().ok(),
            State::Disconnected => None,
        }
    }

    /// Where frames are sent from.
    pub async fn data_addr(&self) -> Option<SocketAddr> {
        match &*self.inner.state.lock().await {
            State::Connected(link) => link.data_socket.local_addr().ok(),
            State::Disconnected => None,
        }
    }

    /// This connection's distance history.
    pub async fn telemetry(&self) -> Option<SensorTelemetry> {
        match &*self.inner.state.lock().await {
            State::Connected(link) => Some(link.telemetry.clone()),
            State::Disconnected => None,
        }
    }

    /// Frames sent over the lifetime of this session.
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_sent.load(Ordering::SeqCst)
    }
}
