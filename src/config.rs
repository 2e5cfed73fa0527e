//! Runtime configuration, loaded from a JSON file.
//!
//! Every field has a default, so `{}` is a valid configuration for a single
//! simulated sensor on loopback.

use crate::berthing::BerthContext;
use crate::estimator::EstimatorConfig;
use crate::protocol::DataKind;
use anyhow::{Context, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

const SENSOR_ID_PATTERN: &str = r"^[A-Za-z0-9_.-]{1,64}$";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Address the device binds its sockets on.
    pub local_address: IpAddr,
    /// Address of the computer that receives frames.
    pub remote_address: IpAddr,
    /// Port frames are sent to on `remote_address`.
    pub data_port: u16,
    /// Port the device listens for commands on.
    pub command_port: u16,
    pub frame_interval_ms: u64,
    pub stop_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub data_kind: DataKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            remote_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            data_port: 56001,
            command_port: 65000,
            frame_interval_ms: 10,
            stop_timeout_ms: 1000,
            poll_interval_ms: 100,
            data_kind: DataKind::Cartesian,
        }
    }
}

impl SessionConfig {
    pub fn data_target(&self) -> SocketAddr {
        SocketAddr::new(self.remote_address, self.data_port)
    }

    pub fn command_bind(&self) -> SocketAddr {
        SocketAddr::new(self.local_address, self.command_port)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Motion of the synthetic vessel the simulated device sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub start_distance_m: f64,
    /// Closing speed, positive towards the sensor.
    pub approach_speed_mps: f64,
    /// The vessel stops here.
    pub stop_distance_m: f64,
    /// Amplitude of the deterministic range wobble on center points.
    pub jitter_mm: i32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            start_distance_m: 30.0,
            approach_speed_mps: 0.25,
            stop_distance_m: 0.5,
            jitter_mm: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sensor_id: String,
    pub session: SessionConfig,
    pub scene: SceneConfig,
    pub estimator: EstimatorConfig,
    pub berth: BerthContext,
    pub report_interval_ms: u64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor_id: "sim-0001".to_string(),
            session: SessionConfig::default(),
            scene: SceneConfig::default(),
            estimator: EstimatorConfig::default(),
            berth: BerthContext {
                sensors: vec!["sim-0001".to_string()],
                ..BerthContext::default()
            },
            report_interval_ms: 1000,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let pattern = Regex::new(SENSOR_ID_PATTERN)?;
        for id in std::iter::once(&self.sensor_id).chain(&self.berth.sensors) {
            if !pattern.is_match(id) {
                bail!("sensor id {id:?} must match {SENSOR_ID_PATTERN}");
            }
        }
        if self.session.frame_interval_ms == 0 {
            bail!("session.frame_interval_ms must be positive");
        }
        if self.session.poll_interval_ms == 0 {
            bail!("session.poll_interval_ms must be positive");
        }
        if self.estimator.short_window < 2 || self.estimator.trend_window < 2 {
            bail!("estimator windows need at least two samples");
        }
        if self.scene.stop_distance_m < 0.0
            || self.scene.start_distance_m < self.scene.stop_distance_m
        {
            bail!("scene must start at or beyond its non-negative stop distance");
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session.command_port, 65000);
        assert_eq!(config.session.data_kind, DataKind::Cartesian);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_json(
            r#"{
                "sensor_id": "berth3-bow",
                "session": { "data_port": 6000, "data_kind": 2 },
                "estimator": { "trend_window": 50 },
                "berth": { "berth_id": 3, "sensors": ["berth3-bow", "berth3-stern"] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.session.data_port, 6000);
        assert_eq!(config.session.command_port, 65000);
        assert_eq!(config.session.data_kind, DataKind::ExtendedCartesian);
        assert_eq!(config.estimator.trend_window, 50);
        assert_eq!(config.estimator.short_window, 10);
        assert_eq!(config.berth.berth_id, 3);
        assert!(config.berth.mode_active);
    }

    #[test]
    fn test_rejects_bad_sensor_id() {
        let err = Config::from_json(r#"{ "sensor_id": "bow sensor!" }"#).unwrap_err();
        assert!(err.to_string().contains("bow sensor!"));
    }

    #[test]
    fn test_rejects_unknown_data_kind() {
        assert!(Config::from_json(r#"{ "session": { "data_kind": 9 } }"#).is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(Config::from_json(r#"{ "session": { "frame_interval_ms": 0 } }"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/berthing.json").unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
