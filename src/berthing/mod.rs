//! Movement phase and berth status classification.
//!
//! Everything here is a pure function of its inputs. The berth-to-sensor
//! mapping and the berthing mode flag are passed in by the caller through a
//! [`BerthContext`].


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Below this distance (m), a moving vessel is on final approach.
pub const FINAL_APPROACH_DISTANCE: f64 = 5.0;
/// Below this distance (m), a moving vessel is approaching.
pub const APPROACH_DISTANCE: f64 = 20.0;
/// Below this distance (m), a still vessel is berthed.
pub const BERTHED_DISTANCE: f64 = 1.0;

/// Latest motion of one sensor's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Stationary,
    Approaching,
    Departing,
    Lateral,
}

/// Operational state of a whole berth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BerthingStatus {
    Inactive,
    Standby,
    Monitoring,
    Approaching,
    FinalApproach,
    Berthed,
}

/// What the classifier needs from one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Meters. Zero or negative means no valid reading.
    pub distance: f64,
    /// Meters per second, negative when approaching.
    pub speed: f64,
    pub is_moving: bool,
}

/// Which sensors belong to a berth and whether berthing mode is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BerthContext {
    pub berth_id: u32,
    pub mode_active: bool,
    pub sensors: Vec<String>,
}

impl Default for BerthContext {
    fn default() -> Self {
        Self {
            berth_id: 1,
            mode_active: true,
            sensors: Vec::new(),
        }
    }
}

/// Classify one sensor's motion.
///
/// `distance` is not used by the current rules but is part of the reading a
/// phase is derived from.
pub fn movement_phase(_distance: f64, speed: f64, is_moving: bool) -> Phase {
    if !is_moving {
        Phase::Stationary
    } else if speed < 0.0 {
        Phase::Approaching
    } else if speed > 0.0 {
        Phase::Departing
    } else {
        Phase::Lateral
    }
}

/// Smallest positive distance across readings, `None` if no sensor has one.
pub fn min_valid_distance<'a>(
    readings: impl IntoIterator<Item = &'a SensorReading>,
) -> Option<f64> {
    readings
        .into_iter()
        .map(|r| r.distance)
        .filter(|d| d.is_finite() && *d > 0.0)
        .reduce(f64::min)
}

/// Collapse a berth's sensor readings into one status.
pub fn aggregate_status(mode_active: bool, readings: &[SensorReading]) -> BerthingStatus {
    if !mode_active {
        return BerthingStatus::Inactive;
    }

    let any_moving = readings.iter().any(|r| r.is_moving);
    let Some(min_distance) = min_valid_distance(readings) else {
        return BerthingStatus::Standby;
    };

    if any_moving {
        if min_distance < FINAL_APPROACH_DISTANCE {
            BerthingStatus::FinalApproach
        } else if min_distance < APPROACH_DISTANCE {
            BerthingStatus::Approaching
        } else {
            BerthingStatus::Monitoring
        }
    } else if min_distance < BERTHED_DISTANCE {
        BerthingStatus::Berthed
    } else {
        BerthingStatus::Standby
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSummary {
    pub distance: f64,
    /// Absolute speed.
    pub speed_mm_s: f64,
    pub is_moving: bool,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BerthSummary {
    pub berth_id: u32,
    pub mode_active: bool,
    pub overall_status: BerthingStatus,
    pub min_distance: Option<f64>,
    pub max_speed_mm_s: f64,
    pub sensors: BTreeMap<String, SensorSummary>,
    /// Berth sensors with no reading.
    pub missing: Vec<String>,
}

/// Build the berth view from the readings the caller has for its sensors.
///
/// Readings for sensors that are not part of the berth are ignored.
pub fn summarize(berth: &BerthContext, readings: &BTreeMap<String, SensorReading>) -> BerthSummary {
    let mut sensors = BTreeMap::new();
    let mut missing = Vec::new();
    let mut present = Vec::with_capacity(berth.sensors.len());

    for sensor_id in &berth.sensors {
        let Some(reading) = readings.get(sensor_id) else {
            missing.push(sensor_id.clone());
            continue;
        };
        present.push(*reading);
        sensors.insert(
            sensor_id.clone(),
            SensorSummary {
                distance: reading.distance,
                speed_mm_s: reading.speed.abs() * 1000.0,
                is_moving: reading.is_moving,
                phase: movement_phase(reading.distance, reading.speed, reading.is_moving),
            },
        );
    }

    let max_speed_mm_s = sensors
        .values()
        .map(|s| s.speed_mm_s)
        .fold(0.0, f64::max);

    BerthSummary {
        berth_id: berth.berth_id,
        mode_active: berth.mode_active,
        overall_status: aggregate_status(berth.mode_active, &present),
        min_distance: min_valid_distance(&present),
        max_speed_mm_s,
        sensors,
        missing,
    }
}
