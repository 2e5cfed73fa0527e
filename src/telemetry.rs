//! Shared per-sensor telemetry.
//!
//! A [`SensorTelemetry`] is a cheap, cloneable handle around one sensor's
//! [`SpeedEstimator`]. The receive path records into it while readers take
//! views. Readers copy the sample window under the lock and compute after
//! releasing it, so a slow reader never stalls the producer.

use crate::berthing::{BerthContext, Phase, SensorReading, movement_phase};
use crate::error::SampleRejected;
use crate::estimator::{
    DistanceSample, EstimatorConfig, HistoryEntry, SpeedEstimate, SpeedEstimator, estimate,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Everything an operator display shows for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    pub sensor_id: String,
    /// Timestamp of the latest sample, seconds.
    pub timestamp: f64,
    pub distance: f64,
    pub distance_mm: f64,
    /// Headline speed, the trend estimate.
    pub speed: f64,
    pub speed_mm_s: f64,
    pub instant_speed: f64,
    pub instant_speed_mm_s: f64,
    pub short_window_speed: f64,
    pub short_window_speed_mm_s: f64,
    pub trend_speed: f64,
    pub speed_precision_mm_s: f64,
    pub is_moving: bool,
    pub direction: Phase,
    pub movement_phase: Phase,
    pub confidence: f64,
}

/// Copy of a sensor's recent window.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub samples: Vec<DistanceSample>,
    pub config: EstimatorConfig,
}

impl Snapshot {
    pub fn latest(&self) -> Option<DistanceSample> {
        self.samples.last().copied()
    }

    pub fn estimate(&self) -> SpeedEstimate {
        estimate(&self.samples, &self.config)
    }

    fn is_moving(&self, estimate: &SpeedEstimate) -> bool {
        estimate.is_moving(self.config.motion_threshold)
    }
}

#[derive(Debug, Clone)]
pub struct SensorTelemetry {
    sensor_id: Arc<str>,
    estimator: Arc<Mutex<SpeedEstimator>>,
}

impl SensorTelemetry {
    pub fn new(sensor_id: &str, config: EstimatorConfig) -> Self {
        Self {
            sensor_id: Arc::from(sensor_id),
            estimator: Arc::new(Mutex::new(SpeedEstimator::new(config))),
        }
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn record(&self, timestamp: f64, distance: f64) -> Result<(), SampleRejected> {
        self.estimator.lock().record(timestamp, distance)
    }

    pub fn clear(&self) {
        self.estimator.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.estimator.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimator.lock().is_empty()
    }

    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.estimator.lock().history(limit)
    }

    pub fn snapshot(&self) -> Snapshot {
        let estimator = self.estimator.lock();
        Snapshot {
            samples: estimator.window(),
            config: estimator.config().clone(),
        }
    }

    /// Classifier input, or `None` before the first sample.
    pub fn reading(&self) -> Option<SensorReading> {
        let snapshot = self.snapshot();
        let latest = snapshot.latest()?;
        let estimate = snapshot.estimate();
        Some(SensorReading {
            distance: latest.distance,
            speed: estimate.trend,
            is_moving: snapshot.is_moving(&estimate),
        })
    }

    /// Full display view, or `None` before the first sample.
    pub fn view(&self) -> Option<SensorView> {
        let snapshot = self.snapshot();
        let latest = snapshot.latest()?;
        let estimate = snapshot.estimate();
        let is_moving = snapshot.is_moving(&estimate);
        let phase = movement_phase(latest.distance, estimate.trend, is_moving);

        Some(SensorView {
            sensor_id: self.sensor_id.to_string(),
            timestamp: latest.timestamp,
            distance: latest.distance,
            distance_mm: latest.distance * 1000.0,
            speed: estimate.trend,
            speed_mm_s: estimate.trend * 1000.0,
            instant_speed: estimate.instantaneous,
            instant_speed_mm_s: estimate.instantaneous * 1000.0,
            short_window_speed: estimate.short_window,
            short_window_speed_mm_s: estimate.short_window * 1000.0,
            trend_speed: estimate.trend,
            speed_precision_mm_s: estimate.precision * 1000.0,
            is_moving,
            direction: phase,
            movement_phase: phase,
            confidence: estimate.confidence,
        })
    }
}

/// Latest readings for a berth's sensors. Sensors without telemetry or
/// without samples are left out.
pub fn berth_readings(
    berth: &BerthContext,
    sensors: &HashMap<String, SensorTelemetry>,
) -> BTreeMap<String, SensorReading> {
    berth
        .sensors
        .iter()
        .filter_map(|id| {
            let reading = sensors.get(id)?.reading()?;
            Some((id.clone(), reading))
        })
        .collect()
}
