//! Distance history and speed estimation for one sensor.
//!
//! Distances are in meters, timestamps in seconds and speeds in meters per
//! second. A negative speed means the distance is shrinking (vessel
//! approaching); positive means departing.

mod history;
mod window;


pub use history::{DistanceSample, HistoryEntry, SpeedEstimator};
pub use window::{SpeedEstimate, estimate};

use serde::{Deserialize, Serialize};

/// Tuning for the estimator. Window lengths are sample counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Samples kept before the oldest is evicted.
    pub capacity: usize,
    /// Samples in the moving-average window.
    pub short_window: usize,
    /// Samples in the regression window. Also the window confidence is
    /// computed over.
    pub trend_window: usize,
    /// Per-step speed spread (m/s) at which confidence halves.
    pub speed_noise_ref: f64,
    /// Largest gap between samples (s) at which confidence halves.
    pub gap_ref: f64,
    /// Trend speed (m/s) at or above which the vessel counts as moving.
    pub motion_threshold: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            capacity: 600,
            short_window: 10,
            trend_window: 30,
            speed_noise_ref: 0.05,
            gap_ref: 0.5,
            motion_threshold: 0.02,
        }
    }
}
