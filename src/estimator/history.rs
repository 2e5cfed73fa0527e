use super::EstimatorConfig;
use super::window::{self, SpeedEstimate};
use crate::error::SampleRejected;
use std::collections::VecDeque;
use tracing::warn;

/// One stable distance reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub timestamp: f64,
    pub distance: f64,
}

/// A recorded sample together with the speed from the sample before it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HistoryEntry {
    pub timestamp: f64,
    pub distance: f64,
    pub speed: f64,
    pub speed_mm_s: f64,
}

/// Bounded, strictly time-ordered distance history for one sensor.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    config: EstimatorConfig,
    samples: VecDeque<DistanceSample>,
}

impl SpeedEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let capacity = config.capacity.max(2);
        Self {
            config: EstimatorConfig { capacity, ..config },
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Append a sample, evicting the oldest once the buffer is full.
    ///
    /// Samples that would break strict time ordering, or that carry a
    /// non-finite timestamp or a negative/non-finite distance, are dropped
    /// and logged. The history is unchanged in that case.
    pub fn record(&mut self, timestamp: f64, distance: f64) -> Result<(), SampleRejected> {
        if let Err(rejected) = self.validate(timestamp, distance) {
            warn!(%rejected, "dropping distance sample");
            return Err(rejected);
        }

        if self.samples.len() == self.config.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(DistanceSample { timestamp, distance });
        Ok(())
    }

    fn validate(&self, timestamp: f64, distance: f64) -> Result<(), SampleRejected> {
        if !timestamp.is_finite() {
            return Err(SampleRejected::InvalidTimestamp(timestamp));
        }
        if !distance.is_finite() || distance < 0.0 {
            return Err(SampleRejected::InvalidDistance(distance));
        }
        match self.samples.back() {
            Some(last) if timestamp <= last.timestamp => Err(SampleRejected::NonMonotonic {
                timestamp,
                last: last.timestamp,
            }),
            _ => Ok(()),
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<DistanceSample> {
        self.samples.back().copied()
    }

    /// Copy of the most recent samples, as many as the widest window needs.
    pub fn window(&self) -> Vec<DistanceSample> {
        let span = self.config.trend_window.max(self.config.short_window).max(2);
        self.tail(span)
    }

    fn tail(&self, n: usize) -> Vec<DistanceSample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    /// Speed over the two most recent samples; `0.0` without two samples.
    pub fn instantaneous_speed(&self) -> f64 {
        window::instantaneous_speed(&self.tail(2))
    }

    /// Mean per-step speed over the short window.
    pub fn short_window_average(&self) -> f64 {
        window::mean_step_speed(&self.tail(self.config.short_window))
    }

    /// Least-squares slope of distance over time across the trend window.
    pub fn trend(&self) -> f64 {
        window::regression(&self.tail(self.config.trend_window)).slope
    }

    /// Confidence in [0, 1] over the trend window.
    pub fn confidence(&self) -> f64 {
        window::confidence(&self.tail(self.config.trend_window), &self.config)
    }

    pub fn estimate(&self) -> SpeedEstimate {
        window::estimate(&self.window(), &self.config)
    }

    pub fn is_moving(&self) -> bool {
        self.estimate().is_moving(self.config.motion_threshold)
    }

    /// The most recent `limit` samples, oldest first, each with the speed
    /// from its predecessor. The first entry returned carries the speed from
    /// the sample before it when one exists.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let samples = self.tail(limit.saturating_add(1));
        let skip = samples.len().saturating_sub(limit);

        samples
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, sample)| {
                let speed = match i.checked_sub(1).map(|p| samples[p]) {
                    Some(prev) => window::instantaneous_speed(&[prev, *sample]),
                    None => 0.0,
                };
                HistoryEntry {
                    timestamp: sample.timestamp,
                    distance: sample.distance,
                    speed,
                    speed_mm_s: speed * 1000.0,
                }
            })
            .collect()
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}
