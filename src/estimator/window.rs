//! Speed math over a copied window of samples.
//!
//! These functions take plain slices so a caller can snapshot a history under
//! a lock and compute on the copy after releasing it.

use super::EstimatorConfig;
use super::history::DistanceSample;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SpeedEstimate {
    /// Speed over the two most recent samples.
    pub instantaneous: f64,
    /// Mean per-step speed over the short window.
    pub short_window: f64,
    /// Regression slope over the trend window.
    pub trend: f64,
    /// Standard error of the trend slope.
    pub precision: f64,
    pub confidence: f64,
    /// Samples the estimate was computed from.
    pub samples: usize,
}

impl SpeedEstimate {
    /// Moving when the trend clears `threshold` (m/s) over at least two samples.
    pub fn is_moving(&self, threshold: f64) -> bool {
        self.samples >= 2 && self.trend.abs() >= threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Regression {
    pub slope: f64,
    pub std_error: f64,
}

/// Compute every estimate from one window, oldest sample first.
pub fn estimate(samples: &[DistanceSample], config: &EstimatorConfig) -> SpeedEstimate {
    let short = last(samples, config.short_window);
    let trend = last(samples, config.trend_window);
    let regression = regression(trend);

    SpeedEstimate {
        instantaneous: instantaneous_speed(samples),
        short_window: mean_step_speed(short),
        trend: regression.slope,
        precision: regression.std_error,
        confidence: confidence(trend, config),
        samples: trend.len(),
    }
}

fn last(samples: &[DistanceSample], n: usize) -> &[DistanceSample] {
    &samples[samples.len().saturating_sub(n)..]
}

pub(crate) fn instantaneous_speed(samples: &[DistanceSample]) -> f64 {
    match samples {
        [.., prev, latest] => step_speed(prev, latest).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `None` for a zero or negative time step.
fn step_speed(prev: &DistanceSample, next: &DistanceSample) -> Option<f64> {
    let dt = next.timestamp - prev.timestamp;
    (dt > 0.0).then(|| (next.distance - prev.distance) / dt)
}

fn step_speeds(samples: &[DistanceSample]) -> Vec<f64> {
    samples
        .windows(2)
        .filter_map(|pair| step_speed(&pair[0], &pair[1]))
        .collect()
}

pub(crate) fn mean_step_speed(samples: &[DistanceSample]) -> f64 {
    let speeds = step_speeds(samples);
    if speeds.is_empty() {
        return 0.0;
    }
    speeds.iter().sum::<f64>() / speeds.len() as f64
}

/// Least squares of distance against time. Time is centered first so epoch
/// timestamps do not swamp the sums.
pub(crate) fn regression(samples: &[DistanceSample]) -> Regression {
    let n = samples.len();
    if n < 2 {
        return Regression::default();
    }

    let nf = n as f64;
    let t_mean = samples.iter().map(|s| s.timestamp).sum::<f64>() / nf;
    let d_mean = samples.iter().map(|s| s.distance).sum::<f64>() / nf;

    let (sxx, sxy) = samples.iter().fold((0.0, 0.0), |(sxx, sxy), s| {
        let dt = s.timestamp - t_mean;
        (sxx + dt * dt, sxy + dt * (s.distance - d_mean))
    });
    if sxx <= 0.0 {
        return Regression::default();
    }

    let slope = sxy / sxx;
    let std_error = if n > 2 {
        let intercept = d_mean;
        let residual_sq: f64 = samples
            .iter()
            .map(|s| {
                let fitted = intercept + slope * (s.timestamp - t_mean);
                (s.distance - fitted).powi(2)
            })
            .sum();
        (residual_sq / (nf - 2.0) / sxx).sqrt()
    } else {
        0.0
    };

    Regression { slope, std_error }
}

/// Product of three factors in [0, 1]:
///
/// * sample count, rising to 1 once the trend window is full
/// * spread of per-step speeds, falling as the standard deviation grows
/// * largest gap between timestamps, falling as the gap grows
pub(crate) fn confidence(samples: &[DistanceSample], config: &EstimatorConfig) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }

    let full = config.trend_window.max(2) as f64 - 1.0;
    let count_factor = ((n - 1) as f64 / full).min(1.0);

    let speeds = step_speeds(samples);
    let spread = std_dev(&speeds);
    let spread_factor = 1.0 / (1.0 + spread / config.speed_noise_ref.max(f64::EPSILON));

    let max_gap = samples
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .fold(0.0, f64::max);
    let gap_factor = 1.0 / (1.0 + max_gap / config.gap_ref.max(f64::EPSILON));

    (count_factor * spread_factor * gap_factor).clamp(0.0, 1.0)
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
