//! Synthetic point clouds for the simulated device.
//!
//! The vessel closes on the sensor at a constant speed and stops at the
//! configured distance. Half of each frame's points form a tight, bright
//! center beam on the vessel hull; the rest are dim returns off the axis.
//! Everything is deterministic so runs are reproducible.

use crate::config::SceneConfig;
use crate::protocol::{DataKind, Point};

/// Angle step between center-beam points, the golden angle in radians.
const GOLDEN_ANGLE: f64 = 2.399_963;
const CENTER_RADIUS_MM: usize = 90;

#[derive(Debug, Clone)]
pub struct Scene {
    config: SceneConfig,
    data_kind: DataKind,
}

impl Scene {
    pub fn new(config: SceneConfig, data_kind: DataKind) -> Self {
        Self { config, data_kind }
    }

    /// True distance to the hull `elapsed` seconds after streaming started.
    pub fn distance_at(&self, elapsed: f64) -> f64 {
        let travelled = self.config.approach_speed_mps * elapsed.max(0.0);
        (self.config.start_distance_m - travelled).max(self.config.stop_distance_m)
    }

    /// Points for one frame. Always exactly as many as the data kind carries.
    pub fn points(&self, elapsed: f64, frame_index: u64) -> Vec<Point> {
        let count = self.data_kind.point_count();
        let hull_mm = (self.distance_at(elapsed) * 1000.0).round() as i32;
        let jitter = self.config.jitter_mm as f64;

        (0..count)
            .map(|i| {
                if i < count / 2 {
                    let radius = (i * 37 % CENTER_RADIUS_MM) as f64;
                    let angle = i as f64 * GOLDEN_ANGLE;
                    let wobble = jitter * (frame_index as f64 * 0.7 + i as f64 * 1.3).sin();
                    Point {
                        x: hull_mm + wobble.round() as i32,
                        y: (radius * angle.cos()).round() as i32,
                        z: (radius * angle.sin()).round() as i32,
                        intensity: 200 + (i * 7 % 56) as u8,
                    }
                } else {
                    let side = if i % 2 == 0 { 1 } else { -1 };
                    Point {
                        x: hull_mm + 1_500 + (i * 53 % 700) as i32,
                        y: side * (150 + (i * 131 % 350) as i32),
                        z: (i * 71 % 1000) as i32 - 500,
                        intensity: 10 + (i * 13 % 140) as u8,
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, FrameHeader};
    use crate::reducer::{CenterBeamReducer, DistanceReducer};

    fn create_test_scene() -> Scene {
        Scene::new(
            SceneConfig {
                start_distance_m: 10.0,
                approach_speed_mps: 0.5,
                stop_distance_m: 1.0,
                jitter_mm: 4,
            },
            DataKind::Cartesian,
        )
    }

    #[test]
    fn test_distance_stops_at_limit() {
        let scene = create_test_scene();
        assert_eq!(scene.distance_at(0.0), 10.0);
        assert_eq!(scene.distance_at(4.0), 8.0);
        assert_eq!(scene.distance_at(100.0), 1.0);
    }

    #[test]
    fn test_point_count_matches_data_kind() {
        for kind in [DataKind::Cartesian, DataKind::ExtendedCartesian, DataKind::DualReturn] {
            let scene = Scene::new(SceneConfig::default(), kind);
            assert_eq!(scene.points(0.0, 0).len(), kind.point_count());
        }
    }

    #[test]
    fn test_center_beam_reduces_to_hull_distance() {
        let scene = create_test_scene();
        let frame = Frame {
            header: FrameHeader {
                version: 5,
                slot: 0,
                device_id: 0,
                reserved: 0,
                status_code: 0,
                timestamp_kind: 0,
                data_kind: DataKind::Cartesian,
                timestamp_ns: 0,
            },
            points: scene.points(2.0, 17),
        };
        let distance = CenterBeamReducer::default().reduce(&frame).unwrap();
        assert!((distance - 9.0).abs() <= 0.005, "got {distance}");
    }
}
