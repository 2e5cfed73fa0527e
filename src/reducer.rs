//! Frame-to-distance reduction.
//!
//! Turning a cloud of points into one stable distance is the caller's call;
//! the receive path only needs something that implements
//! [`DistanceReducer`]. [`CenterBeamReducer`] is a simple reference that
//! takes the median range of the bright points close to the optical axis.

use crate::protocol::Frame;

pub trait DistanceReducer: Send + Sync {
    /// One stable distance in meters, or `None` if the frame has no usable
    /// points.
    fn reduce(&self, frame: &Frame) -> Option<f64>;
}

impl<F> DistanceReducer for F
where
    F: Fn(&Frame) -> Option<f64> + Send + Sync,
{
    fn reduce(&self, frame: &Frame) -> Option<f64> {
        self(frame)
    }
}

/// Median forward range of points within `radius_mm` of the x axis.
#[derive(Debug, Clone, Copy)]
pub struct CenterBeamReducer {
    pub radius_mm: f64,
    pub min_intensity: u8,
}

impl Default for CenterBeamReducer {
    fn default() -> Self {
        Self {
            radius_mm: 90.0,
            min_intensity: 0,
        }
    }
}

impl DistanceReducer for CenterBeamReducer {
    fn reduce(&self, frame: &Frame) -> Option<f64> {
        let mut ranges: Vec<i32> = frame
            .points
            .iter()
            .filter(|p| p.x > 0 && p.intensity >= self.min_intensity)
            .filter(|p| (p.y as f64).hypot(p.z as f64) <= self.radius_mm)
            .map(|p| p.x)
            .collect();

        if ranges.is_empty() {
            return None;
        }

        ranges.sort_unstable();
        let mid = ranges.len() / 2;
        let median_mm = if ranges.len() % 2 == 0 {
            (ranges[mid - 1] as f64 + ranges[mid] as f64) / 2.0
        } else {
            ranges[mid] as f64
        };
        Some(median_mm / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DataKind, FrameHeader, Point};

    fn create_test_frame(points: Vec<Point>) -> Frame {
        Frame {
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
            points,
        }
    }

    fn point(x: i32, y: i32, z: i32) -> Point {
        Point { x, y, z, intensity: 200 }
    }

    #[test]
    fn test_median_of_center_points() {
        let frame = create_test_frame(vec![
            point(4_000, 10, 10),
            point(4_200, -20, 5),
            point(9_000, 0, 0),
            point(1_000, 400, 400), // off axis
        ]);
        let distance = CenterBeamReducer::default().reduce(&frame).unwrap();
        assert!((distance - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_no_center_points() {
        let frame = create_test_frame(vec![point(5_000, 500, 0), point(-3_000, 0, 0)]);
        assert_eq!(CenterBeamReducer::default().reduce(&frame), None);
    }

    #[test]
    fn test_closure_reducer() {
        let fixed = |_: &Frame| Some(12.5);
        assert_eq!(fixed.reduce(&create_test_frame(Vec::new())), Some(12.5));
    }
}
