//! Device orientation feed and the smoothing that turns it into the head
//! camera's rotation.

use cgmath::{Deg, One, Quaternion, Rotation3};

use crate::matrix_operations::damp_factor;

/// Per second. High enough that deliberate head turns feel immediate while
/// sensor noise of a few hundredths of a degree is absorbed.
pub const ORIENTATION_SMOOTHING_RATE: f32 = 20.0;

/// Yaw about +Y, pitch about +X, roll about +Z, in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeviceOrientation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl DeviceOrientation {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Applied yaw first (outermost), then pitch, then roll.
    pub fn to_quaternion(self) -> Quaternion<f32> {
        Quaternion::from_angle_y(Deg(self.yaw))
            * Quaternion::from_angle_x(Deg(self.pitch))
            * Quaternion::from_angle_z(Deg(self.roll))
    }
}

/// Latest-snapshot orientation sensor. `None` means no sample has arrived yet.
pub trait OrientationSource {
    fn latest_orientation(&mut self) -> Option<DeviceOrientation>;
}

impl OrientationSource for Option<DeviceOrientation> {
    fn latest_orientation(&mut self) -> Option<DeviceOrientation> {
        *self
    }
}

pub struct OrientationFilter {
    rate: f32,
    current: Quaternion<f32>,
    last_time: Option<f64>,
}

impl OrientationFilter {
    pub fn new(rate: f32) -> Self {
        Self {
            rate,
            current: Quaternion::one(),
            last_time: None,
        }
    }

    /// Moves the smoothed orientation toward the sample. The first sample is
    /// taken as-is. A missing sample keeps the last orientation.
    pub fn update(&mut self, sample: Option<DeviceOrientation>, now: f64) -> Quaternion<f32> {
        let Some(sample) = sample else {
            return self.current;
        };
        let target = sample.to_quaternion();
        self.current = match self.last_time {
            None => target,
            Some(last) => {
                let t = damp_factor(self.rate, (now - last) as f32);
                self.current.slerp(target, t)
            }
        };
        self.last_time = Some(now);
        self.current
    }
}

impl Default for OrientationFilter {
    fn default() -> Self {
        Self::new(ORIENTATION_SMOOTHING_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    #[test]
    fn yaw_turns_forward_left() {
        let q = DeviceOrientation::new(90.0, 0.0, 0.0).to_quaternion();
        let forward = q * -Vector3::unit_z();
        assert!((forward - Vector3::new(-1.0, 0.0, 0.0)).magnitude() < 1e-5);
    }

    #[test]
    fn first_sample_snaps_then_smooths() {
        let mut filter = OrientationFilter::default();
        let first = filter.update(Some(DeviceOrientation::new(10.0, 0.0, 0.0)), 0.0);
        let expected = DeviceOrientation::new(10.0, 0.0, 0.0).to_quaternion();
        assert!((first - expected).magnitude() < 1e-6);

        let target = DeviceOrientation::new(40.0, 0.0, 0.0).to_quaternion();
        let next = filter.update(Some(DeviceOrientation::new(40.0, 0.0, 0.0)), 0.016);
        let before = first.dot(target);
        let after = next.dot(target);
        assert!(after > before, "moved toward target");
        assert!((next - target).magnitude() > 1e-3, "did not snap");
    }

    #[test]
    fn missing_sample_holds() {
        let mut filter = OrientationFilter::default();
        let q = filter.update(Some(DeviceOrientation::new(0.0, 30.0, 0.0)), 0.0);
        assert_eq!(filter.update(None, 1.0), q);
    }
}
