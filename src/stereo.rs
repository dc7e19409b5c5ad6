//! Side-by-side stereo bookkeeping: eye cameras, eye render-target sizing,
//! and the CPU form of the lens pre-distortion used by `distortion.wgsl`.

use cgmath::{Deg, Vector2};

use crate::calibration::{CalibrationProfile, Eye};
use crate::camera::Camera;

/// Pixel size of one eye target for a physical output size. Never zero.
pub fn eye_target_size(output_width: u32, output_height: u32) -> (u32, u32) {
    ((output_width / 2).max(1), output_height.max(1))
}

#[derive(Clone, Debug, PartialEq)]
pub struct StereoRig {
    output_size: (u32, u32),
    eye_size: (u32, u32),
    /// Bumped whenever an eye's render target has to be recreated.
    generations: [u64; 2],
}

impl StereoRig {
    pub fn new(output_width: u32, output_height: u32) -> Self {
        Self {
            output_size: (output_width.max(1), output_height.max(1)),
            eye_size: eye_target_size(output_width, output_height),
            generations: [1, 1],
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn eye_size(&self) -> (u32, u32) {
        self.eye_size
    }

    pub fn eye_aspect(&self) -> f32 {
        self.eye_size.0 as f32 / self.eye_size.1 as f32
    }

    pub fn generation(&self, eye: Eye) -> u64 {
        self.generations[eye.index()]
    }

    /// Records a new physical output size. Returns the new eye target size
    /// when the targets must be recreated, `None` when nothing changed.
    pub fn resize(&mut self, output_width: u32, output_height: u32) -> Option<(u32, u32)> {
        self.output_size = (output_width.max(1), output_height.max(1));
        let eye_size = eye_target_size(output_width, output_height);
        if eye_size == self.eye_size {
            return None;
        }
        self.eye_size = eye_size;
        for generation in &mut self.generations {
            *generation += 1;
        }
        log::info!("eye targets resized to {}x{}", eye_size.0, eye_size.1);
        Some(eye_size)
    }

    /// The head camera as seen through the headset: calibrated field of view,
    /// eye-target aspect. Used for interaction while stereo is on.
    pub fn headset_camera(&self, head: &Camera, profile: &CalibrationProfile) -> Camera {
        let mut camera = *head;
        camera.fov_y = Deg(profile.fov_deg);
        camera.set_aspect(self.eye_aspect());
        camera
    }

    pub fn eye_camera(&self, head: &Camera, profile: &CalibrationProfile, eye: Eye) -> Camera {
        let mut camera = self.headset_camera(head, profile);
        camera.position = head.position
            + head.right() * (eye.sign() * profile.ipd_scene() * 0.5)
            + head.up() * profile.vertical_offset;
        camera
    }

    pub fn eye_cameras(&self, head: &Camera, profile: &CalibrationProfile) -> [Camera; 2] {
        Eye::BOTH.map(|eye| self.eye_camera(head, profile, eye))
    }
}

/// Maps a UV inside one eye's half of the output to the UV to sample from
/// that eye's render target, or `None` when it falls outside the target
/// (drawn black).
pub fn distort_uv(
    uv: Vector2<f32>,
    profile: &CalibrationProfile,
    eye: Eye,
) -> Option<Vector2<f32>> {
    let lens = Vector2::new(0.5 + profile.eye_shift(eye), profile.lens_center_y);
    let d = uv - lens;
    let r2 = d.x * d.x + d.y * d.y;
    let scale = (1.0 + profile.k1 * r2 + profile.k2 * r2 * r2) / profile.zoom;
    let source = Vector2::new(0.5, 0.5) + d * scale;
    let inside = (0.0..=1.0).contains(&source.x) && (0.0..=1.0).contains(&source.y);
    inside.then_some(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Preset;
    use cgmath::{InnerSpace, Quaternion, Rotation3};

    #[test]
    fn eye_targets_are_half_width_and_never_empty() {
        assert_eq!(eye_target_size(1920, 1080), (960, 1080));
        assert_eq!(eye_target_size(1, 0), (1, 1));
        assert_eq!(StereoRig::new(0, 0).eye_size(), (1, 1));
    }

    #[test]
    fn resize_recreates_each_eye_once() {
        let head = Camera::new(16.0 / 9.0);
        let profile = CalibrationProfile::default();
        let mut rig = StereoRig::new(1280, 720);
        assert_eq!(rig.resize(1600, 900), Some((800, 900)));
        assert_eq!(rig.resize(1600, 900), None);
        for eye in Eye::BOTH {
            assert_eq!(rig.generation(eye), 2);
            let camera = rig.eye_camera(&head, &profile, eye);
            assert!((camera.aspect - 800.0 / 900.0).abs() < 1e-6);
        }
    }

    #[test]
    fn odd_width_change_that_keeps_eye_size_is_not_a_recreate() {
        let mut rig = StereoRig::new(1280, 720);
        assert_eq!(rig.resize(1281, 720), None);
        assert_eq!(rig.output_size(), (1281, 720));
        assert_eq!(rig.generation(Eye::Left), 1);
    }

    #[test]
    fn eyes_straddle_head_along_its_right_vector() {
        let mut head = Camera::new(1.0);
        head.orientation = Quaternion::from_angle_y(Deg(90.0));
        let profile = CalibrationProfile {
            ipd_mm: 64.0,
            vertical_offset: 0.01,
            ..CalibrationProfile::default()
        };
        let rig = StereoRig::new(1000, 500);
        let [left, right] = rig.eye_cameras(&head, &profile);
        assert!(((right.position - left.position).magnitude() - 0.064).abs() < 1e-6);
        assert!(((right.position - left.position).normalize() - head.right()).magnitude() < 1e-5);
        assert!((left.position.y - 0.01).abs() < 1e-6);
        assert_eq!(left.orientation, head.orientation);
        assert_eq!(left.fov_y, Deg(profile.fov_deg));
    }

    #[test]
    fn lens_center_samples_target_center() {
        let profile = CalibrationProfile::default();
        let center = distort_uv(Vector2::new(0.5, 0.5), &profile, Eye::Left).unwrap();
        assert!((center - Vector2::new(0.5, 0.5)).magnitude() < 1e-6);
    }

    #[test]
    fn flat_profile_is_identity() {
        let profile = Preset::Flat.profile();
        let uv = Vector2::new(0.2, 0.7);
        let out = distort_uv(uv, &profile, Eye::Right).unwrap();
        assert!((out - uv).magnitude() < 1e-6);
    }

    #[test]
    fn barrel_pushes_samples_outward_and_edges_go_black() {
        let profile = Preset::CardboardV2.profile();
        let uv = Vector2::new(0.7, 0.5);
        let out = distort_uv(uv, &profile, Eye::Left).unwrap();
        assert!(out.x > 0.7);
        assert!(distort_uv(Vector2::new(0.0, 0.0), &profile, Eye::Left).is_none());
    }

    #[test]
    fn eye_shift_moves_the_image() {
        let profile = CalibrationProfile {
            left_shift: 0.05,
            ..Preset::Flat.profile()
        };
        let out = distort_uv(Vector2::new(0.55, 0.5), &profile, Eye::Left).unwrap();
        assert!((out.x - 0.5).abs() < 1e-6);
        let other = distort_uv(Vector2::new(0.55, 0.5), &profile, Eye::Right).unwrap();
        assert!((other.x - 0.55).abs() < 1e-6);
    }
}
