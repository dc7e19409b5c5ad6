use cgmath::{
    Angle, Deg, EuclideanSpace, Matrix4, One, Point3, Quaternion, Rad, Vector2, Vector3, Vector4,
};

use crate::matrix_operations::{Ray, OPENGL_TO_WGPU_MATRIX};

pub const DEFAULT_FOV_Y_DEG: f32 = 60.0;
const NEAR_PLANE: f32 = 0.05;
const FAR_PLANE: f32 = 100.0;

/// Perspective camera looking down its local -Z with +Y up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub orientation: Quaternion<f32>,
    pub fov_y: Deg<f32>,
    pub aspect: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Point3::origin(),
            orientation: Quaternion::one(),
            fov_y: Deg(DEFAULT_FOV_Y_DEG),
            aspect: sanitize_aspect(aspect),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = sanitize_aspect(aspect);
    }

    pub fn right(&self) -> Vector3<f32> {
        self.orientation * Vector3::unit_x()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.orientation * Vector3::unit_y()
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * -Vector3::unit_z()
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(self.orientation.conjugate())
            * Matrix4::from_translation(-self.position.to_vec())
    }

    /// OpenGL-convention projection; used for NDC math on the CPU.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        cgmath::perspective(self.fov_y, self.aspect, NEAR_PLANE, FAR_PLANE)
    }

    /// View-projection in wgpu clip space, ready for a uniform buffer.
    pub fn view_projection_wgpu(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection_matrix() * self.view_matrix()
    }

    /// World-space ray through a point in normalized device coordinates
    /// (x right, y up, both in [-1,1]).
    pub fn unproject(&self, ndc: Vector2<f32>) -> Ray {
        let tan_half = (Rad::from(self.fov_y) / 2.0).tan();
        let local = Vector3::new(ndc.x * tan_half * self.aspect, ndc.y * tan_half, -1.0);
        Ray::new(self.position, self.orientation * local)
    }

    /// NDC of a world point, or `None` when it lies behind the camera.
    pub fn project(&self, point: Point3<f32>) -> Option<Vector2<f32>> {
        let clip: Vector4<f32> =
            self.projection_matrix() * self.view_matrix() * point.to_homogeneous();
        if clip.w <= f32::EPSILON {
            return None;
        }
        Some(Vector2::new(clip.x / clip.w, clip.y / clip.w))
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rotation3};

    #[test]
    fn center_ray_points_forward() {
        let cam = Camera::new(16.0 / 9.0);
        let ray = cam.unproject(Vector2::new(0.0, 0.0));
        assert!((ray.direction - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-6);
    }

    #[test]
    fn unproject_then_project_round_trips() {
        let mut cam = Camera::new(1.5);
        cam.position = Point3::new(0.3, -0.2, 1.0);
        cam.orientation =
            Quaternion::from_angle_y(Deg(20.0)) * Quaternion::from_angle_x(Deg(-10.0));
        let ndc = Vector2::new(0.35, -0.6);
        let hit = cam.unproject(ndc).at(4.0);
        let back = cam.project(hit).unwrap();
        assert!((back - ndc).magnitude() < 1e-4);
    }

    #[test]
    fn behind_camera_does_not_project() {
        let cam = Camera::new(1.0);
        assert!(cam.project(Point3::new(0.0, 0.0, 2.0)).is_none());
    }

    #[test]
    fn degenerate_aspect_falls_back() {
        let mut cam = Camera::new(0.0);
        assert_eq!(cam.aspect, 1.0);
        cam.set_aspect(f32::NAN);
        assert_eq!(cam.aspect, 1.0);
    }
}
