use cgmath::{InnerSpace, Matrix4, Point3, Vector2, Vector3};

/// cgmath builds OpenGL clip space (z in [-1,1]); wgpu expects z in [0,1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const PARALLEL_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    /// Unit length.
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Intersection with the plane `z = plane_z`. Misses when the ray runs
    /// parallel to the plane or the plane lies behind the origin.
    pub fn intersect_z_plane(&self, plane_z: f32) -> Option<Point3<f32>> {
        if self.direction.z.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (plane_z - self.origin.z) / self.direction.z;
        if !t.is_finite() || t < 0.0 {
            return None;
        }
        Some(self.at(t))
    }
}

/// Axis-aligned rectangle given by its center and full extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub center: Vector2<f32>,
    pub size: Vector2<f32>,
}

impl Rect {
    pub fn new(center_x: f32, center_y: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vector2::new(center_x, center_y),
            size: Vector2::new(width, height),
        }
    }

    pub fn contains(&self, p: Vector2<f32>) -> bool {
        let half = self.size * 0.5;
        (p.x - self.center.x).abs() <= half.x && (p.y - self.center.y).abs() <= half.y
    }

    pub fn min(&self) -> Vector2<f32> {
        self.center - self.size * 0.5
    }

    pub fn max(&self) -> Vector2<f32> {
        self.center + self.size * 0.5
    }
}

/// Fraction of the remaining distance to cover this frame when chasing a
/// target at `rate` per second. Frame-rate independent.
pub fn damp_factor(rate: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt).exp()
}

pub fn damp_towards(current: Point3<f32>, target: Point3<f32>, rate: f32, dt: f32) -> Point3<f32> {
    current + (target - current) * damp_factor(rate, dt)
}

pub fn angle_between_deg(a: Vector3<f32>, b: Vector3<f32>) -> Option<f32> {
    let la = a.magnitude();
    let lb = b.magnitude();
    if la <= PARALLEL_EPSILON || lb <= PARALLEL_EPSILON {
        return None;
    }
    let cos = (a.dot(b) / (la * lb)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_plane_in_front() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -1.0));
        let hit = ray.intersect_z_plane(-3.0).unwrap();
        assert!((hit.z + 3.0).abs() < 1e-6);
        assert!(ray.intersect_z_plane(2.0).is_none());
    }

    #[test]
    fn parallel_ray_misses() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(ray.intersect_z_plane(-1.0).is_none());
    }

    #[test]
    fn rect_contains_edges() {
        let r = Rect::new(0.0, 0.0, 2.0, 1.0);
        assert!(r.contains(Vector2::new(1.0, 0.5)));
        assert!(!r.contains(Vector2::new(1.01, 0.0)));
    }

    #[test]
    fn damping_is_frame_rate_independent() {
        let start = Point3::new(0.0, 0.0, 0.0);
        let target = Point3::new(1.0, 0.0, 0.0);
        let one_step = damp_towards(start, target, 10.0, 0.1);
        let mut two_steps = damp_towards(start, target, 10.0, 0.05);
        two_steps = damp_towards(two_steps, target, 10.0, 0.05);
        assert!((one_step.x - two_steps.x).abs() < 1e-5);
        assert!(one_step.x < 1.0);
    }

    #[test]
    fn right_angle() {
        let a = angle_between_deg(Vector3::unit_x(), Vector3::unit_y()).unwrap();
        assert!((a - 90.0).abs() < 1e-4);
        assert!(angle_between_deg(Vector3::new(0.0, 0.0, 0.0), Vector3::unit_y()).is_none());
    }
}
