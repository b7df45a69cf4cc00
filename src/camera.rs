// camera.rs — 视线几何：方向向量、屏幕射线、投影

use glam::{Vec2, Vec3};

/// Unit direction for a yaw/pitch pair in degrees.
///
/// yaw 0 / pitch 0 looks down +Z, positive yaw turns towards +X and positive
/// pitch looks up (+Y). The equirect shader uses the same convention.
pub fn direction(yaw_deg: f32, pitch_deg: f32) -> Vec3 {
    let (sy, cy) = yaw_deg.to_radians().sin_cos();
    let (sp, cp) = pitch_deg.to_radians().sin_cos();
    Vec3::new(cp * sy, sp, cp * cy)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Pinhole camera sitting at the centre of the panorama sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub yaw: f32,
    pub pitch: f32,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn new(yaw: f32, pitch: f32, fov_y: f32, aspect: f32) -> Self {
        Self {
            yaw,
            pitch,
            fov_y,
            aspect: if aspect > 0.0 { aspect } else { 1.0 },
        }
    }

    /// (forward, right, up)
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = direction(self.yaw, self.pitch);
        let right = direction(self.yaw + 90.0, 0.0);
        let up = forward.cross(right);
        (forward, right, up)
    }

    fn half_height(&self) -> f32 {
        (self.fov_y.to_radians() * 0.5).tan()
    }

    pub fn fov_x(&self) -> f32 {
        let v = self.fov_y.to_radians();
        (2.0 * ((v * 0.5).tan() * self.aspect).atan()).to_degrees()
    }

    /// Ray through normalized device coordinates (x right, y up, both in -1..1).
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let (forward, right, up) = self.basis();
        let t = self.half_height();
        let dir = forward + right * (ndc.x * t * self.aspect) + up * (ndc.y * t);
        Ray::new(Vec3::ZERO, dir)
    }

    pub fn ray_through_pixel(&self, x: f32, y: f32, width: f32, height: f32) -> Ray {
        self.ray_through(pixel_to_ndc(x, y, width, height))
    }

    pub fn center_ray(&self) -> Ray {
        Ray::new(Vec3::ZERO, direction(self.yaw, self.pitch))
    }

    /// Screen position (pixels, y down) of a world point, or `None` when it
    /// is behind the camera.
    pub fn project(&self, point: Vec3, width: f32, height: f32) -> Option<Vec2> {
        let (forward, right, up) = self.basis();
        let z = point.dot(forward);
        if z <= 1e-4 {
            return None;
        }
        let t = self.half_height();
        let x = point.dot(right) / (z * t * self.aspect);
        let y = point.dot(up) / (z * t);
        Some(Vec2::new((x + 1.0) * 0.5 * width, (1.0 - y) * 0.5 * height))
    }

    /// Degrees of rotation per dragged pixel along each axis, following the
    /// visible field of view so the image tracks the pointer.
    pub fn degrees_per_pixel(&self, width: f32, height: f32) -> Vec2 {
        if width <= 0.0 || height <= 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(self.fov_x() / width, self.fov_y / height)
    }
}

pub fn pixel_to_ndc(x: f32, y: f32, width: f32, height: f32) -> Vec2 {
    let w = width.max(1.0);
    let h = height.max(1.0);
    Vec2::new(x / w * 2.0 - 1.0, 1.0 - y / h * 2.0)
}

/// Distance along `ray` to the first intersection with a sphere, if any.
pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.dir);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t0 = -b - sq;
    let t1 = -b + sq;
    if t0 > 0.0 {
        Some(t0)
    } else if t1 > 0.0 {
        Some(t1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn direction_convention() {
        let f = direction(0.0, 0.0);
        assert_abs_diff_eq!(f.z, 1.0, epsilon = 1e-6);
        let r = direction(90.0, 0.0);
        assert_abs_diff_eq!(r.x, 1.0, epsilon = 1e-6);
        let u = direction(0.0, 90.0);
        assert_abs_diff_eq!(u.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn basis_is_orthonormal_and_upright() {
        let cam = Camera::new(37.0, 20.0, 75.0, 16.0 / 9.0);
        let (f, r, u) = cam.basis();
        assert_abs_diff_eq!(f.dot(r), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(f.dot(u), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(r.length(), 1.0, epsilon = 1e-5);
        assert!(u.y > 0.0);
    }

    #[test]
    fn center_pixel_is_forward() {
        let cam = Camera::new(120.0, -30.0, 75.0, 1.5);
        let ray = cam.ray_through_pixel(300.0, 200.0, 600.0, 400.0);
        let fwd = direction(120.0, -30.0);
        assert_abs_diff_eq!(ray.dir.dot(fwd), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn project_inverts_ray() {
        let cam = Camera::new(15.0, 5.0, 75.0, 1.6);
        let (w, h) = (1280.0, 800.0);
        let ray = cam.ray_through_pixel(900.0, 150.0, w, h);
        let p = cam.project(ray.at(450.0), w, h).unwrap();
        assert_abs_diff_eq!(p.x, 900.0, epsilon = 0.05);
        assert_abs_diff_eq!(p.y, 150.0, epsilon = 0.05);
    }

    #[test]
    fn points_behind_do_not_project() {
        let cam = Camera::new(0.0, 0.0, 75.0, 1.0);
        assert!(cam.project(Vec3::new(0.0, 0.0, -10.0), 100.0, 100.0).is_none());
    }

    #[test]
    fn ray_sphere_hits_and_misses() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let t = ray_sphere(&ray, Vec3::new(0.0, 0.0, 450.0), 10.0).unwrap();
        assert_abs_diff_eq!(t, 440.0, epsilon = 1e-3);
        assert!(ray_sphere(&ray, Vec3::new(0.0, 50.0, 450.0), 10.0).is_none());
        assert!(ray_sphere(&ray, Vec3::new(0.0, 0.0, -450.0), 10.0).is_none());
    }

    #[test]
    fn degrees_per_pixel_follows_fov() {
        let cam = Camera::new(0.0, 0.0, 60.0, 2.0);
        let dpp = cam.degrees_per_pixel(1000.0, 500.0);
        assert_abs_diff_eq!(dpp.y, 60.0 / 500.0, epsilon = 1e-6);
        assert!(dpp.x > 0.0);
        assert_eq!(cam.degrees_per_pixel(0.0, 10.0), Vec2::ZERO);
    }
}
