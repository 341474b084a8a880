use super::math::{Mat4, Vec3};

/// Left-handed perspective camera orbiting a target point.
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            eye: Vec3::new(0.0, 4.0, -10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 45.0_f32.to_radians(),
            aspect_ratio: screen_width as f32 / screen_height.max(1) as f32,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect_ratio, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Places the eye on a circle around the target, keeping its height and distance.
    pub fn orbit(&mut self, angle: f32) {
        let offset = self.eye - self.target;
        let radius = Vec3::new(offset.x, 0.0, offset.z).length();
        self.eye = self.target + Vec3::new(radius * angle.sin(), offset.y, -radius * angle.cos());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::math::Vec4;

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera::new(1280, 720);
        let clip = camera.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;

        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn orbit_keeps_distance() {
        let mut camera = Camera::new(800, 600);
        let distance = camera.eye.distance(camera.target);

        camera.orbit(1.3);
        assert!((camera.eye.distance(camera.target) - distance).abs() < 1e-4);
        assert_eq!(camera.eye.y, 4.0);

        camera.orbit(0.0);
        assert!((camera.eye - Vec3::new(0.0, 4.0, -10.0)).length() < 1e-4);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        let camera = Camera::new(640, 0);
        assert!(camera.aspect_ratio.is_finite());
    }
}
