//! Left-handed perspective camera

use serde::{Deserialize, Serialize};

use crate::rasterizer::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.5, -5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.position, self.target, self.up)
    }

    /// Depth maps to [0, 1]
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, aspect, self.near, self.far)
    }

    pub fn front(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Swing the position around the target about the up axis
    pub fn orbit(&mut self, radians: f32) {
        let offset = self.position - self.target;
        self.position = self.target + Quat::from_axis_angle(self.up.normalize_or_zero(), radians) * offset;
    }

    /// Move toward (positive) or away from the target, never past it
    pub fn zoom(&mut self, amount: f32) {
        let offset = self.position - self.target;
        let dist = (offset.length() - amount).max(self.near * 2.0);
        self.position = self.target + offset.normalize_or_zero() * dist;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::Vec4;

    #[test]
    fn test_target_projects_to_center() {
        let cam = Camera::default();
        let clip = cam.projection(1.0) * cam.view() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 0.001);
        assert!(ndc.y.abs() < 0.001);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut cam = Camera::default();
        let before = cam.position.distance(cam.target);
        cam.orbit(1.0);
        assert!((cam.position.distance(cam.target) - before).abs() < 0.001);
    }

    #[test]
    fn test_zoom_stops_before_target() {
        let mut cam = Camera::default();
        cam.zoom(100.0);
        assert!(cam.position.distance(cam.target) > 0.0);
    }
}
