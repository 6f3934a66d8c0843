use glam::{Mat4, Vec3};

use crate::settings::CameraSettings;

/// Camera orbiting the origin at a fixed distance. Angles accumulate without clamping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitCamera {
    pub angle_x: f32,
    pub angle_y: f32,
    pub distance: f32,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl OrbitCamera {
    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self {
            angle_x: 0.0,
            angle_y: 0.0,
            distance: settings.distance,
            fov_y_radians: settings.fov_y_degrees.to_radians(),
            aspect: settings.aspect,
            near: settings.near,
            far: settings.far,
        }
    }

    /// translate(0, 0, -distance) · rotX · rotY
    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.distance))
            * Mat4::from_rotation_x(self.angle_x)
            * Mat4::from_rotation_y(self.angle_y)
    }

    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far)
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}
