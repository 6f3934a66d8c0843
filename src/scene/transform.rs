use std::f32::consts::TAU;

use glam::{Mat4, Vec3};

/// Position, Euler rotation in radians and per-axis scale of a scene object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Pose {
    /// translate · rotY · rotX · rotZ · scale
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(self.scale)
    }

    /// Inverse of the rotation part only; translation and scale are ignored.
    pub fn inverse_rotation(&self) -> Mat4 {
        Mat4::from_rotation_y(-self.rotation.y)
            * Mat4::from_rotation_x(-self.rotation.x)
            * Mat4::from_rotation_z(-self.rotation.z)
    }

    /// Advances the rotation and wraps every angle back into `[0, 2π)`.
    pub fn spin(&mut self, angular_velocity: Vec3, dt: f32) {
        let r = self.rotation + angular_velocity * dt;
        self.rotation = Vec3::new(r.x.rem_euclid(TAU), r.y.rem_euclid(TAU), r.z.rem_euclid(TAU));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let pose = Pose::default();
        assert!(pose.model_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(pose.inverse_rotation().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn scale_then_rotate_then_translate() {
        let pose = Pose {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vec3::splat(2.0),
        };
        // (1,0,0) -> (2,0,0) -> rotY(90°) -> (0,0,-2) -> (1,2,1)
        let p = pose.model_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn rotation_order_is_y_then_x_then_z() {
        let rotation = Vec3::new(0.3, 0.7, 1.1);
        let pose = Pose {
            rotation,
            ..Pose::default()
        };
        let expected = Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_z(rotation.z);
        assert!(pose.model_matrix().abs_diff_eq(expected, 1e-6));

        let other_order = Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_z(rotation.z);
        assert!(!pose.model_matrix().abs_diff_eq(other_order, 1e-3));
    }

    #[test]
    fn inverse_rotation_undoes_single_axis_rotation() {
        for rotation in [Vec3::new(0.4, 0.0, 0.0), Vec3::new(0.0, 0.4, 0.0), Vec3::new(0.0, 0.0, 0.4)] {
            let pose = Pose {
                rotation,
                ..Pose::default()
            };
            let product = pose.inverse_rotation() * pose.model_matrix();
            assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn spin_wraps_angles() {
        let mut pose = Pose {
            rotation: Vec3::new(0.0, TAU - 0.1, 0.0),
            ..Pose::default()
        };
        pose.spin(Vec3::new(-0.5, 0.5, 0.0), 1.0);
        assert!((pose.rotation.y - 0.4).abs() < 1e-5);
        assert!((pose.rotation.x - (TAU - 0.5)).abs() < 1e-5);
        assert!(pose.rotation.max_element() < TAU);
        assert!(pose.rotation.min_element() >= 0.0);
    }
}
