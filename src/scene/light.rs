use glam::{Mat4, Vec3};

use crate::settings::LightSettings;

/// The single shadow-casting light. Its view and projection are fixed once built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowLight {
    position: Vec3,
    view: Mat4,
    proj: Mat4,
}

impl ShadowLight {
    pub fn from_settings(settings: &LightSettings) -> Self {
        let position = settings.position();
        let up = if position.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let e = settings.half_extent;
        Self {
            position,
            view: Mat4::look_at_rh(position, Vec3::ZERO, up),
            proj: Mat4::orthographic_rh(-e, e, -e, e, settings.near, settings.far),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn proj(&self) -> Mat4 {
        self.proj
    }

    /// proj · view
    pub fn light_space(&self) -> Mat4 {
        self.proj * self.view
    }
}

impl Default for ShadowLight {
    fn default() -> Self {
        Self::from_settings(&LightSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_centre_of_shadow_map() {
        let light = ShadowLight::default();
        let clip = light.light_space().project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn light_space_is_proj_times_view() {
        let light = ShadowLight::default();
        assert!(light
            .light_space()
            .abs_diff_eq(light.proj() * light.view(), 1e-6));
    }

    #[test]
    fn light_straight_above_still_has_a_view() {
        let light = ShadowLight::from_settings(&LightSettings {
            position: [0.0, 10.0, 0.0],
            ..LightSettings::default()
        });
        assert!(light.view().is_finite());
    }
}
