use std::rc::Rc;

use glam::Mat4;

use crate::renderer::{ClearFlags, PassDescriptor, RenderDevice, Viewport};
use crate::scene::camera::OrbitCamera;
use crate::scene::drawable::Drawable;
use crate::scene::light::ShadowLight;
use crate::settings::RenderSettings;

/// Flat list of drawables rendered in two passes: depth from the light into the
/// shadow map, then lit from the camera into the window.
pub struct Scene<D: RenderDevice> {
    objects: Vec<Box<dyn Drawable<D>>>,
    shadow_target: D::Framebuffer,
    shadow_map: Rc<D::Texture>,
    shadow_map_size: u32,
    light: ShadowLight,
    camera: OrbitCamera,
    view: Mat4,
    viewport: Viewport,
    clear_colour: [f32; 4],
}

impl<D: RenderDevice> Scene<D> {
    pub fn new(device: &mut D, settings: &RenderSettings) -> Self {
        let shadow_map_size = settings.shadow_map_size;
        let (shadow_target, shadow_map) = device.create_shadow_target(shadow_map_size);
        let camera = OrbitCamera::from_settings(&settings.camera);

        log::info!(
            "Scene created: shadow map {}x{}, light at {}",
            shadow_map_size,
            shadow_map_size,
            settings.light.position()
        );

        Self {
            objects: Vec::new(),
            shadow_target,
            shadow_map: Rc::new(shadow_map),
            shadow_map_size,
            light: ShadowLight::from_settings(&settings.light),
            view: camera.view(),
            camera,
            viewport: Viewport::sized(settings.resolution.width, settings.resolution.height),
            clear_colour: settings.clear_colour,
        }
    }

    /// Appends a drawable; insertion order is draw order in both passes.
    pub fn add(&mut self, drawable: Box<dyn Drawable<D>>) {
        self.objects.push(drawable);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The depth texture written by the shadow pass, for lit materials to sample.
    pub fn shadow_map(&self) -> Rc<D::Texture> {
        Rc::clone(&self.shadow_map)
    }

    pub fn shadow_map_size(&self) -> u32 {
        self.shadow_map_size
    }

    pub fn light(&self) -> &ShadowLight {
        &self.light
    }

    pub fn change_camera_angle_x(&mut self, delta: f32) {
        self.camera.angle_x += delta;
    }

    pub fn change_camera_angle_y(&mut self, delta: f32) {
        self.camera.angle_y += delta;
    }

    pub fn camera_angles(&self) -> (f32, f32) {
        (self.camera.angle_x, self.camera.angle_y)
    }

    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::sized(width, height);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Camera view as of the last `update`.
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.camera.proj()
    }

    pub fn light_space_matrix(&self) -> Mat4 {
        self.light.light_space()
    }

    pub fn update(&mut self, dt: f32) {
        for object in &mut self.objects {
            object.update(dt);
        }
        self.view = self.camera.view();
    }

    pub fn draw(&self, device: &mut D) {
        device.begin_pass(
            Some(&self.shadow_target),
            &PassDescriptor {
                viewport: Viewport::sized(self.shadow_map_size, self.shadow_map_size),
                clear: ClearFlags::DEPTH,
                clear_colour: self.clear_colour,
            },
        );
        for object in &self.objects {
            object.light_draw(device, self.light.view(), self.light.proj());
        }

        device.begin_pass(
            None,
            &PassDescriptor {
                viewport: self.viewport,
                clear: ClearFlags::COLOR | ClearFlags::DEPTH,
                clear_colour: self.clear_colour,
            },
        );
        let projection = self.camera.proj();
        let light_space = self.light.light_space();
        for object in &self.objects {
            object.draw(device, self.view, projection, light_space);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::HeadlessDevice;

    #[test]
    fn empty_scene_still_runs_both_passes() {
        let mut device = HeadlessDevice::new();
        let scene = Scene::new(&mut device, &RenderSettings::default());
        device.clear_commands();

        scene.draw(&mut device);

        let passes = device.passes();
        assert_eq!(passes.len(), 2);
        assert!(passes[0].0.is_some());
        assert_eq!(passes[0].1.clear, ClearFlags::DEPTH);
        assert_eq!(passes[0].1.viewport, Viewport::sized(1080, 1080));
        assert_eq!(passes[1].0, None);
        assert_eq!(passes[1].1.clear, ClearFlags::COLOR | ClearFlags::DEPTH);
        assert_eq!(passes[1].1.clear_colour, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn camera_angles_accumulate_unclamped() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new(&mut device, &RenderSettings::default());
        for _ in 0..10 {
            scene.change_camera_angle_x(1.0);
        }
        scene.change_camera_angle_y(-0.25);
        assert_eq!(scene.camera_angles(), (10.0, -0.25));
    }

    #[test]
    fn view_follows_camera_after_update() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new(&mut device, &RenderSettings::default());
        let before = scene.view_matrix();

        scene.change_camera_angle_y(0.5);
        assert_eq!(scene.view_matrix(), before);

        scene.update(0.016);
        let expected = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, -3.5))
            * Mat4::from_rotation_x(0.0)
            * Mat4::from_rotation_y(0.5);
        assert!(scene.view_matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn resize_moves_colour_viewport_only() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new(&mut device, &RenderSettings::default());
        scene.set_viewport_size(640, 480);
        device.clear_commands();

        scene.draw(&mut device);

        let passes = device.passes();
        assert_eq!(passes[0].1.viewport, Viewport::sized(1080, 1080));
        assert_eq!(passes[1].1.viewport, Viewport::sized(640, 480));
    }
}
