use std::fmt;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::renderer::{GeometryAsset, RenderDevice, ShaderMaterial, Transforms};
use crate::scene::transform::Pose;

/// Anything the scene can animate and render in both passes.
pub trait Drawable<D: RenderDevice> {
    fn update(&mut self, dt: f32);

    /// Lit pass with the camera's matrices and the light-space matrix.
    fn draw(&self, device: &mut D, view: Mat4, proj: Mat4, light_space: Mat4);

    /// Depth-only pass with the light's matrices.
    fn light_draw(&self, device: &mut D, light_view: Mat4, light_proj: Mat4);
}

/// A shared mesh drawn with its own lit and depth materials.
pub struct SceneObject<D: RenderDevice> {
    mesh: Option<Rc<GeometryAsset<D>>>,
    material: Option<ShaderMaterial<D>>,
    light_material: Option<ShaderMaterial<D>>,
    pose: Pose,
    spin: Vec3,
}

impl<D: RenderDevice> Default for SceneObject<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RenderDevice> fmt::Debug for SceneObject<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("mesh", &self.mesh)
            .field("material", &self.material)
            .field("light_material", &self.light_material)
            .field("pose", &self.pose)
            .field("spin", &self.spin)
            .finish()
    }
}

impl<D: RenderDevice> SceneObject<D> {
    pub fn new() -> Self {
        Self {
            mesh: None,
            material: None,
            light_material: None,
            pose: Pose::default(),
            spin: Vec3::ZERO,
        }
    }

    pub fn set_mesh(&mut self, mesh: Rc<GeometryAsset<D>>) {
        self.mesh = Some(mesh);
    }

    pub fn set_material(&mut self, material: ShaderMaterial<D>) {
        self.material = Some(material);
    }

    pub fn set_light_material(&mut self, material: ShaderMaterial<D>) {
        self.light_material = Some(material);
    }

    pub fn material_mut(&mut self) -> Option<&mut ShaderMaterial<D>> {
        self.material.as_mut()
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.pose.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.pose.rotation = rotation;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.pose.scale = scale;
    }

    pub fn add_position(&mut self, delta: Vec3) {
        self.pose.position += delta;
    }

    pub fn add_rotation(&mut self, delta: Vec3) {
        self.pose.rotation += delta;
    }

    pub fn add_scale(&mut self, delta: Vec3) {
        self.pose.scale += delta;
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.pose.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.pose.scale
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Constant angular velocity in radians per second, applied in `update`.
    pub fn set_spin(&mut self, angular_velocity: Vec3) {
        self.spin = angular_velocity;
    }

    fn render(
        &self,
        device: &mut D,
        material: Option<&ShaderMaterial<D>>,
        view: Mat4,
        projection: Mat4,
        light_space: Option<Mat4>,
    ) {
        let (Some(mesh), Some(material)) = (&self.mesh, material) else {
            return;
        };
        if !material.is_usable() {
            return;
        }

        let transforms = Transforms {
            model: self.pose.model_matrix(),
            inv_model_rotation: self.pose.inverse_rotation(),
            view,
            projection,
            light_space,
        };
        material.set_transforms(device, &transforms);
        material.apply(device);
        mesh.draw(device);
    }
}

impl<D: RenderDevice> Drawable<D> for SceneObject<D> {
    fn update(&mut self, dt: f32) {
        if self.spin != Vec3::ZERO {
            self.pose.spin(self.spin, dt);
        }
    }

    fn draw(&self, device: &mut D, view: Mat4, proj: Mat4, light_space: Mat4) {
        self.render(device, self.material.as_ref(), view, proj, Some(light_space));
    }

    fn light_draw(&self, device: &mut D, light_view: Mat4, light_proj: Mat4) {
        self.render(device, self.light_material.as_ref(), light_view, light_proj, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::HeadlessDevice;

    #[test]
    fn position_reads_back_exactly() {
        let mut object = SceneObject::<HeadlessDevice>::new();
        let position = Vec3::new(0.1, -2.75, 1e-7);
        object.set_position(position);
        assert_eq!(object.position(), position);

        object.add_position(Vec3::X);
        assert_eq!(object.position(), position + Vec3::X);
    }

    #[test]
    fn relative_setters_accumulate() {
        let mut object = SceneObject::<HeadlessDevice>::new();
        object.add_rotation(Vec3::new(0.0, 0.5, 0.0));
        object.add_rotation(Vec3::new(0.0, 0.25, 0.0));
        object.add_scale(Vec3::splat(1.0));
        assert_eq!(object.rotation(), Vec3::new(0.0, 0.75, 0.0));
        assert_eq!(object.scale(), Vec3::splat(2.0));
    }

    #[test]
    fn update_without_spin_leaves_pose_alone() {
        let mut object = SceneObject::<HeadlessDevice>::new();
        object.set_rotation(Vec3::new(10.0, 0.0, 0.0));
        object.update(1.0);
        assert_eq!(object.rotation(), Vec3::new(10.0, 0.0, 0.0));

        object.set_spin(Vec3::new(0.0, 0.5, 0.0));
        object.update(0.5);
        assert!((object.rotation().y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn incomplete_object_draws_nothing() {
        let mut device = HeadlessDevice::new();
        let object = SceneObject::<HeadlessDevice>::new();
        object.draw(&mut device, Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY);
        object.light_draw(&mut device, Mat4::IDENTITY, Mat4::IDENTITY);
        assert!(device.commands().is_empty());
    }
}
