use std::path::Path;
use std::rc::Rc;

use glam::Vec3;

use crate::asset::{AssetError, GeometryError};
use crate::renderer::{GeometryAsset, RenderDevice, ShaderError, ShaderMaterial};
use crate::scene::{Scene, SceneObject};
use crate::settings::RenderSettings;

const CUBE_MODEL: &str = "models/cube.obj";
const CHECKER_TEXTURE: &str = "textures/checker.bmp";
const LIT_VERTEX: &str = "shaders/lit.vert.wgsl";
const LIT_FRAGMENT: &str = "shaders/lit.frag.wgsl";
const DEPTH_VERTEX: &str = "shaders/depth.vert.wgsl";
const DEPTH_FRAGMENT: &str = "shaders/depth.frag.wgsl";

/// Spin of the centre cube around Y, radians per second.
const CUBE_SPIN: Vec3 = Vec3::new(0.0, 0.5, 0.0);

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("demo geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("demo shaders: {0}")]
    Shader(#[from] ShaderError),
    #[error("demo texture: {0}")]
    Texture(#[from] AssetError),
}

/// Builds the demo: a spinning cube above a flattened cube acting as the floor.
/// Both share one geometry upload and one checker texture.
pub fn build_demo_scene<D: RenderDevice + 'static>(
    device: &mut D,
    settings: &RenderSettings,
) -> Result<Scene<D>, DemoError> {
    let assets = settings.asset_dir.as_path();
    let mut scene = Scene::new(device, settings);

    let mut cube = GeometryAsset::new();
    cube.load_from_path(device, assets.join(CUBE_MODEL))?;
    let cube = Rc::new(cube);

    let mut spinner = SceneObject::new();
    spinner.set_mesh(Rc::clone(&cube));
    let mut material = lit_material(device, &scene, assets)?;
    let checker = material.load_texture(device, assets.join(CHECKER_TEXTURE))?;
    spinner.set_material(material);
    spinner.set_light_material(depth_material(device, assets)?);
    spinner.set_spin(CUBE_SPIN);

    let mut floor = SceneObject::new();
    floor.set_mesh(cube);
    let mut material = lit_material(device, &scene, assets)?;
    material.set_texture(Some(checker));
    floor.set_material(material);
    floor.set_light_material(depth_material(device, assets)?);
    floor.set_position(Vec3::new(0.0, -1.0, 0.0));
    floor.set_scale(Vec3::new(4.0, 0.05, 4.0));

    scene.add(Box::new(spinner));
    scene.add(Box::new(floor));
    log::info!("Demo scene ready with {} objects", scene.len());
    Ok(scene)
}

fn lit_material<D: RenderDevice>(
    device: &mut D,
    scene: &Scene<D>,
    assets: &Path,
) -> Result<ShaderMaterial<D>, ShaderError> {
    let mut material = ShaderMaterial::new();
    material.load_shaders(device, assets.join(LIT_VERTEX), assets.join(LIT_FRAGMENT))?;
    material.set_diffuse_colour(Vec3::ONE);
    material.set_specular_colour(Vec3::splat(0.5));
    material.set_emissive_colour(Vec3::splat(0.05));
    material.set_light_position(scene.light().position());
    material.set_shadow_map(Some(scene.shadow_map()));
    Ok(material)
}

fn depth_material<D: RenderDevice>(
    device: &mut D,
    assets: &Path,
) -> Result<ShaderMaterial<D>, ShaderError> {
    let mut material = ShaderMaterial::new();
    material.load_shaders(device, assets.join(DEPTH_VERTEX), assets.join(DEPTH_FRAGMENT))?;
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::HeadlessDevice;

    #[test]
    fn missing_asset_dir_fails_on_geometry() {
        let mut device = HeadlessDevice::new();
        let settings = RenderSettings {
            asset_dir: "does/not/exist".into(),
            ..RenderSettings::default()
        };
        let result = build_demo_scene(&mut device, &settings);
        assert!(matches!(result, Err(DemoError::Geometry(_))));
    }
}
