use std::path::PathBuf;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use wgpu_shadows::demo::build_demo_scene;
use wgpu_shadows::renderer::{
    DeviceCommand, GeometryAsset, HeadlessDevice, ShaderError, ShaderMaterial, ShaderStage,
    UniformValue, SHADOW_MAP_UNIT,
};
use wgpu_shadows::scene::{Scene, SceneObject};
use wgpu_shadows::settings::RenderSettings;

const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

fn asset_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

fn settings() -> RenderSettings {
    RenderSettings {
        asset_dir: asset_dir(),
        ..RenderSettings::default()
    }
}

fn material(device: &mut HeadlessDevice, name: &str) -> ShaderMaterial<HeadlessDevice> {
    let shaders = asset_dir().join("shaders");
    let mut material = ShaderMaterial::new();
    material
        .load_shaders(
            device,
            shaders.join(format!("{name}.vert.wgsl")),
            shaders.join(format!("{name}.frag.wgsl")),
        )
        .unwrap();
    material
}

fn single_object_scene(device: &mut HeadlessDevice) -> (Scene<HeadlessDevice>, u32) {
    let mut scene = Scene::new(device, &settings());

    let mut mesh = GeometryAsset::new();
    mesh.load_from_str(device, TRIANGLE).unwrap();
    let mesh = Rc::new(mesh);

    let mut lit = material(device, "lit");
    assert!(lit.set_shadow_map(Some(scene.shadow_map())));
    let depth = material(device, "depth");

    let mut object = SceneObject::new();
    object.set_mesh(Rc::clone(&mesh));
    object.set_material(lit);
    object.set_light_material(depth);
    scene.add(Box::new(object));

    let geometry = match device.commands().iter().find_map(|c| match c {
        DeviceCommand::UploadGeometry { geometry, .. } => Some(*geometry),
        _ => None,
    }) {
        Some(id) => id,
        None => panic!("geometry was not uploaded"),
    };
    (scene, geometry)
}

#[test]
fn one_object_draws_once_per_pass_depth_first() {
    let mut device = HeadlessDevice::new();
    let (mut scene, geometry) = single_object_scene(&mut device);
    device.clear_commands();

    scene.update(0.016);
    scene.draw(&mut device);

    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert!(draws[0].0.is_some(), "first draw goes to the shadow target");
    assert_eq!(draws[0].1, geometry);
    assert_eq!(draws[1], (None, geometry));
}

#[test]
fn full_frame_never_samples_the_shadow_map_while_writing_it() {
    let mut device = HeadlessDevice::new();
    let (mut scene, _) = single_object_scene(&mut device);

    for _ in 0..3 {
        scene.update(0.016);
        scene.draw(&mut device);
    }

    assert_eq!(device.hazards(), 0);
}

#[test]
fn colour_pass_binds_shadow_map_to_its_unit() {
    let mut device = HeadlessDevice::new();
    let (scene, _) = single_object_scene(&mut device);
    let shadow_map = scene.shadow_map().id;
    device.clear_commands();

    scene.draw(&mut device);

    assert!(device.commands().iter().any(|c| matches!(
        c,
        DeviceCommand::BindTexture { unit, texture } if *unit == SHADOW_MAP_UNIT && *texture == shadow_map
    )));
}

#[test]
fn light_space_matrix_reaches_the_lit_shader() {
    let mut device = HeadlessDevice::new();
    let (scene, _) = single_object_scene(&mut device);
    device.clear_commands();

    scene.draw(&mut device);

    let light_space = scene.light_space_matrix();
    let uploaded = device.commands().iter().any(|c| matches!(
        c,
        DeviceCommand::SetUniform { value: UniformValue::Mat4(m), .. } if *m == light_space
    ));
    assert!(uploaded);
}

#[test]
fn broken_shader_reports_failure_and_later_apply_is_a_no_op() {
    let mut device = HeadlessDevice::new();
    let mut material = ShaderMaterial::<HeadlessDevice>::new();
    let fragment = asset_dir().join("shaders/depth.frag.wgsl");
    let broken = std::env::temp_dir().join("wgpu_shadows_broken.vert.wgsl");
    std::fs::write(&broken, "@vertex fn vs_main( -> {").unwrap();

    let err = material.load_shaders(&mut device, &broken, &fragment).unwrap_err();

    assert!(matches!(
        err,
        ShaderError::Compile {
            stage: ShaderStage::Vertex,
            ..
        }
    ));
    assert!(!material.is_usable());
    material.apply(&mut device);
    assert!(device.commands().is_empty());
}

#[test]
fn object_without_usable_material_is_skipped() {
    let mut device = HeadlessDevice::new();
    let mut scene = Scene::new(&mut device, &settings());
    let mut mesh = GeometryAsset::new();
    mesh.load_from_str(&mut device, TRIANGLE).unwrap();

    let mut object = SceneObject::new();
    object.set_mesh(Rc::new(mesh));
    object.set_material(ShaderMaterial::new());
    scene.add(Box::new(object));

    scene.draw(&mut device);

    assert!(device.draws().is_empty());
    assert_eq!(device.passes().len(), 2);
}

#[test]
fn demo_scene_builds_from_shipped_assets() {
    let mut device = HeadlessDevice::new();
    let mut scene = build_demo_scene(&mut device, &settings()).unwrap();
    assert_eq!(scene.len(), 2);

    let uploads = device
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::UploadGeometry { .. }))
        .count();
    let textures = device
        .commands()
        .iter()
        .filter(|c| matches!(c, DeviceCommand::CreateTexture { .. }))
        .count();
    assert_eq!(uploads, 1, "both objects share one cube");
    assert_eq!(textures, 1, "both objects share one checker texture");

    device.clear_commands();
    scene.update(0.5);
    scene.draw(&mut device);
    assert_eq!(device.draws().len(), 4);
    assert_eq!(device.hazards(), 0);
}

#[test]
fn model_matrix_uses_y_x_z_rotation_order() {
    let mut object = SceneObject::<HeadlessDevice>::new();
    let position = Vec3::new(1.5, -0.25, 3.0);
    let rotation = Vec3::new(0.3, 1.2, -0.7);
    object.set_position(position);
    object.set_rotation(rotation);
    object.set_scale(Vec3::new(2.0, 1.0, 0.5));

    assert_eq!(object.position(), position);
    let expected = Mat4::from_translation(position)
        * Mat4::from_rotation_y(rotation.y)
        * Mat4::from_rotation_x(rotation.x)
        * Mat4::from_rotation_z(rotation.z)
        * Mat4::from_scale(Vec3::new(2.0, 1.0, 0.5));
    assert!(object.pose().model_matrix().abs_diff_eq(expected, 1e-6));
}
