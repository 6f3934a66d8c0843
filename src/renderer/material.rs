use std::fmt;
use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};

use crate::asset::{AssetError, TextureImage};
use crate::io;
use crate::renderer::device::RenderDevice;
use crate::renderer::shader::{self, ShaderError, ShaderStage};
use crate::renderer::uniforms::{Uniform, UniformTable, UniformValue};

/// Texture unit the primary texture `tex1` is bound to.
pub const TEXTURE_UNIT: u32 = 0;
/// Texture unit the shadow map is bound to.
pub const SHADOW_MAP_UNIT: u32 = 1;

/// Matrices uploaded before a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transforms {
    pub model: Mat4,
    /// Rotation-only inverse of `model`; uploaded transposed.
    pub inv_model_rotation: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub light_space: Option<Mat4>,
}

/// A linked shader program plus the constants and textures it is drawn with.
pub struct ShaderMaterial<D: RenderDevice> {
    program: Option<D::Program>,
    uniforms: UniformTable,
    texture: Option<Rc<D::Texture>>,
    shadow_map: Option<Rc<D::Texture>>,
    diffuse_colour: Vec3,
    emissive_colour: Vec3,
    specular_colour: Vec3,
    light_position: Vec4,
}

impl<D: RenderDevice> Default for ShaderMaterial<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RenderDevice> fmt::Debug for ShaderMaterial<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderMaterial")
            .field("usable", &self.is_usable())
            .field("uniforms", &self.uniforms)
            .field("has_texture", &self.texture.is_some())
            .field("has_shadow_map", &self.shadow_map.is_some())
            .field("diffuse_colour", &self.diffuse_colour)
            .field("emissive_colour", &self.emissive_colour)
            .field("specular_colour", &self.specular_colour)
            .field("light_position", &self.light_position)
            .finish()
    }
}

impl<D: RenderDevice> ShaderMaterial<D> {
    pub fn new() -> Self {
        Self {
            program: None,
            uniforms: UniformTable::default(),
            texture: None,
            shadow_map: None,
            diffuse_colour: Vec3::ZERO,
            emissive_colour: Vec3::ZERO,
            specular_colour: Vec3::ZERO,
            light_position: Vec4::W,
        }
    }

    /// Reads, compiles and links a vertex/fragment pair. On failure the material
    /// keeps whatever program it had before.
    pub fn load_shaders(
        &mut self,
        device: &mut D,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<(), ShaderError> {
        let vertex_source = read_stage(ShaderStage::Vertex, vertex_path.as_ref())?;
        let fragment_source = read_stage(ShaderStage::Fragment, fragment_path.as_ref())?;
        self.load_shader_source(device, &vertex_source, &fragment_source)
    }

    pub fn load_shader_source(
        &mut self,
        device: &mut D,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), ShaderError> {
        let linked = shader::link(vertex_source, fragment_source).map_err(|err| {
            log::error!("{err}");
            err
        })?;

        self.program = Some(device.create_program(&linked));
        self.uniforms = UniformTable::resolve(linked.layout());

        let missing: Vec<&str> = Uniform::ALL
            .into_iter()
            .filter(|u| !self.uniforms.is_declared(*u))
            .map(Uniform::name)
            .collect();
        log::debug!("Shader program linked; undeclared uniforms: {:?}", missing);
        Ok(())
    }

    pub fn is_usable(&self) -> bool {
        self.program.is_some()
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn program(&self) -> Option<&D::Program> {
        self.program.as_ref()
    }

    /// Decodes a bitmap, uploads it and makes it this material's primary texture.
    /// The returned handle can be shared with other materials.
    pub fn load_texture(
        &mut self,
        device: &mut D,
        path: impl AsRef<Path>,
    ) -> Result<Rc<D::Texture>, AssetError> {
        let image = TextureImage::from_path(path).map_err(|err| {
            log::warn!("{err}");
            err
        })?;
        let texture = Rc::new(device.create_texture(&image));
        self.texture = Some(Rc::clone(&texture));
        Ok(texture)
    }

    /// Returns whether a texture is now set, whatever the program declares.
    pub fn set_texture(&mut self, texture: Option<Rc<D::Texture>>) -> bool {
        self.texture = texture;
        self.warn_if_unsampled(self.texture.is_some(), Uniform::Tex1);
        self.texture.is_some()
    }

    /// Returns whether a shadow map is now set, whatever the program declares.
    pub fn set_shadow_map(&mut self, shadow_map: Option<Rc<D::Texture>>) -> bool {
        self.shadow_map = shadow_map;
        self.warn_if_unsampled(self.shadow_map.is_some(), Uniform::ShadowMap);
        self.shadow_map.is_some()
    }

    fn warn_if_unsampled(&self, is_set: bool, uniform: Uniform) {
        if is_set && self.is_usable() && !self.uniforms.is_declared(uniform) {
            log::warn!("Program does not sample `{}`; texture stays unused", uniform.name());
        }
    }

    pub fn set_diffuse_colour(&mut self, colour: Vec3) {
        self.diffuse_colour = colour;
    }

    pub fn set_emissive_colour(&mut self, colour: Vec3) {
        self.emissive_colour = colour;
    }

    pub fn set_specular_colour(&mut self, colour: Vec3) {
        self.specular_colour = colour;
    }

    pub fn set_light_position(&mut self, position: Vec3) {
        self.light_position = position.extend(1.0);
    }

    pub fn diffuse_colour(&self) -> Vec3 {
        self.diffuse_colour
    }

    pub fn emissive_colour(&self) -> Vec3 {
        self.emissive_colour
    }

    pub fn specular_colour(&self) -> Vec3 {
        self.specular_colour
    }

    pub fn light_position(&self) -> Vec4 {
        self.light_position
    }

    pub fn set_transforms(&self, device: &mut D, transforms: &Transforms) {
        let Some(program) = &self.program else {
            return;
        };
        device.use_program(program);

        self.write(device, Uniform::ModelMat, UniformValue::Mat4(transforms.model));
        self.write(
            device,
            Uniform::InvModelMat,
            UniformValue::Mat4(transforms.inv_model_rotation.transpose()),
        );
        self.write(device, Uniform::ViewMat, UniformValue::Mat4(transforms.view));
        self.write(device, Uniform::ProjMat, UniformValue::Mat4(transforms.projection));
        if let Some(light_space) = transforms.light_space {
            self.write(device, Uniform::LightSpaceMat, UniformValue::Mat4(light_space));
        }
    }

    /// Selects the program and pushes colours, light position and textures.
    pub fn apply(&self, device: &mut D) {
        let Some(program) = &self.program else {
            return;
        };
        device.use_program(program);

        self.write(device, Uniform::WorldSpaceLightPos, UniformValue::Vec4(self.light_position));
        self.write(device, Uniform::EmissiveColour, UniformValue::Vec3(self.emissive_colour));
        self.write(device, Uniform::DiffuseColour, UniformValue::Vec3(self.diffuse_colour));
        self.write(device, Uniform::SpecularColour, UniformValue::Vec3(self.specular_colour));

        self.write(device, Uniform::Tex1, UniformValue::Sampler(TEXTURE_UNIT));
        if let Some(texture) = &self.texture {
            device.bind_texture(TEXTURE_UNIT, texture);
        }

        if let Some(shadow_map) = &self.shadow_map {
            self.write(device, Uniform::ShadowMap, UniformValue::Sampler(SHADOW_MAP_UNIT));
            device.bind_texture(SHADOW_MAP_UNIT, shadow_map);
        }
    }

    fn write(&self, device: &mut D, uniform: Uniform, value: UniformValue) {
        if let Some(location) = self.uniforms.location(uniform) {
            device.set_uniform(location, value);
        }
    }
}

fn read_stage(stage: ShaderStage, path: &Path) -> Result<String, ShaderError> {
    io::load_text(path).map_err(|source| {
        log::error!("Could not read {stage} shader: {source}");
        ShaderError::Io { stage, source }
    })
}
