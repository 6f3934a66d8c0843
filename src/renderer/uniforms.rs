// renderer/uniforms.rs
//! The fixed uniform contract between materials and shader programs.

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::shader::ProgramLayout;

/// Every uniform a material knows how to feed, with the exact shader-side name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    ModelMat,
    InvModelMat,
    ViewMat,
    ProjMat,
    LightSpaceMat,
    DiffuseColour,
    EmissiveColour,
    SpecularColour,
    WorldSpaceLightPos,
    Tex1,
    ShadowMap,
}

/// Shader-side type a uniform must be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Mat4,
    Vec3,
    Vec4,
    Texture2d,
    DepthTexture2d,
}

impl Uniform {
    pub const COUNT: usize = 11;

    pub const ALL: [Uniform; Self::COUNT] = [
        Uniform::ModelMat,
        Uniform::InvModelMat,
        Uniform::ViewMat,
        Uniform::ProjMat,
        Uniform::LightSpaceMat,
        Uniform::DiffuseColour,
        Uniform::EmissiveColour,
        Uniform::SpecularColour,
        Uniform::WorldSpaceLightPos,
        Uniform::Tex1,
        Uniform::ShadowMap,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Uniform::ModelMat => "modelMat",
            Uniform::InvModelMat => "invModelMat",
            Uniform::ViewMat => "viewMat",
            Uniform::ProjMat => "projMat",
            Uniform::LightSpaceMat => "lightSpaceMat",
            Uniform::DiffuseColour => "diffuseColour",
            Uniform::EmissiveColour => "emissiveColour",
            Uniform::SpecularColour => "specularColour",
            Uniform::WorldSpaceLightPos => "worldSpaceLightPos",
            Uniform::Tex1 => "tex1",
            Uniform::ShadowMap => "shadowMap",
        }
    }

    pub const fn kind(self) -> UniformKind {
        match self {
            Uniform::ModelMat
            | Uniform::InvModelMat
            | Uniform::ViewMat
            | Uniform::ProjMat
            | Uniform::LightSpaceMat => UniformKind::Mat4,
            Uniform::DiffuseColour | Uniform::EmissiveColour | Uniform::SpecularColour => {
                UniformKind::Vec3
            }
            Uniform::WorldSpaceLightPos => UniformKind::Vec4,
            Uniform::Tex1 => UniformKind::Texture2d,
            Uniform::ShadowMap => UniformKind::DepthTexture2d,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.name() == name)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl UniformKind {
    pub const fn wgsl(self) -> &'static str {
        match self {
            UniformKind::Mat4 => "mat4x4<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Texture2d => "texture_2d<f32>",
            UniformKind::DepthTexture2d => "texture_depth_2d",
        }
    }

    /// Bytes occupied inside the uniform block, `None` for textures.
    pub const fn byte_size(self) -> Option<usize> {
        match self {
            UniformKind::Mat4 => Some(64),
            UniformKind::Vec3 => Some(12),
            UniformKind::Vec4 => Some(16),
            UniformKind::Texture2d | UniformKind::DepthTexture2d => None,
        }
    }

    pub const fn is_texture(self) -> bool {
        self.byte_size().is_none()
    }
}

/// Where a resolved uniform lives in a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformLocation {
    /// Member of the program's single uniform block.
    Block { offset: u32, kind: UniformKind },
    /// Texture binding in the texture group; its value is a texture unit.
    Texture { binding: u32, kind: UniformKind },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Vec4(Vec4),
    /// Texture unit a sampler uniform reads from.
    Sampler(u32),
}

impl UniformValue {
    pub fn fits(&self, location: UniformLocation) -> bool {
        matches!(
            (self, location),
            (UniformValue::Mat4(_), UniformLocation::Block { kind: UniformKind::Mat4, .. })
                | (UniformValue::Vec3(_), UniformLocation::Block { kind: UniformKind::Vec3, .. })
                | (UniformValue::Vec4(_), UniformLocation::Block { kind: UniformKind::Vec4, .. })
                | (UniformValue::Sampler(_), UniformLocation::Texture { .. })
        )
    }
}

/// CPU copy of a program's uniform block, written member by member.
#[derive(Debug, Clone, Default)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(size: u32) -> Self {
        Self {
            bytes: vec![0; size as usize],
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns false when the value does not fit the location; nothing is written then.
    pub fn write(&mut self, location: UniformLocation, value: UniformValue) -> bool {
        let UniformLocation::Block { offset, .. } = location else {
            return false;
        };
        if !value.fits(location) {
            return false;
        }

        let mut scratch = [0.0f32; 16];
        let floats: &[f32] = match value {
            UniformValue::Mat4(m) => {
                scratch = m.to_cols_array();
                &scratch
            }
            UniformValue::Vec3(v) => {
                scratch[..3].copy_from_slice(&v.to_array());
                &scratch[..3]
            }
            UniformValue::Vec4(v) => {
                scratch[..4].copy_from_slice(&v.to_array());
                &scratch[..4]
            }
            UniformValue::Sampler(_) => return false,
        };

        let src: &[u8] = bytemuck::cast_slice(floats);
        let start = offset as usize;
        let Some(dst) = self.bytes.get_mut(start..start + src.len()) else {
            return false;
        };
        dst.copy_from_slice(src);
        true
    }
}

/// Locations of every [`Uniform`] in one linked program, resolved once after link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformTable {
    locations: [Option<UniformLocation>; Uniform::COUNT],
}

impl UniformTable {
    pub fn resolve(layout: &ProgramLayout) -> Self {
        let mut table = Self::default();
        for uniform in Uniform::ALL {
            table.locations[uniform.index()] = layout.location_of(uniform.name());
        }
        table
    }

    pub fn location(&self, uniform: Uniform) -> Option<UniformLocation> {
        self.locations[uniform.index()]
    }

    pub fn is_declared(&self, uniform: Uniform) -> bool {
        self.location(uniform).is_some()
    }
}
