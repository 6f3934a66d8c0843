// renderer/shader.rs
//! WGSL stage compilation and program linking.
//!
//! Each stage is compiled on its own with naga. Linking checks that the two
//! stages agree with each other and with the [`Uniform`] contract, and records
//! the reflected layout that uniform locations are resolved against.

use std::fmt;

use naga::{Binding, Handle, ImageClass, ImageDimension, ScalarKind, Type, TypeInner, VectorSize};

use crate::asset::AssetError;
use crate::renderer::uniforms::{Uniform, UniformKind, UniformLocation};
use crate::renderer::vertex::VertexAttribute;

/// Bind group holding the single uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Bind group holding textures and their samplers.
pub const TEXTURE_GROUP: u32 = 1;

const SAMPLER_SUFFIX: &str = "Sampler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }

    fn naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("could not read {stage} shader: {source}")]
    Io {
        stage: ShaderStage,
        #[source]
        source: AssetError,
    },
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader linking failed: {log}")]
    Link { log: String },
}

fn link_error(log: impl Into<String>) -> ShaderError {
    ShaderError::Link { log: log.into() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMember {
    pub name: String,
    pub offset: u32,
    /// `None` when the member's type is not one the contract can feed.
    pub kind: Option<UniformKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub binding: u32,
    pub comparison: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub name: String,
    pub binding: u32,
    pub kind: UniformKind,
    pub sampler: Option<SamplerBinding>,
}

/// Reflected interface of a linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub uniform_block_size: u32,
    pub members: Vec<BlockMember>,
    pub textures: Vec<TextureBinding>,
    /// Vertex streams consumed by the vertex stage, in location order.
    pub vertex_inputs: Vec<VertexAttribute>,
    /// Colour outputs written by the fragment stage.
    pub color_outputs: Vec<u32>,
}

impl ProgramLayout {
    pub fn location_of(&self, name: &str) -> Option<UniformLocation> {
        if let Some(member) = self.members.iter().find(|m| m.name == name) {
            return member.kind.map(|kind| UniformLocation::Block {
                offset: member.offset,
                kind,
            });
        }
        self.textures
            .iter()
            .find(|t| t.name == name)
            .map(|t| UniformLocation::Texture {
                binding: t.binding,
                kind: t.kind,
            })
    }

    fn check_contract(&self) -> Result<(), ShaderError> {
        let declared = self
            .members
            .iter()
            .map(|m| (m.name.as_str(), m.kind))
            .chain(self.textures.iter().map(|t| (t.name.as_str(), Some(t.kind))));

        for (name, kind) in declared {
            let Some(uniform) = Uniform::from_name(name) else {
                log::warn!("Uniform `{name}` is not fed by materials and will stay zeroed");
                continue;
            };
            if kind != Some(uniform.kind()) {
                return Err(link_error(format!(
                    "uniform `{name}` is declared as {} but materials supply {}",
                    kind.map_or("an unsupported type", UniformKind::wgsl),
                    uniform.kind().wgsl()
                )));
            }
        }
        Ok(())
    }
}

/// Both stage texts plus the layout they were linked into.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    vertex_source: String,
    fragment_source: String,
    layout: ProgramLayout,
}

impl LinkedProgram {
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }
}

#[derive(Debug, Default)]
struct StageInterface {
    block: Option<(u32, Vec<BlockMember>)>,
    textures: Vec<(String, u32, UniformKind)>,
    samplers: Vec<(String, SamplerBinding)>,
    inputs: Vec<u32>,
    outputs: Vec<u32>,
}

/// Parses and validates one stage, returning the compiler diagnostic on failure.
pub fn compile(stage: ShaderStage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| ShaderError::Compile {
        stage,
        log: err.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| ShaderError::Compile {
        stage,
        log: err.emit_to_string(source),
    })?;

    Ok(module)
}

pub fn link(vertex_source: &str, fragment_source: &str) -> Result<LinkedProgram, ShaderError> {
    let vertex_module = compile(ShaderStage::Vertex, vertex_source)?;
    let fragment_module = compile(ShaderStage::Fragment, fragment_source)?;
    let vertex = reflect(&vertex_module, ShaderStage::Vertex)?;
    let fragment = reflect(&fragment_module, ShaderStage::Fragment)?;

    if let Some(missing) = fragment
        .inputs
        .iter()
        .find(|location| !vertex.outputs.contains(location))
    {
        return Err(link_error(format!(
            "fragment input @location({missing}) is not written by the vertex stage"
        )));
    }

    let mut vertex_inputs = vertex
        .inputs
        .iter()
        .map(|&location| {
            VertexAttribute::from_location(location).ok_or_else(|| {
                link_error(format!(
                    "vertex input @location({location}) has no matching vertex stream"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    vertex_inputs.sort();
    vertex_inputs.dedup();

    let (uniform_block_size, members) = merge_blocks(vertex.block, fragment.block)?;

    let mut texture_decls = vertex.textures;
    texture_decls.extend(fragment.textures);
    let mut sampler_decls = vertex.samplers;
    sampler_decls.extend(fragment.samplers);
    let textures = pair_textures(texture_decls, sampler_decls)?;

    let layout = ProgramLayout {
        uniform_block_size,
        members,
        textures,
        vertex_inputs,
        color_outputs: fragment.outputs,
    };
    layout.check_contract()?;

    Ok(LinkedProgram {
        vertex_source: vertex_source.to_string(),
        fragment_source: fragment_source.to_string(),
        layout,
    })
}

fn reflect(module: &naga::Module, stage: ShaderStage) -> Result<StageInterface, ShaderError> {
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point() && ep.stage == stage.naga())
        .ok_or_else(|| {
            link_error(format!(
                "{stage} stage has no `{}` entry point",
                stage.entry_point()
            ))
        })?;

    let mut interface = StageInterface::default();

    for (_, var) in module.global_variables.iter() {
        let name = var.name.clone().unwrap_or_default();
        match var.space {
            naga::AddressSpace::Uniform => {
                if interface.block.is_some() {
                    return Err(link_error(format!(
                        "{stage} stage declares more than one uniform block"
                    )));
                }
                match &var.binding {
                    Some(rb) if rb.group == UNIFORM_GROUP && rb.binding == 0 => {}
                    _ => {
                        return Err(link_error(format!(
                            "uniform block `{name}` must be bound at @group({UNIFORM_GROUP}) @binding(0)"
                        )))
                    }
                }
                let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
                    return Err(link_error(format!("uniform block `{name}` must be a struct")));
                };
                let members = members
                    .iter()
                    .filter_map(|member| {
                        member.name.as_ref().map(|member_name| BlockMember {
                            name: member_name.clone(),
                            offset: member.offset,
                            kind: block_kind(&module.types[member.ty].inner),
                        })
                    })
                    .collect();
                interface.block = Some((*span, members));
            }
            naga::AddressSpace::Handle => {
                let Some(rb) = &var.binding else {
                    continue;
                };
                if rb.group != TEXTURE_GROUP {
                    return Err(link_error(format!(
                        "`{name}` must be bound in @group({TEXTURE_GROUP})"
                    )));
                }
                match &module.types[var.ty].inner {
                    TypeInner::Image {
                        dim: ImageDimension::D2,
                        arrayed: false,
                        class,
                    } => {
                        let kind = match class {
                            ImageClass::Sampled {
                                kind: ScalarKind::Float,
                                multi: false,
                            } => UniformKind::Texture2d,
                            ImageClass::Depth { multi: false } => UniformKind::DepthTexture2d,
                            _ => {
                                return Err(link_error(format!(
                                    "texture `{name}` has an unsupported image class"
                                )))
                            }
                        };
                        interface.textures.push((name, rb.binding, kind));
                    }
                    TypeInner::Sampler { comparison } => {
                        interface.samplers.push((
                            name,
                            SamplerBinding {
                                binding: rb.binding,
                                comparison: *comparison,
                            },
                        ));
                    }
                    _ => {
                        return Err(link_error(format!(
                            "`{name}` is not a 2D texture or sampler"
                        )))
                    }
                }
            }
            _ => {}
        }
    }

    interface.inputs = entry
        .function
        .arguments
        .iter()
        .flat_map(|arg| locations(module, arg.ty, arg.binding.as_ref()))
        .collect();
    interface.outputs = entry
        .function
        .result
        .as_ref()
        .map(|result| locations(module, result.ty, result.binding.as_ref()))
        .unwrap_or_default();

    Ok(interface)
}

fn block_kind(inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Mat4),
        TypeInner::Vector {
            size: VectorSize::Tri,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Vec3),
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Vec4),
        _ => None,
    }
}

fn locations(module: &naga::Module, ty: Handle<Type>, binding: Option<&Binding>) -> Vec<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => vec![*location],
        Some(Binding::BuiltIn(_)) => Vec::new(),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|member| match &member.binding {
                    Some(Binding::Location { location, .. }) => Some(*location),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}

fn merge_blocks(
    vertex: Option<(u32, Vec<BlockMember>)>,
    fragment: Option<(u32, Vec<BlockMember>)>,
) -> Result<(u32, Vec<BlockMember>), ShaderError> {
    let (mut size, mut members) = vertex.unwrap_or_default();
    let Some((fragment_size, fragment_members)) = fragment else {
        return Ok((size, members));
    };

    size = size.max(fragment_size);
    for member in fragment_members {
        match members.iter().find(|m| m.name == member.name) {
            Some(existing) if *existing != member => {
                return Err(link_error(format!(
                    "uniform `{}` is laid out differently in the vertex and fragment stages",
                    member.name
                )))
            }
            Some(_) => {}
            None => members.push(member),
        }
    }
    Ok((size, members))
}

fn pair_textures(
    textures: Vec<(String, u32, UniformKind)>,
    samplers: Vec<(String, SamplerBinding)>,
) -> Result<Vec<TextureBinding>, ShaderError> {
    let mut paired: Vec<TextureBinding> = Vec::new();
    for (name, binding, kind) in textures {
        if let Some(existing) = paired.iter().find(|t| t.name == name) {
            if existing.binding != binding || existing.kind != kind {
                return Err(link_error(format!(
                    "texture `{name}` is bound differently in the vertex and fragment stages"
                )));
            }
            continue;
        }
        paired.push(TextureBinding {
            name,
            binding,
            kind,
            sampler: None,
        });
    }

    for (name, sampler) in samplers {
        let owner = name
            .strip_suffix(SAMPLER_SUFFIX)
            .and_then(|texture| paired.iter_mut().find(|t| t.name == texture))
            .ok_or_else(|| {
                link_error(format!(
                    "sampler `{name}` has no texture; name it `<texture>{SAMPLER_SUFFIX}`"
                ))
            })?;
        match owner.sampler {
            Some(existing) if existing != sampler => {
                return Err(link_error(format!(
                    "sampler `{name}` is bound differently in the vertex and fragment stages"
                )))
            }
            _ => owner.sampler = Some(sampler),
        }
    }

    let mut bindings: Vec<u32> = paired
        .iter()
        .flat_map(|t| std::iter::once(t.binding).chain(t.sampler.map(|s| s.binding)))
        .collect();
    bindings.sort_unstable();
    if bindings.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(link_error(format!(
            "two resources share a binding in @group({TEXTURE_GROUP})"
        )));
    }

    paired.sort_by_key(|t| t.binding);
    Ok(paired)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIT_VERT: &str = include_str!("../../assets/shaders/lit.vert.wgsl");
    const LIT_FRAG: &str = include_str!("../../assets/shaders/lit.frag.wgsl");
    const DEPTH_VERT: &str = include_str!("../../assets/shaders/depth.vert.wgsl");
    const DEPTH_FRAG: &str = include_str!("../../assets/shaders/depth.frag.wgsl");

    const MINIMAL_VERT: &str = r#"
struct Uniforms {
    modelMat: mat4x4<f32>,
    viewMat: mat4x4<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

struct VertexOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) shade: f32,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOut {
    var out: VertexOut;
    out.clip = u.viewMat * u.modelMat * vec4<f32>(position, 1.0);
    out.shade = position.y;
    return out;
}
"#;

    const MINIMAL_FRAG: &str = r#"
@fragment
fn fs_main(@location(0) shade: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(shade, shade, shade, 1.0);
}
"#;

    #[test]
    fn lit_program_satisfies_contract() {
        let program = link(LIT_VERT, LIT_FRAG).expect("lit shaders link");
        let layout = program.layout();
        for uniform in Uniform::ALL {
            assert!(
                layout.location_of(uniform.name()).is_some(),
                "{} missing",
                uniform.name()
            );
        }
        assert_eq!(
            layout.vertex_inputs,
            vec![
                VertexAttribute::Position,
                VertexAttribute::Normal,
                VertexAttribute::TexCoord
            ]
        );
        assert_eq!(layout.color_outputs, vec![0]);

        let shadow = layout.textures.iter().find(|t| t.name == "shadowMap").unwrap();
        assert_eq!(shadow.kind, UniformKind::DepthTexture2d);
        assert!(shadow.sampler.unwrap().comparison);
    }

    #[test]
    fn depth_program_declares_only_transforms() {
        let program = link(DEPTH_VERT, DEPTH_FRAG).expect("depth shaders link");
        let layout = program.layout();
        for uniform in [Uniform::ModelMat, Uniform::InvModelMat, Uniform::ViewMat, Uniform::ProjMat] {
            assert!(layout.location_of(uniform.name()).is_some());
        }
        for uniform in [Uniform::LightSpaceMat, Uniform::DiffuseColour, Uniform::Tex1, Uniform::ShadowMap] {
            assert!(layout.location_of(uniform.name()).is_none());
        }
        assert_eq!(layout.vertex_inputs, vec![VertexAttribute::Position]);
        assert!(layout.color_outputs.is_empty());
    }

    #[test]
    fn block_offsets_come_from_the_shader() {
        let program = link(MINIMAL_VERT, MINIMAL_FRAG).unwrap();
        assert_eq!(program.layout().uniform_block_size, 128);
        assert_eq!(
            program.layout().location_of("viewMat"),
            Some(UniformLocation::Block {
                offset: 64,
                kind: UniformKind::Mat4
            })
        );
        assert_eq!(program.layout().location_of("projMat"), None);
    }

    #[test]
    fn syntax_error_is_a_compile_error_with_diagnostic() {
        let broken = "@vertex fn vs_main( -> @builtin(position) vec4<f32> { }";
        match link(broken, MINIMAL_FRAG) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_point_fails_link() {
        let no_entry = "fn helper() -> f32 { return 1.0; }";
        assert!(matches!(
            link(MINIMAL_VERT, no_entry),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn unmatched_fragment_input_fails_link() {
        let frag = r#"
@fragment
fn fs_main(@location(3) extra: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(extra, 0.0, 1.0);
}
"#;
        let err = link(MINIMAL_VERT, frag).unwrap_err();
        assert!(err.to_string().contains("@location(3)"), "{err}");
    }

    #[test]
    fn contract_type_mismatch_fails_link() {
        let vert = r#"
struct Uniforms {
    modelMat: vec4<f32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0) + u.modelMat;
}
"#;
        let err = link(vert, "@fragment fn fs_main() {}").unwrap_err();
        assert!(err.to_string().contains("modelMat"), "{err}");
    }

    #[test]
    fn orphan_sampler_fails_link() {
        let frag = r#"
@group(1) @binding(0) var lonely: sampler;

@fragment
fn fs_main() {}
"#;
        assert!(matches!(
            link(MINIMAL_VERT.replace("out.shade = position.y;", "out.shade = 0.0;").as_str(), frag),
            Err(ShaderError::Link { .. })
        ));
    }
}
