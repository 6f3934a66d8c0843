use std::collections::HashMap;

use crate::renderer::depth::DEPTH_FORMAT;
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::shader::{LinkedProgram, ProgramLayout, SamplerBinding, TextureBinding};
use crate::renderer::uniforms::{UniformBlock, UniformKind};

const SHADOW_DEPTH_BIAS: i32 = 2;
const SHADOW_SLOPE_BIAS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TargetKind {
    Surface,
    Shadow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub(crate) program: usize,
    pub(crate) target: TargetKind,
}

/// GPU objects and current uniform state of one linked program.
pub(crate) struct ProgramResources {
    pub(crate) layout: ProgramLayout,
    pub(crate) texture_layout: Option<wgpu::BindGroupLayout>,
    pub(crate) block: UniformBlock,
    pub(crate) sampler_units: HashMap<u32, u32>,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
}

impl ProgramResources {
    pub(crate) fn new(
        device: &wgpu::Device,
        program: &LinkedProgram,
        uniform_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = program.layout().clone();

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("VertexShader"),
            source: wgpu::ShaderSource::Wgsl(program.vertex_source().to_owned().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("FragmentShader"),
            source: wgpu::ShaderSource::Wgsl(program.fragment_source().to_owned().into()),
        });

        let texture_layout = (!layout.textures.is_empty()).then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ProgramTexturesLayout"),
                entries: &texture_layout_entries(&layout.textures),
            })
        });

        let mut bind_group_layouts = vec![uniform_layout];
        if let Some(textures) = &texture_layout {
            bind_group_layouts.push(textures);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ProgramPipelineLayout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        Self {
            block: UniformBlock::new(layout.uniform_block_size),
            layout,
            texture_layout,
            sampler_units: HashMap::new(),
            vertex_module,
            fragment_module,
            pipeline_layout,
        }
    }

    fn build_pipeline(
        &self,
        device: &wgpu::Device,
        target: TargetKind,
        surface_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let label = match target {
            TargetKind::Surface => "SurfacePipeline",
            TargetKind::Shadow => "ShadowPipeline",
        };
        let mut builder = PipelineBuilder::new(
            device,
            &self.pipeline_layout,
            &self.vertex_module,
            &self.fragment_module,
        )
        .with_label(label)
        .with_no_culling();

        for attribute in &self.layout.vertex_inputs {
            builder = builder.with_vertex_buffer(attribute.layout());
        }

        builder = match target {
            TargetKind::Surface => {
                let writes = if self.layout.color_outputs.contains(&0) {
                    wgpu::ColorWrites::ALL
                } else {
                    wgpu::ColorWrites::empty()
                };
                builder
                    .with_color_target(surface_format, writes)
                    .with_depth_stencil(DEPTH_FORMAT, true, wgpu::CompareFunction::Less)
            }
            TargetKind::Shadow => builder.with_depth_stencil_biased(
                DEPTH_FORMAT,
                true,
                wgpu::CompareFunction::LessEqual,
                SHADOW_DEPTH_BIAS,
                SHADOW_SLOPE_BIAS,
            ),
        };

        builder.build()
    }
}

/// Pipelines are created lazily, one per program and kind of target.
#[derive(Default)]
pub(crate) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub(crate) fn ensure(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        program: &ProgramResources,
        surface_format: wgpu::TextureFormat,
    ) {
        self.pipelines.entry(key).or_insert_with(|| {
            log::debug!("Creating pipeline for {:?}", key);
            program.build_pipeline(device, key.target, surface_format)
        });
    }

    /// Drops every pipeline built for the program in `slot`.
    pub(crate) fn evict_program(&mut self, slot: usize) {
        self.pipelines.retain(|key, _| key.program != slot);
    }

    pub(crate) fn get(&self, key: PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&key)
    }
}

pub(crate) fn texture_layout_entries(textures: &[TextureBinding]) -> Vec<wgpu::BindGroupLayoutEntry> {
    let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
    let mut entries = Vec::with_capacity(textures.len() * 2);

    for texture in textures {
        let sample_type = match texture.kind {
            UniformKind::DepthTexture2d => wgpu::TextureSampleType::Depth,
            _ => wgpu::TextureSampleType::Float { filterable: true },
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: texture.binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });

        if let Some(sampler) = texture.sampler {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.binding,
                visibility,
                ty: wgpu::BindingType::Sampler(sampler_binding_type(texture.kind, sampler)),
                count: None,
            });
        }
    }

    entries
}

pub(crate) fn sampler_binding_type(
    kind: UniformKind,
    sampler: SamplerBinding,
) -> wgpu::SamplerBindingType {
    match (sampler.comparison, kind) {
        (true, _) => wgpu::SamplerBindingType::Comparison,
        (false, UniformKind::DepthTexture2d) => wgpu::SamplerBindingType::NonFiltering,
        (false, _) => wgpu::SamplerBindingType::Filtering,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shader;

    #[test]
    fn lit_program_layout_entries() {
        let program = shader::link(
            include_str!("../../../assets/shaders/lit.vert.wgsl"),
            include_str!("../../../assets/shaders/lit.frag.wgsl"),
        )
        .unwrap();
        let entries = texture_layout_entries(&program.layout().textures);
        assert_eq!(entries.len(), 4);

        let by_binding = |b: u32| entries.iter().find(|e| e.binding == b).unwrap().ty;
        assert!(matches!(
            by_binding(0),
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                ..
            }
        ));
        assert!(matches!(
            by_binding(1),
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        ));
        assert!(matches!(
            by_binding(2),
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                ..
            }
        ));
        assert!(matches!(
            by_binding(3),
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        ));
    }

    #[test]
    fn plain_sampler_on_depth_texture_does_not_filter() {
        let sampler = SamplerBinding {
            binding: 1,
            comparison: false,
        };
        assert_eq!(
            sampler_binding_type(UniformKind::DepthTexture2d, sampler),
            wgpu::SamplerBindingType::NonFiltering
        );
    }
}
