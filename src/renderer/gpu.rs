// renderer/gpu.rs
//! `RenderDevice` on top of wgpu.
//!
//! Calls are recorded as they arrive: every draw snapshots the current program's
//! uniform block into the [`UniformArena`] and resolves its textures from the bound
//! units. `present` turns the recorded passes into one command buffer.
//!
//! Program and texture handles carry a [`ReleaseGuard`]; once dropped, their slot,
//! cached pipelines and bind groups are freed after the next `present`.

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::asset::TextureImage;
use crate::renderer::depth::create_depth_texture;
use crate::renderer::device::{
    ClearFlags, PassDescriptor, ReleaseGuard, ReleaseQueue, RenderDevice,
};
use crate::renderer::internal::{
    BindGroupCache, BindGroupKey, ContextError, PipelineCache, PipelineKey, ProgramResources, RenderContext, TargetKind,
    UniformArena,
};
use crate::renderer::shader::LinkedProgram;
use crate::renderer::texture::{upload_rgba, Samplers, TextureKind};
use crate::renderer::uniforms::{UniformKind, UniformLocation, UniformValue};
use crate::renderer::vertex::{VertexAttribute, VertexStream};
use crate::settings::RenderSettings;

const INITIAL_UNIFORM_SLOTS: u32 = 64;

pub struct WgpuGeometry {
    buffers: Vec<(VertexAttribute, wgpu::Buffer)>,
}

impl WgpuGeometry {
    fn buffer(&self, attribute: VertexAttribute) -> Option<&wgpu::Buffer> {
        self.buffers
            .iter()
            .find(|(a, _)| *a == attribute)
            .map(|(_, buffer)| buffer)
    }
}

#[derive(Debug)]
pub struct WgpuProgram {
    release: ReleaseGuard,
}

impl WgpuProgram {
    fn slot(&self) -> usize {
        self.release.id() as usize
    }
}

pub struct WgpuTexture {
    release: ReleaseGuard,
    kind: TextureKind,
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

pub struct WgpuFramebuffer {
    depth_id: u32,
    size: u32,
    view: wgpu::TextureView,
}

#[derive(Clone)]
struct BoundTexture {
    id: u32,
    kind: TextureKind,
    view: wgpu::TextureView,
}

enum PassTarget {
    Surface,
    Shadow {
        view: wgpu::TextureView,
        depth_id: u32,
        size: u32,
    },
}

impl PassTarget {
    fn kind(&self) -> TargetKind {
        match self {
            PassTarget::Surface => TargetKind::Surface,
            PassTarget::Shadow { .. } => TargetKind::Shadow,
        }
    }

    fn depth_id(&self) -> Option<u32> {
        match self {
            PassTarget::Surface => None,
            PassTarget::Shadow { depth_id, .. } => Some(*depth_id),
        }
    }
}

struct RecordedDraw {
    key: PipelineKey,
    vertex_buffers: Vec<wgpu::Buffer>,
    vertex_count: u32,
    uniform_offset: u32,
    textures: Option<wgpu::BindGroup>,
}

struct RecordedPass {
    target: PassTarget,
    descriptor: PassDescriptor,
    draws: Vec<RecordedDraw>,
}

pub struct WgpuDevice {
    context: RenderContext,
    arena: UniformArena,
    pipelines: PipelineCache,
    programs: Vec<Option<ProgramResources>>,
    free_program_slots: Vec<usize>,
    program_releases: ReleaseQueue,
    texture_releases: ReleaseQueue,
    bind_groups: BindGroupCache<wgpu::BindGroup>,
    samplers: Samplers,
    white: BoundTexture,
    zero_vertices: wgpu::Buffer,
    units: HashMap<u32, BoundTexture>,
    current_program: Option<usize>,
    passes: Vec<RecordedPass>,
    next_texture_id: u32,
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, ContextError> {
        let context = RenderContext::new(window, settings).await?;
        let device = &context.device;

        let arena = UniformArena::new(device, INITIAL_UNIFORM_SLOTS);
        let samplers = Samplers::new(device);

        let white_texture = upload_rgba(device, &context.queue, &TextureImage::white(), "White");
        let white = BoundTexture {
            id: 0,
            kind: TextureKind::Colour,
            view: white_texture.create_view(&wgpu::TextureViewDescriptor::default()),
        };
        let zero_vertices = Self::create_zero_vertices(device, 0);

        Ok(Self {
            context,
            arena,
            pipelines: PipelineCache::default(),
            programs: Vec::new(),
            free_program_slots: Vec::new(),
            program_releases: ReleaseQueue::default(),
            texture_releases: ReleaseQueue::default(),
            bind_groups: BindGroupCache::default(),
            samplers,
            white,
            zero_vertices,
            units: HashMap::new(),
            current_program: None,
            passes: Vec::new(),
            next_texture_id: 1,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Encodes and submits everything recorded since the last call.
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let passes = std::mem::take(&mut self.passes);
        let result = self.submit(&passes);
        self.arena.reset();
        self.collect_released();
        result
    }

    /// Frees resources of handles dropped since the last collection. Only runs
    /// with no recorded passes, so no pending draw refers to a freed slot.
    fn collect_released(&mut self) {
        if !self.passes.is_empty() {
            return;
        }

        for slot in self.program_releases.drain() {
            let slot = slot as usize;
            if let Some(resources) = self.programs.get_mut(slot) {
                *resources = None;
            }
            self.pipelines.evict_program(slot);
            self.bind_groups.evict_program(slot);
            if self.current_program == Some(slot) {
                self.current_program = None;
            }
            self.free_program_slots.push(slot);
            log::debug!("Released program slot {}", slot);
        }

        let textures = self.texture_releases.drain();
        if !textures.is_empty() {
            self.units.retain(|_, bound| !textures.contains(&bound.id));
            self.bind_groups.evict_textures(&textures);
            log::debug!("{} texture bind groups cached", self.bind_groups.len());
        }
    }

    fn submit(&mut self, passes: &[RecordedPass]) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        for draw in passes.iter().flat_map(|pass| &pass.draws) {
            if let Some(program) = self.programs.get(draw.key.program).and_then(Option::as_ref) {
                self.pipelines.ensure(
                    &self.context.device,
                    draw.key,
                    program,
                    self.context.config.format,
                );
            }
        }
        self.arena.flush(&self.context);

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FrameEncoder"),
            });
        for pass in passes {
            self.encode_pass(&mut encoder, pass, &surface_view);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &RecordedPass,
        surface_view: &wgpu::TextureView,
    ) {
        let clear = pass.descriptor.clear;
        let [r, g, b, a] = pass.descriptor.clear_colour.map(f64::from);

        let (label, colour_view, depth_view, extent) = match &pass.target {
            PassTarget::Surface => (
                "ColourPass",
                Some(surface_view),
                &self.context.depth.view,
                (self.context.config.width, self.context.config.height),
            ),
            PassTarget::Shadow { view, size, .. } => ("ShadowPass", None, view, (*size, *size)),
        };

        let colour_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colour_view
            .map(|view| wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if clear.contains(ClearFlags::COLOR) {
                        wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })
            .into_iter()
            .map(Some)
            .collect();

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &colour_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear.contains(ClearFlags::DEPTH) {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(viewport) = pass.descriptor.viewport.clamped_to(extent.0, extent.1) else {
            return;
        };
        rpass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );

        for draw in &pass.draws {
            let Some(pipeline) = self.pipelines.get(draw.key) else {
                continue;
            };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.arena.bind_group, &[draw.uniform_offset]);
            if let Some(textures) = &draw.textures {
                rpass.set_bind_group(1, textures, &[]);
            }
            for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            rpass.draw(0..draw.vertex_count, 0..1);
        }
    }

    fn allocate_texture_id(&mut self) -> u32 {
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        id
    }

    fn create_zero_vertices(device: &wgpu::Device, vertex_count: u32) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ZeroVertices"),
            size: vertex_count.max(1) as u64 * VertexAttribute::Position.stride(),
            usage: wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        })
    }

    /// Texture group for the program in `slot` from the bound units, reused while
    /// the same textures stay bound.
    fn texture_bind_group(
        &mut self,
        slot: usize,
        depth_attachment: Option<u32>,
    ) -> Result<Option<wgpu::BindGroup>, String> {
        let Some(program) = self.programs.get(slot).and_then(Option::as_ref) else {
            return Err(format!("program slot {slot} has been released"));
        };
        let Some(layout) = &program.texture_layout else {
            return Ok(None);
        };

        let mut chosen = Vec::with_capacity(program.layout.textures.len());
        for texture in &program.layout.textures {
            let unit = program.sampler_units.get(&texture.binding).copied().unwrap_or(0);
            let bound = self.units.get(&unit);
            let view = match (texture.kind, bound) {
                (UniformKind::DepthTexture2d, Some(b)) if b.kind == TextureKind::Depth => {
                    if Some(b.id) == depth_attachment {
                        return Err(format!(
                            "`{}` samples the depth target of the current pass",
                            texture.name
                        ));
                    }
                    b
                }
                (UniformKind::DepthTexture2d, _) => {
                    return Err(format!(
                        "no depth texture is bound to unit {unit} for `{}`",
                        texture.name
                    ))
                }
                (_, Some(b)) if b.kind == TextureKind::Colour => b,
                _ => &self.white,
            };
            chosen.push(view);
        }

        let key = BindGroupKey {
            program: slot,
            textures: chosen.iter().map(|bound| bound.id).collect(),
        };
        let device = &self.context.device;
        let samplers = &self.samplers;
        let group = self.bind_groups.get_or_create(key, || {
            let mut entries = Vec::with_capacity(chosen.len() * 2);
            for (texture, bound) in program.layout.textures.iter().zip(&chosen) {
                entries.push(wgpu::BindGroupEntry {
                    binding: texture.binding,
                    resource: wgpu::BindingResource::TextureView(&bound.view),
                });
                if let Some(sampler) = texture.sampler {
                    entries.push(wgpu::BindGroupEntry {
                        binding: sampler.binding,
                        resource: wgpu::BindingResource::Sampler(
                            samplers.for_binding(texture.kind, sampler),
                        ),
                    });
                }
            }
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("ProgramTextures"),
                layout,
                entries: &entries,
            })
        });
        Ok(Some(group))
    }
}

impl RenderDevice for WgpuDevice {
    type Geometry = WgpuGeometry;
    type Program = WgpuProgram;
    type Texture = WgpuTexture;
    type Framebuffer = WgpuFramebuffer;

    fn upload_geometry(&mut self, streams: &[VertexStream], vertex_count: u32) -> WgpuGeometry {
        let device = &self.context.device;
        let buffers = streams
            .iter()
            .map(|stream| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("VertexStream"),
                    contents: stream.bytes(),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                (stream.attribute, buffer)
            })
            .collect();

        let needed = vertex_count as u64 * VertexAttribute::Position.stride();
        if needed > self.zero_vertices.size() {
            self.zero_vertices = Self::create_zero_vertices(device, vertex_count);
        }

        WgpuGeometry { buffers }
    }

    fn create_program(&mut self, program: &LinkedProgram) -> WgpuProgram {
        self.collect_released();
        let resources =
            ProgramResources::new(&self.context.device, program, &self.arena.bind_layout);
        let slot = match self.free_program_slots.pop() {
            Some(slot) => {
                self.programs[slot] = Some(resources);
                slot
            }
            None => {
                self.programs.push(Some(resources));
                self.programs.len() - 1
            }
        };
        WgpuProgram {
            release: self.program_releases.guard(slot as u32),
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> WgpuTexture {
        let texture = upload_rgba(&self.context.device, &self.context.queue, image, "Texture");
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.allocate_texture_id();
        WgpuTexture {
            release: self.texture_releases.guard(id),
            kind: TextureKind::Colour,
            view,
            _texture: texture,
        }
    }

    fn create_shadow_target(&mut self, size: u32) -> (WgpuFramebuffer, WgpuTexture) {
        let size = size.max(1);
        let texture = create_depth_texture(
            &self.context.device,
            "ShadowMap",
            size,
            size,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.allocate_texture_id();

        (
            WgpuFramebuffer {
                depth_id: id,
                size,
                view: view.clone(),
            },
            WgpuTexture {
                release: self.texture_releases.guard(id),
                kind: TextureKind::Depth,
                view,
                _texture: texture,
            },
        )
    }

    fn use_program(&mut self, program: &WgpuProgram) {
        self.current_program = Some(program.slot());
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self
            .current_program
            .and_then(|i| self.programs.get_mut(i))
            .and_then(Option::as_mut)
        else {
            log::warn!("Uniform written with no program in use");
            return;
        };
        match (location, value) {
            (UniformLocation::Texture { binding, .. }, UniformValue::Sampler(unit)) => {
                program.sampler_units.insert(binding, unit);
            }
            _ => {
                if !program.block.write(location, value) {
                    log::warn!("Uniform value {:?} does not fit {:?}", value, location);
                }
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &WgpuTexture) {
        self.units.insert(
            unit,
            BoundTexture {
                id: texture.release.id(),
                kind: texture.kind,
                view: texture.view.clone(),
            },
        );
    }

    fn begin_pass(&mut self, target: Option<&WgpuFramebuffer>, pass: &PassDescriptor) {
        let target = match target {
            Some(framebuffer) => PassTarget::Shadow {
                view: framebuffer.view.clone(),
                depth_id: framebuffer.depth_id,
                size: framebuffer.size,
            },
            None => PassTarget::Surface,
        };
        self.passes.push(RecordedPass {
            target,
            descriptor: *pass,
            draws: Vec::new(),
        });
    }

    fn draw(&mut self, geometry: &WgpuGeometry, vertex_count: u32) {
        let Some(index) = self.current_program else {
            log::warn!("Draw issued with no program in use");
            return;
        };
        let Some((target, depth_attachment)) = self
            .passes
            .last()
            .map(|pass| (pass.target.kind(), pass.target.depth_id()))
        else {
            log::warn!("Draw issued outside of a pass");
            return;
        };

        let textures = match self.texture_bind_group(index, depth_attachment) {
            Ok(textures) => textures,
            Err(reason) => {
                log::warn!("Skipping draw: {reason}");
                return;
            }
        };
        let Some(program) = self.programs.get(index).and_then(Option::as_ref) else {
            return;
        };

        let vertex_buffers = program
            .layout
            .vertex_inputs
            .iter()
            .map(|attribute| {
                geometry
                    .buffer(*attribute)
                    .unwrap_or(&self.zero_vertices)
                    .clone()
            })
            .collect();

        let Some(uniform_offset) = self.arena.push(program.block.bytes()) else {
            log::warn!("Skipping draw: uniform block is larger than an arena slot");
            return;
        };

        let draw = RecordedDraw {
            key: PipelineKey {
                program: index,
                target,
            },
            vertex_buffers,
            vertex_count,
            uniform_offset,
            textures,
        };
        if let Some(pass) = self.passes.last_mut() {
            pass.draws.push(draw);
        }
    }
}
