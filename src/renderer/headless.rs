//! A device that records calls instead of talking to a GPU.

use std::collections::HashMap;

use crate::asset::TextureImage;
use crate::renderer::device::{PassDescriptor, ReleaseGuard, ReleaseQueue, RenderDevice};
use crate::renderer::shader::LinkedProgram;
use crate::renderer::uniforms::{UniformLocation, UniformValue};
use crate::renderer::vertex::{VertexAttribute, VertexStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessGeometry {
    pub id: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug)]
pub struct HeadlessProgram {
    release: ReleaseGuard,
}

impl HeadlessProgram {
    pub fn id(&self) -> u32 {
        self.release.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessTexture {
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessFramebuffer {
    pub id: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    UploadGeometry {
        geometry: u32,
        attributes: Vec<VertexAttribute>,
        vertex_count: u32,
    },
    CreateProgram {
        program: u32,
    },
    CreateTexture {
        texture: u32,
        width: u32,
        height: u32,
    },
    CreateShadowTarget {
        framebuffer: u32,
        depth: u32,
        size: u32,
    },
    UseProgram {
        program: u32,
    },
    ReleaseProgram {
        program: u32,
    },
    SetUniform {
        location: UniformLocation,
        value: UniformValue,
    },
    BindTexture {
        unit: u32,
        texture: u32,
    },
    BeginPass {
        framebuffer: Option<u32>,
        pass: PassDescriptor,
    },
    Draw {
        geometry: u32,
        vertex_count: u32,
        program: Option<u32>,
    },
}

/// Recording backend. Texture units and uniform values persist across programs
/// the way they do in a GL context.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    commands: Vec<DeviceCommand>,
    next_id: u32,
    program_textures: HashMap<u32, Vec<u32>>,
    program_releases: ReleaseQueue,
    sampler_units: HashMap<(u32, u32), u32>,
    units: HashMap<u32, u32>,
    current_program: Option<u32>,
    current_depth_attachment: Option<u32>,
    hazards: usize,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Draws in submission order, each tagged with the pass it was recorded in.
    pub fn draws(&self) -> Vec<(Option<u32>, u32)> {
        let mut framebuffer = None;
        let mut draws = Vec::new();
        for command in &self.commands {
            match command {
                DeviceCommand::BeginPass { framebuffer: fb, .. } => framebuffer = *fb,
                DeviceCommand::Draw { geometry, .. } => draws.push((framebuffer, *geometry)),
                _ => {}
            }
        }
        draws
    }

    pub fn passes(&self) -> Vec<(Option<u32>, PassDescriptor)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::BeginPass { framebuffer, pass } => Some((*framebuffer, *pass)),
                _ => None,
            })
            .collect()
    }

    /// Values written to `location` so far, oldest first.
    pub fn uniform_writes(&self, location: UniformLocation) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::SetUniform { location: l, value } if *l == location => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Programs created and not yet dropped.
    pub fn live_programs(&self) -> usize {
        self.program_textures.len() - self.program_releases.pending()
    }

    /// Draws that sampled the depth texture currently being rendered to.
    pub fn hazards(&self) -> usize {
        self.hazards
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn collect_released(&mut self) {
        for program in self.program_releases.drain() {
            self.program_textures.remove(&program);
            self.sampler_units.retain(|(p, _), _| *p != program);
            if self.current_program == Some(program) {
                self.current_program = None;
            }
            self.commands.push(DeviceCommand::ReleaseProgram { program });
        }
    }

    fn samples_attachment(&self, program: u32, depth: u32) -> bool {
        let Some(bindings) = self.program_textures.get(&program) else {
            return false;
        };
        bindings.iter().any(|binding| {
            let unit = self.sampler_units.get(&(program, *binding)).copied().unwrap_or(0);
            self.units.get(&unit) == Some(&depth)
        })
    }
}

impl RenderDevice for HeadlessDevice {
    type Geometry = HeadlessGeometry;
    type Program = HeadlessProgram;
    type Texture = HeadlessTexture;
    type Framebuffer = HeadlessFramebuffer;

    fn upload_geometry(&mut self, streams: &[VertexStream], vertex_count: u32) -> HeadlessGeometry {
        let id = self.allocate();
        let attributes: Vec<VertexAttribute> = streams.iter().map(|s| s.attribute).collect();
        self.commands.push(DeviceCommand::UploadGeometry {
            geometry: id,
            attributes: attributes.clone(),
            vertex_count,
        });
        HeadlessGeometry { id, attributes }
    }

    fn create_program(&mut self, program: &LinkedProgram) -> HeadlessProgram {
        self.collect_released();
        let id = self.allocate();
        let bindings = program.layout().textures.iter().map(|t| t.binding).collect();
        self.program_textures.insert(id, bindings);
        self.commands.push(DeviceCommand::CreateProgram { program: id });
        HeadlessProgram {
            release: self.program_releases.guard(id),
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> HeadlessTexture {
        let id = self.allocate();
        self.commands.push(DeviceCommand::CreateTexture {
            texture: id,
            width: image.width,
            height: image.height,
        });
        HeadlessTexture { id }
    }

    fn create_shadow_target(&mut self, size: u32) -> (HeadlessFramebuffer, HeadlessTexture) {
        let framebuffer = self.allocate();
        let depth = self.allocate();
        self.commands.push(DeviceCommand::CreateShadowTarget {
            framebuffer,
            depth,
            size,
        });
        (
            HeadlessFramebuffer {
                id: framebuffer,
                depth,
            },
            HeadlessTexture { id: depth },
        )
    }

    fn use_program(&mut self, program: &HeadlessProgram) {
        self.collect_released();
        self.current_program = Some(program.id());
        self.commands.push(DeviceCommand::UseProgram {
            program: program.id(),
        });
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let (Some(program), UniformLocation::Texture { binding, .. }, UniformValue::Sampler(unit)) =
            (self.current_program, location, value)
        {
            self.sampler_units.insert((program, binding), unit);
        }
        self.commands.push(DeviceCommand::SetUniform { location, value });
    }

    fn bind_texture(&mut self, unit: u32, texture: &HeadlessTexture) {
        self.units.insert(unit, texture.id);
        self.commands.push(DeviceCommand::BindTexture {
            unit,
            texture: texture.id,
        });
    }

    fn begin_pass(&mut self, target: Option<&HeadlessFramebuffer>, pass: &PassDescriptor) {
        self.collect_released();
        self.current_depth_attachment = target.map(|fb| fb.depth);
        self.commands.push(DeviceCommand::BeginPass {
            framebuffer: target.map(|fb| fb.id),
            pass: *pass,
        });
    }

    fn draw(&mut self, geometry: &HeadlessGeometry, vertex_count: u32) {
        if let (Some(program), Some(depth)) = (self.current_program, self.current_depth_attachment)
        {
            if self.samples_attachment(program, depth) {
                log::warn!("Draw samples the depth texture it renders into");
                self.hazards += 1;
            }
        }
        self.commands.push(DeviceCommand::Draw {
            geometry: geometry.id,
            vertex_count,
            program: self.current_program,
        });
    }
}
