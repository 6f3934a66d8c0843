//! The seam between the scene and a graphics backend.
//!
//! Calls follow the shape of an immediate-mode API: select a program, write its
//! uniforms, bind textures to units, then draw. Backends decide how that maps to
//! their own command model.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::asset::TextureImage;
use crate::renderer::shader::LinkedProgram;
use crate::renderer::uniforms::{UniformLocation, UniformValue};
use crate::renderer::vertex::VertexStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// The part of the viewport inside a `width` x `height` target, if any.
    pub fn clamped_to(self, width: u32, height: u32) -> Option<Viewport> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let clamped = Viewport {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        };
        (clamped.width > 0 && clamped.height > 0).then_some(clamped)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDescriptor {
    pub viewport: Viewport,
    pub clear: ClearFlags,
    pub clear_colour: [f32; 4],
}

/// Ids of handles dropped since their device last collected them.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Rc<RefCell<Vec<u32>>>);

impl ReleaseQueue {
    /// A guard that queues `id` when it is dropped.
    pub fn guard(&self, id: u32) -> ReleaseGuard {
        ReleaseGuard {
            id,
            queue: self.clone(),
        }
    }

    pub fn drain(&self) -> Vec<u32> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    /// Dropped handles not yet drained.
    pub fn pending(&self) -> usize {
        self.0.borrow().len()
    }
}

/// Owned by a backend handle; reports the handle's id to its device on drop.
#[derive(Debug)]
pub struct ReleaseGuard {
    id: u32,
    queue: ReleaseQueue,
}

impl ReleaseGuard {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.queue.0.borrow_mut().push(self.id);
    }
}

/// Handles are owned: dropping a program or texture handle releases its GPU
/// objects the next time the device collects releases.
pub trait RenderDevice {
    type Geometry;
    type Program;
    type Texture;
    type Framebuffer;

    /// Uploads one buffer per stream. Streams are never modified afterwards.
    fn upload_geometry(&mut self, streams: &[VertexStream], vertex_count: u32) -> Self::Geometry;

    fn create_program(&mut self, program: &LinkedProgram) -> Self::Program;

    fn create_texture(&mut self, image: &TextureImage) -> Self::Texture;

    /// Creates a square depth-only render target and the texture that samples it.
    fn create_shadow_target(&mut self, size: u32) -> (Self::Framebuffer, Self::Texture);

    fn use_program(&mut self, program: &Self::Program);

    /// Writes a uniform of the program selected by the last `use_program`.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture);

    /// Starts a pass on `target`, or on the window surface when `None`.
    fn begin_pass(&mut self, target: Option<&Self::Framebuffer>, pass: &PassDescriptor);

    fn draw(&mut self, geometry: &Self::Geometry, vertex_count: u32);
}
