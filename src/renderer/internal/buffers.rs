use std::num::NonZeroU64;

use crate::renderer::internal::RenderContext;

/// Bytes reserved for one draw's uniform block.
pub(crate) const UNIFORM_SLOT_SIZE: u64 = 1024;

/// Per-frame arena of uniform block snapshots, bound with a dynamic offset per draw.
pub(crate) struct UniformArena {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) capacity: u32,
    pub(crate) bind_group: wgpu::BindGroup,
    pub(crate) bind_layout: wgpu::BindGroupLayout,
    stride: u64,
    scratch: Vec<u8>,
}

impl UniformArena {
    pub(crate) fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let stride = slot_stride(device.limits().min_uniform_buffer_offset_alignment);

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("UniformArenaBindLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_SLOT_SIZE),
                },
                count: None,
            }],
        });

        let buffer = Self::create_buffer(device, capacity, stride);
        let bind_group = Self::create_bind_group(device, &bind_layout, &buffer);

        Self {
            buffer,
            capacity,
            bind_group,
            bind_layout,
            stride,
            scratch: Vec::with_capacity((capacity as u64 * stride) as usize),
        }
    }

    /// Copies a block into the next slot and returns its dynamic offset.
    pub(crate) fn push(&mut self, block: &[u8]) -> Option<u32> {
        push_slot(&mut self.scratch, self.stride, block)
    }

    pub(crate) fn flush(&mut self, context: &RenderContext) {
        let required = (self.scratch.len() as u64 / self.stride) as u32;
        if required > self.capacity {
            self.grow(context, required);
        }

        if !self.scratch.is_empty() {
            context.queue.write_buffer(&self.buffer, 0, &self.scratch);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.scratch.clear();
    }

    fn grow(&mut self, context: &RenderContext, required: u32) {
        let new_capacity = required.max(self.capacity * 2).max(1);
        log::info!(
            "Growing uniform arena: {} -> {} slots",
            self.capacity,
            new_capacity
        );

        self.buffer = Self::create_buffer(&context.device, new_capacity, self.stride);
        self.bind_group = Self::create_bind_group(&context.device, &self.bind_layout, &self.buffer);
        self.capacity = new_capacity;
    }

    fn create_buffer(device: &wgpu::Device, capacity: u32, stride: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("UniformArenaBuffer"),
            size: capacity.max(1) as u64 * stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("UniformArenaBindGroup"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(UNIFORM_SLOT_SIZE),
                }),
            }],
        })
    }
}

fn slot_stride(alignment: u32) -> u64 {
    UNIFORM_SLOT_SIZE.next_multiple_of(u64::from(alignment.max(1)))
}

fn push_slot(scratch: &mut Vec<u8>, stride: u64, block: &[u8]) -> Option<u32> {
    if block.len() as u64 > UNIFORM_SLOT_SIZE {
        return None;
    }
    let offset = scratch.len();
    scratch.resize(offset + stride as usize, 0);
    scratch[offset..offset + block.len()].copy_from_slice(block);
    u32::try_from(offset).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_respects_alignment() {
        assert_eq!(slot_stride(256), 1024);
        assert_eq!(slot_stride(768), 1536);
        assert_eq!(slot_stride(0), 1024);
    }

    #[test]
    fn slots_are_packed_at_stride() {
        let mut scratch = Vec::new();
        assert_eq!(push_slot(&mut scratch, 1024, &[1, 2, 3]), Some(0));
        assert_eq!(push_slot(&mut scratch, 1024, &[4]), Some(1024));
        assert_eq!(scratch.len(), 2048);
        assert_eq!(&scratch[1024..1026], &[4, 0]);
    }

    #[test]
    fn oversized_block_is_refused() {
        let mut scratch = Vec::new();
        let block = vec![0u8; UNIFORM_SLOT_SIZE as usize + 4];
        assert_eq!(push_slot(&mut scratch, 1024, &block), None);
        assert!(scratch.is_empty());
    }
}
