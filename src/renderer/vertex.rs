use std::mem;

use glam::{Vec2, Vec3};

/// Per-vertex attribute streams. Each lives in its own buffer at a fixed location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    TexCoord,
}

impl VertexAttribute {
    pub const ALL: [VertexAttribute; 3] = [
        VertexAttribute::Position,
        VertexAttribute::Normal,
        VertexAttribute::TexCoord,
    ];

    const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    const NORMAL_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
    const TEXCOORD_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x2];

    pub const fn location(self) -> u32 {
        match self {
            VertexAttribute::Position => 0,
            VertexAttribute::Normal => 1,
            VertexAttribute::TexCoord => 2,
        }
    }

    pub fn from_location(location: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.location() == location)
    }

    pub const fn components(self) -> usize {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => 3,
            VertexAttribute::TexCoord => 2,
        }
    }

    pub const fn stride(self) -> wgpu::BufferAddress {
        (self.components() * mem::size_of::<f32>()) as wgpu::BufferAddress
    }

    pub fn layout(self) -> wgpu::VertexBufferLayout<'static> {
        let attributes: &'static [wgpu::VertexAttribute] = match self {
            VertexAttribute::Position => &Self::POSITION_ATTRS,
            VertexAttribute::Normal => &Self::NORMAL_ATTRS,
            VertexAttribute::TexCoord => &Self::TEXCOORD_ATTRS,
        };
        wgpu::VertexBufferLayout {
            array_stride: self.stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}

/// Tightly packed floats for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexStream {
    pub attribute: VertexAttribute,
    pub data: Vec<f32>,
}

impl VertexStream {
    pub fn positions(values: &[Vec3]) -> Self {
        Self {
            attribute: VertexAttribute::Position,
            data: values.iter().flat_map(|v| v.to_array()).collect(),
        }
    }

    pub fn normals(values: &[Vec3]) -> Self {
        Self {
            attribute: VertexAttribute::Normal,
            data: values.iter().flat_map(|v| v.to_array()).collect(),
        }
    }

    pub fn tex_coords(values: &[Vec2]) -> Self {
        Self {
            attribute: VertexAttribute::TexCoord,
            data: values.iter().flat_map(|v| v.to_array()).collect(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.attribute.components()
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_matches_component_count() {
        for attribute in VertexAttribute::ALL {
            let layout = attribute.layout();
            assert_eq!(layout.array_stride, attribute.components() as u64 * 4);
            assert_eq!(layout.attributes[0].shader_location, attribute.location());
        }
    }

    #[test]
    fn locations_round_trip() {
        for attribute in VertexAttribute::ALL {
            assert_eq!(VertexAttribute::from_location(attribute.location()), Some(attribute));
        }
        assert_eq!(VertexAttribute::from_location(3), None);
    }

    #[test]
    fn streams_pack_tightly() {
        let stream = VertexStream::tex_coords(&[Vec2::new(0.0, 1.0), Vec2::new(0.5, 0.25)]);
        assert_eq!(stream.vertex_count(), 2);
        assert_eq!(stream.data, vec![0.0, 1.0, 0.5, 0.25]);
        assert_eq!(stream.bytes().len(), 16);
    }
}
