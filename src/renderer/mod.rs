pub mod depth;
pub mod device;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub(crate) mod internal;
pub mod material;
pub mod pipeline_builder;
pub mod shader;
pub mod texture;
pub mod uniforms;
pub mod vertex;

pub use device::{ClearFlags, PassDescriptor, RenderDevice, Viewport};
pub use geometry::GeometryAsset;
pub use gpu::WgpuDevice;
pub use headless::{DeviceCommand, HeadlessDevice};
pub use internal::ContextError;
pub use material::{ShaderMaterial, Transforms, SHADOW_MAP_UNIT, TEXTURE_UNIT};
pub use shader::{LinkedProgram, ProgramLayout, ShaderError, ShaderStage};
pub use uniforms::{Uniform, UniformKind, UniformLocation, UniformValue};
pub use vertex::{VertexAttribute, VertexStream};
