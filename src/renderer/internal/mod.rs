pub mod bind_groups;
pub mod buffers;
pub mod context;
pub mod pipeline;

pub(crate) use bind_groups::{BindGroupCache, BindGroupKey};
pub(crate) use buffers::UniformArena;
pub(crate) use context::RenderContext;
pub use context::ContextError;
pub(crate) use pipeline::{
    sampler_binding_type, PipelineCache, PipelineKey, ProgramResources, TargetKind,
};
