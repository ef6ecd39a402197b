//! Forward PBR renderer with image based lighting, on wgpu.
//!
//! Per frame the [`Renderer`] packs the frame parameters into one uniform
//! buffer ([`params`]), then draws every entity of a
//! [`Scene`](pbr_engine_scene::Scene) with dynamic offsets into it. The IBL
//! maps ([`ibl`]) are computed once at startup.

pub mod buffer;
pub mod config;
pub mod gpu;
pub mod ibl;
pub mod params;
mod renderer;
pub mod shaders;
pub mod texture;

// `crate::scene::*` resolves to the GPU-free scene crate.
pub use pbr_engine_scene as scene;

pub use buffer::{AlignedBuffer, BufferError, BufferUsageClass, GpuAlignedBuffer};
pub use config::EngineConfig;
pub use gpu::GpuError;
pub use ibl::{EnvironmentMapSet, IblError};
pub use params::{FrameParams, ParamRange, ParamsError};
pub use renderer::{
    link_attributes, plan_draws, BindingCache, DrawCommand, DrawStats, FrameStats, LinkError, Renderer,
    ResourceCounts, SubmeshKey, SubmitError, TextureSlot,
};
