//! wgpu backend.
//!
//! Implements [`crate::command::ExecutionContext`] against a real device:
//! pooled temporary render targets, a depth-only pipeline for atlas tiles,
//! and a lit forward pipeline that consumes the published light and shadow
//! uniforms.

mod executor;
mod forward_pipeline;
mod mesh;
mod shadow_pipeline;
mod target_pool;

pub use executor::{WgpuExecutor, CAMERA_COLOR_FORMAT, DEPTH_FORMAT};
pub use forward_pipeline::{ForwardPipeline, FrameUniforms};
pub use mesh::{GpuMesh, MeshData, ModelUniform, Vertex};
pub use shadow_pipeline::ShadowPipeline;
pub use target_pool::TargetPool;
