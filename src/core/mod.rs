//! # Core Module
//!
//! wgpu context management and renderer-wide configuration.

mod context;

pub use context::{Context, ContextError};

/// Render configuration options.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Allow dynamic batching in the geometry submission path.
    pub dynamic_batching: bool,
    /// Allow GPU instancing in the geometry submission path.
    pub gpu_instancing: bool,
    /// Power preference for GPU selection.
    pub power_preference: wgpu::PowerPreference,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dynamic_batching: true,
            gpu_instancing: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}
