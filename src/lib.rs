//! # Vela - wgpu Frame Renderer
//!
//! Vela renders frames for a real-time 3D pipeline: per-camera culling
//! boundary, directional-light aggregation, and a tiled directional
//! shadow-map atlas shared by every shadow-casting light.
//!
//! ## Architecture
//!
//! - **Command**: GPU work recorded as data and drained into an execution
//!   context at phase boundaries
//! - **Culling**: the boundary traits an external scene implements
//! - **Shadows**: slot reservation, atlas layout, sampling-matrix math
//! - **Lighting**: the per-frame directional light catalog
//! - **Frame**: per-camera orchestration of the whole sequence
//! - **Gpu**: the wgpu execution backend
//!
//! ## Example
//!
//! ```ignore
//! use vela::prelude::*;
//!
//! let context = Context::new(&RenderConfig::default()).await?;
//! let mut executor = WgpuExecutor::new(context, 1280, 720);
//! let mut renderer = FrameRenderer::default();
//!
//! renderer.render(&scene, &camera, &mut executor);
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod core;
pub mod culling;
pub mod frame;
pub mod gpu;
pub mod lighting;
pub mod shadows;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::command::*;
    pub use crate::core::*;
    pub use crate::culling::*;
    pub use crate::frame::*;
    pub use crate::gpu::*;
    pub use crate::lighting::*;
    pub use crate::shadows::*;
}

/// Engine version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const NAME: &str = "Vela";
