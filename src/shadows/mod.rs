//! Directional shadow mapping.
//!
//! Shadowed directional lights reserve slots in a fixed-capacity table, and
//! every reserved slot becomes one tile of a shared shadow-map atlas. The
//! module owns slot reservation, atlas layout, the light-space to atlas-space
//! matrix conversion, and the command sequencing that renders each tile.
//!
//! # Example
//!
//! ```ignore
//! use vela::shadows::{AtlasSize, ShadowConfig};
//!
//! let config = ShadowConfig::new()
//!     .atlas_size(AtlasSize::Size2048)
//!     .max_distance(150.0);
//! ```

mod atlas;
mod config;
mod slots;

pub use atlas::{
    to_atlas_matrix, AtlasLayout, ShadowAtlas, DIRECTIONAL_SHADOW_ATLAS,
    DIRECTIONAL_SHADOW_MATRICES,
};
pub use config::{AtlasSize, ShadowConfig};
pub use slots::{ShadowDescriptor, ShadowSlot, ShadowSlots};

/// Maximum number of directional lights with an atlas slot.
pub const MAX_SHADOWED_LIGHTS: usize = 4;
