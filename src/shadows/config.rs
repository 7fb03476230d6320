//! Shadow configuration types.

use serde::{Deserialize, Serialize};

/// Shadow atlas resolution.
///
/// Every size is a power of two so the atlas divides exactly into a 2×2
/// tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AtlasSize {
    /// 256×256.
    Size256,
    /// 512×512.
    Size512,
    /// 1024×1024 (default).
    #[default]
    Size1024,
    /// 2048×2048.
    Size2048,
    /// 4096×4096.
    Size4096,
    /// 8192×8192.
    Size8192,
}

impl AtlasSize {
    /// Get the resolution in pixels.
    pub fn resolution(&self) -> u32 {
        match self {
            Self::Size256 => 256,
            Self::Size512 => 512,
            Self::Size1024 => 1024,
            Self::Size2048 => 2048,
            Self::Size4096 => 4096,
            Self::Size8192 => 8192,
        }
    }

    /// Create from a resolution value, rounding up to the nearest size.
    pub fn from_resolution(resolution: u32) -> Self {
        match resolution {
            0..=256 => Self::Size256,
            257..=512 => Self::Size512,
            513..=1024 => Self::Size1024,
            1025..=2048 => Self::Size2048,
            2049..=4096 => Self::Size4096,
            _ => Self::Size8192,
        }
    }
}

/// Configuration for the directional shadow atlas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Atlas resolution.
    pub atlas_size: AtlasSize,
    /// Maximum shadow render distance in world units.
    pub max_distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            atlas_size: AtlasSize::default(),
            max_distance: 100.0,
        }
    }
}

impl ShadowConfig {
    /// Create a new shadow configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the atlas size.
    pub fn atlas_size(mut self, size: AtlasSize) -> Self {
        self.atlas_size = size;
        self
    }

    /// Set the maximum shadow distance. Negative values clamp to zero.
    pub fn max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolutions_divide_into_tiles() {
        for size in [
            AtlasSize::Size256,
            AtlasSize::Size512,
            AtlasSize::Size1024,
            AtlasSize::Size2048,
            AtlasSize::Size4096,
            AtlasSize::Size8192,
        ] {
            assert_eq!(size.resolution() % 2, 0);
            assert_eq!(AtlasSize::from_resolution(size.resolution()), size);
        }
    }

    #[test]
    fn test_max_distance_clamps_to_zero() {
        let config = ShadowConfig::new().max_distance(-5.0);
        assert_eq!(config.max_distance, 0.0);
    }
}
