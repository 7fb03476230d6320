//! Directional light aggregation.

use crate::command::{Command, CommandList};
use crate::culling::{Culling, LightKind};
use crate::shadows::ShadowAtlas;

use super::{
    DIRECTIONAL_LIGHT_COLORS, DIRECTIONAL_LIGHT_COUNT, DIRECTIONAL_LIGHT_DIRECTIONS,
    DIRECTIONAL_LIGHT_SHADOW_DATA, MAX_DIRECTIONAL_LIGHTS,
};

/// Dense per-frame tables of the directional lights used by shading.
///
/// The catalog walks the visible-light list in culling order, keeps the
/// first [`MAX_DIRECTIONAL_LIGHTS`] directional lights, and fills three
/// parallel arrays indexed by catalog position: color, direction, and the
/// shadow descriptor obtained from the slot allocator. Lights past the
/// maximum are silently ignored. Counts reset every frame; the arrays are
/// reused without reallocation.
#[derive(Debug)]
pub struct LightCatalog {
    colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    directions: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    shadow_data: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    count: usize,
    visible_count: usize,
}

impl Default for LightCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl LightCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            colors: [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS],
            directions: [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS],
            shadow_data: [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS],
            count: 0,
            visible_count: 0,
        }
    }

    /// Rebuild the tables from this frame's visible lights.
    ///
    /// Issues exactly one shadow reservation per kept light. Non-directional
    /// lights are filtered out here, so the slot allocator only ever sees
    /// directional lights.
    pub fn collect<C: Culling>(&mut self, culling: &C, shadows: &mut ShadowAtlas) {
        self.count = 0;
        let lights = culling.visible_lights();
        self.visible_count = lights.len();

        for light in lights {
            if light.kind != LightKind::Directional {
                continue;
            }
            let color = light.color;
            // Shading wants the direction toward the light.
            let direction = -light.direction;
            self.colors[self.count] = [color.x, color.y, color.z, 1.0];
            self.directions[self.count] = [direction.x, direction.y, direction.z, 0.0];
            self.shadow_data[self.count] = shadows.reserve(light, culling).to_vec4();
            self.count += 1;
            if self.count >= MAX_DIRECTIONAL_LIGHTS {
                break;
            }
        }
    }

    /// Record the global uniform updates for the shading stage.
    ///
    /// The full fixed-size arrays are published in one batch; entries past
    /// [`LightCatalog::count`] are stale and gated out by the light count.
    pub fn publish(&self, buffer: &mut CommandList) {
        buffer.push(Command::SetGlobalInt {
            name: DIRECTIONAL_LIGHT_COUNT,
            value: self.visible_count as i32,
        });
        buffer.push(Command::SetGlobalVec4Array {
            name: DIRECTIONAL_LIGHT_COLORS,
            values: self.colors.to_vec(),
        });
        buffer.push(Command::SetGlobalVec4Array {
            name: DIRECTIONAL_LIGHT_DIRECTIONS,
            values: self.directions.to_vec(),
        });
        buffer.push(Command::SetGlobalVec4Array {
            name: DIRECTIONAL_LIGHT_SHADOW_DATA,
            values: self.shadow_data.to_vec(),
        });
    }

    /// Number of cataloged directional lights.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Total visible lights this frame, all kinds.
    #[inline]
    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    /// The color table.
    #[inline]
    pub fn colors(&self) -> &[[f32; 4]] {
        &self.colors[..self.count]
    }

    /// The direction table.
    #[inline]
    pub fn directions(&self) -> &[[f32; 4]] {
        &self.directions[..self.count]
    }

    /// The shadow-descriptor table.
    #[inline]
    pub fn shadow_data(&self) -> &[[f32; 4]] {
        &self.shadow_data[..self.count]
    }
}
