//! Per-frame lighting setup.
//!
//! [`Lighting`] ties the light catalog and the shadow atlas together: one
//! call per camera collects the directional lights, reserves their shadow
//! slots, renders the atlas, and publishes the shading uniforms.

mod catalog;

pub use catalog::LightCatalog;

use crate::command::{CommandList, ExecutionContext};
use crate::culling::Culling;
use crate::shadows::{ShadowAtlas, ShadowConfig};

/// Maximum number of directional lights visible to shading.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Name of the visible-light-count uniform.
pub const DIRECTIONAL_LIGHT_COUNT: &str = "directional_light_count";
/// Name of the light-color array uniform.
pub const DIRECTIONAL_LIGHT_COLORS: &str = "directional_light_colors";
/// Name of the light-direction array uniform.
pub const DIRECTIONAL_LIGHT_DIRECTIONS: &str = "directional_light_directions";
/// Name of the shadow-descriptor array uniform.
pub const DIRECTIONAL_LIGHT_SHADOW_DATA: &str = "directional_light_shadow_data";

const SAMPLE_NAME: &str = "Lighting";

/// Frame lighting stage: catalog, slot reservation, and atlas rendering.
#[derive(Debug)]
pub struct Lighting {
    catalog: LightCatalog,
    shadows: ShadowAtlas,
    buffer: CommandList,
}

impl Lighting {
    /// Create the lighting stage.
    pub fn new() -> Self {
        Self {
            catalog: LightCatalog::new(),
            shadows: ShadowAtlas::new(),
            buffer: CommandList::new(SAMPLE_NAME),
        }
    }

    /// Run lighting setup for one camera.
    ///
    /// Reservation completes for every light before atlas rendering begins;
    /// the shading uniforms are published before the first geometry draw can
    /// observe them.
    pub fn setup<C: Culling>(
        &mut self,
        culling: &C,
        config: &ShadowConfig,
        ctx: &mut dyn ExecutionContext,
    ) {
        self.buffer.begin_sample(SAMPLE_NAME);
        self.buffer.flush(ctx);

        self.shadows.setup(config);
        self.catalog.collect(culling, &mut self.shadows);
        self.catalog.publish(&mut self.buffer);
        self.buffer.flush(ctx);

        self.shadows.render(culling, ctx);

        self.buffer.end_sample(SAMPLE_NAME);
        self.buffer.flush(ctx);
    }

    /// Release frame resources. Must run once per rendered camera.
    pub fn cleanup(&mut self, ctx: &mut dyn ExecutionContext) {
        self.shadows.cleanup(ctx);
    }

    /// The light catalog of the last setup.
    #[inline]
    pub fn catalog(&self) -> &LightCatalog {
        &self.catalog
    }

    /// The shadow atlas of the last setup.
    #[inline]
    pub fn shadows(&self) -> &ShadowAtlas {
        &self.shadows
    }
}

impl Default for Lighting {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::command::recording::RecordingContext;
    use crate::command::Command;
    use crate::culling::fixtures::{shadowed_light, TestCulling};
    use crate::shadows::DIRECTIONAL_SHADOW_ATLAS;

    use super::*;

    fn run_frame(culling: &TestCulling) -> RecordingContext {
        let mut lighting = Lighting::new();
        let mut ctx = RecordingContext::new();
        lighting.setup(culling, &ShadowConfig::default(), &mut ctx);
        lighting.cleanup(&mut ctx);
        ctx
    }

    #[test]
    fn test_uniforms_publish_before_atlas_render() {
        let culling = TestCulling::new((0..2).map(shadowed_light).collect());
        let ctx = run_frame(&culling);

        let publish = ctx
            .position(|c| {
                matches!(c, Command::SetGlobalVec4Array { name, .. } if *name == DIRECTIONAL_LIGHT_SHADOW_DATA)
            })
            .expect("shadow data published");
        let acquire = ctx
            .position(|c| matches!(c, Command::AcquireTarget { .. }))
            .expect("atlas acquired");
        assert!(publish < acquire);
    }

    #[test]
    fn test_sample_regions_balance() {
        let culling = TestCulling::new((0..3).map(shadowed_light).collect());
        let ctx = run_frame(&culling);
        assert!(ctx.samples_balanced());
    }

    #[test]
    fn test_atlas_released_on_empty_frame() {
        let culling = TestCulling::new(Vec::new());
        let ctx = run_frame(&culling);
        assert_eq!(ctx.acquires(DIRECTIONAL_SHADOW_ATLAS), 1);
        assert_eq!(ctx.releases(DIRECTIONAL_SHADOW_ATLAS), 1);
    }

    #[test]
    fn test_visible_count_includes_all_kinds() {
        let culling = TestCulling::new((0..5).map(shadowed_light).collect());
        let ctx = run_frame(&culling);

        let count = ctx.commands.iter().find_map(|c| match c {
            Command::SetGlobalInt { name, value } if *name == DIRECTIONAL_LIGHT_COUNT => {
                Some(*value)
            }
            _ => None,
        });
        assert_eq!(count, Some(5));
    }
}
