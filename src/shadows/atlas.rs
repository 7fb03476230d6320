//! Directional shadow atlas rendering.
//!
//! All shadowed directional lights share one atlas texture, subdivided into
//! a tile grid. Each frame the atlas is re-laid-out from the active slot
//! count, every tile is rendered from its light's view, and the matrices
//! that map world space into each tile's UV+depth region are published in
//! one batch for the shading stage.

use glam::{Mat4, Vec2};

use crate::command::{Command, CommandList, ExecutionContext, TargetDesc, TargetId, Viewport};
use crate::culling::{Culling, VisibleLight};

use super::config::ShadowConfig;
use super::slots::{ShadowDescriptor, ShadowSlots};
use super::MAX_SHADOWED_LIGHTS;

/// Name of the shadow atlas render target.
pub const DIRECTIONAL_SHADOW_ATLAS: TargetId = TargetId("directional_shadow_atlas");

/// Name of the sampling-matrix array uniform.
pub const DIRECTIONAL_SHADOW_MATRICES: &str = "directional_shadow_matrices";

const SAMPLE_NAME: &str = "Shadows";

/// Tile arrangement of the atlas for one frame.
///
/// Derived from the active slot count every frame, never stored across
/// frames. The grid side is 1 for at most one slot and 2 otherwise, so the
/// tile size always divides the resolution exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Atlas resolution in pixels.
    pub resolution: u32,
    /// Tile grid side length, 1 or 2.
    pub split: u32,
    /// Side length of one tile in pixels.
    pub tile_size: u32,
}

impl AtlasLayout {
    /// Compute the layout for an atlas resolution and active slot count.
    pub fn for_slot_count(resolution: u32, count: usize) -> Self {
        let split = if count <= 1 { 1 } else { 2 };
        Self {
            resolution,
            split,
            tile_size: resolution / split,
        }
    }

    /// Grid position of a slot's tile, in tile units.
    #[inline]
    pub fn tile_offset(&self, index: usize) -> Vec2 {
        let index = index as u32;
        Vec2::new((index % self.split) as f32, (index / self.split) as f32)
    }

    /// Pixel-space viewport of a slot's tile.
    pub fn tile_viewport(&self, index: usize) -> Viewport {
        let offset = self.tile_offset(index);
        let tile = self.tile_size as f32;
        Viewport {
            x: offset.x * tile,
            y: offset.y * tile,
            width: tile,
            height: tile,
        }
    }
}

/// Remap a light's clip space into one tile of the shared atlas.
///
/// `m` is the combined projection×view matrix, `offset` the tile's grid
/// position in tile units, and `split` the grid side. When the backend's
/// depth buffer is reversed the z row is negated first so atlas-space depth
/// comparisons stay consistent. The x/y rows are rescaled and biased from
/// clip-space `[-1, 1]` into the tile's sub-rectangle of the `0..1` atlas
/// UV square; z/w rows are otherwise untouched.
pub fn to_atlas_matrix(m: Mat4, offset: Vec2, split: u32, reversed_depth: bool) -> Mat4 {
    let mut rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
    if reversed_depth {
        rows[2] = -rows[2];
    }
    let w = rows[3];
    let scale = 1.0 / split as f32;
    rows[0] = (0.5 * (rows[0] + w) + offset.x * w) * scale;
    rows[1] = (0.5 * (rows[1] + w) + offset.y * w) * scale;
    Mat4::from_cols(rows[0], rows[1], rows[2], rows[3]).transpose()
}

/// Renders the directional shadow atlas for one frame.
///
/// Owns the slot table and the sampling-matrix array. A frame either has no
/// active slots (a 1×1 placeholder target keeps the shading stage's binding
/// contract uniform) or takes the full atlas path; the choice is re-made
/// every frame from the slot count.
#[derive(Debug)]
pub struct ShadowAtlas {
    slots: ShadowSlots,
    matrices: [Mat4; MAX_SHADOWED_LIGHTS],
    buffer: CommandList,
    settings: ShadowConfig,
}

impl Default for ShadowAtlas {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowAtlas {
    /// Create an atlas renderer.
    pub fn new() -> Self {
        Self {
            slots: ShadowSlots::new(),
            matrices: [Mat4::IDENTITY; MAX_SHADOWED_LIGHTS],
            buffer: CommandList::new(SAMPLE_NAME),
            settings: ShadowConfig::default(),
        }
    }

    /// Begin a frame: snapshot the configuration and clear all reservations.
    pub fn setup(&mut self, config: &ShadowConfig) {
        self.settings = *config;
        self.slots.reset();
    }

    /// Reserve an atlas slot for a light. See [`ShadowSlots::reserve`].
    pub fn reserve<C: Culling>(&mut self, light: &VisibleLight, culling: &C) -> ShadowDescriptor {
        self.slots.reserve(light, culling)
    }

    /// Render every reserved tile and publish the sampling matrices.
    ///
    /// Must run after all reservations for the frame; tiles render in
    /// slot-index order and the matrix array is published once, after the
    /// last tile.
    pub fn render<C: Culling>(&mut self, culling: &C, ctx: &mut dyn ExecutionContext) {
        if self.slots.is_empty() {
            self.render_placeholder(ctx);
        } else {
            self.render_tiles(culling, ctx);
        }
    }

    /// No active slots: a cleared 1×1 target so shaders always have
    /// something bound, with no meaningful matrices.
    fn render_placeholder(&mut self, ctx: &mut dyn ExecutionContext) {
        self.buffer.push(Command::AcquireTarget {
            target: DIRECTIONAL_SHADOW_ATLAS,
            desc: TargetDesc::shadow(1),
        });
        self.buffer.push(Command::SetRenderTarget {
            target: DIRECTIONAL_SHADOW_ATLAS,
        });
        self.buffer.push(Command::Clear {
            depth: true,
            color: None,
        });
        self.buffer.flush(ctx);
    }

    /// Full atlas layout, one tile per slot.
    fn render_tiles<C: Culling>(&mut self, culling: &C, ctx: &mut dyn ExecutionContext) {
        let layout =
            AtlasLayout::for_slot_count(self.settings.atlas_size.resolution(), self.slots.len());
        log::trace!(
            "shadow atlas: {} slots, {}px tiles",
            self.slots.len(),
            layout.tile_size
        );

        self.buffer.push(Command::AcquireTarget {
            target: DIRECTIONAL_SHADOW_ATLAS,
            desc: TargetDesc::shadow(layout.resolution),
        });
        self.buffer.push(Command::SetRenderTarget {
            target: DIRECTIONAL_SHADOW_ATLAS,
        });
        self.buffer.push(Command::Clear {
            depth: true,
            color: None,
        });
        self.buffer.begin_sample(SAMPLE_NAME);
        self.buffer.flush(ctx);

        let reversed_depth = ctx.uses_reversed_depth();
        for index in 0..self.slots.len() {
            let handle = self.slots.active()[index].handle();
            let projection = culling.shadow_projection(handle, layout.tile_size);

            self.buffer.push(Command::SetViewport(layout.tile_viewport(index)));
            self.buffer.push(Command::SetViewProjection {
                view: projection.view,
                projection: projection.projection,
            });
            self.buffer.flush(ctx);
            self.buffer.push(Command::DrawShadowCasters {
                handle,
                split: projection.split,
            });
            self.buffer.flush(ctx);

            self.matrices[index] = to_atlas_matrix(
                projection.projection * projection.view,
                layout.tile_offset(index),
                layout.split,
                reversed_depth,
            );
        }

        self.buffer.push(Command::SetGlobalMat4Array {
            name: DIRECTIONAL_SHADOW_MATRICES,
            values: self.matrices.to_vec(),
        });
        self.buffer.end_sample(SAMPLE_NAME);
        self.buffer.flush(ctx);
    }

    /// Release the atlas target. Must run once per frame on every path.
    pub fn cleanup(&mut self, ctx: &mut dyn ExecutionContext) {
        self.buffer.push(Command::ReleaseTarget {
            target: DIRECTIONAL_SHADOW_ATLAS,
        });
        self.buffer.flush(ctx);
    }

    /// The slot table for this frame.
    #[inline]
    pub fn slots(&self) -> &ShadowSlots {
        &self.slots
    }

    /// The sampling matrices of the active slots.
    #[inline]
    pub fn sampling_matrices(&self) -> &[Mat4] {
        &self.matrices[..self.slots.len()]
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec4};

    use crate::command::recording::RecordingContext;
    use crate::culling::fixtures::{shadowed_light, TestCulling};

    use super::*;

    fn populate(atlas: &mut ShadowAtlas, culling: &TestCulling) {
        atlas.setup(&ShadowConfig::default());
        for light in culling.lights.clone() {
            atlas.reserve(&light, culling);
        }
    }

    #[test]
    fn test_layout_split_factor() {
        for (count, split) in [(0, 1), (1, 1), (2, 2), (3, 2), (4, 2)] {
            let layout = AtlasLayout::for_slot_count(1024, count);
            assert_eq!(layout.split, split, "count {count}");
            assert_eq!(layout.tile_size * layout.split, 1024);
        }
    }

    #[test]
    fn test_tile_viewports_cover_grid() {
        let layout = AtlasLayout::for_slot_count(1024, 4);
        let expected = [(0.0, 0.0), (512.0, 0.0), (0.0, 512.0), (512.0, 512.0)];
        for (index, (x, y)) in expected.into_iter().enumerate() {
            let viewport = layout.tile_viewport(index);
            assert_eq!((viewport.x, viewport.y), (x, y));
            assert_eq!((viewport.width, viewport.height), (512.0, 512.0));
        }
    }

    #[test]
    fn test_atlas_matrix_is_deterministic() {
        let m = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0)
            * Mat4::look_at_rh(glam::Vec3::ONE, glam::Vec3::ZERO, glam::Vec3::Y);
        let offset = Vec2::new(1.0, 1.0);
        let first = to_atlas_matrix(m, offset, 2, false);
        let second = to_atlas_matrix(m, offset, 2, false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clip_center_maps_to_tile_center() {
        let center = Vec4::new(0.0, 0.0, 0.0, 1.0);
        // Full atlas: clip center lands at the middle of the UV square.
        let full = to_atlas_matrix(Mat4::IDENTITY, Vec2::ZERO, 1, false) * center;
        assert!((full.x - 0.5).abs() < 1e-6);
        assert!((full.y - 0.5).abs() < 1e-6);

        // 2x2 grid: each tile's clip center lands at that tile's UV center.
        let layout = AtlasLayout::for_slot_count(1024, 4);
        let centers = [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)];
        for (index, (u, v)) in centers.into_iter().enumerate() {
            let mapped =
                to_atlas_matrix(Mat4::IDENTITY, layout.tile_offset(index), 2, false) * center;
            assert!((mapped.x - u).abs() < 1e-6, "tile {index}");
            assert!((mapped.y - v).abs() < 1e-6, "tile {index}");
        }
    }

    #[test]
    fn test_reversed_depth_negates_z_row() {
        let converted = to_atlas_matrix(Mat4::IDENTITY, Vec2::ZERO, 1, true);
        assert_eq!(converted.row(2), Vec4::new(0.0, 0.0, -1.0, 0.0));
        // x/y remapping is unaffected by the depth convention.
        let standard = to_atlas_matrix(Mat4::IDENTITY, Vec2::ZERO, 1, false);
        assert_eq!(converted.row(0), standard.row(0));
        assert_eq!(converted.row(1), standard.row(1));
    }

    #[test]
    fn test_empty_path_uses_placeholder_target() {
        let culling = TestCulling::new(Vec::new());
        let mut atlas = ShadowAtlas::new();
        let mut ctx = RecordingContext::new();

        populate(&mut atlas, &culling);
        atlas.render(&culling, &mut ctx);
        atlas.cleanup(&mut ctx);

        assert_eq!(
            ctx.commands[0],
            Command::AcquireTarget {
                target: DIRECTIONAL_SHADOW_ATLAS,
                desc: TargetDesc::shadow(1),
            }
        );
        assert!(ctx
            .position(|c| matches!(c, Command::SetGlobalMat4Array { .. }))
            .is_none());
        assert!(ctx
            .position(|c| matches!(c, Command::DrawShadowCasters { .. }))
            .is_none());
        assert_eq!(ctx.acquires(DIRECTIONAL_SHADOW_ATLAS), 1);
        assert_eq!(ctx.releases(DIRECTIONAL_SHADOW_ATLAS), 1);
        assert!(atlas.sampling_matrices().is_empty());
    }

    #[test]
    fn test_single_slot_uses_full_atlas() {
        let culling = TestCulling::new(vec![shadowed_light(0)]);
        let mut atlas = ShadowAtlas::new();
        let mut ctx = RecordingContext::new();

        populate(&mut atlas, &culling);
        atlas.render(&culling, &mut ctx);

        let resolution = ShadowConfig::default().atlas_size.resolution();
        assert_eq!(ctx.acquires(DIRECTIONAL_SHADOW_ATLAS), 1);
        assert_eq!(
            ctx.commands[0],
            Command::AcquireTarget {
                target: DIRECTIONAL_SHADOW_ATLAS,
                desc: TargetDesc::shadow(resolution),
            }
        );
        // Split 1: the lone tile spans the whole atlas.
        assert_eq!(culling.last_tile_size.get(), resolution);
        assert_eq!(atlas.sampling_matrices().len(), 1);
    }

    #[test]
    fn test_four_slots_render_in_order_then_publish() {
        let culling = TestCulling::new((0..4).map(shadowed_light).collect());
        let mut atlas = ShadowAtlas::new();
        let mut ctx = RecordingContext::new();

        populate(&mut atlas, &culling);
        atlas.render(&culling, &mut ctx);

        // Tiles are half-resolution and drawn in slot order.
        assert_eq!(culling.last_tile_size.get(), 512);
        let draws: Vec<_> = ctx
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawShadowCasters { handle, .. } => Some(handle.index()),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![0, 1, 2, 3]);

        // The bulk matrix publish happens exactly once, after the last draw.
        let publish = ctx
            .position(|c| matches!(c, Command::SetGlobalMat4Array { name, .. } if *name == DIRECTIONAL_SHADOW_MATRICES))
            .expect("matrices published");
        let last_draw = ctx
            .commands
            .iter()
            .rposition(|c| matches!(c, Command::DrawShadowCasters { .. }))
            .unwrap();
        assert!(publish > last_draw);
        assert!(ctx.samples_balanced());
        assert_eq!(atlas.sampling_matrices().len(), 4);
    }

    #[test]
    fn test_backend_depth_convention_flips_matrices() {
        let culling = TestCulling::new(vec![shadowed_light(0)]);
        let mut standard = ShadowAtlas::new();
        let mut reversed = ShadowAtlas::new();
        let mut standard_ctx = RecordingContext::new();
        let mut reversed_ctx = RecordingContext::new();
        reversed_ctx.reversed_depth = true;

        populate(&mut standard, &culling);
        standard.render(&culling, &mut standard_ctx);
        populate(&mut reversed, &culling);
        reversed.render(&culling, &mut reversed_ctx);

        let standard_matrix = standard.sampling_matrices()[0];
        let reversed_matrix = reversed.sampling_matrices()[0];
        assert_eq!(reversed_matrix.row(2), -standard_matrix.row(2));
        assert_eq!(reversed_matrix.row(0), standard_matrix.row(0));
    }

    #[test]
    fn test_viewport_precedes_each_tile_draw() {
        let culling = TestCulling::new((0..2).map(shadowed_light).collect());
        let mut atlas = ShadowAtlas::new();
        let mut ctx = RecordingContext::new();

        populate(&mut atlas, &culling);
        atlas.render(&culling, &mut ctx);

        let layout = AtlasLayout::for_slot_count(1024, 2);
        let viewports: Vec<_> = ctx
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::SetViewport(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(viewports, vec![layout.tile_viewport(0), layout.tile_viewport(1)]);
    }
}
