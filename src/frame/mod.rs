//! Per-camera frame orchestration.
//!
//! [`FrameRenderer`] drives the full per-camera sequence: cull, lighting
//! setup (catalog, shadow slots, atlas), camera target setup and clear,
//! geometry submission in opaque/skybox/transparent order, lighting cleanup,
//! and submit. A camera whose culling fails is skipped whole; nothing is
//! acquired for it.

use crate::command::{Command, CommandList, DrawFlags, DrawGroup, ExecutionContext, TargetId};
use crate::core::RenderConfig;
use crate::culling::Culling;
use crate::lighting::Lighting;
use crate::shadows::ShadowConfig;

use glam::Mat4;

const SAMPLE_NAME: &str = "Render Camera";

/// How a camera clears its target before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearFlags {
    /// Clear depth; the sky pass covers color.
    #[default]
    Skybox,
    /// Clear depth and color to the background color.
    Color,
    /// Clear depth only, keep color.
    Depth,
    /// Keep both.
    Nothing,
}

impl ClearFlags {
    /// Whether the depth attachment is cleared.
    #[inline]
    pub fn clears_depth(&self) -> bool {
        !matches!(self, Self::Nothing)
    }

    /// Whether the color attachment is cleared.
    #[inline]
    pub fn clears_color(&self) -> bool {
        matches!(self, Self::Color)
    }
}

/// One camera's view of the scene for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// World-to-view matrix.
    pub view: Mat4,
    /// Projection matrix.
    pub projection: Mat4,
    /// Far clip plane distance.
    pub far_plane: f32,
    /// Clear behavior.
    pub clear_flags: ClearFlags,
    /// Background color, linear RGBA.
    pub background: [f32; 4],
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            far_plane: 1000.0,
            clear_flags: ClearFlags::default(),
            background: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Scene-side culling entry point.
///
/// `cull` runs visibility for one camera with the given shadow render
/// distance and returns the frame's culling query, or `None` when culling
/// parameters cannot be obtained, in which case the camera is skipped.
pub trait SceneCuller {
    /// The per-frame query type produced by a successful cull.
    type Query: Culling;

    /// Cull the scene for a camera.
    fn cull(&self, camera: &CameraView, shadow_distance: f32) -> Option<Self::Query>;
}

/// Renders cameras: culling, lighting, geometry submission, cleanup.
#[derive(Debug)]
pub struct FrameRenderer {
    lighting: Lighting,
    buffer: CommandList,
    render_config: RenderConfig,
    shadow_config: ShadowConfig,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new(RenderConfig::default(), ShadowConfig::default())
    }
}

impl FrameRenderer {
    /// Create a frame renderer with the given configuration.
    pub fn new(render_config: RenderConfig, shadow_config: ShadowConfig) -> Self {
        Self {
            lighting: Lighting::new(),
            buffer: CommandList::new(SAMPLE_NAME),
            render_config,
            shadow_config,
        }
    }

    /// Render one camera. Returns `false` when culling failed and the
    /// camera was skipped.
    pub fn render<S: SceneCuller>(
        &mut self,
        scene: &S,
        camera: &CameraView,
        ctx: &mut dyn ExecutionContext,
    ) -> bool {
        // Shadows never render past the camera itself.
        let shadow_distance = self.shadow_config.max_distance.min(camera.far_plane);
        let Some(culling) = scene.cull(camera, shadow_distance) else {
            log::debug!("culling failed, skipping camera");
            return false;
        };

        self.buffer.begin_sample(SAMPLE_NAME);
        self.buffer.flush(ctx);

        self.lighting.setup(&culling, &self.shadow_config, ctx);

        self.setup_camera(camera);
        self.buffer.flush(ctx);

        self.draw_visible_geometry();
        self.buffer.flush(ctx);

        self.lighting.cleanup(ctx);

        self.buffer.end_sample(SAMPLE_NAME);
        self.buffer.flush(ctx);
        ctx.submit();
        true
    }

    /// Render a list of cameras in order. Returns how many were rendered.
    pub fn render_all<S: SceneCuller>(
        &mut self,
        scene: &S,
        cameras: &[CameraView],
        ctx: &mut dyn ExecutionContext,
    ) -> usize {
        cameras
            .iter()
            .filter(|camera| self.render(scene, camera, ctx))
            .count()
    }

    /// Route drawing to the camera target, clear it per the camera's flags,
    /// and set the camera matrices.
    fn setup_camera(&mut self, camera: &CameraView) {
        self.buffer.push(Command::SetRenderTarget {
            target: TargetId::CAMERA,
        });
        self.buffer.push(Command::Clear {
            depth: camera.clear_flags.clears_depth(),
            color: camera.clear_flags.clears_color().then_some(camera.background),
        });
        self.buffer.push(Command::SetViewProjection {
            view: camera.view,
            projection: camera.projection,
        });
    }

    /// Submit the visible geometry groups in draw order.
    fn draw_visible_geometry(&mut self) {
        let flags = DrawFlags {
            dynamic_batching: self.render_config.dynamic_batching,
            gpu_instancing: self.render_config.gpu_instancing,
        };
        for group in [DrawGroup::Opaque, DrawGroup::Skybox, DrawGroup::Transparent] {
            self.buffer.push(Command::DrawGeometry { group, flags });
        }
    }

    /// The lighting stage.
    #[inline]
    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    /// The render configuration.
    #[inline]
    pub fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }

    /// The shadow configuration.
    #[inline]
    pub fn shadow_config(&self) -> &ShadowConfig {
        &self.shadow_config
    }

    /// Replace the shadow configuration for subsequent frames.
    pub fn set_shadow_config(&mut self, config: ShadowConfig) {
        self.shadow_config = config;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::command::recording::RecordingContext;
    use crate::culling::fixtures::{shadowed_light, TestCulling};
    use crate::culling::VisibleLight;
    use crate::shadows::{AtlasSize, DIRECTIONAL_SHADOW_ATLAS};

    use super::*;

    /// Scene fixture that records the cull call and can refuse it.
    struct TestScene {
        lights: Vec<VisibleLight>,
        fail_cull: bool,
        last_distance: Cell<f32>,
    }

    impl TestScene {
        fn new(lights: Vec<VisibleLight>) -> Self {
            Self {
                lights,
                fail_cull: false,
                last_distance: Cell::new(0.0),
            }
        }
    }

    impl SceneCuller for TestScene {
        type Query = TestCulling;

        fn cull(&self, _camera: &CameraView, shadow_distance: f32) -> Option<TestCulling> {
            self.last_distance.set(shadow_distance);
            if self.fail_cull {
                None
            } else {
                Some(TestCulling::new(self.lights.clone()))
            }
        }
    }

    #[test]
    fn test_failed_culling_skips_everything() {
        let mut scene = TestScene::new(vec![shadowed_light(0)]);
        scene.fail_cull = true;
        let mut renderer = FrameRenderer::default();
        let mut ctx = RecordingContext::new();

        assert!(!renderer.render(&scene, &CameraView::default(), &mut ctx));
        assert!(ctx.commands.is_empty());
        assert_eq!(ctx.submits, 0);
    }

    #[test]
    fn test_frame_submits_once_with_balanced_samples() {
        let scene = TestScene::new((0..2).map(shadowed_light).collect());
        let mut renderer = FrameRenderer::default();
        let mut ctx = RecordingContext::new();

        assert!(renderer.render(&scene, &CameraView::default(), &mut ctx));
        assert_eq!(ctx.submits, 1);
        assert!(ctx.samples_balanced());
        assert_eq!(ctx.acquires(DIRECTIONAL_SHADOW_ATLAS), 1);
        assert_eq!(ctx.releases(DIRECTIONAL_SHADOW_ATLAS), 1);
    }

    #[test]
    fn test_atlas_balances_without_shadowed_lights() {
        let scene = TestScene::new(Vec::new());
        let mut renderer = FrameRenderer::default();
        let mut ctx = RecordingContext::new();

        assert!(renderer.render(&scene, &CameraView::default(), &mut ctx));
        assert_eq!(ctx.acquires(DIRECTIONAL_SHADOW_ATLAS), 1);
        assert_eq!(ctx.releases(DIRECTIONAL_SHADOW_ATLAS), 1);
    }

    #[test]
    fn test_geometry_groups_draw_in_order() {
        let scene = TestScene::new(vec![shadowed_light(0)]);
        let mut renderer = FrameRenderer::default();
        let mut ctx = RecordingContext::new();
        renderer.render(&scene, &CameraView::default(), &mut ctx);

        let groups: Vec<_> = ctx
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawGeometry { group, .. } => Some(*group),
                _ => None,
            })
            .collect();
        assert_eq!(
            groups,
            vec![DrawGroup::Opaque, DrawGroup::Skybox, DrawGroup::Transparent]
        );

        // Geometry draws only after the shadow matrices are published.
        let publish = ctx
            .position(|c| matches!(c, Command::SetGlobalMat4Array { .. }))
            .unwrap();
        let first_draw = ctx
            .position(|c| matches!(c, Command::DrawGeometry { .. }))
            .unwrap();
        assert!(publish < first_draw);
    }

    #[test]
    fn test_shadow_distance_clamps_to_far_plane() {
        let scene = TestScene::new(Vec::new());
        let mut renderer = FrameRenderer::new(
            RenderConfig::default(),
            ShadowConfig::new().max_distance(500.0),
        );
        let camera = CameraView {
            far_plane: 80.0,
            ..Default::default()
        };
        let mut ctx = RecordingContext::new();

        renderer.render(&scene, &camera, &mut ctx);
        assert_eq!(scene.last_distance.get(), 80.0);
    }

    #[test]
    fn test_clear_flags_map_to_clear_command() {
        let scene = TestScene::new(Vec::new());
        let mut renderer = FrameRenderer::default();
        let camera = CameraView {
            clear_flags: ClearFlags::Color,
            background: [0.1, 0.2, 0.3, 1.0],
            ..Default::default()
        };
        let mut ctx = RecordingContext::new();
        renderer.render(&scene, &camera, &mut ctx);

        let camera_clear = ctx.commands.iter().find_map(|c| match c {
            Command::Clear {
                depth,
                color: Some(color),
            } => Some((*depth, *color)),
            _ => None,
        });
        assert_eq!(camera_clear, Some((true, [0.1, 0.2, 0.3, 1.0])));
    }

    #[test]
    fn test_render_all_counts_rendered_cameras() {
        let scene = TestScene::new(vec![shadowed_light(0)]);
        let mut renderer = FrameRenderer::new(
            RenderConfig::default(),
            ShadowConfig::new().atlas_size(AtlasSize::Size512),
        );
        let cameras = [CameraView::default(), CameraView::default()];
        let mut ctx = RecordingContext::new();

        assert_eq!(renderer.render_all(&scene, &cameras, &mut ctx), 2);
        assert_eq!(ctx.submits, 2);
        assert_eq!(ctx.acquires(DIRECTIONAL_SHADOW_ATLAS), 2);
        assert_eq!(ctx.releases(DIRECTIONAL_SHADOW_ATLAS), 2);
    }
}
