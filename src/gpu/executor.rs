//! wgpu execution backend for the command stream.

use glam::Mat4;

use crate::command::{
    Command, DrawGroup, ExecutionContext, TargetFormat, TargetId, Viewport,
};
use crate::core::Context;
use crate::culling::ShadowSplit;
use crate::lighting::{
    DIRECTIONAL_LIGHT_COLORS, DIRECTIONAL_LIGHT_COUNT, DIRECTIONAL_LIGHT_DIRECTIONS,
    DIRECTIONAL_LIGHT_SHADOW_DATA,
};
use crate::shadows::{DIRECTIONAL_SHADOW_ATLAS, DIRECTIONAL_SHADOW_MATRICES};

use super::forward_pipeline::{ForwardPipeline, FrameUniforms};
use super::mesh::{GpuMesh, MeshData};
use super::shadow_pipeline::ShadowPipeline;
use super::target_pool::TargetPool;

/// Color format of the camera target.
pub const CAMERA_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Depth format shared by every depth attachment.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Executes recorded commands against a wgpu device.
///
/// Owns the camera's offscreen color+depth target, the temporary target
/// pool, both pipelines, and the registered meshes. Commands mutate a small
/// amount of pass state (current target, viewport, view-projection); draws
/// open a render pass, record, and close it again, so command order on the
/// encoder matches recording order exactly.
pub struct WgpuExecutor {
    context: Context,
    pool: TargetPool,
    shadow_pipeline: ShadowPipeline,
    forward_pipeline: ForwardPipeline,
    model_layout: wgpu::BindGroupLayout,
    meshes: Vec<GpuMesh>,

    width: u32,
    height: u32,
    camera_color: wgpu::Texture,
    camera_color_view: wgpu::TextureView,
    camera_depth_view: wgpu::TextureView,

    encoder: wgpu::CommandEncoder,
    current_target: TargetId,
    viewport: Option<Viewport>,
    view_proj: Mat4,
    frame_uniforms: FrameUniforms,
    sample_depth: usize,
}

impl WgpuExecutor {
    /// Create an executor rendering into a `width`×`height` camera target.
    pub fn new(context: Context, width: u32, height: u32) -> Self {
        // Model bind group layout (group 1 in both pipelines)
        let model_layout = context
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Model Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let shadow_pipeline = ShadowPipeline::new(&context.device, &model_layout);
        let forward_pipeline =
            ForwardPipeline::new(&context.device, &model_layout, CAMERA_COLOR_FORMAT);

        let (camera_color, camera_color_view, camera_depth_view) =
            Self::create_camera_target(&context.device, width, height);

        let encoder = context.create_command_encoder();

        Self {
            context,
            pool: TargetPool::new(),
            shadow_pipeline,
            forward_pipeline,
            model_layout,
            meshes: Vec::new(),
            width,
            height,
            camera_color,
            camera_color_view,
            camera_depth_view,
            encoder,
            current_target: TargetId::CAMERA,
            viewport: None,
            view_proj: Mat4::IDENTITY,
            frame_uniforms: FrameUniforms::default(),
            sample_depth: 0,
        }
    }

    fn create_camera_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView, wgpu::TextureView) {
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Camera Color"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAMERA_COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Camera Depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        (color, color_view, depth_view)
    }

    /// Resize the camera target.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && (width != self.width || height != self.height) {
            self.width = width;
            self.height = height;
            let (color, color_view, depth_view) =
                Self::create_camera_target(&self.context.device, width, height);
            self.camera_color = color;
            self.camera_color_view = color_view;
            self.camera_depth_view = depth_view;
        }
    }

    /// Register a mesh and return its index.
    pub fn add_mesh(&mut self, data: &MeshData<'_>) -> usize {
        self.meshes
            .push(GpuMesh::new(&self.context.device, &self.model_layout, data));
        self.meshes.len() - 1
    }

    /// Update a registered mesh's model matrix.
    pub fn set_mesh_model(&mut self, index: usize, model: Mat4) {
        if let Some(mesh) = self.meshes.get_mut(index) {
            mesh.set_model(&self.context.queue, model);
        }
    }

    /// The wgpu context.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The camera color texture, for readback.
    #[inline]
    pub fn camera_color_texture(&self) -> &wgpu::Texture {
        &self.camera_color
    }

    /// The temporary target pool, for resource accounting.
    #[inline]
    pub fn target_pool(&self) -> &TargetPool {
        &self.pool
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::BeginSample(name) => {
                self.encoder.push_debug_group(name);
                self.sample_depth += 1;
            }
            Command::EndSample(name) => {
                if self.sample_depth > 0 {
                    self.encoder.pop_debug_group();
                    self.sample_depth -= 1;
                } else {
                    log::warn!("unbalanced EndSample({name})");
                }
            }
            Command::AcquireTarget { target, desc } => {
                self.pool.acquire(&self.context.device, target, desc);
                if target == DIRECTIONAL_SHADOW_ATLAS {
                    // The atlas texture may have changed.
                    self.forward_pipeline.invalidate_bind_group();
                }
            }
            Command::ReleaseTarget { target } => self.pool.release(target),
            Command::SetRenderTarget { target } => {
                self.current_target = target;
                self.viewport = None;
            }
            Command::Clear { depth, color } => self.clear_current(depth, color),
            Command::SetViewport(viewport) => self.viewport = Some(viewport),
            Command::SetViewProjection { view, projection } => {
                self.view_proj = projection * view;
            }
            Command::DrawShadowCasters { handle: _, split } => self.draw_shadow_casters(split),
            Command::DrawGeometry { group, flags: _ } => self.draw_geometry(group),
            Command::SetGlobalInt { name, value } => match name {
                DIRECTIONAL_LIGHT_COUNT => {
                    self.frame_uniforms.light_count[0] = value.max(0) as u32;
                }
                _ => log::warn!("unknown global int uniform {name}"),
            },
            Command::SetGlobalVec4Array { name, values } => {
                let table = match name {
                    DIRECTIONAL_LIGHT_COLORS => &mut self.frame_uniforms.colors,
                    DIRECTIONAL_LIGHT_DIRECTIONS => &mut self.frame_uniforms.directions,
                    DIRECTIONAL_LIGHT_SHADOW_DATA => &mut self.frame_uniforms.shadow_data,
                    _ => {
                        log::warn!("unknown global vec4-array uniform {name}");
                        return;
                    }
                };
                for (entry, value) in table.iter_mut().zip(values) {
                    *entry = value;
                }
            }
            Command::SetGlobalMat4Array { name, values } => match name {
                DIRECTIONAL_SHADOW_MATRICES => {
                    for (entry, value) in
                        self.frame_uniforms.shadow_matrices.iter_mut().zip(values)
                    {
                        *entry = value.to_cols_array_2d();
                    }
                }
                _ => log::warn!("unknown global mat4-array uniform {name}"),
            },
        }
    }

    /// Realize a clear as its own pass; later draws load what it left.
    fn clear_current(&mut self, depth: bool, color: Option<[f32; 4]>) {
        if !depth && color.is_none() {
            return;
        }

        let clear_color = color.map(|[r, g, b, a]| wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        });

        let (color_view, depth_view) = if self.current_target == TargetId::CAMERA {
            (Some(&self.camera_color_view), Some(&self.camera_depth_view))
        } else {
            match (self.pool.view(self.current_target), self.pool.desc(self.current_target)) {
                (Some(view), Some(desc)) => match desc.format {
                    TargetFormat::Shadow => (None, Some(view)),
                    TargetFormat::Color => (Some(view), None),
                },
                _ => {
                    log::warn!("clear on unbound target {:?}", self.current_target.0);
                    return;
                }
            }
        };

        let color_attachment = color_view.map(|view| wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: match clear_color {
                    Some(value) => wgpu::LoadOp::Clear(value),
                    None => wgpu::LoadOp::Load,
                },
                store: wgpu::StoreOp::Store,
            },
        });
        let depth_attachment = depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: if depth {
                    wgpu::LoadOp::Clear(1.0)
                } else {
                    wgpu::LoadOp::Load
                },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });

        let attachments = [color_attachment];
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: if attachments[0].is_some() { &attachments } else { &[] },
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    /// Render one shadow tile: the registered casters inside the split
    /// sphere, into the current viewport of the atlas target.
    fn draw_shadow_casters(&mut self, split: ShadowSplit) {
        let tile = self.shadow_pipeline.next_tile(
            &self.context.device,
            &self.context.queue,
            self.view_proj,
        );

        let Some(view) = self.pool.view(self.current_target) else {
            log::warn!("shadow draw on unbound target {:?}", self.current_target.0);
            return;
        };
        let Some(tile_bind_group) = self.shadow_pipeline.tile_bind_group(tile) else {
            return;
        };

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Tile Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some(viewport) = self.viewport {
            pass.set_viewport(
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                0.0,
                1.0,
            );
        }
        pass.set_pipeline(self.shadow_pipeline.pipeline());
        pass.set_bind_group(0, tile_bind_group, &[]);
        for mesh in &self.meshes {
            let bounds = mesh.bounds();
            if mesh.casts_shadow() && split.intersects(bounds.truncate(), bounds.w) {
                mesh.draw(&mut pass);
            }
        }
    }

    /// Render one geometry group into the camera target.
    fn draw_geometry(&mut self, group: DrawGroup) {
        // Geometry draws follow the camera's SetViewProjection.
        self.frame_uniforms.view_proj = self.view_proj.to_cols_array_2d();

        if group == DrawGroup::Skybox {
            // The camera clear provides the background.
            self.encoder.insert_debug_marker("Skybox");
            return;
        }

        let Some(atlas_view) = self.pool.view(DIRECTIONAL_SHADOW_ATLAS) else {
            log::warn!("geometry draw without a shadow atlas bound");
            return;
        };
        self.forward_pipeline
            .ensure_bind_group(&self.context.device, atlas_view);
        let Some(bind_group) = self.forward_pipeline.bind_group() else {
            return;
        };

        let transparent = group == DrawGroup::Transparent;
        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Geometry Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.camera_color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.camera_depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some(viewport) = self.viewport {
            pass.set_viewport(
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                0.0,
                1.0,
            );
        }
        pass.set_pipeline(self.forward_pipeline.pipeline(transparent));
        pass.set_bind_group(0, bind_group, &[]);
        for mesh in &self.meshes {
            if mesh.is_transparent() == transparent {
                mesh.draw(&mut pass);
            }
        }
    }
}

impl ExecutionContext for WgpuExecutor {
    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }

    fn submit(&mut self) {
        // One bulk uniform update per submit; write_buffer lands before the
        // submitted command buffer executes.
        self.forward_pipeline
            .write_uniforms(&self.context.queue, &self.frame_uniforms);

        let encoder = std::mem::replace(&mut self.encoder, self.context.create_command_encoder());
        self.context.submit(std::iter::once(encoder.finish()));
        self.shadow_pipeline.reset();
    }

    fn uses_reversed_depth(&self) -> bool {
        // The shadow pipeline clears to 1.0 and compares Less.
        false
    }
}
