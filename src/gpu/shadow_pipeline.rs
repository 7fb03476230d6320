//! Depth-only pipeline for shadow atlas tiles.

use glam::Mat4;

use super::mesh::Vertex;

/// Depth-only shader source for the shadow pass.
const SHADOW_SHADER: &str = r#"
// Shadow depth shader - renders depth from the light's perspective

struct LightCamera {
    view_proj: mat4x4<f32>,
}

struct Model {
    model: mat4x4<f32>,
    normal: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> light_camera: LightCamera;

@group(1) @binding(0)
var<uniform> model: Model;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_pos = model.model * vec4<f32>(in.position, 1.0);
    out.clip_position = light_camera.view_proj * world_pos;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) {
    // Depth is automatically written
}
"#;

/// Depth-only pipeline plus a ring of per-tile view-projection uniforms.
///
/// Every tile of a frame gets its own small uniform buffer from the ring, so
/// sequential tile matrices never alias before the frame's single submit.
/// The ring grows on demand and the cursor resets at submit.
pub struct ShadowPipeline {
    pipeline: wgpu::RenderPipeline,
    tile_layout: wgpu::BindGroupLayout,
    tiles: Vec<(wgpu::Buffer, wgpu::BindGroup)>,
    cursor: usize,
}

impl ShadowPipeline {
    /// Create the shadow pipeline.
    pub fn new(device: &wgpu::Device, model_layout: &wgpu::BindGroupLayout) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER.into()),
        });

        // Light camera bind group layout (group 0)
        let tile_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Light Camera Layout"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&tile_layout, model_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[], // No color targets
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,      // Constant depth bias
                    slope_scale: 2.0, // Slope-scale bias
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            tile_layout,
            tiles: Vec::new(),
            cursor: 0,
        }
    }

    /// Write a tile's view-projection into the next ring entry and return
    /// its index.
    pub fn next_tile(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, view_proj: Mat4) -> usize {
        if self.cursor == self.tiles.len() {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Shadow Tile Buffer"),
                size: 64, // mat4x4
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Shadow Tile Bind Group"),
                layout: &self.tile_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            self.tiles.push((buffer, bind_group));
        }

        let (buffer, _) = &self.tiles[self.cursor];
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(&view_proj.to_cols_array_2d()));
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    /// Bind group of a ring entry.
    #[inline]
    pub fn tile_bind_group(&self, index: usize) -> Option<&wgpu::BindGroup> {
        self.tiles.get(index).map(|(_, bind_group)| bind_group)
    }

    /// Reset the ring cursor. Called at submit.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Get the render pipeline.
    #[inline]
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}
