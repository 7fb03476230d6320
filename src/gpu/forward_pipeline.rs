//! Lit forward pipeline consuming the published light and shadow uniforms.

use bytemuck::{Pod, Zeroable};

use crate::lighting::MAX_DIRECTIONAL_LIGHTS;
use crate::shadows::MAX_SHADOWED_LIGHTS;

use super::mesh::Vertex;

/// Lit forward shader: lambert shading from the directional light tables,
/// attenuated by the shadow atlas through a comparison sampler.
const FORWARD_SHADER: &str = r#"
// Forward lit shader - directional lights with atlas shadows

struct FrameUniforms {
    view_proj: mat4x4<f32>,
    light_count: vec4<u32>,
    colors: array<vec4<f32>, 4>,
    directions: array<vec4<f32>, 4>,
    shadow_data: array<vec4<f32>, 4>,
    shadow_matrices: array<mat4x4<f32>, 4>,
}

struct Model {
    model: mat4x4<f32>,
    normal: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

@group(0) @binding(1)
var shadow_atlas: texture_depth_2d;

@group(0) @binding(2)
var shadow_sampler: sampler_comparison;

@group(1) @binding(0)
var<uniform> model: Model;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = model.model * vec4<f32>(in.position, 1.0);
    out.world_position = world.xyz;
    out.world_normal = (model.normal * vec4<f32>(in.normal, 0.0)).xyz;
    out.clip_position = frame.view_proj * world;
    return out;
}

fn shadow_attenuation(index: u32, world_position: vec3<f32>) -> f32 {
    let data = frame.shadow_data[index];
    let strength = data.x;
    if (strength <= 0.0) {
        return 1.0;
    }
    let slot = u32(data.y);
    let position = frame.shadow_matrices[slot] * vec4<f32>(world_position, 1.0);
    let coords = position.xyz / position.w;
    // Atlas UV space is y-up, texture space is y-down.
    let uv = vec2<f32>(coords.x, 1.0 - coords.y);
    let lit = textureSampleCompareLevel(shadow_atlas, shadow_sampler, uv, coords.z);
    return mix(1.0, lit, strength);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(in.world_normal);
    var color = vec3<f32>(0.0);
    let count = min(frame.light_count.x, 4u);
    for (var i = 0u; i < count; i = i + 1u) {
        let direction = frame.directions[i].xyz;
        let diffuse = max(dot(normal, direction), 0.0);
        color = color + frame.colors[i].rgb * diffuse * shadow_attenuation(i, in.world_position);
    }
    return vec4<f32>(color, 1.0);
}
"#;

/// Frame-wide uniform data published to the forward shader.
///
/// Mirrors the WGSL `FrameUniforms` block; field order and 16-byte alignment
/// must match it exactly.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FrameUniforms {
    /// Camera view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// Total visible light count in `x`; the rest pads the vec4.
    pub light_count: [u32; 4],
    /// Directional light colors.
    pub colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Directions toward each light.
    pub directions: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Shadow descriptors (strength, slot).
    pub shadow_data: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Atlas sampling matrices indexed by slot.
    pub shadow_matrices: [[[f32; 4]; 4]; MAX_SHADOWED_LIGHTS],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            light_count: [0; 4],
            colors: [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS],
            directions: [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS],
            shadow_data: [[0.0; 4]; MAX_DIRECTIONAL_LIGHTS],
            shadow_matrices: [glam::Mat4::IDENTITY.to_cols_array_2d(); MAX_SHADOWED_LIGHTS],
        }
    }
}

/// Forward pipelines (opaque and blended) over the shared frame bind group.
pub struct ForwardPipeline {
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    bind_group: Option<wgpu::BindGroup>,
}

impl ForwardPipeline {
    /// Create the forward pipelines.
    pub fn new(
        device: &wgpu::Device,
        model_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Forward Shader"),
            source: wgpu::ShaderSource::Wgsl(FORWARD_SHADER.into()),
        });

        // Frame bind group layout (group 0)
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                // Frame uniform data
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Shadow atlas
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Comparison sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        // Comparison sampler for shadow tests
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Forward Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, model_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffers = [Vertex::layout()];
        let opaque_targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let transparent_targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let primitive = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        };
        let depth_stencil = |depth_write_enabled| wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };

        let opaque = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Forward Opaque Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &opaque_targets,
                compilation_options: Default::default(),
            }),
            primitive,
            depth_stencil: Some(depth_stencil(true)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        // Transparents load the opaque depth but do not write it.
        let transparent = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Forward Transparent Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &transparent_targets,
                compilation_options: Default::default(),
            }),
            primitive,
            depth_stencil: Some(depth_stencil(false)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            opaque,
            transparent,
            frame_layout,
            frame_buffer,
            sampler,
            bind_group: None,
        }
    }

    /// Drop the cached bind group; the next ensure call rebuilds it.
    pub fn invalidate_bind_group(&mut self) {
        self.bind_group = None;
    }

    /// Build the frame bind group against the current atlas view if needed.
    pub fn ensure_bind_group(&mut self, device: &wgpu::Device, atlas_view: &wgpu::TextureView) {
        if self.bind_group.is_some() {
            return;
        }
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    /// Get the frame bind group.
    #[inline]
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    /// Write the frame uniforms to the GPU buffer.
    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Pipeline for a geometry group.
    #[inline]
    pub fn pipeline(&self, transparent: bool) -> &wgpu::RenderPipeline {
        if transparent {
            &self.transparent
        } else {
            &self.opaque
        }
    }
}
