//! Vertex layout and GPU mesh resources.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;

/// Standard vertex with position, normal, and UV coordinates.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Position in local space.
    pub position: [f32; 3],
    /// Normal vector.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a new vertex.
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Get the vertex buffer layout for this vertex type.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Vertex attributes.
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        // position
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        // normal
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        // uv
        wgpu::VertexAttribute {
            offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ];
}

/// Per-mesh uniform data.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct ModelUniform {
    /// Local-to-world matrix.
    pub model: [[f32; 4]; 4],
    /// Normal matrix (inverse transpose of the model matrix).
    pub normal: [[f32; 4]; 4],
}

impl ModelUniform {
    /// Build from a model matrix.
    pub fn from_model(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal: model.inverse().transpose().to_cols_array_2d(),
        }
    }
}

/// CPU-side description of a mesh to upload.
#[derive(Debug, Clone, Copy)]
pub struct MeshData<'a> {
    /// Vertex data.
    pub vertices: &'a [Vertex],
    /// Triangle indices.
    pub indices: &'a [u32],
    /// Local-to-world matrix.
    pub model: Mat4,
    /// World-space bounding sphere, `xyz` center and `w` radius.
    pub bounds: Vec4,
    /// Whether the mesh renders into shadow maps.
    pub casts_shadow: bool,
    /// Whether the mesh draws in the transparent group.
    pub transparent: bool,
}

/// A mesh uploaded to the GPU.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    bounds: Vec4,
    casts_shadow: bool,
    transparent: bool,
}

impl GpuMesh {
    /// Upload a mesh.
    pub(crate) fn new(
        device: &wgpu::Device,
        model_layout: &wgpu::BindGroupLayout,
        data: &MeshData<'_>,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Model Buffer"),
            contents: bytemuck::bytes_of(&ModelUniform::from_model(data.model)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Model Bind Group"),
            layout: model_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: model_buffer.as_entire_binding(),
            }],
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            model_buffer,
            model_bind_group,
            bounds: data.bounds,
            casts_shadow: data.casts_shadow,
            transparent: data.transparent,
        }
    }

    /// Update the model matrix.
    pub fn set_model(&mut self, queue: &wgpu::Queue, model: Mat4) {
        queue.write_buffer(
            &self.model_buffer,
            0,
            bytemuck::bytes_of(&ModelUniform::from_model(model)),
        );
    }

    /// Set the world-space bounding sphere.
    pub fn set_bounds(&mut self, bounds: Vec4) {
        self.bounds = bounds;
    }

    /// Get the world-space bounding sphere.
    #[inline]
    pub fn bounds(&self) -> Vec4 {
        self.bounds
    }

    /// Whether the mesh renders into shadow maps.
    #[inline]
    pub fn casts_shadow(&self) -> bool {
        self.casts_shadow
    }

    /// Whether the mesh draws in the transparent group.
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Record this mesh's draw into a render pass. Bind group 1 carries the
    /// model uniform; the caller owns group 0 and the pipeline.
    pub(crate) fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_bind_group(1, &self.model_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}
