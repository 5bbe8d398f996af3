//! Shared scaffolding for the reference pass library: a procedural cube
//! mesh (this crate has no asset pipeline wired into `RenderPass::execute`,
//! so passes render a fixed mesh driven by externally-supplied world
//! matrices), an instanced world-matrix vertex buffer, and the small
//! view-uniform layout every graphics pass binds at set 0.
//!
//! Passes build their own bind group / pipeline layouts directly rather
//! than going through [`crate::pipeline::PipelineCache`]'s reflection-driven
//! path, mirroring the teacher's own per-pass layout construction.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::rhi::device::{Device as _, WgpuDevice};
use crate::rhi::format::{BufferUsage, MemoryType};
use crate::rhi::resources::Buffer;

/// Upper bound on instances drawn by a single pass invocation in one frame.
pub const MAX_INSTANCES: usize = 4096;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

const fn vtx(p: [f32; 3], n: [f32; 3]) -> CubeVertex {
    CubeVertex { position: p, normal: n }
}

/// 24 vertices (4 per face, not shared across faces) so each face keeps a
/// flat normal.
#[must_use]
pub fn cube_vertices() -> [CubeVertex; 24] {
    [
        // +X
        vtx([0.5, -0.5, -0.5], [1.0, 0.0, 0.0]),
        vtx([0.5, 0.5, -0.5], [1.0, 0.0, 0.0]),
        vtx([0.5, 0.5, 0.5], [1.0, 0.0, 0.0]),
        vtx([0.5, -0.5, 0.5], [1.0, 0.0, 0.0]),
        // -X
        vtx([-0.5, -0.5, 0.5], [-1.0, 0.0, 0.0]),
        vtx([-0.5, 0.5, 0.5], [-1.0, 0.0, 0.0]),
        vtx([-0.5, 0.5, -0.5], [-1.0, 0.0, 0.0]),
        vtx([-0.5, -0.5, -0.5], [-1.0, 0.0, 0.0]),
        // +Y
        vtx([-0.5, 0.5, -0.5], [0.0, 1.0, 0.0]),
        vtx([-0.5, 0.5, 0.5], [0.0, 1.0, 0.0]),
        vtx([0.5, 0.5, 0.5], [0.0, 1.0, 0.0]),
        vtx([0.5, 0.5, -0.5], [0.0, 1.0, 0.0]),
        // -Y
        vtx([-0.5, -0.5, 0.5], [0.0, -1.0, 0.0]),
        vtx([-0.5, -0.5, -0.5], [0.0, -1.0, 0.0]),
        vtx([0.5, -0.5, -0.5], [0.0, -1.0, 0.0]),
        vtx([0.5, -0.5, 0.5], [0.0, -1.0, 0.0]),
        // +Z
        vtx([0.5, -0.5, 0.5], [0.0, 0.0, 1.0]),
        vtx([0.5, 0.5, 0.5], [0.0, 0.0, 1.0]),
        vtx([-0.5, 0.5, 0.5], [0.0, 0.0, 1.0]),
        vtx([-0.5, -0.5, 0.5], [0.0, 0.0, 1.0]),
        // -Z
        vtx([-0.5, -0.5, -0.5], [0.0, 0.0, -1.0]),
        vtx([-0.5, 0.5, -0.5], [0.0, 0.0, -1.0]),
        vtx([0.5, 0.5, -0.5], [0.0, 0.0, -1.0]),
        vtx([0.5, -0.5, -0.5], [0.0, 0.0, -1.0]),
    ]
}

#[must_use]
pub fn cube_indices() -> [u16; 36] {
    let mut out = [0u16; 36];
    for face in 0..6u16 {
        let base = face * 4;
        let tri = [base, base + 1, base + 2, base, base + 2, base + 3];
        out[(face as usize) * 6..(face as usize) * 6 + 6].copy_from_slice(&tri);
    }
    out
}

pub const CUBE_VERTEX_STRIDE: u64 = std::mem::size_of::<CubeVertex>() as u64;
pub const CUBE_INDEX_COUNT: u32 = 36;

/// The procedural unit-cube mesh: a vertex buffer, an index buffer, and
/// the index count to pass to `draw_indexed`.
pub struct CubeMesh {
    pub vertices: Buffer,
    pub indices: Buffer,
    pub index_count: u32,
}

impl CubeMesh {
    #[must_use]
    pub fn create(device: &WgpuDevice) -> Option<Self> {
        let verts = cube_vertices();
        let idx = cube_indices();

        let vertices = device.create_buffer(&crate::rhi::resources::BufferDesc {
            size: std::mem::size_of_val(&verts) as u64,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            memory_type: MemoryType::Default,
            stride: CUBE_VERTEX_STRIDE as u32,
            debug_name: "cube-mesh-vertices".into(),
        })?;
        device.write_buffer(&vertices, 0, bytemuck::cast_slice(&verts));

        let indices = device.create_buffer(&crate::rhi::resources::BufferDesc {
            size: std::mem::size_of_val(&idx) as u64,
            usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            memory_type: MemoryType::Default,
            stride: 2,
            debug_name: "cube-mesh-indices".into(),
        })?;
        device.write_buffer(&indices, 0, bytemuck::cast_slice(&idx));

        Some(Self { vertices, indices, index_count: CUBE_INDEX_COUNT })
    }
}

const CUBE_ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const INSTANCE_ATTRS: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4];

#[must_use]
pub fn cube_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: CUBE_VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &CUBE_ATTRS,
    }
}

/// Per-instance world matrix, one `mat4x4<f32>` laid out as 4 `vec4`
/// attributes (locations 2-5) stepped once per instance.
#[must_use]
pub fn instance_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRS,
    }
}

/// Owns the instance buffer backing a pass's per-object world matrices and
/// the count of instances written into it. `write` is called from outside
/// `RenderPass::setup`/`execute` (both take `&self`), any time before the
/// graph's `execute` replays this pass's draw commands.
pub struct InstanceBuffer {
    buffer: Buffer,
    count: std::sync::atomic::AtomicU32,
}

impl InstanceBuffer {
    #[must_use]
    pub fn create(device: &WgpuDevice, debug_name: &str) -> Option<Self> {
        let buffer = device.create_buffer(&crate::rhi::resources::BufferDesc {
            size: (MAX_INSTANCES * 64) as u64,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            memory_type: MemoryType::Default,
            stride: 64,
            debug_name: debug_name.to_string(),
        })?;
        Some(Self { buffer, count: std::sync::atomic::AtomicU32::new(0) })
    }

    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Writes `matrices` into the instance buffer, truncating to
    /// [`MAX_INSTANCES`] and logging the drop rather than silently
    /// clipping without a trace.
    pub fn write(&self, device: &WgpuDevice, matrices: &[Mat4]) {
        let n = matrices.len().min(MAX_INSTANCES);
        if matrices.len() > MAX_INSTANCES {
            log::warn!(
                "weft: instance buffer '{}' dropped {} of {} instances (cap {MAX_INSTANCES})",
                self.buffer.debug_name(),
                matrices.len() - MAX_INSTANCES,
                matrices.len()
            );
        }
        let cols: Vec<[[f32; 4]; 4]> = matrices[..n].iter().map(Mat4::to_cols_array_2d).collect();
        if n > 0 {
            device.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&cols));
        }
        self.count.store(n as u32, std::sync::atomic::Ordering::Release);
    }
}

/// Layout-compatible mirror of the `SceneView` uniform every graphics
/// pass in this library binds at group 0, binding 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneViewUniform {
    pub view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub time: f32,
    pub light_direction: [f32; 3],
    pub light_color_intensity: f32,
}

impl SceneViewUniform {
    #[must_use]
    pub fn from_view(view_projection: Mat4, camera_position: glam::Vec3, time: f32, light_direction: glam::Vec3, light_intensity: f32) -> Self {
        Self {
            view_projection: view_projection.to_cols_array_2d(),
            camera_position: camera_position.into(),
            time,
            light_direction: light_direction.normalize_or_zero().into(),
            light_color_intensity: light_intensity,
        }
    }
}

pub const SCENE_VIEW_UNIFORM_SIZE: u64 = std::mem::size_of::<SceneViewUniform>() as u64;

/// Creates the `wgpu::BindGroupLayout` shared by every pass's group 0: a
/// single uniform buffer binding visible to both vertex and fragment
/// stages.
#[must_use]
pub fn create_scene_view_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("weft-scene-view-layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

#[must_use]
pub fn create_scene_view_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("weft-scene-view-bind-group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.raw().as_entire_binding(),
        }],
    })
}

/// Wraps a raw `wgpu::BindGroup` in this crate's `DescriptorSet` handle so
/// it can be bound through [`crate::rhi::command_context::CommandContext`].
#[must_use]
pub fn wrap_descriptor_set(raw: wgpu::BindGroup) -> crate::rhi::resources::DescriptorSet {
    crate::rhi::resources::DescriptorSet(std::sync::Arc::new(raw))
}

/// Wraps a raw `wgpu::RenderPipeline` in this crate's `Pipeline` handle.
#[must_use]
pub fn wrap_graphics_pipeline(raw: wgpu::RenderPipeline) -> crate::rhi::resources::Pipeline {
    crate::rhi::resources::Pipeline::Graphics(std::sync::Arc::new(raw))
}

pub fn create_scene_view_buffer(device: &WgpuDevice, debug_name: &str) -> Option<Buffer> {
    device.create_buffer(&crate::rhi::resources::BufferDesc {
        size: SCENE_VIEW_UNIFORM_SIZE,
        usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
        memory_type: MemoryType::Default,
        stride: 0,
        debug_name: debug_name.to_string(),
    })
}
