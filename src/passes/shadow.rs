//! Cascaded shadow mapping: one depth-only pass per cascade.
//!
//! `GraphBuilder` allows only one depth-stencil attachment per pass, and
//! `Device::create_texture_view` only ever creates a whole-resource view
//! (no per-array-layer selection), so a single pass targeting the layers
//! of one texture array — the usual CSM shape — isn't expressible against
//! this RHI. Each cascade is instead its own [`ShadowCascade`]
//! `RenderPass`, registered individually and given its own transient
//! depth texture handle by the caller each frame.
//!
//! Grounded on `scene::camera::Frustum::from_matrix_standard_z` /
//! `from_matrix_shadow_caster` (`src/scene/camera.rs`), both already
//! documented there as intended for shadow-map orthographic projections
//! and shadow-caster culling respectively. The practical-split formula
//! (log/uniform blend) is the standard CSM split used by
//! `original_source`'s shadow pass.

use std::cell::Cell;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::graph::{priority, GraphBuilder, RenderPass, RgTextureHandle};
use crate::rhi::command_context::{CommandContext, LoadOp};
use crate::rhi::device::{Device as _, WgpuDevice};
use crate::rhi::format::{BufferUsage, Format, MemoryType};
use crate::rhi::resources::{Buffer, BufferDesc, Pipeline};
use crate::scene::{Aabb, Frustum, ViewData};

use super::common::{self, wrap_descriptor_set, CubeMesh, InstanceBuffer};

/// One cascade's near/far split distance along the view's Z axis.
#[derive(Debug, Clone, Copy)]
pub struct CascadeSplit {
    pub near: f32,
    pub far: f32,
}

/// Practical split scheme: blends a logarithmic split (tighter near the
/// camera, where shadow resolution matters most) with a uniform split,
/// weighted by `lambda` (0 = fully uniform, 1 = fully logarithmic).
#[must_use]
pub fn practical_splits(near: f32, far: f32, cascade_count: u32, lambda: f32) -> Vec<CascadeSplit> {
    let cascade_count = cascade_count.max(1);
    let mut splits = Vec::with_capacity(cascade_count as usize);
    let mut prev = near;
    for i in 1..=cascade_count {
        let p = i as f32 / cascade_count as f32;
        let uniform_split = near + (far - near) * p;
        let split = if near > 0.0 {
            let log_split = near * (far / near).powf(p);
            lambda * log_split + (1.0 - lambda) * uniform_split
        } else {
            uniform_split
        };
        splits.push(CascadeSplit { near: prev, far: split });
        prev = split;
    }
    splits
}

/// Builds a light-space orthographic view-projection matrix tightly
/// bounding the world-space frustum corners of
/// `camera_projection_standard_z * camera_view` (the caller slices the
/// projection to one cascade's `[split.near, split.far]` range before
/// calling this), as seen from a directional light pointed along
/// `light_direction`.
#[must_use]
pub fn fit_light_view_projection(camera_view: Mat4, camera_projection_standard_z: Mat4, light_direction: Vec3) -> Mat4 {
    let inv_view_proj = (camera_projection_standard_z * camera_view).inverse();
    let corners_ndc = [
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ];
    let mut center = Vec3::ZERO;
    let mut world_corners = [Vec3::ZERO; 8];
    for (i, ndc) in corners_ndc.iter().enumerate() {
        let world = inv_view_proj.project_point3(*ndc);
        world_corners[i] = world;
        center += world;
    }
    center /= 8.0;

    let light_dir = light_direction.normalize_or(Vec3::NEG_Y);
    let up = if light_dir.abs_diff_eq(Vec3::Y, 1e-3) { Vec3::Z } else { Vec3::Y };
    let light_view = Mat4::look_at_rh(center - light_dir * 500.0, center, up);

    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for corner in world_corners {
        let p = light_view.transform_point3(corner);
        min = min.min(p);
        max = max.max(p);
    }
    let light_projection = Mat4::orthographic_rh(min.x, max.x, min.y, max.y, -max.z - 50.0, -min.z + 50.0);
    light_projection * light_view
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LightViewUniform {
    light_view_projection: [[f32; 4]; 4],
}

const SHADER_SRC: &str = r"
struct LightView {
    light_view_projection: mat4x4<f32>,
};
@group(0) @binding(0) var<uniform> light: LightView;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
};

@vertex
fn vs_main(in: VsIn) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(in.model_0, in.model_1, in.model_2, in.model_3);
    return light.light_view_projection * model * vec4<f32>(in.position, 1.0);
}
";

/// One cascade of a cascaded shadow map: owns its own tiny pipeline and
/// light-view-projection uniform, distinct from
/// [`crate::pipeline::PipelineCache`]'s shared view buffer. Uses a
/// standard (non reverse-Z) depth convention, clearing to 1.0 — the
/// opposite of the main scene's reverse-Z convention — since nothing
/// else samples this depth target through the shared convention.
pub struct ShadowCascade {
    device: Arc<WgpuDevice>,
    mesh: CubeMesh,
    instances: InstanceBuffer,
    light_view_buffer: Buffer,
    view_layout: wgpu::BindGroupLayout,
    pipeline: Pipeline,
    depth_handle: Cell<RgTextureHandle>,
    light_view_projection: parking_lot::Mutex<Mat4>,
    cascade_index: u32,
    depth_format: Format,
}

impl ShadowCascade {
    /// # Panics
    /// Panics if mesh/buffer/pipeline creation fails against a live device.
    #[must_use]
    pub fn new(device: Arc<WgpuDevice>, cascade_index: u32, depth_format: Format) -> Self {
        let mesh = CubeMesh::create(&device).expect("weft: failed to build shadow-cascade cube mesh");
        let instances = InstanceBuffer::create(&device, &format!("shadow-cascade-{cascade_index}-instances"))
            .expect("weft: failed to create shadow-cascade instance buffer");
        let light_view_buffer = device
            .create_buffer(&BufferDesc {
                size: std::mem::size_of::<LightViewUniform>() as u64,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
                memory_type: MemoryType::Default,
                stride: 0,
                debug_name: format!("shadow-cascade-{cascade_index}-light-view"),
            })
            .expect("weft: failed to create shadow-cascade light-view buffer");

        let view_layout = device.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("weft-shadow-cascade-layout"),
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

        let shader = device.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("weft-shadow-cascade"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SRC.into()),
        });
        let layout = device.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("weft-shadow-cascade-pipeline-layout"),
            bind_group_layouts: &[&view_layout],
            push_constant_ranges: &[],
        });
        let raw_pipeline = device.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("weft-shadow-cascade-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[common::cube_vertex_layout(), common::instance_vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format.to_wgpu(),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState { constant: 2, slope_scale: 2.0, clamp: 0.0 },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            device,
            mesh,
            instances,
            light_view_buffer,
            view_layout,
            pipeline: common::wrap_graphics_pipeline(raw_pipeline),
            depth_handle: Cell::new(RgTextureHandle::new(0)),
            light_view_projection: parking_lot::Mutex::new(Mat4::IDENTITY),
            cascade_index,
            depth_format,
        }
    }

    #[must_use]
    pub fn cascade_index(&self) -> u32 {
        self.cascade_index
    }

    #[must_use]
    pub fn depth_format(&self) -> Format {
        self.depth_format
    }

    /// Points this cascade at the transient depth texture the caller
    /// created for it this frame (the graph is rebuilt from scratch every
    /// frame, so the handle is only known at build time).
    pub fn set_depth_handle(&self, handle: RgTextureHandle) {
        self.depth_handle.set(handle);
    }

    pub fn set_light_view_projection(&self, matrix: Mat4) {
        *self.light_view_projection.lock() = matrix;
    }

    /// Replaces this cascade's shadow-caster instances, already culled by
    /// the caller against [`Frustum::from_matrix_shadow_caster`] of this
    /// cascade's light-view-projection.
    pub fn set_instances(&self, matrices: &[Mat4]) {
        self.instances.write(&self.device, matrices);
    }

    /// Builds a shadow-caster frustum for this cascade's current
    /// light-view-projection, for the caller to cull scene objects with
    /// before calling [`Self::set_instances`].
    #[must_use]
    pub fn caster_frustum(&self) -> Frustum {
        Frustum::from_matrix_shadow_caster(*self.light_view_projection.lock())
    }

    /// Convenience: filters `bounds` (one AABB per candidate caster) down
    /// to the indices visible to this cascade's light frustum.
    #[must_use]
    pub fn cull_casters(&self, bounds: &[Aabb]) -> Vec<u32> {
        let frustum = self.caster_frustum();
        bounds
            .iter()
            .enumerate()
            .filter(|(_, aabb)| frustum.intersects_aabb(aabb))
            .map(|(i, _)| i as u32)
            .collect()
    }
}

impl RenderPass for ShadowCascade {
    fn name(&self) -> &str {
        "shadow-cascade"
    }

    fn priority(&self) -> i32 {
        priority::SHADOW + self.cascade_index as i32
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, _view: &ViewData) {
        builder.set_depth_stencil(self.depth_handle.get(), true, false, LoadOp::Clear(1.0));
    }

    fn execute(&self, ctx: &mut dyn CommandContext, _view: &ViewData) {
        let count = self.instances.count();
        if count == 0 {
            return;
        }

        let uniform = LightViewUniform {
            light_view_projection: self.light_view_projection.lock().to_cols_array_2d(),
        };
        self.device.write_buffer(&self.light_view_buffer, 0, bytemuck::bytes_of(&uniform));
        let bind_group = self.device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("weft-shadow-cascade-bind-group"),
            layout: &self.view_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: self.light_view_buffer.raw().as_entire_binding(),
            }],
        });
        let set = wrap_descriptor_set(bind_group);

        ctx.bind_pipeline(&self.pipeline);
        ctx.bind_descriptor_set(0, &set);
        ctx.bind_vertex_buffer(0, &self.mesh.vertices, 0);
        ctx.bind_vertex_buffer(1, self.instances.buffer(), 0);
        ctx.bind_index_buffer(&self.mesh.indices, 0, 2);
        ctx.draw_indexed(0..self.mesh.index_count, 0, 0..count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn practical_splits_cover_full_range_monotonically() {
        let splits = practical_splits(0.1, 100.0, 4, 0.5);
        assert_eq!(splits.len(), 4);
        assert!((splits[0].near - 0.1).abs() < 1e-5);
        assert!((splits[3].far - 100.0).abs() < 1e-3);
        for pair in splits.windows(2) {
            assert!(pair[0].far <= pair[1].far);
            assert!((pair[0].far - pair[1].near).abs() < 1e-3);
        }
    }

    #[test]
    fn practical_splits_lambda_zero_is_uniform() {
        let splits = practical_splits(0.0, 100.0, 4, 0.0);
        for (i, split) in splits.iter().enumerate() {
            let expected_far = 100.0 * (i as f32 + 1.0) / 4.0;
            assert!((split.far - expected_far).abs() < 1e-3);
        }
    }
}
