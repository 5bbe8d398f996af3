//! Forward-shaded opaque pass: the main lit draw against the back buffer.
//!
//! Grounded on `examples/panxinmiao-myth/src/renderer/graph/passes/opaque.rs`
//! (`OpaquePass`): clears color+depth, reverse-Z depth test, one draw call
//! per batch of instances. The teacher sorts a per-material `render_lists`
//! and binds per-draw material/object bind groups; this pass has no
//! material system to sort against, so it draws every instance supplied by
//! `set_instances` in one indexed-instanced call with a single fixed
//! lambert shader.

use std::sync::Arc;

use glam::Mat4;

use crate::graph::{priority, GraphBuilder, RenderPass, RgTextureHandle};
use crate::rhi::command_context::{CommandContext, LoadOp};
use crate::rhi::device::{Device as _, WgpuDevice};
use crate::rhi::format::Format;
use crate::rhi::resources::Pipeline;
use crate::scene::ViewData;

use super::common::{
    self, create_scene_view_bind_group, create_scene_view_buffer, create_scene_view_layout, wrap_descriptor_set,
    CubeMesh, InstanceBuffer, SceneViewUniform,
};

const SHADER_SRC: &str = r"
struct SceneView {
    view_projection: mat4x4<f32>,
    camera_position: vec3<f32>,
    time: f32,
    light_direction: vec3<f32>,
    light_color_intensity: f32,
};
@group(0) @binding(0) var<uniform> scene: SceneView;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
};

struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    let model = mat4x4<f32>(in.model_0, in.model_1, in.model_2, in.model_3);
    var out: VsOut;
    out.clip_position = scene.view_projection * model * vec4<f32>(in.position, 1.0);
    out.world_normal = normalize((model * vec4<f32>(in.normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let l = normalize(-scene.light_direction);
    let ndotl = max(dot(n, l), 0.0);
    let lit = 0.08 + ndotl * scene.light_color_intensity;
    let albedo = vec3<f32>(0.72, 0.74, 0.78);
    return vec4<f32>(albedo * lit, 1.0);
}
";

/// Clears and shades the back buffer (handle index 0) against the scene
/// depth buffer (handle index 1), per the fixed import order
/// `SceneRenderer::render` establishes each frame.
pub struct OpaquePass {
    device: Arc<WgpuDevice>,
    mesh: CubeMesh,
    instances: InstanceBuffer,
    view_buffer: crate::rhi::resources::Buffer,
    view_layout: wgpu::BindGroupLayout,
    pipeline: Pipeline,
    light_direction: parking_lot::Mutex<glam::Vec3>,
    light_intensity: std::sync::atomic::AtomicU32,
}

impl OpaquePass {
    /// # Panics
    /// Panics if mesh/buffer/pipeline creation fails against a live device.
    #[must_use]
    pub fn new(device: Arc<WgpuDevice>, color_format: Format, depth_format: Format) -> Self {
        let mesh = CubeMesh::create(&device).expect("weft: failed to build opaque-pass cube mesh");
        let instances =
            InstanceBuffer::create(&device, "opaque-instances").expect("weft: failed to create opaque instance buffer");
        let view_buffer =
            create_scene_view_buffer(&device, "opaque-view-uniform").expect("weft: failed to create opaque view buffer");
        let view_layout = create_scene_view_layout(&device.device);

        let shader = device.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("weft-opaque"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SRC.into()),
        });
        let layout = device.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("weft-opaque-layout"),
            bind_group_layouts: &[&view_layout],
            push_constant_ranges: &[],
        });
        let raw_pipeline = device.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("weft-opaque-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[common::cube_vertex_layout(), common::instance_vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format.to_wgpu(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format.to_wgpu(),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Greater,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            device,
            mesh,
            instances,
            view_buffer,
            view_layout,
            pipeline: common::wrap_graphics_pipeline(raw_pipeline),
            light_direction: parking_lot::Mutex::new(glam::Vec3::new(-0.4, -1.0, -0.3)),
            light_intensity: std::sync::atomic::AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn set_instances(&self, matrices: &[Mat4]) {
        self.instances.write(&self.device, matrices);
    }

    pub fn set_directional_light(&self, direction: glam::Vec3, intensity: f32) {
        *self.light_direction.lock() = direction;
        self.light_intensity
            .store(intensity.to_bits(), std::sync::atomic::Ordering::Relaxed);
    }
}

impl RenderPass for OpaquePass {
    fn name(&self) -> &str {
        "opaque"
    }

    fn priority(&self) -> i32 {
        priority::OPAQUE
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, _view: &ViewData) {
        builder.set_color_attachment(RgTextureHandle::new(0), LoadOp::Clear([0.05, 0.05, 0.08, 1.0]));
        builder.set_depth_stencil(RgTextureHandle::new(1), true, false, LoadOp::Clear(0.0));
    }

    fn execute(&self, ctx: &mut dyn CommandContext, view: &ViewData) {
        let count = self.instances.count();
        if count == 0 {
            return;
        }

        let direction = *self.light_direction.lock();
        let intensity = f32::from_bits(self.light_intensity.load(std::sync::atomic::Ordering::Relaxed));
        let uniform = SceneViewUniform::from_view(view.view_projection, view.camera_position, view.time, direction, intensity);
        self.device.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&uniform));
        let set = wrap_descriptor_set(create_scene_view_bind_group(&self.device.device, &self.view_layout, &self.view_buffer));

        ctx.bind_pipeline(&self.pipeline);
        ctx.bind_descriptor_set(0, &set);
        ctx.bind_vertex_buffer(0, &self.mesh.vertices, 0);
        ctx.bind_vertex_buffer(1, self.instances.buffer(), 0);
        ctx.bind_index_buffer(&self.mesh.indices, 0, 2);
        ctx.draw_indexed(0..self.mesh.index_count, 0, 0..count);
    }
}
