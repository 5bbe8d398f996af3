//! Depth-only prepass: writes scene depth before the opaque pass shades,
//! enabling early-Z rejection on the heavier lit pass.
//!
//! Grounded on `examples/panxinmiao-myth/src/renderer/graph/passes/prepass.rs`
//! (`DepthNormalPrepass`): an inline, hand-built pipeline layout rather
//! than a shared reflection cache, and the reverse-Z clear-to-zero
//! convention. This pass omits the teacher's optional normal/feature-ID
//! G-buffer outputs — nothing downstream in this library consumes them.

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

/// Writes depth only, against the back buffer's companion depth texture
/// (handle index 1, per the fixed back-buffer/depth import order
/// `SceneRenderer::render` establishes each frame).
pub struct DepthPrepass {
    device: Arc<WgpuDevice>,
    mesh: CubeMesh,
    instances: InstanceBuffer,
    view_buffer: crate::rhi::resources::Buffer,
    view_layout: wgpu::BindGroupLayout,
    pipeline: Pipeline,
    depth_format: Format,
}

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

@vertex
fn vs_main(in: VsIn) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(in.model_0, in.model_1, in.model_2, in.model_3);
    return scene.view_projection * model * vec4<f32>(in.position, 1.0);
}
";

impl DepthPrepass {
    /// # Panics
    /// Panics if mesh/buffer/pipeline creation fails — this pass's fixed
    /// geometry and uniform layout are expected to always succeed against
    /// a live device.
    #[must_use]
    pub fn new(device: Arc<WgpuDevice>, depth_format: Format) -> Self {
        let mesh = CubeMesh::create(&device).expect("weft: failed to build prepass cube mesh");
        let instances =
            InstanceBuffer::create(&device, "prepass-instances").expect("weft: failed to create prepass instance buffer");
        let view_buffer =
            create_scene_view_buffer(&device, "prepass-view-uniform").expect("weft: failed to create prepass view buffer");
        let view_layout = create_scene_view_layout(&device.device);

        let shader = device.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("weft-prepass"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SRC.into()),
        });
        let layout = device.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("weft-prepass-layout"),
            bind_group_layouts: &[&view_layout],
            push_constant_ranges: &[],
        });
        let raw_pipeline = device.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("weft-prepass-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[common::cube_vertex_layout(), common::instance_vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: None,
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
            depth_format,
        }
    }

    /// Replaces the world matrices drawn this frame. Called by the owning
    /// driver before `RenderGraph::compile`/`execute`; safe to call from a
    /// `&self` context since the pass keeps its GPU state interior-mutable.
    pub fn set_instances(&self, matrices: &[Mat4]) {
        self.instances.write(&self.device, matrices);
    }

    #[must_use]
    pub fn depth_format(&self) -> Format {
        self.depth_format
    }
}

impl RenderPass for DepthPrepass {
    fn name(&self) -> &str {
        "depth-prepass"
    }

    fn priority(&self) -> i32 {
        priority::DEPTH_PREPASS
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, _view: &ViewData) {
        builder.set_depth_stencil(RgTextureHandle::new(1), true, false, LoadOp::Clear(0.0));
    }

    fn execute(&self, ctx: &mut dyn CommandContext, view: &ViewData) {
        let count = self.instances.count();
        if count == 0 {
            return;
        }

        let uniform = SceneViewUniform::from_view(view.view_projection, view.camera_position, view.time, glam::Vec3::NEG_Y, 1.0);
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
