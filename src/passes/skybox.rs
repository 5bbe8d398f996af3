//! Background pass: draws a full-screen sky gradient behind everything
//! the opaque pass shaded.
//!
//! Grounded on `examples/panxinmiao-myth/src/renderer/graph/passes/skybox.rs`
//! (`SkyboxPass`): `LoadOp::Load` throughout (it inherits the opaque
//! pass's framebuffer), `GreaterEqual` depth test with
//! `depth_write_enabled: false` so it only shades pixels no opaque
//! geometry touched, and its own dedicated bind group layout built
//! directly rather than through shared pipeline reflection. The teacher
//! supports four background variants (gradient/cube/equirectangular/
//! planar); this pass implements only the gradient variant, since this
//! library has no texture-asset pipeline to source a cubemap or
//! equirectangular image from.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::graph::{priority, GraphBuilder, RenderPass, RgTextureHandle};
use crate::rhi::command_context::{CommandContext, LoadOp};
use crate::rhi::device::{Device as _, WgpuDevice};
use crate::rhi::format::{BufferUsage, Format, MemoryType};
use crate::rhi::resources::{Buffer, BufferDesc, Pipeline};
use crate::scene::ViewData;

use super::common::wrap_descriptor_set;

const SHADER_SRC: &str = r"
struct SkyUniform {
    inverse_view_projection: mat4x4<f32>,
    horizon_color: vec4<f32>,
    zenith_color: vec4<f32>,
};
@group(0) @binding(0) var<uniform> sky: SkyUniform;

var<private> FULLSCREEN: array<vec2<f32>, 3> = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>(3.0, -1.0),
    vec2<f32>(-1.0, 3.0),
);

struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_dir: vec3<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    let p = FULLSCREEN[index];
    var out: VsOut;
    out.clip_position = vec4<f32>(p, 0.0, 1.0);
    let near = sky.inverse_view_projection * vec4<f32>(p, 1.0, 1.0);
    let far = sky.inverse_view_projection * vec4<f32>(p, 0.0, 1.0);
    out.world_dir = normalize(far.xyz / far.w - near.xyz / near.w);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let t = clamp(in.world_dir.y * 0.5 + 0.5, 0.0, 1.0);
    return mix(sky.horizon_color, sky.zenith_color, t);
}
";

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SkyUniform {
    inverse_view_projection: [[f32; 4]; 4],
    horizon_color: [f32; 4],
    zenith_color: [f32; 4],
}

/// Draws over the back buffer (handle index 0), testing (but not
/// writing) the scene depth buffer (handle index 1).
pub struct SkyboxPass {
    device: Arc<WgpuDevice>,
    uniform_buffer: Buffer,
    layout: wgpu::BindGroupLayout,
    pipeline: Pipeline,
    horizon_color: parking_lot::Mutex<[f32; 3]>,
    zenith_color: parking_lot::Mutex<[f32; 3]>,
}

impl SkyboxPass {
    /// # Panics
    /// Panics if buffer/pipeline creation fails against a live device.
    #[must_use]
    pub fn new(device: Arc<WgpuDevice>, color_format: Format, depth_format: Format) -> Self {
        let uniform_buffer = device
            .create_buffer(&BufferDesc {
                size: std::mem::size_of::<SkyUniform>() as u64,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
                memory_type: MemoryType::Default,
                stride: 0,
                debug_name: "skybox-uniform".into(),
            })
            .expect("weft: failed to create skybox uniform buffer");

        let layout = device.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("weft-skybox-layout"),
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
        });

        let shader = device.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("weft-skybox"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SRC.into()),
        });
        let pipeline_layout = device.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("weft-skybox-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let raw_pipeline = device.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("weft-skybox-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
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
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format.to_wgpu(),
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            device,
            uniform_buffer,
            layout,
            pipeline: super::common::wrap_graphics_pipeline(raw_pipeline),
            horizon_color: parking_lot::Mutex::new([0.75, 0.82, 0.9]),
            zenith_color: parking_lot::Mutex::new([0.25, 0.45, 0.85]),
        }
    }

    pub fn set_gradient(&self, horizon: [f32; 3], zenith: [f32; 3]) {
        *self.horizon_color.lock() = horizon;
        *self.zenith_color.lock() = zenith;
    }
}

impl RenderPass for SkyboxPass {
    fn name(&self) -> &str {
        "skybox"
    }

    fn priority(&self) -> i32 {
        priority::SKYBOX
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, _view: &ViewData) {
        builder.set_color_attachment(RgTextureHandle::new(0), LoadOp::Load);
        builder.set_depth_stencil(RgTextureHandle::new(1), false, false, LoadOp::Load);
    }

    fn execute(&self, ctx: &mut dyn CommandContext, view: &ViewData) {
        let inverse_view_projection = view.inverse_view * view.inverse_projection;
        let horizon = *self.horizon_color.lock();
        let zenith = *self.zenith_color.lock();
        let uniform = SkyUniform {
            inverse_view_projection: inverse_view_projection.to_cols_array_2d(),
            horizon_color: [horizon[0], horizon[1], horizon[2], 1.0],
            zenith_color: [zenith[0], zenith[1], zenith[2], 1.0],
        };
        self.device.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
        let bind_group = self.device.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("weft-skybox-bind-group"),
            layout: &self.layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: self.uniform_buffer.raw().as_entire_binding(),
            }],
        });
        let set = wrap_descriptor_set(bind_group);

        ctx.bind_pipeline(&self.pipeline);
        ctx.bind_descriptor_set(0, &set);
        ctx.draw(0..3, 0..1);
    }
}
