//! Orchestrates a scene's per-frame render: collects the world into a
//! [`RenderScene`], builds a fresh [`RenderGraph`] over the registered
//! pass library, and executes it against a [`RenderContext`]'s current
//! frame.
//!
//! Grounded on
//! `original_source/Render/Include/Render/Renderer/SceneRenderer.h` for
//! the `SetupView`/`Render`/depth-buffer-ownership/back-buffer-state
//! responsibilities.

use std::sync::Arc;

use crate::context::RenderContext;
use crate::error::Result;
use crate::graph::{CompileStats, RenderGraph, RenderPass};
use crate::pipeline::PipelineCache;
use crate::rhi::device::{Device as _, WgpuDevice};
use crate::rhi::format::{Format, ResourceState, TextureDimension, TextureUsage};
use crate::rhi::resources::{Texture, TextureDesc, TextureView};
use crate::scene::{Camera, RenderScene, ViewData, WorldSource};

/// Wraps a `wgpu::SurfaceTexture`'s texture (owned by the swap chain, not
/// this crate's device) in an RHI [`Texture`] handle so it can be
/// imported into the render graph like any other resource.
fn wrap_surface_texture(raw: &wgpu::Texture, format: Format, width: u32, height: u32) -> Texture {
    use crate::rhi::resources::TextureInner;
    Texture(std::sync::Arc::new(TextureInner {
        raw: raw.clone(),
        desc: TextureDesc {
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            format,
            usage: TextureUsage::RENDER_TARGET,
            dimension: TextureDimension::D2,
            sample_count: 1,
            debug_name: "back-buffer".into(),
        },
    }))
}

/// Owns the pass library, the GPU resource manager, the pipeline cache,
/// and the depth buffer; drives one [`RenderGraph`] build+compile+execute
/// cycle per frame.
pub struct SceneRenderer {
    passes: Vec<Box<dyn RenderPass>>,
    pipeline_cache: PipelineCache,
    scene: RenderScene,
    view_data: ViewData,
    visible_object_indices: Vec<u32>,
    depth_texture: Option<Texture>,
    depth_view: Option<TextureView>,
    depth_width: u32,
    depth_height: u32,
    depth_format: Format,
    back_buffer_states: Vec<ResourceState>,
    depth_buffer_state: ResourceState,
    frame_number: u64,
    time: f32,
}

impl SceneRenderer {
    /// # Errors
    /// Returns an error if the pipeline cache's constant buffers could
    /// not be created.
    pub fn new(device: Arc<WgpuDevice>, frame_buffering: u32, depth_format: Format) -> Result<Self> {
        let pipeline_cache = PipelineCache::new(device)?;
        Ok(Self {
            passes: Vec::new(),
            pipeline_cache,
            scene: RenderScene::new(),
            view_data: ViewData {
                view: glam::Mat4::IDENTITY,
                projection: glam::Mat4::IDENTITY,
                view_projection: glam::Mat4::IDENTITY,
                inverse_view: glam::Mat4::IDENTITY,
                inverse_projection: glam::Mat4::IDENTITY,
                camera_position: glam::Vec3::ZERO,
                camera_forward: glam::Vec3::NEG_Z,
                near: 0.1,
                far: 1000.0,
                fov: 60.0,
                viewport_width: 0,
                viewport_height: 0,
                frame_number: 0,
                time: 0.0,
                delta_time: 0.0,
            },
            visible_object_indices: Vec::new(),
            depth_texture: None,
            depth_view: None,
            depth_width: 0,
            depth_height: 0,
            depth_format,
            back_buffer_states: vec![ResourceState::Undefined; frame_buffering.max(1) as usize],
            depth_buffer_state: ResourceState::Undefined,
            frame_number: 0,
            time: 0.0,
        })
    }

    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
        self.passes.push(pass);
    }

    pub fn remove_pass(&mut self, name: &str) -> bool {
        let before = self.passes.len();
        self.passes.retain(|p| p.name() != name);
        self.passes.len() != before
    }

    pub fn clear_passes(&mut self) {
        self.passes.clear();
    }

    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[must_use]
    pub fn pipeline_cache_mut(&mut self) -> &mut PipelineCache {
        &mut self.pipeline_cache
    }

    #[must_use]
    pub fn render_scene(&self) -> &RenderScene {
        &self.scene
    }

    #[must_use]
    pub fn view_data(&self) -> &ViewData {
        &self.view_data
    }

    /// Builds this frame's `ViewData` from `camera` and, if `world` is
    /// given, collects+culls+sorts the scene against it.
    pub fn setup_view(&mut self, camera: &Camera, world: Option<&dyn WorldSource>, viewport: (u32, u32), delta_time: f32) {
        if viewport.0 == 0 || viewport.1 == 0 {
            // A minimized window or a swap chain mid-resize reports a
            // zero-sized viewport; there is nothing to build a view for.
            return;
        }
        let render_camera = camera.extract_render_camera();
        self.time += delta_time;
        self.view_data = ViewData::from_camera(&render_camera, viewport.0, viewport.1, self.frame_number, self.time, delta_time);
        self.view_data.fov = camera.fov;

        if let Some(world) = world {
            self.scene.collect_from_world(world);
            self.visible_object_indices = self.scene.cull_against_camera(&render_camera.frustum);
        }
    }

    #[must_use]
    pub fn visible_object_indices(&self) -> &[u32] {
        &self.visible_object_indices
    }

    fn ensure_depth_buffer(&mut self, device: &WgpuDevice, width: u32, height: u32) {
        if self.depth_texture.is_some() && self.depth_width == width && self.depth_height == height {
            return;
        }
        let desc = TextureDesc {
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            format: self.depth_format,
            usage: TextureUsage::DEPTH_STENCIL,
            dimension: crate::rhi::format::TextureDimension::D2,
            sample_count: 1,
            debug_name: "scene-depth".into(),
        };
        let texture = device.create_texture(&desc);
        self.depth_view = texture.as_ref().and_then(|t| device.create_texture_view(t));
        self.depth_texture = texture;
        self.depth_width = width;
        self.depth_height = height;
        self.depth_buffer_state = ResourceState::Undefined;
    }

    /// Builds a fresh [`RenderGraph`] for the current frame, imports the
    /// back buffer and depth buffer, runs every registered pass's Setup,
    /// compiles, and executes against `ctx`'s current frame.
    pub fn render(&mut self, render_context: &mut RenderContext) -> Result<CompileStats> {
        let width = render_context.swap_chain().width();
        let height = render_context.swap_chain().height();
        if width == 0 || height == 0 {
            // Zero-sized viewport (e.g. a minimized window): no-op rather
            // than building a graph around a zero-area depth buffer.
            return Ok(CompileStats::default());
        }
        let device = render_context.device().clone();
        self.ensure_depth_buffer(&device, width, height);

        let back_buffer_texture = render_context.current_back_buffer().map(|frame| {
            wrap_surface_texture(&frame.texture, render_context.swap_chain().format(), width, height)
        });

        let slot = render_context.frame_index() as usize;
        let back_buffer_state = self.back_buffer_states[slot];

        // Import order is load-bearing: passes in `crate::passes` hardcode
        // handle index 0 as the back buffer and index 1 as the depth
        // buffer rather than threading handles through `RenderPass::setup`,
        // since that method takes `&self` with no resource-table access.
        let mut graph = RenderGraph::new();
        let back_buffer_handle = back_buffer_texture.map(|texture| {
            let handle = graph.import_texture("back-buffer", texture, back_buffer_state);
            graph.set_export_texture_state(handle, ResourceState::Present);
            handle
        });
        debug_assert!(back_buffer_handle.is_none_or(|h| h == crate::graph::RgTextureHandle::new(0)));
        let depth_handle = self.depth_texture.clone().map(|texture| {
            graph.import_texture("scene-depth", texture, self.depth_buffer_state)
        });
        debug_assert!(depth_handle.is_none_or(|h| h == crate::graph::RgTextureHandle::new(1)));

        for pass in &self.passes {
            graph.add_pass(pass.as_ref());
        }

        graph.compile(&self.view_data)?;
        let stats = graph.execute(device.as_ref(), render_context.graphics_context(), &self.view_data)?;

        self.back_buffer_states[slot] = ResourceState::Present;
        self.depth_buffer_state = ResourceState::DepthWrite;
        self.frame_number += 1;
        Ok(stats)
    }
}
