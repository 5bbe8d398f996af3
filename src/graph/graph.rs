//! The top-level render graph: resource declaration, pass registration,
//! compile, and execution.

use crate::error::{Result, WeftError};
use crate::rhi::command_context::{Barrier, CommandContext};
use crate::rhi::device::Device;
use crate::rhi::format::ResourceState;
use crate::rhi::resources::{Buffer, BufferDesc, Texture, TextureDesc};
use crate::scene::ViewData;

use super::alias::{alias_transients, AliasRequest};
use super::builder::GraphBuilder;
use super::compile::{self, CompiledPlan};
use super::graphviz::export_graphviz;
use super::handle::{RgBufferHandle, RgTextureHandle};
use super::pass::{resolve_color_attachment, resolve_depth_attachment, PassRecord, RenderPass};
use super::resource::RgResource;
use super::stats::CompileStats;

const TEXTURE_BUCKET: u32 = 0;
const BUFFER_BUCKET: u32 = 1;

/// One frame's render graph: resources and passes are declared fresh each
/// frame, compiled into an execution plan, then run. Not reused across
/// frames; `clear()` resets it for the next one instead of reallocating.
pub struct RenderGraph<'a> {
    resources: Vec<RgResource>,
    passes: Vec<PassRecord<'a>>,
    plan: Option<CompiledPlan>,
    memory_aliasing_enabled: bool,
}

impl<'a> Default for RenderGraph<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderGraph<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            passes: Vec::new(),
            plan: None,
            memory_aliasing_enabled: true,
        }
    }

    pub fn set_memory_aliasing_enabled(&mut self, enabled: bool) {
        self.memory_aliasing_enabled = enabled;
    }

    #[must_use]
    pub fn is_memory_aliasing_enabled(&self) -> bool {
        self.memory_aliasing_enabled
    }

    /// Declares a new transient texture, not backed by any physical
    /// resource until `compile`/`execute` realizes it.
    pub fn create_texture(&mut self, name: impl Into<String>, desc: TextureDesc) -> RgTextureHandle {
        let index = self.resources.len() as u32;
        self.resources.push(RgResource::transient_texture(name, desc));
        RgTextureHandle::new(index)
    }

    pub fn create_buffer(&mut self, name: impl Into<String>, desc: BufferDesc) -> RgBufferHandle {
        let index = self.resources.len() as u32;
        self.resources.push(RgResource::transient_buffer(name, desc));
        RgBufferHandle::new(index)
    }

    /// Imports an externally-owned texture (e.g. the swap chain back
    /// buffer) under the state it is currently known to be in. Importing
    /// the same texture twice in one frame yields two independent graph
    /// entries; callers that want a single shared handle should import
    /// once and reuse the returned handle.
    pub fn import_texture(
        &mut self,
        name: impl Into<String>,
        texture: Texture,
        current_state: ResourceState,
    ) -> RgTextureHandle {
        let index = self.resources.len() as u32;
        self.resources.push(RgResource::imported_texture(name, texture, current_state));
        RgTextureHandle::new(index)
    }

    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: Buffer,
        current_state: ResourceState,
    ) -> RgBufferHandle {
        let index = self.resources.len() as u32;
        self.resources.push(RgResource::imported_buffer(name, buffer, current_state));
        RgBufferHandle::new(index)
    }

    /// Marks the state a resource must be transitioned to by the time the
    /// graph finishes executing (e.g. `Present` for the swap chain image).
    pub fn set_export_texture_state(&mut self, handle: RgTextureHandle, state: ResourceState) {
        if let Some(resource) = self.resources.get_mut(handle.index as usize) {
            resource.export_final_state = Some(state);
        }
    }

    pub fn set_export_buffer_state(&mut self, handle: RgBufferHandle, state: ResourceState) {
        if let Some(resource) = self.resources.get_mut(handle.index as usize) {
            resource.export_final_state = Some(state);
        }
    }

    pub fn add_pass(&mut self, pass: &'a dyn RenderPass) {
        if !pass.is_enabled() {
            return;
        }
        let insertion_order = self.passes.len();
        self.passes.push(PassRecord {
            name: pass.name().to_string(),
            pass_type: pass.pass_type(),
            priority: pass.priority(),
            insertion_order,
            pass,
            accesses: Vec::new(),
            color_attachments: Vec::new(),
            depth_stencil: None,
        });
    }

    /// Runs Setup on every registered pass, then compiles the access graph
    /// into an executable plan. Must be called before `execute`.
    pub fn compile(&mut self, view: &ViewData) -> Result<()> {
        for record in &mut self.passes {
            let mut builder = GraphBuilder::new(
                &mut record.accesses,
                &mut record.color_attachments,
                &mut record.depth_stencil,
            );
            record.pass.setup(&mut builder, view);
        }

        let mut plan = compile::compile(&self.passes, &mut self.resources);

        if compile::has_unresolvable_cycle(&plan) {
            let passes = compile::unresolved_pass_names(&self.passes, &plan);
            return Err(WeftError::GraphCycle { passes });
        }

        if self.memory_aliasing_enabled {
            self.run_aliasing(&plan, &mut plan.stats);
        } else {
            plan.stats.memory_without_aliasing = self.untracked_transient_memory();
            plan.stats.memory_with_aliasing = plan.stats.memory_without_aliasing;
        }

        self.plan = Some(plan);
        Ok(())
    }

    fn untracked_transient_memory(&self) -> u64 {
        self.resources
            .iter()
            .filter(|r| r.is_transient() && r.is_used())
            .map(|r| r.kind.approx_byte_size())
            .sum()
    }

    fn run_aliasing(&self, plan: &CompiledPlan, stats: &mut CompileStats) {
        let mut requests = Vec::new();
        for (index, resource) in self.resources.iter().enumerate() {
            if !resource.is_transient() || !resource.is_used() {
                continue;
            }
            let Some((first_use, last_use)) = compile::resource_lifetime(plan, resource) else {
                continue;
            };
            let bucket = if resource.kind.is_texture() { TEXTURE_BUCKET } else { BUFFER_BUCKET };
            requests.push(AliasRequest {
                resource_index: index,
                bucket,
                first_use,
                last_use,
                size: resource.kind.approx_byte_size(),
                alignment: 256,
            });
        }

        let without_aliasing: u64 = requests.iter().map(|r| r.size).sum();
        let (_placements, heaps) = alias_transients(&requests);

        stats.memory_without_aliasing = without_aliasing;
        stats.memory_with_aliasing = heaps.iter().map(|h| h.size).sum();
        stats.transient_heap_count = heaps.len() as u32;
        stats.aliased_texture_count =
            requests.iter().filter(|r| r.bucket == TEXTURE_BUCKET).count() as u32;
        stats.aliased_buffer_count =
            requests.iter().filter(|r| r.bucket == BUFFER_BUCKET).count() as u32;
    }

    /// Realizes transient resources, then replays the compiled plan:
    /// barriers, render passes, and each live pass's `execute`. Returns the
    /// compile-time statistics for the caller to log or display.
    pub fn execute(
        &mut self,
        device: &dyn Device,
        ctx: &mut dyn CommandContext,
        view: &ViewData,
    ) -> Result<CompileStats> {
        let plan = self.plan.take().ok_or_else(|| {
            WeftError::PipelineCreateFailed("render graph executed before compile".into())
        })?;

        for resource in &mut self.resources {
            if resource.is_transient() && resource.is_used() {
                resource.realize(device);
            }
        }
        self.ensure_attachment_views(device);

        for compiled in &plan.order {
            if !compiled.barriers.is_empty() {
                ctx.resource_barriers(&compiled.barriers);
            }

            let record = &self.passes[compiled.pass_index];
            let is_graphics = record.pass_type == super::pass::PassType::Graphics
                && (!record.color_attachments.is_empty() || record.depth_stencil.is_some());

            if is_graphics {
                self.begin_pass_attachments(ctx, record)?;
            }

            record.pass.execute(ctx, view);

            if is_graphics {
                ctx.end_render_pass();
            }
        }

        if !plan.final_barriers.is_empty() {
            ctx.resource_barriers(&plan.final_barriers);
        }

        Ok(plan.stats)
    }

    fn begin_pass_attachments(
        &self,
        ctx: &mut dyn CommandContext,
        record: &PassRecord<'_>,
    ) -> Result<()> {
        let mut colors_owned = Vec::with_capacity(record.color_attachments.len());
        for desc in &record.color_attachments {
            let resource = self
                .resources
                .get(desc.handle.index as usize)
                .ok_or(WeftError::UnknownResourceHandle(desc.handle.index))?;
            let view = resource.physical_view.clone().ok_or_else(|| {
                WeftError::UnknownResourceHandle(desc.handle.index)
            })?;
            colors_owned.push((desc, view));
        }
        let colors: Vec<_> = colors_owned
            .iter()
            .map(|(desc, view)| resolve_color_attachment(desc, view))
            .collect();

        let depth_owned = if let Some(desc) = &record.depth_stencil {
            let resource = self
                .resources
                .get(desc.handle.index as usize)
                .ok_or(WeftError::UnknownResourceHandle(desc.handle.index))?;
            let view = resource.physical_view.clone().ok_or_else(|| {
                WeftError::UnknownResourceHandle(desc.handle.index)
            })?;
            Some((desc, view))
        } else {
            None
        };
        let depth = depth_owned.as_ref().map(|(desc, view)| resolve_depth_attachment(desc, view));

        ctx.begin_render_pass(&record.name, &colors, depth);
        Ok(())
    }

    /// Creates (or reuses a cached) whole-resource view for every resource
    /// an attachment references. Called by `execute` after transient
    /// resources are realized; exposed so tests can resolve views without
    /// a full command context.
    pub fn ensure_attachment_views(&mut self, device: &dyn Device) {
        for record in &self.passes {
            for desc in &record.color_attachments {
                if let Some(resource) = self.resources.get_mut(desc.handle.index as usize) {
                    resource.ensure_view(device);
                }
            }
            if let Some(desc) = &record.depth_stencil {
                if let Some(resource) = self.resources.get_mut(desc.handle.index as usize) {
                    resource.ensure_view(device);
                }
            }
        }
    }

    #[must_use]
    pub fn to_graphviz(&self) -> Option<String> {
        let plan = self.plan.as_ref()?;
        Some(export_graphviz(&self.passes, &self.resources, plan))
    }

    #[must_use]
    pub fn stats(&self) -> Option<CompileStats> {
        self.plan.as_ref().map(|p| p.stats)
    }

    /// Resets the graph for the next frame; passes are borrowed
    /// references (not owned), so the caller re-registers them each frame.
    pub fn clear(&mut self) {
        self.resources.clear();
        self.passes.clear();
        self.plan = None;
    }
}
