//! Single-threaded command recording.
//!
//! One `CommandContext` per frame-in-flight slot; never shared across
//! threads at once. Barriers are caller-tracked (`ResourceState`
//! transitions) so `RenderGraph` can plan them ahead of recording; the
//! `wgpu` backend logs/counts them instead of emitting a GPU-level
//! barrier, since `wgpu` inserts its own.

use std::ops::Range;

use crate::rhi::format::ResourceState;
use crate::rhi::resources::{Buffer, DescriptorSet, Pipeline, Texture, TextureView};

/// A single resource-state transition the graph has planned.
#[derive(Debug, Clone)]
pub enum Barrier {
    Buffer {
        buffer: BarrierTarget,
        before: ResourceState,
        after: ResourceState,
    },
    Texture {
        texture: BarrierTarget,
        before: ResourceState,
        after: ResourceState,
    },
}

/// Identifies the resource a barrier targets without requiring the
/// caller to hand over a live RHI handle — the graph plans barriers
/// against virtual handles before any physical resource exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierTarget(pub u32);

/// Color or depth/stencil attachment load/store behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp<T> {
    Load,
    Clear(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorAttachment<'a> {
    pub view: &'a TextureView,
    pub load: LoadOp<[f32; 4]>,
    pub store: StoreOp,
}

#[derive(Debug, Clone, Copy)]
pub struct DepthStencilAttachment<'a> {
    pub view: &'a TextureView,
    pub depth_load: LoadOp<f32>,
    pub depth_store: StoreOp,
    /// Attachment is bound read-only; writing and reading it in the same
    /// pass without this set is a usage defect the graph rejects.
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPassStats {
    pub draw_calls: u32,
    pub barriers_recorded: u32,
}

/// Recording-side contract every backend's command recorder satisfies.
pub trait CommandContext {
    fn reset(&mut self);
    fn begin(&mut self);
    fn end(&mut self);

    fn resource_barriers(&mut self, barriers: &[Barrier]);

    fn begin_render_pass(
        &mut self,
        debug_name: &str,
        colors: &[ColorAttachment<'_>],
        depth_stencil: Option<DepthStencilAttachment<'_>>,
    );
    fn end_render_pass(&mut self);

    fn bind_pipeline(&mut self, pipeline: &Pipeline);
    fn bind_descriptor_set(&mut self, index: u32, set: &DescriptorSet);
    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64);
    fn bind_index_buffer(&mut self, buffer: &Buffer, offset: u64, index_size: u8);

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
    fn draw_indirect(&mut self, buffer: &Buffer, offset: u64);
    fn draw_indexed_indirect(&mut self, buffer: &Buffer, offset: u64);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64);

    fn copy_buffer_to_buffer(&mut self, src: &Buffer, src_offset: u64, dst: &Buffer, dst_offset: u64, size: u64);
    fn copy_buffer_to_texture(&mut self, src: &Buffer, dst: &Texture);

    fn push_debug_marker(&mut self, label: &str);
    fn pop_debug_marker(&mut self);

    fn stats(&self) -> RenderPassStats;
}

/// The `wgpu`-backed command recorder. Wraps a single
/// `wgpu::CommandEncoder`. `wgpu::RenderPass<'_>` borrows its encoder, so
/// it cannot be stored behind the trait's `&mut self` methods between
/// `begin_render_pass` and `end_render_pass`; instead, pass commands are
/// queued and the actual `wgpu::RenderPass` is opened and closed inside
/// `end_render_pass`, once every command is known.
pub struct WgpuCommandContext {
    encoder: Option<wgpu::CommandEncoder>,
    device: std::sync::Arc<wgpu::Device>,
    label: String,
    stats: RenderPassStats,
    active_pass: Option<ActivePass>,
}

struct OwnedColorAttachment {
    view: TextureView,
    load: LoadOp<[f32; 4]>,
    store: StoreOp,
}

struct OwnedDepthAttachment {
    view: TextureView,
    depth_load: LoadOp<f32>,
    depth_store: StoreOp,
}

struct ActivePass {
    commands: Vec<PassCommand>,
    colors: Vec<OwnedColorAttachment>,
    depth: Option<OwnedDepthAttachment>,
}

enum PassCommand {
    BindPipeline(Pipeline),
    BindDescriptorSet(u32, DescriptorSet),
    BindVertexBuffer(u32, Buffer, u64),
    BindIndexBuffer(Buffer, u64, wgpu::IndexFormat),
    Draw(Range<u32>, Range<u32>),
    DrawIndexed(Range<u32>, i32, Range<u32>),
    DrawIndirect(Buffer, u64),
    DrawIndexedIndirect(Buffer, u64),
}

impl WgpuCommandContext {
    #[must_use]
    pub fn new(device: std::sync::Arc<wgpu::Device>, label: impl Into<String>) -> Self {
        Self {
            encoder: None,
            device,
            label: label.into(),
            stats: RenderPassStats::default(),
            active_pass: None,
        }
    }

    pub fn finish(&mut self) -> Option<wgpu::CommandBuffer> {
        self.encoder.take().map(wgpu::CommandEncoder::finish)
    }
}

impl CommandContext for WgpuCommandContext {
    fn reset(&mut self) {
        self.encoder = None;
        self.stats = RenderPassStats::default();
        self.active_pass = None;
    }

    fn begin(&mut self) {
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(&self.label) }),
        );
    }

    fn end(&mut self) {
        // finish() consumes the encoder; callers that only need stats
        // can call end() without finish()ing immediately.
    }

    fn resource_barriers(&mut self, barriers: &[Barrier]) {
        // wgpu synchronizes resource access automatically; barriers are
        // counted for CompileStats but issue no command.
        self.stats.barriers_recorded += u32::try_from(barriers.len()).unwrap_or(u32::MAX);
        log::trace!("weft: {} barrier(s) elided (wgpu auto-sync)", barriers.len());
    }

    fn begin_render_pass(
        &mut self,
        debug_name: &str,
        colors: &[ColorAttachment<'_>],
        depth_stencil: Option<DepthStencilAttachment<'_>>,
    ) {
        let colors = colors
            .iter()
            .map(|c| OwnedColorAttachment {
                view: c.view.clone(),
                load: c.load,
                store: c.store,
            })
            .collect();
        let depth = depth_stencil.map(|d| OwnedDepthAttachment {
            view: d.view.clone(),
            depth_load: d.depth_load,
            depth_store: d.depth_store,
        });

        log::debug!("weft: begin render pass '{debug_name}'");
        self.active_pass = Some(ActivePass {
            commands: Vec::new(),
            colors,
            depth,
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pass_data) = self.active_pass.take() else {
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = pass_data
            .colors
            .iter()
            .map(|c| {
                let load = match c.load {
                    LoadOp::Load => wgpu::LoadOp::Load,
                    LoadOp::Clear([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(r),
                        g: f64::from(g),
                        b: f64::from(b),
                        a: f64::from(a),
                    }),
                };
                let store = match c.store {
                    StoreOp::Store => wgpu::StoreOp::Store,
                    StoreOp::Discard => wgpu::StoreOp::Discard,
                };
                Some(wgpu::RenderPassColorAttachment {
                    view: c.view.raw(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store },
                })
            })
            .collect();

        let depth_stencil_attachment = pass_data.depth.as_ref().map(|d| {
            let depth_load = match d.depth_load {
                LoadOp::Load => wgpu::LoadOp::Load,
                LoadOp::Clear(v) => wgpu::LoadOp::Clear(v),
            };
            let depth_store = match d.depth_store {
                StoreOp::Store => wgpu::StoreOp::Store,
                StoreOp::Discard => wgpu::StoreOp::Discard,
            };
            wgpu::RenderPassDepthStencilAttachment {
                view: d.view.raw(),
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: depth_store,
                }),
                stencil_ops: None,
            }
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: None,
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_stencil_attachment.as_ref(),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        for cmd in &pass_data.commands {
            match cmd {
                PassCommand::BindPipeline(p) => match p {
                    Pipeline::Graphics(rp) => pass.set_pipeline(rp),
                    Pipeline::Compute(_) => {}
                },
                PassCommand::BindDescriptorSet(index, set) => pass.set_bind_group(*index, set.raw(), &[]),
                PassCommand::BindVertexBuffer(slot, buffer, offset) => {
                    pass.set_vertex_buffer(*slot, buffer.raw().slice(*offset..));
                }
                PassCommand::BindIndexBuffer(buffer, offset, fmt) => {
                    pass.set_index_buffer(buffer.raw().slice(*offset..), *fmt);
                }
                PassCommand::Draw(vertices, instances) => {
                    pass.draw(vertices.clone(), instances.clone());
                    self.stats.draw_calls += 1;
                }
                PassCommand::DrawIndexed(indices, base_vertex, instances) => {
                    pass.draw_indexed(indices.clone(), *base_vertex, instances.clone());
                    self.stats.draw_calls += 1;
                }
                PassCommand::DrawIndirect(buffer, offset) => {
                    pass.draw_indirect(buffer.raw(), *offset);
                    self.stats.draw_calls += 1;
                }
                PassCommand::DrawIndexedIndirect(buffer, offset) => {
                    pass.draw_indexed_indirect(buffer.raw(), *offset);
                    self.stats.draw_calls += 1;
                }
            }
        }
    }

    fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands.push(PassCommand::BindPipeline(pipeline.clone()));
        }
    }

    fn bind_descriptor_set(&mut self, index: u32, set: &DescriptorSet) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands.push(PassCommand::BindDescriptorSet(index, set.clone()));
        }
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands
                .push(PassCommand::BindVertexBuffer(slot, buffer.clone(), offset));
        }
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer, offset: u64, index_size: u8) {
        let fmt = if index_size == 2 {
            wgpu::IndexFormat::Uint16
        } else {
            wgpu::IndexFormat::Uint32
        };
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands.push(PassCommand::BindIndexBuffer(buffer.clone(), offset, fmt));
        }
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands.push(PassCommand::Draw(vertices, instances));
        }
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands
                .push(PassCommand::DrawIndexed(indices, base_vertex, instances));
        }
    }

    fn draw_indirect(&mut self, buffer: &Buffer, offset: u64) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands.push(PassCommand::DrawIndirect(buffer.clone(), offset));
        }
    }

    fn draw_indexed_indirect(&mut self, buffer: &Buffer, offset: u64) {
        if let Some(pass) = self.active_pass.as_mut() {
            pass.commands
                .push(PassCommand::DrawIndexedIndirect(buffer.clone(), offset));
        }
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        if let Some(encoder) = self.encoder.as_mut() {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            pass.dispatch_workgroups(x, y, z);
        }
    }

    fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64) {
        if let Some(encoder) = self.encoder.as_mut() {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            pass.dispatch_workgroups_indirect(buffer.raw(), offset);
        }
    }

    fn copy_buffer_to_buffer(&mut self, src: &Buffer, src_offset: u64, dst: &Buffer, dst_offset: u64, size: u64) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.copy_buffer_to_buffer(src.raw(), src_offset, dst.raw(), dst_offset, size);
        }
    }

    fn copy_buffer_to_texture(&mut self, src: &Buffer, dst: &Texture) {
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let desc = dst.desc();
        let bytes_per_row = desc.width * desc.format.block_size();
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: src.raw(),
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(desc.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: dst.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn push_debug_marker(&mut self, label: &str) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.push_debug_group(label);
        }
    }

    fn pop_debug_marker(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.pop_debug_group();
        }
    }

    fn stats(&self) -> RenderPassStats {
        self.stats
    }
}
