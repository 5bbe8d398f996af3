//! Per-pass access recorder, handed to [`RenderPass::setup`](super::pass::RenderPass::setup).

use crate::rhi::format::ResourceState;
use crate::rhi::resources::ShaderStageMask;

use super::handle::{RgBufferHandle, RgTextureHandle};
use super::pass::{AccessKind, ColorAttachmentDesc, DepthStencilAttachmentDesc, ResourceAccess, ResourceHandle};
use crate::rhi::command_context::LoadOp;

/// Records one pass's resource accesses and attachment bindings during
/// graph Setup. Dropped once Setup for that pass returns.
pub struct GraphBuilder<'p> {
    accesses: &'p mut Vec<ResourceAccess>,
    color_attachments: &'p mut Vec<ColorAttachmentDesc>,
    depth_stencil: &'p mut Option<DepthStencilAttachmentDesc>,
}

impl<'p> GraphBuilder<'p> {
    pub(crate) fn new(
        accesses: &'p mut Vec<ResourceAccess>,
        color_attachments: &'p mut Vec<ColorAttachmentDesc>,
        depth_stencil: &'p mut Option<DepthStencilAttachmentDesc>,
    ) -> Self {
        Self { accesses, color_attachments, depth_stencil }
    }

    pub fn read_texture(&mut self, handle: RgTextureHandle, stages: ShaderStageMask) -> RgTextureHandle {
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Texture(handle),
            kind: AccessKind::Read,
            state: ResourceState::ShaderResource,
            shader_stages: stages,
        });
        handle
    }

    pub fn read_buffer(&mut self, handle: RgBufferHandle, stages: ShaderStageMask) -> RgBufferHandle {
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Buffer(handle),
            kind: AccessKind::Read,
            state: ResourceState::VertexConstantBuffer,
            shader_stages: stages,
        });
        handle
    }

    pub fn write_texture(&mut self, handle: RgTextureHandle, state: ResourceState) -> RgTextureHandle {
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Texture(handle),
            kind: AccessKind::Write,
            state,
            shader_stages: ShaderStageMask::empty(),
        });
        handle
    }

    pub fn write_buffer(&mut self, handle: RgBufferHandle, state: ResourceState) -> RgBufferHandle {
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Buffer(handle),
            kind: AccessKind::Write,
            state,
            shader_stages: ShaderStageMask::empty(),
        });
        handle
    }

    pub fn read_write_texture(&mut self, handle: RgTextureHandle) -> RgTextureHandle {
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Texture(handle),
            kind: AccessKind::ReadWrite,
            state: ResourceState::UnorderedAccess,
            shader_stages: ShaderStageMask::COMPUTE,
        });
        handle
    }

    pub fn read_write_buffer(&mut self, handle: RgBufferHandle) -> RgBufferHandle {
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Buffer(handle),
            kind: AccessKind::ReadWrite,
            state: ResourceState::UnorderedAccess,
            shader_stages: ShaderStageMask::COMPUTE,
        });
        handle
    }

    pub fn read_mip(&mut self, handle: RgTextureHandle, mip_level: u32) -> RgTextureHandle {
        self.read_texture(handle.mip(mip_level), ShaderStageMask::FRAGMENT)
    }

    pub fn write_mip(&mut self, handle: RgTextureHandle, mip_level: u32) -> RgTextureHandle {
        self.write_texture(handle.mip(mip_level), ResourceState::RenderTarget)
    }

    /// Declares a color attachment; implies a `RenderTarget` write.
    pub fn set_color_attachment(&mut self, handle: RgTextureHandle, load: LoadOp<[f32; 4]>) {
        self.write_texture(handle, ResourceState::RenderTarget);
        self.color_attachments.push(ColorAttachmentDesc { handle, load });
    }

    /// Declares the pass's depth-stencil attachment. `depth_write=false`
    /// implies `DepthRead` state; `depth_write=true` implies `DepthWrite`.
    pub fn set_depth_stencil(
        &mut self,
        handle: RgTextureHandle,
        depth_write: bool,
        stencil_write: bool,
        load: LoadOp<f32>,
    ) {
        let state = if depth_write { ResourceState::DepthWrite } else { ResourceState::DepthRead };
        self.accesses.push(ResourceAccess {
            handle: ResourceHandle::Texture(handle),
            kind: if depth_write { AccessKind::Write } else { AccessKind::Read },
            state,
            shader_stages: ShaderStageMask::FRAGMENT,
        });
        *self.depth_stencil = Some(DepthStencilAttachmentDesc {
            handle,
            depth_write,
            stencil_write,
            read_only: !depth_write,
            load,
        });
    }
}
