//! Pass records and the resource accesses collected during Setup.

use crate::rhi::command_context::{ColorAttachment, DepthStencilAttachment};
use crate::rhi::format::ResourceState;
use crate::rhi::resources::ShaderStageMask;
use crate::scene::ViewData;

use super::builder::GraphBuilder;
use super::handle::{RgBufferHandle, RgTextureHandle};

/// Standard pass priority slots; lower executes earlier.
pub mod priority {
    pub const DEPTH_PREPASS: i32 = 100;
    pub const SHADOW: i32 = 200;
    pub const OPAQUE: i32 = 300;
    pub const SKYBOX: i32 = 400;
    pub const TRANSPARENT: i32 = 500;
    pub const POST_PROCESS: i32 = 1000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    Graphics,
    Compute,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy)]
pub enum ResourceHandle {
    Texture(RgTextureHandle),
    Buffer(RgBufferHandle),
}

impl ResourceHandle {
    #[must_use]
    pub fn index(&self) -> u32 {
        match self {
            Self::Texture(h) => h.index,
            Self::Buffer(h) => h.index,
        }
    }
}

/// One declared access to a resource by a pass, recorded via the builder
/// during Setup.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAccess {
    pub handle: ResourceHandle,
    pub kind: AccessKind,
    pub state: ResourceState,
    pub shader_stages: ShaderStageMask,
}

/// Implemented by every concrete render pass. `setup` declares resource
/// access against the builder; `execute` records the actual GPU commands.
/// Disabled passes are skipped entirely (neither callback runs).
pub trait RenderPass {
    fn name(&self) -> &str;

    fn pass_type(&self) -> PassType {
        PassType::Graphics
    }

    fn priority(&self) -> i32;

    fn is_enabled(&self) -> bool {
        true
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, view: &ViewData);

    fn execute(&self, ctx: &mut dyn crate::rhi::command_context::CommandContext, view: &ViewData);
}

/// Bookkeeping the graph keeps per registered pass across Setup/Compile/Execute.
pub struct PassRecord<'a> {
    pub name: String,
    pub pass_type: PassType,
    pub priority: i32,
    pub insertion_order: usize,
    pub pass: &'a dyn RenderPass,
    pub accesses: Vec<ResourceAccess>,
    pub color_attachments: Vec<ColorAttachmentDesc>,
    pub depth_stencil: Option<DepthStencilAttachmentDesc>,
}

/// Color attachment declared via `GraphBuilder::set_color_attachment`,
/// resolved to a concrete [`ColorAttachment`] once the physical texture
/// view is known at execute time.
#[derive(Clone, Copy)]
pub struct ColorAttachmentDesc {
    pub handle: RgTextureHandle,
    pub load: crate::rhi::command_context::LoadOp<[f32; 4]>,
}

#[derive(Clone, Copy)]
pub struct DepthStencilAttachmentDesc {
    pub handle: RgTextureHandle,
    pub depth_write: bool,
    pub stencil_write: bool,
    pub read_only: bool,
    pub load: crate::rhi::command_context::LoadOp<f32>,
}

pub(crate) fn resolve_color_attachment<'a>(
    desc: &ColorAttachmentDesc,
    view: &'a crate::rhi::resources::TextureView,
) -> ColorAttachment<'a> {
    ColorAttachment { view, load: desc.load, store: crate::rhi::command_context::StoreOp::Store }
}

pub(crate) fn resolve_depth_attachment<'a>(
    desc: &DepthStencilAttachmentDesc,
    view: &'a crate::rhi::resources::TextureView,
) -> DepthStencilAttachment<'a> {
    DepthStencilAttachment {
        view,
        depth_load: desc.load,
        depth_store: crate::rhi::command_context::StoreOp::Store,
        read_only: desc.read_only,
    }
}
