//! Render graph: declarative, per-frame GPU resource and pass scheduling.
//!
//! Passes declare their resource accesses during Setup against a
//! [`GraphBuilder`]; `compile` turns the resulting access graph into a
//! dependency-ordered, barrier-planned [`compile::CompiledPlan`], which
//! `execute` replays against a [`CommandContext`](crate::rhi::command_context::CommandContext).

mod alias;
mod builder;
mod compile;
mod graph;
mod graphviz;
mod handle;
mod pass;
mod resource;
mod stats;

pub use alias::{AliasPlacement, AliasRequest, BucketHeap};
pub use builder::GraphBuilder;
pub use compile::{has_unresolvable_cycle, resource_lifetime, unresolved_pass_names, CompiledPass, CompiledPlan};
pub use graph::RenderGraph;
pub use graphviz::export_graphviz;
pub use handle::{RgBufferHandle, RgTextureHandle};
pub use pass::{
    priority, AccessKind, ColorAttachmentDesc, DepthStencilAttachmentDesc, PassRecord, PassType,
    RenderPass, ResourceAccess, ResourceHandle,
};
pub use resource::{RgResource, RgResourceKind};
pub use stats::CompileStats;
