//! Backend-neutral GPU abstraction layer.
//!
//! `wgpu` is the sole concrete backend: it dispatches to Vulkan, DirectX
//! 12, Metal, or GL/GLES at adapter-request time, and `BackendType`/
//! `Capabilities` surface which one it picked. `RenderGraph` and the
//! rest of the crate depend only on the traits in this module
//! ([`device::Device`], [`command_context::CommandContext`]), never on
//! `wgpu` directly.

pub mod capabilities;
pub mod command_context;
pub mod device;
pub mod format;
pub mod resources;
pub mod upload;

pub use capabilities::{BackendType, Capabilities, MemoryStats};
pub use command_context::{Barrier, BarrierTarget, CommandContext, ColorAttachment, DepthStencilAttachment, LoadOp, RenderPassStats, StoreOp, WgpuCommandContext};
pub use device::{BackendPreference, Device, RhiDeviceConfig, SwapChain, SwapChainConfig, WgpuDevice};
pub use format::{Aspect, BufferUsage, Format, MemoryType, ResourceState, SubresourceRange, TextureDimension, TextureUsage};
pub use resources::{
    BindingKind, Buffer, BufferDesc, DescriptorSet, DescriptorSetLayout, Fence, Heap, Pipeline,
    PipelineLayout, QueryPool, QueryType, ReflectedBinding, Sampler, Shader, ShaderStage,
    ShaderStageMask, Texture, TextureDesc, TextureView,
};
pub use upload::{RingAllocation, RingBuffer, StagingBuffer};
