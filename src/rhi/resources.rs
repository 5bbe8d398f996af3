//! RHI resource descriptors and reference-counted handles.
//!
//! Every handle here is an `Arc`-backed wrapper: ownership is shared, and
//! the underlying `wgpu` object is dropped once the last clone goes away.
//! Deferred release — destruction waits until all in-flight frames that
//! might still reference the resource have completed — is the caller's
//! responsibility: the device registry does not release a handle until
//! `FrameSynchronizer::wait_for_frame` for its frame slot has returned.

use std::sync::Arc;

use crate::rhi::format::{BufferUsage, Format, MemoryType, TextureDimension, TextureUsage};

/// Description of a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
    pub memory_type: MemoryType,
    /// Structured-buffer element stride; 0 for non-structured buffers.
    pub stride: u32,
    pub debug_name: String,
}

/// Description of a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub usage: TextureUsage,
    pub dimension: TextureDimension,
    pub sample_count: u32,
    pub debug_name: String,
}

impl TextureDesc {
    #[must_use]
    pub fn texture_2d(width: u32, height: u32, format: Format, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            format,
            usage,
            dimension: TextureDimension::D2,
            sample_count: 1,
            debug_name: String::new(),
        }
    }

    /// Size in bytes of one array layer at mip 0, ignoring mip chain and
    /// multisampling — used by the aliasing pass as a first-order memory
    /// estimate.
    #[must_use]
    pub fn approx_byte_size(&self) -> u64 {
        let texel_count = u64::from(self.width) * u64::from(self.height) * u64::from(self.depth);
        let bytes_per_texel = u64::from(self.format.block_size());
        let per_layer = if self.format.is_compressed() {
            // Block-compressed formats store one block per 4x4 texel tile.
            let blocks = (u64::from(self.width).div_ceil(4)) * (u64::from(self.height).div_ceil(4));
            blocks * bytes_per_texel
        } else {
            texel_count * bytes_per_texel
        };
        per_layer * u64::from(self.array_size) * u64::from(self.sample_count.max(1))
    }
}

/// A reference-counted GPU buffer.
#[derive(Clone)]
pub struct Buffer(pub(crate) Arc<BufferInner>);

pub(crate) struct BufferInner {
    pub raw: wgpu::Buffer,
    pub desc: BufferDesc,
}

impl Buffer {
    #[must_use]
    pub fn desc(&self) -> &BufferDesc {
        &self.0.desc
    }

    #[must_use]
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.0.raw
    }

    #[must_use]
    pub fn debug_name(&self) -> &str {
        &self.0.desc.debug_name
    }
}

/// A reference-counted GPU texture.
#[derive(Clone)]
pub struct Texture(pub(crate) Arc<TextureInner>);

pub(crate) struct TextureInner {
    pub raw: wgpu::Texture,
    pub desc: TextureDesc,
}

impl Texture {
    #[must_use]
    pub fn desc(&self) -> &TextureDesc {
        &self.0.desc
    }

    #[must_use]
    pub fn raw(&self) -> &wgpu::Texture {
        &self.0.raw
    }

    #[must_use]
    pub fn debug_name(&self) -> &str {
        &self.0.desc.debug_name
    }
}

/// A view into a texture (or a subresource range of it). A distinct
/// entity from `Texture` so a single mip or cube face can be bound as a
/// render target independently.
#[derive(Clone)]
pub struct TextureView(pub(crate) Arc<TextureViewInner>);

pub(crate) struct TextureViewInner {
    pub raw: wgpu::TextureView,
    pub texture: Texture,
    pub format: Format,
}

impl TextureView {
    #[must_use]
    pub fn raw(&self) -> &wgpu::TextureView {
        &self.0.raw
    }

    #[must_use]
    pub fn texture(&self) -> &Texture {
        &self.0.texture
    }
}

/// A reference-counted sampler.
#[derive(Clone)]
pub struct Sampler(pub(crate) Arc<wgpu::Sampler>);

impl Sampler {
    #[must_use]
    pub fn raw(&self) -> &wgpu::Sampler {
        &self.0
    }
}

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Tessellation,
    Compute,
}

/// Kind of a single binding reported by shader reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    ConstantBuffer,
    Texture,
    StorageBuffer,
    Sampler,
    PushConstant,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageMask: u32 {
        const VERTEX       = 1 << 0;
        const FRAGMENT     = 1 << 1;
        const GEOMETRY     = 1 << 2;
        const TESSELLATION = 1 << 3;
        const COMPUTE      = 1 << 4;
    }
}

/// One binding slot described by shader reflection metadata.
#[derive(Debug, Clone)]
pub struct ReflectedBinding {
    pub set: u32,
    pub slot: u32,
    pub kind: BindingKind,
    pub stage_mask: ShaderStageMask,
    pub array_size: u32,
}

/// Shader bytecode plus the reflection metadata every binding needs —
/// each blob arrives alongside its reflection metadata rather than
/// requiring a separate parse pass.
#[derive(Clone)]
pub struct Shader(pub(crate) Arc<ShaderInner>);

pub(crate) struct ShaderInner {
    pub stage: ShaderStage,
    pub module: wgpu::ShaderModule,
    pub bindings: Vec<ReflectedBinding>,
    pub debug_name: String,
}

impl Shader {
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.0.stage
    }

    #[must_use]
    pub fn bindings(&self) -> &[ReflectedBinding] {
        &self.0.bindings
    }

    #[must_use]
    pub fn raw(&self) -> &wgpu::ShaderModule {
        &self.0.module
    }
}

/// A reference-counted pipeline layout.
#[derive(Clone)]
pub struct PipelineLayout(pub(crate) Arc<wgpu::PipelineLayout>);

impl PipelineLayout {
    #[must_use]
    pub fn raw(&self) -> &wgpu::PipelineLayout {
        &self.0
    }
}

/// A reference-counted descriptor-set layout (`wgpu::BindGroupLayout`).
#[derive(Clone)]
pub struct DescriptorSetLayout(pub(crate) Arc<wgpu::BindGroupLayout>);

impl DescriptorSetLayout {
    #[must_use]
    pub fn raw(&self) -> &wgpu::BindGroupLayout {
        &self.0
    }
}

/// A reference-counted descriptor set (`wgpu::BindGroup`).
#[derive(Clone)]
pub struct DescriptorSet(pub(crate) Arc<wgpu::BindGroup>);

impl DescriptorSet {
    #[must_use]
    pub fn raw(&self) -> &wgpu::BindGroup {
        &self.0
    }
}

/// A graphics or compute pipeline state object. Immutable after creation.
#[derive(Clone)]
pub enum Pipeline {
    Graphics(Arc<wgpu::RenderPipeline>),
    Compute(Arc<wgpu::ComputePipeline>),
}

/// A linear allocation region used to place "placed" (aliased) resources.
/// The `wgpu` backend does not expose raw heaps, so `Heap` is
/// a logical bookkeeping object only: the render graph's aliasing pass
/// uses it to compute offsets, and the `wgpu` device realizes each
/// placed resource as an ordinary dedicated allocation. A future
/// explicit backend (Vulkan/DX12) would back this with a real
/// `VkDeviceMemory`/`ID3D12Heap`.
#[derive(Debug, Clone)]
pub struct Heap {
    pub size: u64,
    pub memory_type: MemoryType,
    pub debug_name: String,
}

/// Timeline fence: a monotonically increasing 64-bit value.
pub struct Fence {
    pub(crate) value: std::sync::atomic::AtomicU64,
    pub debug_name: String,
}

impl Fence {
    #[must_use]
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            value: std::sync::atomic::AtomicU64::new(0),
            debug_name: debug_name.into(),
        }
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.value.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn signal(&self, value: u64) {
        self.value.store(value, std::sync::atomic::Ordering::Release);
    }
}

/// Query pool kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Timestamp,
    Occlusion,
    BinaryOcclusion,
    PipelineStatistics,
}

pub struct QueryPool {
    pub raw: wgpu::QuerySet,
    pub ty: QueryType,
    pub count: u32,
}
