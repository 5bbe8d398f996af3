//! Shared enumerations between the RHI and the render graph.
//!
//! `Format`, the usage bitsets, `ResourceState` and `MemoryType` are the
//! vocabulary every other module in this crate builds on.

use bitflags::bitflags;

/// Pixel / vertex / index format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    Rgb10a2Unorm,
    Rg11b10Float,
    Depth16Unorm,
    Depth32Float,
    Depth24PlusStencil8,
    Depth32FloatStencil8,
    Bc1RgbaUnorm,
    Bc2RgbaUnorm,
    Bc3RgbaUnorm,
    Bc4RUnorm,
    Bc5RgUnorm,
    Bc6hRgbFloat,
    Bc7RgbaUnorm,
}

impl Format {
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Format::Depth16Unorm
                | Format::Depth32Float
                | Format::Depth24PlusStencil8
                | Format::Depth32FloatStencil8
        )
    }

    #[must_use]
    pub fn is_stencil(self) -> bool {
        matches!(
            self,
            Format::Depth24PlusStencil8 | Format::Depth32FloatStencil8
        )
    }

    #[must_use]
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Format::Bc1RgbaUnorm
                | Format::Bc2RgbaUnorm
                | Format::Bc3RgbaUnorm
                | Format::Bc4RUnorm
                | Format::Bc5RgUnorm
                | Format::Bc6hRgbFloat
                | Format::Bc7RgbaUnorm
        )
    }

    /// Bytes per block (compressed formats are 4x4 blocks; uncompressed
    /// formats report bytes per texel).
    #[must_use]
    pub fn block_size(self) -> u32 {
        match self {
            Format::R8Unorm => 1,
            Format::Rg8Unorm | Format::Depth16Unorm => 2,
            Format::Rgba8Unorm
            | Format::Rgba8UnormSrgb
            | Format::Bgra8Unorm
            | Format::Bgra8UnormSrgb
            | Format::R16Float
            | Format::Rg16Float
            | Format::Rgb10a2Unorm
            | Format::Rg11b10Float
            | Format::Depth32Float
            | Format::Depth24PlusStencil8
            | Format::R32Float => 4,
            Format::Depth32FloatStencil8 | Format::Rg32Float | Format::Rgba16Float => 8,
            Format::Rgba32Float => 16,
            Format::Bc1RgbaUnorm | Format::Bc4RUnorm => 8,
            Format::Bc2RgbaUnorm
            | Format::Bc3RgbaUnorm
            | Format::Bc5RgUnorm
            | Format::Bc6hRgbFloat
            | Format::Bc7RgbaUnorm => 16,
        }
    }

    /// Maps to the `wgpu` equivalent. Panics for formats `wgpu` cannot
    /// express directly (none currently; kept as a single translation
    /// point for the RHI's `wgpu` backend).
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        use wgpu::TextureFormat as Tf;
        match self {
            Format::R8Unorm => Tf::R8Unorm,
            Format::Rg8Unorm => Tf::Rg8Unorm,
            Format::Rgba8Unorm => Tf::Rgba8Unorm,
            Format::Rgba8UnormSrgb => Tf::Rgba8UnormSrgb,
            Format::Bgra8Unorm => Tf::Bgra8Unorm,
            Format::Bgra8UnormSrgb => Tf::Bgra8UnormSrgb,
            Format::R16Float => Tf::R16Float,
            Format::Rg16Float => Tf::Rg16Float,
            Format::Rgba16Float => Tf::Rgba16Float,
            Format::R32Float => Tf::R32Float,
            Format::Rg32Float => Tf::Rg32Float,
            Format::Rgba32Float => Tf::Rgba32Float,
            Format::Rgb10a2Unorm => Tf::Rgb10a2Unorm,
            Format::Rg11b10Float => Tf::Rg11b10Ufloat,
            Format::Depth16Unorm => Tf::Depth16Unorm,
            Format::Depth32Float => Tf::Depth32Float,
            Format::Depth24PlusStencil8 => Tf::Depth24PlusStencil8,
            Format::Depth32FloatStencil8 => Tf::Depth32FloatStencil8,
            Format::Bc1RgbaUnorm => Tf::Bc1RgbaUnorm,
            Format::Bc2RgbaUnorm => Tf::Bc2RgbaUnorm,
            Format::Bc3RgbaUnorm => Tf::Bc3RgbaUnorm,
            Format::Bc4RUnorm => Tf::Bc4RUnorm,
            Format::Bc5RgUnorm => Tf::Bc5RgUnorm,
            Format::Bc6hRgbFloat => Tf::Bc6hRgbFloat,
            Format::Bc7RgbaUnorm => Tf::Bc7RgbaUnorm,
        }
    }
}

bitflags! {
    /// Usage flags for buffer resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX          = 1 << 0;
        const INDEX           = 1 << 1;
        const CONSTANT        = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const UNORDERED_ACCESS= 1 << 4;
        const INDIRECT        = 1 << 5;
        const COPY_SRC        = 1 << 6;
        const COPY_DST        = 1 << 7;
    }
}

impl BufferUsage {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::BufferUsages {
        let mut out = wgpu::BufferUsages::empty();
        if self.contains(Self::VERTEX) {
            out |= wgpu::BufferUsages::VERTEX;
        }
        if self.contains(Self::INDEX) {
            out |= wgpu::BufferUsages::INDEX;
        }
        if self.contains(Self::CONSTANT) {
            out |= wgpu::BufferUsages::UNIFORM;
        }
        if self.contains(Self::SHADER_RESOURCE) || self.contains(Self::UNORDERED_ACCESS) {
            out |= wgpu::BufferUsages::STORAGE;
        }
        if self.contains(Self::INDIRECT) {
            out |= wgpu::BufferUsages::INDIRECT;
        }
        if self.contains(Self::COPY_SRC) {
            out |= wgpu::BufferUsages::COPY_SRC;
        }
        if self.contains(Self::COPY_DST) {
            out |= wgpu::BufferUsages::COPY_DST;
        }
        out
    }
}

bitflags! {
    /// Usage flags for texture resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SHADER_RESOURCE  = 1 << 0;
        const UNORDERED_ACCESS = 1 << 1;
        const RENDER_TARGET    = 1 << 2;
        const DEPTH_STENCIL    = 1 << 3;
        const COPY_SRC         = 1 << 4;
        const COPY_DST         = 1 << 5;
        const PRESENT          = 1 << 6;
    }
}

impl TextureUsage {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureUsages {
        let mut out = wgpu::TextureUsages::empty();
        if self.contains(Self::SHADER_RESOURCE) {
            out |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(Self::UNORDERED_ACCESS) {
            out |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if self.contains(Self::RENDER_TARGET) || self.contains(Self::DEPTH_STENCIL) {
            out |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.contains(Self::COPY_SRC) {
            out |= wgpu::TextureUsages::COPY_SRC;
        }
        if self.contains(Self::COPY_DST) {
            out |= wgpu::TextureUsages::COPY_DST;
        }
        out
    }
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
    Cube,
    CubeArray,
    D2Array,
}

/// Caller-tracked resource state. The render graph walks these
/// transitions to plan barriers; the `wgpu` backend logs and counts them
/// but issues no explicit GPU barrier (wgpu synchronizes automatically).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Undefined,
    Common,
    VertexConstantBuffer,
    IndexBuffer,
    RenderTarget,
    UnorderedAccess,
    DepthWrite,
    DepthRead,
    ShaderResource,
    CopySrc,
    CopyDst,
    Present,
}

/// Residency class of a memory allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Device-local; fastest for GPU access, not host-visible.
    Default,
    /// Host-visible and GPU-readable; used for upload staging.
    Upload,
    /// Host-visible and GPU-writable; used for GPU->CPU readback.
    Readback,
}

/// Identifies a single subresource of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    Color,
    Depth,
    Stencil,
}

/// A contiguous range of mips/array layers, with an aspect mask. Used by
/// both RHI texture views and the render graph's subresource-level
/// barrier tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    pub aspect: Aspect,
}

impl SubresourceRange {
    #[must_use]
    pub fn all(mip_levels: u32, array_size: u32) -> Self {
        Self {
            base_mip: 0,
            mip_count: mip_levels,
            base_array_layer: 0,
            array_layer_count: array_size,
            aspect: Aspect::Color,
        }
    }

    #[must_use]
    pub fn single_mip(mip: u32, array_layer: u32, aspect: Aspect) -> Self {
        Self {
            base_mip: mip,
            mip_count: 1,
            base_array_layer: array_layer,
            array_layer_count: 1,
            aspect,
        }
    }

    /// Whether `self` and `other` touch any common subresource; callers
    /// with disjoint ranges on the same texture retain independent state.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.aspect != other.aspect {
            return false;
        }
        let mips_overlap = self.base_mip < other.base_mip + other.mip_count
            && other.base_mip < self.base_mip + self.mip_count;
        let layers_overlap = self.base_array_layer < other.base_array_layer + other.array_layer_count
            && other.base_array_layer < self.base_array_layer + self.array_layer_count;
        mips_overlap && layers_overlap
    }
}
