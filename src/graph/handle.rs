//! Lightweight resource handles: integer indices plus optional
//! subresource/range selectors, never RHI resources themselves.

use crate::rhi::format::SubresourceRange;

/// Handle to a graph-managed texture (transient or imported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RgTextureHandle {
    pub index: u32,
    pub subresource: Option<SubresourceRange>,
}

impl RgTextureHandle {
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self { index, subresource: None }
    }

    /// The handle's subresource range, or `None` for "the whole resource"
    /// (the graph resolves `None` against the resource's full extent when
    /// it needs a concrete range).
    #[must_use]
    pub fn subresource(&self) -> Option<SubresourceRange> {
        self.subresource
    }

    /// Narrows this handle to a single mip level, layer 0.
    #[must_use]
    pub fn mip(&self, mip_level: u32) -> Self {
        self.mip_range(mip_level, 1)
    }

    #[must_use]
    pub fn mip_range(&self, base_mip: u32, mip_count: u32) -> Self {
        use crate::rhi::format::Aspect;
        Self {
            index: self.index,
            subresource: Some(SubresourceRange {
                base_mip,
                mip_count,
                base_array_layer: 0,
                array_layer_count: 1,
                aspect: Aspect::Color,
            }),
        }
    }
}

/// Handle to a graph-managed buffer (transient or imported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RgBufferHandle {
    pub index: u32,
    pub offset: Option<u64>,
    pub size: Option<u64>,
}

impl RgBufferHandle {
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self { index, offset: None, size: None }
    }

    #[must_use]
    pub fn range(&self, offset: u64, size: u64) -> Self {
        Self { index: self.index, offset: Some(offset), size: Some(size) }
    }
}
