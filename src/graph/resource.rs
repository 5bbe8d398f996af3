//! Graph-tracked resource bookkeeping: transient descriptors, imports,
//! and the producer/consumer lists compile uses to build the access graph.

use crate::rhi::device::Device;
use crate::rhi::format::ResourceState;
use crate::rhi::resources::{Buffer, BufferDesc, Texture, TextureDesc, TextureView};

/// Which kind of physical resource a graph entry wraps.
pub enum RgResourceKind {
    TransientTexture(TextureDesc),
    TransientBuffer(BufferDesc),
    ImportedTexture(Texture),
    ImportedBuffer(Buffer),
}

impl RgResourceKind {
    #[must_use]
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::TransientTexture(_) | Self::ImportedTexture(_))
    }

    #[must_use]
    pub fn approx_byte_size(&self) -> u64 {
        match self {
            Self::TransientTexture(desc) => desc.approx_byte_size(),
            Self::TransientBuffer(desc) => desc.size,
            Self::ImportedTexture(_) | Self::ImportedBuffer(_) => 0,
        }
    }
}

/// One resource entry tracked by the graph for the current frame.
pub struct RgResource {
    pub name: String,
    pub kind: RgResourceKind,
    pub initial_state: ResourceState,
    pub export_final_state: Option<ResourceState>,
    /// Indices (into the graph's pass list) of passes that write this
    /// resource, in the order they were declared.
    pub producers: Vec<usize>,
    /// Indices of passes that read or read-write this resource.
    pub consumers: Vec<usize>,
    /// Physical resource assigned during compile, once realized.
    pub physical_texture: Option<Texture>,
    pub physical_buffer: Option<Buffer>,
    /// Whole-resource view, lazily created the first time a pass binds
    /// this resource as an attachment.
    pub physical_view: Option<TextureView>,
}

impl RgResource {
    #[must_use]
    pub fn transient_texture(name: impl Into<String>, desc: TextureDesc) -> Self {
        Self {
            name: name.into(),
            kind: RgResourceKind::TransientTexture(desc),
            initial_state: ResourceState::Undefined,
            export_final_state: None,
            producers: Vec::new(),
            consumers: Vec::new(),
            physical_texture: None,
            physical_buffer: None,
            physical_view: None,
        }
    }

    #[must_use]
    pub fn transient_buffer(name: impl Into<String>, desc: BufferDesc) -> Self {
        Self {
            name: name.into(),
            kind: RgResourceKind::TransientBuffer(desc),
            initial_state: ResourceState::Undefined,
            export_final_state: None,
            producers: Vec::new(),
            consumers: Vec::new(),
            physical_texture: None,
            physical_buffer: None,
            physical_view: None,
        }
    }

    #[must_use]
    pub fn imported_texture(name: impl Into<String>, texture: Texture, initial_state: ResourceState) -> Self {
        Self {
            name: name.into(),
            kind: RgResourceKind::ImportedTexture(texture),
            initial_state,
            export_final_state: None,
            producers: Vec::new(),
            consumers: Vec::new(),
            physical_texture: None,
            physical_buffer: None,
            physical_view: None,
        }
    }

    #[must_use]
    pub fn imported_buffer(name: impl Into<String>, buffer: Buffer, initial_state: ResourceState) -> Self {
        Self {
            name: name.into(),
            kind: RgResourceKind::ImportedBuffer(buffer),
            initial_state,
            export_final_state: None,
            producers: Vec::new(),
            consumers: Vec::new(),
            physical_texture: None,
            physical_buffer: None,
            physical_view: None,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, RgResourceKind::TransientTexture(_) | RgResourceKind::TransientBuffer(_))
    }

    #[must_use]
    pub fn is_used(&self) -> bool {
        !self.producers.is_empty() || !self.consumers.is_empty()
    }

    /// Creates the backing RHI resource for a transient entry, if not
    /// already realized. Imported entries already own theirs. Each
    /// transient gets its own independent allocation regardless of its
    /// aliasing placement: `wgpu` has no placed-resource API to honor the
    /// computed heap offset, so aliasing here is bookkeeping/statistics
    /// only, not a physical memory reuse.
    pub fn realize(&mut self, device: &dyn Device) {
        match &self.kind {
            RgResourceKind::TransientTexture(desc) if self.physical_texture.is_none() => {
                self.physical_texture = device.create_texture(desc);
            }
            RgResourceKind::TransientBuffer(desc) if self.physical_buffer.is_none() => {
                self.physical_buffer = device.create_buffer(desc);
            }
            _ => {}
        }
    }

    /// Returns (creating lazily if needed) a whole-resource view of this
    /// entry's physical texture, for use as a render pass attachment.
    pub fn ensure_view(&mut self, device: &dyn Device) -> Option<&TextureView> {
        if self.physical_view.is_none() {
            let texture = match &self.kind {
                RgResourceKind::ImportedTexture(t) => Some(t),
                _ => self.physical_texture.as_ref(),
            }?;
            self.physical_view = device.create_texture_view(texture);
        }
        self.physical_view.as_ref()
    }
}
