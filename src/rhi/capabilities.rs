//! Device capability and memory reporting.

/// Which concrete graphics API the RHI device is realized on.
///
/// `wgpu` dispatches to one of these at adapter-request time; the core
/// does not implement separate backends per API, it wraps `wgpu` and
/// surfaces whichever backend `wgpu` picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    Auto,
    Vulkan,
    Dx12,
    Metal,
    OpenGl,
    BrowserWebGpu,
    Unknown,
}

impl BackendType {
    #[must_use]
    pub fn from_wgpu(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Vulkan => BackendType::Vulkan,
            wgpu::Backend::Dx12 => BackendType::Dx12,
            wgpu::Backend::Metal => BackendType::Metal,
            wgpu::Backend::Gl => BackendType::OpenGl,
            wgpu::Backend::BrowserWebGpu => BackendType::BrowserWebGpu,
            _ => BackendType::Unknown,
        }
    }
}

/// Adapter/device capability report.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub backend: BackendType,
    pub adapter_name: String,
    pub max_color_attachments: u32,
    pub max_texture_dimension_2d: u32,
    pub uniform_buffer_alignment: u32,
    pub storage_buffer_alignment: u32,
    pub timestamp_period_ns: f32,
    /// True when the backend's clip space has Y pointing down (Vulkan,
    /// DX12, Metal); false for OpenGL/WebGL.
    pub clip_space_y_down: bool,
}

/// Best-effort GPU memory usage report; not every platform exposes this.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub device_local_bytes_used: Option<u64>,
    pub device_local_bytes_budget: Option<u64>,
    pub host_visible_bytes_used: Option<u64>,
}
