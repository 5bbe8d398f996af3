//! The GPU device abstraction: adapter/device setup, resource creation,
//! and swap-chain ownership.
//!
//! Grounded on the teacher's `renderer/core/context.rs` `WgpuContext` for
//! adapter/device/surface setup order, generalized into a trait so the
//! render graph and scene renderer depend on `Device`, not on `wgpu`
//! directly.

use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::{Result, WeftError};
use crate::rhi::capabilities::{BackendType, Capabilities, MemoryStats};
use crate::rhi::format::{Format, MemoryType};
use crate::rhi::resources::{
    Buffer, BufferDesc, Fence, Heap, Sampler, Shader, ShaderStage, Texture, TextureDesc,
    TextureView,
};

/// Picks which `wgpu` backend(s) the instance is allowed to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Vulkan,
    Dx12,
    Metal,
    OpenGl,
}

impl BackendPreference {
    fn to_wgpu(self) -> wgpu::Backends {
        match self {
            BackendPreference::Auto => wgpu::Backends::PRIMARY,
            BackendPreference::Vulkan => wgpu::Backends::VULKAN,
            BackendPreference::Dx12 => wgpu::Backends::DX12,
            BackendPreference::Metal => wgpu::Backends::METAL,
            BackendPreference::OpenGl => wgpu::Backends::GL,
        }
    }
}

/// Configuration consumed by `WgpuDevice::new`. Example binaries are free
/// to populate this from command-line flags; parsing those flags is
/// outside this crate.
#[derive(Debug, Clone)]
pub struct RhiDeviceConfig {
    pub backend: BackendPreference,
    pub app_name: String,
    /// Enable `wgpu`'s validation/debug layers.
    pub validation: bool,
    /// Number of frames the caller intends to keep in flight; informs the
    /// frame synchronizer's fence count, not `wgpu` itself.
    pub frames_in_flight: u32,
}

impl Default for RhiDeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            app_name: "weft".to_string(),
            validation: cfg!(debug_assertions),
            frames_in_flight: 2,
        }
    }
}

/// Configuration for a swap chain bound to a window.
#[derive(Debug, Clone)]
pub struct SwapChainConfig {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub vsync: bool,
}

/// A presentable swap chain. `wgpu` owns the surface/texture lifecycle;
/// this wraps it with the `Format`/state bookkeeping the render graph's
/// import-as-resource path needs.
pub struct SwapChain {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) config: wgpu::SurfaceConfiguration,
    pub(crate) format: Format,
}

impl SwapChain {
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.config.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.config.height
    }
}

/// Backend-neutral GPU device contract. `WgpuDevice` is the sole
/// implementation; the trait exists so `RenderGraph`, `PipelineCache`,
/// and `gpu::ResourceManager` depend on an interface rather than a
/// concrete backend.
pub trait Device: Send + Sync {
    fn create_buffer(&self, desc: &BufferDesc) -> Option<Buffer>;
    fn create_texture(&self, desc: &TextureDesc) -> Option<Texture>;
    fn create_texture_view(&self, texture: &Texture) -> Option<TextureView>;
    fn create_sampler(&self) -> Option<Sampler>;
    fn create_shader(&self, stage: ShaderStage, source: &str, debug_name: &str) -> Option<Shader>;
    fn create_fence(&self, debug_name: &str) -> Fence;
    fn create_heap(&self, size: u64, memory_type: MemoryType, debug_name: &str) -> Heap;

    /// Writes `data` into `buffer` at `offset`, queued for the next
    /// submission. Used by the upload helpers for host-visible buffers;
    /// not a substitute for staged copies into device-local memory.
    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]);
    /// Writes `data` into the full extent of `texture`'s mip 0, queued
    /// for the next submission.
    fn write_texture(&self, texture: &Texture, data: &[u8]);

    fn capabilities(&self) -> &Capabilities;
    fn memory_stats(&self) -> MemoryStats;
    fn wait_idle(&self);

    /// Last non-fatal error recorded by a create-call that returned
    /// `None`. Create-calls never propagate `Result`; tooling that wants
    /// the reason polls this instead.
    fn last_error(&self) -> Option<String>;
}

/// The `wgpu`-backed concrete device.
pub struct WgpuDevice {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    capabilities: Capabilities,
    last_error: parking_lot::Mutex<Option<String>>,
}

impl WgpuDevice {
    pub async fn new(config: &RhiDeviceConfig) -> Result<Self> {
        Self::new_with_surface(config, None).await
    }

    /// Creates a device compatible with the given window, returning the
    /// device and a swap chain bound to it in one step (mirrors the
    /// teacher's `WgpuContext::new`, which always creates a surface
    /// alongside the device).
    pub async fn new_with_window<W>(
        config: &RhiDeviceConfig,
        window: &W,
        swap_chain_config: &SwapChainConfig,
    ) -> Result<(Self, SwapChain)>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backend.to_wgpu(),
            ..Default::default()
        });
        let surface = unsafe {
            instance
                .create_surface_unsafe(wgpu::SurfaceTargetUnsafe::from_window(window)?)
                .map_err(WeftError::SurfaceError)?
        };
        let device = Self::new_inner(config, instance, Some(&surface)).await?;
        let surface_config = surface
            .get_default_config(&device.adapter, swap_chain_config.width, swap_chain_config.height)
            .ok_or_else(|| WeftError::AdapterRequestFailed("surface not supported by adapter".into()))?;
        let mut surface_config = surface_config;
        surface_config.present_mode = if swap_chain_config.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device.device, &surface_config);
        let swap_chain = SwapChain {
            surface,
            config: surface_config,
            format: swap_chain_config.format,
        };
        Ok((device, swap_chain))
    }

    async fn new_with_surface(config: &RhiDeviceConfig, surface: Option<&wgpu::Surface<'_>>) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backend.to_wgpu(),
            ..Default::default()
        });
        Self::new_inner(config, instance, surface).await
    }

    async fn new_inner(
        config: &RhiDeviceConfig,
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| WeftError::AdapterRequestFailed(e.to_string()))?;

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(&config.app_name),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let info = adapter.get_info();
        let capabilities = Capabilities {
            backend: BackendType::from_wgpu(info.backend),
            adapter_name: info.name,
            max_color_attachments: limits.max_color_attachments,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            uniform_buffer_alignment: limits.min_uniform_buffer_offset_alignment,
            storage_buffer_alignment: limits.min_storage_buffer_offset_alignment,
            timestamp_period_ns: queue.get_timestamp_period(),
            clip_space_y_down: !matches!(info.backend, wgpu::Backend::Gl),
        };

        log::info!(
            "weft: GPU device created on {:?} ({})",
            capabilities.backend,
            capabilities.adapter_name
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            capabilities,
            last_error: parking_lot::Mutex::new(None),
        })
    }

    pub fn resize_swap_chain(&self, swap_chain: &mut SwapChain, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        swap_chain.config.width = width;
        swap_chain.config.height = height;
        swap_chain.surface.configure(&self.device, &swap_chain.config);
    }

    /// Acquires the next back buffer. Returns `None` (rather than an
    /// error) on `Timeout`/`Outdated`, matching the "skip the frame, try
    /// again next time" behavior a swap chain miss calls for; `Lost` and
    /// `OutOfMemory` are logged as device-lost conditions.
    pub fn acquire_next_texture(&self, swap_chain: &SwapChain) -> Option<wgpu::SurfaceTexture> {
        match swap_chain.surface.get_current_texture() {
            Ok(frame) => Some(frame),
            Err(wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Outdated) => None,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::OutOfMemory)) => {
                *self.last_error.lock() = Some(err.to_string());
                log::error!("weft: swap chain acquire failed fatally: {err}");
                None
            }
            Err(err) => {
                *self.last_error.lock() = Some(err.to_string());
                None
            }
        }
    }

    fn record_failure(&self, message: String) {
        log::warn!("weft: {message}");
        *self.last_error.lock() = Some(message);
    }
}

impl Device for WgpuDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Option<Buffer> {
        if desc.size == 0 {
            self.record_failure(format!("buffer '{}' requested with size 0", desc.debug_name));
            return None;
        }
        let raw = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.debug_name),
            size: desc.size,
            usage: desc.usage.to_wgpu(),
            mapped_at_creation: false,
        });
        Some(Buffer(Arc::new(crate::rhi::resources::BufferInner {
            raw,
            desc: desc.clone(),
        })))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Option<Texture> {
        if desc.width == 0 || desc.height == 0 {
            self.record_failure(format!("texture '{}' requested with zero extent", desc.debug_name));
            return None;
        }
        let dimension = match desc.dimension {
            crate::rhi::format::TextureDimension::D1 => wgpu::TextureDimension::D1,
            crate::rhi::format::TextureDimension::D3 => wgpu::TextureDimension::D3,
            _ => wgpu::TextureDimension::D2,
        };
        let raw = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.debug_name),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.depth.max(desc.array_size),
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: desc.sample_count.max(1),
            dimension,
            format: desc.format.to_wgpu(),
            usage: desc.usage.to_wgpu(),
            view_formats: &[],
        });
        Some(Texture(Arc::new(crate::rhi::resources::TextureInner {
            raw,
            desc: desc.clone(),
        })))
    }

    fn create_texture_view(&self, texture: &Texture) -> Option<TextureView> {
        let raw = texture.raw().create_view(&wgpu::TextureViewDescriptor::default());
        Some(TextureView(Arc::new(crate::rhi::resources::TextureViewInner {
            raw,
            texture: texture.clone(),
            format: texture.desc().format,
        })))
    }

    fn create_sampler(&self) -> Option<Sampler> {
        Some(Sampler(Arc::new(self.device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }))))
    }

    fn create_shader(&self, stage: ShaderStage, source: &str, debug_name: &str) -> Option<Shader> {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(debug_name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        Some(Shader(Arc::new(crate::rhi::resources::ShaderInner {
            stage,
            module,
            bindings: Vec::new(),
            debug_name: debug_name.to_string(),
        })))
    }

    fn create_fence(&self, debug_name: &str) -> Fence {
        Fence::new(debug_name)
    }

    fn create_heap(&self, size: u64, memory_type: MemoryType, debug_name: &str) -> Heap {
        Heap {
            size,
            memory_type,
            debug_name: debug_name.to_string(),
        }
    }

    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer.raw(), offset, data);
    }

    fn write_texture(&self, texture: &Texture, data: &[u8]) {
        let desc = texture.desc();
        let bytes_per_row = desc.width * desc.format.block_size();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.depth.max(desc.array_size),
            },
        );
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn memory_stats(&self) -> MemoryStats {
        // wgpu does not expose a portable memory-usage query; report what
        // is known to be unknown rather than fabricate a number.
        MemoryStats::default()
    }

    fn wait_idle(&self) {
        self.device.poll(wgpu::PollType::Wait).ok();
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}
