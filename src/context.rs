//! Owns the RHI device, swap chain, and per-frame command contexts.
//!
//! Grounded on `original_source/Render/Include/Render/Context/RenderContext.h`
//! for the `Initialize`/`CreateSwapChain`/`BeginFrame`/`EndFrame`/`Present`
//! lifecycle, and on the teacher's `renderer/core/context.rs` for the
//! device/surface setup order this crate's `rhi::device::WgpuDevice`
//! already follows.

use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::Result;
use crate::rhi::command_context::WgpuCommandContext;
use crate::rhi::device::{BackendPreference, Device as _, RhiDeviceConfig, SwapChain, SwapChainConfig, WgpuDevice};
use crate::rhi::format::Format;
use crate::sync::FrameSynchronizer;

/// Configuration consumed by [`RenderContext::new`], mirroring the
/// original's `RenderContextConfig`.
#[derive(Debug, Clone)]
pub struct RenderContextConfig {
    pub backend: BackendPreference,
    pub app_name: String,
    pub validation: bool,
    pub vsync: bool,
    /// Number of frames kept in flight; sizes the command context array
    /// and the frame synchronizer's fence count.
    pub frame_buffering: u32,
}

impl Default for RenderContextConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            app_name: "weft".to_string(),
            validation: cfg!(debug_assertions),
            vsync: true,
            frame_buffering: 2,
        }
    }
}

/// Central rendering resource manager: owns the RHI device, the swap
/// chain, and frame synchronization. One per window.
pub struct RenderContext {
    device: Arc<WgpuDevice>,
    swap_chain: SwapChain,
    command_contexts: Vec<WgpuCommandContext>,
    frame_synchronizer: FrameSynchronizer,
    config: RenderContextConfig,
    frame_index: u32,
    frame_number: u64,
    frame_active: bool,
    current_back_buffer: Option<wgpu::SurfaceTexture>,
}

impl RenderContext {
    /// Creates the device and a swap chain bound to `window` in one step,
    /// mirroring `RenderContext::Initialize` followed immediately by
    /// `CreateSwapChain` in the original (this crate has no windowless
    /// initialization path worth separating out).
    pub async fn new<W>(config: RenderContextConfig, window: &W, width: u32, height: u32) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let device_config = RhiDeviceConfig {
            backend: config.backend,
            app_name: config.app_name.clone(),
            validation: config.validation,
            frames_in_flight: config.frame_buffering,
        };
        let swap_chain_config = SwapChainConfig {
            width,
            height,
            format: Format::Bgra8Unorm,
            vsync: config.vsync,
        };
        let (device, swap_chain) = WgpuDevice::new_with_window(&device_config, window, &swap_chain_config).await?;
        let device = Arc::new(device);

        let command_contexts = (0..config.frame_buffering.max(1))
            .map(|i| WgpuCommandContext::new(Arc::new(device.device.clone()), format!("weft-cmd-{i}")))
            .collect();
        let frame_synchronizer = FrameSynchronizer::new(device.as_ref(), config.frame_buffering.max(1));

        Ok(Self {
            device,
            swap_chain,
            command_contexts,
            frame_synchronizer,
            config,
            frame_index: 0,
            frame_number: 0,
            frame_active: false,
            current_back_buffer: None,
        })
    }

    #[must_use]
    pub fn device(&self) -> &Arc<WgpuDevice> {
        &self.device
    }

    #[must_use]
    pub fn config(&self) -> &RenderContextConfig {
        &self.config
    }

    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[must_use]
    pub fn swap_chain(&self) -> &SwapChain {
        &self.swap_chain
    }

    pub fn resize_swap_chain(&mut self, width: u32, height: u32) {
        self.device.resize_swap_chain(&mut self.swap_chain, width, height);
    }

    /// Waits for this frame slot's prior work to finish, acquires the next
    /// back buffer, and resets the slot's command context for recording.
    /// Returns `false` (without side effects beyond the wait) if the swap
    /// chain could not hand back an image this frame — the caller should
    /// skip the frame and try again next time.
    pub fn begin_frame(&mut self) -> bool {
        self.frame_synchronizer.wait_for_frame(self.frame_index, self.device.as_ref());

        let Some(back_buffer) = self.device.acquire_next_texture(&self.swap_chain) else {
            return false;
        };
        self.current_back_buffer = Some(back_buffer);

        self.command_contexts[self.frame_index as usize].reset();
        self.command_contexts[self.frame_index as usize].begin();
        self.frame_active = true;
        true
    }

    #[must_use]
    pub fn graphics_context(&mut self) -> &mut WgpuCommandContext {
        &mut self.command_contexts[self.frame_index as usize]
    }

    #[must_use]
    pub fn current_back_buffer(&self) -> Option<&wgpu::SurfaceTexture> {
        self.current_back_buffer.as_ref()
    }

    /// Submits the current frame's recorded commands and signals its fence.
    pub fn end_frame(&mut self) {
        if !self.frame_active {
            return;
        }
        let slot = self.frame_index as usize;
        if let Some(command_buffer) = self.command_contexts[slot].finish() {
            self.device.queue.submit(std::iter::once(command_buffer));
        }
        self.frame_synchronizer.signal_frame(self.frame_index);
        self.frame_active = false;
    }

    /// Presents the frame acquired by `begin_frame` and advances to the
    /// next frame-in-flight slot.
    pub fn present(&mut self) {
        if let Some(back_buffer) = self.current_back_buffer.take() {
            back_buffer.present();
        }
        self.frame_number += 1;
        self.frame_index = (self.frame_index + 1) % self.command_contexts.len() as u32;
    }

    pub fn wait_idle(&mut self) {
        self.device.wait_idle();
        self.frame_synchronizer.wait_for_all_frames(self.device.as_ref());
    }
}
