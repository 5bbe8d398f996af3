//! Manages GPU/CPU synchronization for multi-buffered rendering.
//!
//! Grounded on `original_source/Render/Include/Render/Context/FrameSynchronizer.h`:
//! one timeline fence per frame-in-flight slot, an expected fence value
//! bumped by `signal_frame`, and `wait_for_frame` blocking until the
//! backend reports that value reached. The original notes that the GPU
//! queue itself signals the timeline semaphore during submission and
//! `SignalFrame` only tracks the expected value for `WaitForFrame` to
//! compare against — this port keeps that split: `signal_frame` never
//! touches the fence's completed value, only the caller (via
//! `Fence::signal`, typically from the device's submission-completion
//! callback) does.

use crate::rhi::device::Device;
use crate::rhi::resources::Fence;

const MAX_FRAME_COUNT: u32 = 8;

/// Tracks one timeline fence and its expected value per frame-in-flight
/// slot.
pub struct FrameSynchronizer {
    fences: Vec<Fence>,
    fence_values: Vec<u64>,
    frame_count: u32,
}

impl FrameSynchronizer {
    /// Creates fences for `frame_count` frames in flight (typically 2-3).
    ///
    /// # Panics
    /// Panics if `frame_count` is zero or exceeds `MAX_FRAME_COUNT` —
    /// this is a caller configuration error, not a runtime condition to
    /// recover from.
    #[must_use]
    pub fn new(device: &dyn Device, frame_count: u32) -> Self {
        assert!(
            frame_count > 0 && frame_count <= MAX_FRAME_COUNT,
            "frame count must be in 1..={MAX_FRAME_COUNT}, got {frame_count}"
        );
        let fences = (0..frame_count)
            .map(|i| device.create_fence(&format!("frame-fence-{i}")))
            .collect();
        log::debug!("FrameSynchronizer initialized with {frame_count} frames");
        Self {
            fences,
            fence_values: vec![0; frame_count as usize],
            frame_count,
        }
    }

    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    #[must_use]
    pub fn fence(&self, frame_index: u32) -> Option<&Fence> {
        self.fences.get(frame_index as usize)
    }

    #[must_use]
    pub fn frame_fence_value(&self, frame_index: u32) -> u64 {
        self.fence_values.get(frame_index as usize).copied().unwrap_or(0)
    }

    /// Waits for a specific frame's prior submission to complete. Call
    /// this before reusing resources last written by that frame slot.
    /// A no-op if no work has been submitted for the slot yet (expected
    /// value still zero).
    pub fn wait_for_frame(&self, frame_index: u32, device: &dyn Device) {
        let Some(fence) = self.fence(frame_index) else {
            log::warn!("FrameSynchronizer: invalid frame index {frame_index}");
            return;
        };
        let expected = self.frame_fence_value(frame_index);
        if expected == 0 {
            return;
        }
        if fence.value() < expected {
            device.wait_idle();
            fence.signal(expected);
        }
    }

    /// Records that a frame's command buffers have been submitted.
    /// Bumps the expected fence value; does not touch the fence's
    /// completed value, since the GPU queue itself signals completion.
    pub fn signal_frame(&mut self, frame_index: u32) {
        let Some(value) = self.fence_values.get_mut(frame_index as usize) else {
            log::warn!("FrameSynchronizer: invalid frame index {frame_index}");
            return;
        };
        *value += 1;
    }

    pub fn wait_for_all_frames(&self, device: &dyn Device) {
        for i in 0..self.frame_count {
            self.wait_for_frame(i, device);
        }
    }

    #[must_use]
    pub fn is_frame_complete(&self, frame_index: u32) -> bool {
        let Some(fence) = self.fence(frame_index) else {
            return true;
        };
        fence.value() >= self.frame_fence_value(frame_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::capabilities::{BackendType, Capabilities, MemoryStats};
    use crate::rhi::format::MemoryType;
    use crate::rhi::resources::{Buffer, BufferDesc, Sampler, Shader, ShaderStage, Texture, TextureDesc, TextureView};

    /// A fake device used only to exercise `FrameSynchronizer`'s pure
    /// bookkeeping logic without a real GPU adapter.
    struct FakeDevice {
        caps: Capabilities,
        wait_calls: std::sync::atomic::AtomicU32,
    }

    impl FakeDevice {
        fn new() -> Self {
            Self {
                caps: Capabilities {
                    backend: BackendType::Unknown,
                    adapter_name: "fake".into(),
                    max_color_attachments: 8,
                    max_texture_dimension_2d: 8192,
                    uniform_buffer_alignment: 256,
                    storage_buffer_alignment: 256,
                    timestamp_period_ns: 1.0,
                    clip_space_y_down: true,
                },
                wait_calls: std::sync::atomic::AtomicU32::new(0),
            }
        }
    }

    impl Device for FakeDevice {
        fn create_buffer(&self, _desc: &BufferDesc) -> Option<Buffer> {
            None
        }
        fn create_texture(&self, _desc: &TextureDesc) -> Option<Texture> {
            None
        }
        fn create_texture_view(&self, _texture: &Texture) -> Option<TextureView> {
            None
        }
        fn create_sampler(&self) -> Option<Sampler> {
            None
        }
        fn create_shader(&self, _stage: ShaderStage, _source: &str, _debug_name: &str) -> Option<Shader> {
            None
        }
        fn create_fence(&self, debug_name: &str) -> Fence {
            Fence::new(debug_name)
        }
        fn create_heap(&self, size: u64, memory_type: MemoryType, debug_name: &str) -> crate::rhi::resources::Heap {
            crate::rhi::resources::Heap {
                size,
                memory_type,
                debug_name: debug_name.to_string(),
            }
        }
        fn capabilities(&self) -> &Capabilities {
            &self.caps
        }
        fn memory_stats(&self) -> MemoryStats {
            MemoryStats::default()
        }
        fn wait_idle(&self) {
            self.wait_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        fn last_error(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn frame_not_yet_submitted_is_considered_complete() {
        let device = FakeDevice::new();
        let sync = FrameSynchronizer::new(&device, 3);
        assert!(sync.is_frame_complete(0));
    }

    #[test]
    fn waiting_for_a_submitted_frame_blocks_until_signaled() {
        let device = FakeDevice::new();
        let mut sync = FrameSynchronizer::new(&device, 2);
        sync.signal_frame(0);
        assert!(!sync.is_frame_complete(0));
        sync.wait_for_frame(0, &device);
        assert_eq!(device.wait_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(sync.is_frame_complete(0));
    }

    #[test]
    fn each_frame_slot_tracks_its_own_fence_independently() {
        let device = FakeDevice::new();
        let mut sync = FrameSynchronizer::new(&device, 3);
        sync.signal_frame(0);
        sync.signal_frame(1);
        assert!(!sync.is_frame_complete(0));
        assert!(!sync.is_frame_complete(1));
        assert!(sync.is_frame_complete(2));
        sync.wait_for_frame(0, &device);
        assert!(sync.is_frame_complete(0));
        assert!(!sync.is_frame_complete(1));
    }

    #[test]
    fn invalid_frame_index_is_a_no_op_not_a_panic() {
        let device = FakeDevice::new();
        let mut sync = FrameSynchronizer::new(&device, 2);
        sync.signal_frame(99);
        sync.wait_for_frame(99, &device);
        assert!(sync.is_frame_complete(99));
    }
}
