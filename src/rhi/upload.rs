//! CPU-to-GPU upload helpers: a one-shot staging buffer and a
//! per-frame bump-allocated ring buffer.
//!
//! `RingBuffer` is a fixed-capacity bump allocator over a pre-allocated
//! pool, matching `RHIRingBuffer::Allocate`/`RHIRingAllocation::IsValid`
//! in `examples/original_source/RHI/Include/RHI/RHIUpload.h`: an
//! allocation that would overrun the active region fails rather than
//! growing the backing buffer. Not thread-safe: one ring buffer is
//! owned by the render thread and reset once per frame.

use crate::error::{Result, WeftError};
use crate::rhi::resources::{Buffer, BufferDesc};

/// A single-use upload buffer: host-visible memory copied once and then
/// consumed by a copy command. Used for mesh/texture uploads that do not
/// repeat every frame.
pub struct StagingBuffer {
    pub buffer: Buffer,
    pub size: u64,
}

impl StagingBuffer {
    #[must_use]
    pub fn desc(size: u64, debug_name: impl Into<String>) -> BufferDesc {
        BufferDesc {
            size,
            usage: crate::rhi::format::BufferUsage::COPY_SRC,
            memory_type: crate::rhi::format::MemoryType::Upload,
            stride: 0,
            debug_name: debug_name.into(),
        }
    }
}

/// A linear, per-frame allocator over a single, fixed-size GPU buffer.
/// Every `allocate` call hands back a byte offset into the backing
/// buffer; `reset` reclaims the whole region at the start of a new
/// frame. An allocation that would overrun the active region fails
/// (returns an invalid `RingAllocation`) rather than growing the
/// backing buffer — the caller must either shrink its request, drain
/// the ring sooner, or construct a larger ring up front.
pub struct RingBuffer {
    capacity: u64,
    cursor: u64,
    alignment: u64,
    debug_name: String,
    buffer: Option<Buffer>,
    usage: crate::rhi::format::BufferUsage,
}

impl RingBuffer {
    #[must_use]
    pub fn new(capacity: u64, alignment: u64, usage: crate::rhi::format::BufferUsage, debug_name: impl Into<String>) -> Self {
        Self {
            capacity: capacity.max(alignment),
            cursor: 0,
            alignment: alignment.max(1),
            debug_name: debug_name.into(),
            buffer: None,
            usage,
        }
    }

    /// Resets the write cursor to the start of the region. Must be
    /// called once per frame before any `allocate` call for that frame;
    /// callers never see overlapping allocations across frame
    /// boundaries as a result (the non-overlap property this type
    /// exists to guarantee).
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    fn align_up(value: u64, alignment: u64) -> u64 {
        (value + alignment - 1) / alignment * alignment
    }

    /// Reserves `size` bytes from the active region. Returns an invalid
    /// allocation (`RingAllocation::is_valid` false) when the aligned
    /// offset plus `size` would overrun `capacity`; the cursor is left
    /// unchanged on failure so a subsequent smaller request can still
    /// succeed against the same region.
    pub fn allocate(&mut self, size: u64) -> RingAllocation {
        let offset = Self::align_up(self.cursor, self.alignment);
        let end = offset + size;
        if end > self.capacity {
            log::warn!(
                "weft: ring buffer '{}' allocation of {} bytes at offset {} exceeds capacity {}",
                self.debug_name,
                size,
                offset,
                self.capacity
            );
            return RingAllocation::invalid();
        }
        self.cursor = end;
        RingAllocation { offset, size, valid: true }
    }

    /// Ensures a backing buffer exists for this ring's capacity,
    /// creating it via `device` on first use.
    pub fn ensure_buffer(&mut self, device: &dyn crate::rhi::device::Device) -> Result<&Buffer> {
        if self.buffer.is_none() {
            let desc = BufferDesc {
                size: self.capacity,
                usage: self.usage,
                memory_type: crate::rhi::format::MemoryType::Upload,
                stride: 0,
                debug_name: self.debug_name.clone(),
            };
            let buffer = device.create_buffer(&desc).ok_or_else(|| WeftError::UploadAllocationFailed {
                requested: self.capacity,
                available: 0,
            })?;
            self.buffer = Some(buffer);
        }
        Ok(self.buffer.as_ref().expect("just populated above"))
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[must_use]
    pub fn used(&self) -> u64 {
        self.cursor
    }
}

/// Result of a `RingBuffer::allocate` call. `offset`/`size` are only
/// meaningful when `valid` is true — mirrors
/// `RHIRingAllocation::IsValid()` (`cpuAddress != nullptr`) from the
/// original, which this crate's host-side offset allocator has no
/// pointer for.
#[derive(Debug, Clone, Copy)]
pub struct RingAllocation {
    pub offset: u64,
    pub size: u64,
    valid: bool,
}

impl RingAllocation {
    fn invalid() -> Self {
        Self { offset: 0, size: 0, valid: false }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::format::BufferUsage;

    #[test]
    fn sequential_allocations_never_overlap() {
        let mut ring = RingBuffer::new(256, 16, BufferUsage::CONSTANT, "test-ring");
        let a = ring.allocate(48);
        let b = ring.allocate(64);
        assert!(a.offset + a.size <= b.offset, "allocation b must start at/after end of a");
    }

    #[test]
    fn allocation_respects_alignment() {
        let mut ring = RingBuffer::new(256, 64, BufferUsage::CONSTANT, "test-ring");
        ring.allocate(10);
        let b = ring.allocate(10);
        assert_eq!(b.offset % 64, 0);
    }

    #[test]
    fn overrunning_capacity_fails_without_growing() {
        let mut ring = RingBuffer::new(16, 16, BufferUsage::CONSTANT, "test-ring");
        let alloc = ring.allocate(100);
        assert!(!alloc.is_valid());
        assert_eq!(ring.capacity(), 16);
    }

    #[test]
    fn ring_buffer_exhaustion_scenario() {
        // Ring of 4 KiB, alignment 256: Allocate(3000) succeeds at
        // offset 0, Allocate(2000) then fails (3000 aligned up to 3072,
        // + 2000 = 5072 > 4096) and reports invalid.
        let mut ring = RingBuffer::new(4096, 256, BufferUsage::CONSTANT, "test-ring");
        let first = ring.allocate(3000);
        assert!(first.is_valid());
        assert_eq!(first.offset, 0);

        let second = ring.allocate(2000);
        assert!(!second.is_valid());
    }

    #[test]
    fn reset_reclaims_the_whole_region() {
        let mut ring = RingBuffer::new(256, 16, BufferUsage::CONSTANT, "test-ring");
        ring.allocate(200);
        ring.reset();
        let a = ring.allocate(200);
        assert_eq!(a.offset, 0);
    }
}
