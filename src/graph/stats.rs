//! Compile-time statistics: pass culling, barrier counts, and memory
//! aliasing savings.

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileStats {
    pub total_passes: u32,
    pub culled_passes: u32,

    pub barrier_count: u32,
    pub texture_barrier_count: u32,
    pub buffer_barrier_count: u32,
    pub merged_barrier_count: u32,
    pub merged_texture_barrier_count: u32,
    pub merged_buffer_barrier_count: u32,
    pub cross_pass_merged_barrier_count: u32,

    pub total_transient_textures: u32,
    pub total_transient_buffers: u32,
    pub aliased_texture_count: u32,
    pub aliased_buffer_count: u32,
    pub memory_without_aliasing: u64,
    pub memory_with_aliasing: u64,
    pub transient_heap_count: u32,
}

impl CompileStats {
    #[must_use]
    pub fn memory_savings_percent(&self) -> f32 {
        if self.memory_without_aliasing == 0 {
            return 0.0;
        }
        100.0 * (1.0 - self.memory_with_aliasing as f32 / self.memory_without_aliasing as f32)
    }
}
