//! Error Types
//!
//! [`WeftError`] covers every failure domain from the RHI boundary down to
//! the render-graph compiler. All public APIs return [`Result<T>`], an
//! alias for `std::result::Result<T, WeftError>`.
//!
//! RHI create-calls return a null handle rather than propagating an
//! error, so most `WeftError` variants surface at the edges —
//! device/adapter setup, graph compile, and upload scheduling — rather
//! than from every resource constructor.

use thiserror::Error;

/// The error type for the `weft` render core.
#[derive(Error, Debug)]
pub enum WeftError {
    // ========================================================================
    // Construction failure: RHI create-call returned a null handle
    // ========================================================================
    /// No compatible GPU adapter could be found for the requested backend.
    #[error("failed to request a GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Device creation was refused by the driver.
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Surface creation or configuration failed.
    #[error("surface error: {0}")]
    SurfaceError(#[from] wgpu::CreateSurfaceError),

    /// The window handle could not be resolved.
    #[error("window handle error: {0}")]
    WindowHandleError(#[from] raw_window_handle::HandleError),

    // ========================================================================
    // Usage defect: programming-side misuse, not a recovered error at
    // runtime, but surfaced where the graph can detect it statically
    // ========================================================================
    /// The render graph contains a cycle; compile failed before producing
    /// an execution plan.
    #[error("render graph compile failed: cycle through passes {passes:?}")]
    GraphCycle { passes: Vec<String> },

    /// A pass referenced a resource handle that was never created or
    /// imported in the current graph.
    #[error("render graph: unknown resource handle (index {0})")]
    UnknownResourceHandle(u32),

    /// A depth-stencil attachment was written and read in the same pass
    /// without declaring `read_only`.
    #[error("pass {pass}: depth-stencil attachment used as write and read without read_only")]
    InvalidDepthStencilUsage { pass: String },

    // ========================================================================
    // Transient upload failure
    // ========================================================================
    /// A staging buffer or ring-buffer allocation could not be satisfied
    /// from the current frame's active region.
    #[error("upload allocation failed: requested {requested} bytes, {available} available")]
    UploadAllocationFailed { requested: u64, available: u64 },

    // ========================================================================
    // Device lost
    // ========================================================================
    /// The GPU device was lost. Recovery is out of scope for the core;
    /// the caller must tear down and reinitialize.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    // ========================================================================
    // Shader / pipeline construction
    // ========================================================================
    /// Shader reflection metadata was missing or inconsistent with the
    /// supplied bytecode.
    #[error("shader reflection error: {0}")]
    ShaderReflectionError(String),

    /// Pipeline creation failed (invalid combination of state).
    #[error("pipeline creation failed: {0}")]
    PipelineCreateFailed(String),
}

/// Alias for `Result<T, WeftError>`.
pub type Result<T> = std::result::Result<T, WeftError>;
