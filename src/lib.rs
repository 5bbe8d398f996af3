#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! `weft`: a backend-neutral real-time rendering core. A GPU abstraction
//! layer (`rhi`) sits under a declarative, per-frame render graph
//! (`graph`), which a small reference pass library (`passes`) and a
//! per-frame driver (`context`, `scene_renderer`) build on.

pub mod context;
pub mod error;
pub mod gpu;
pub mod graph;
pub mod passes;
pub mod pipeline;
pub mod scene;
pub mod scene_renderer;
pub mod sync;

pub mod rhi;

pub use context::{RenderContext, RenderContextConfig};
pub use error::{Result, WeftError};
pub use gpu::{ResourceId, ResourceManager};
pub use graph::{RenderGraph, RenderPass};
pub use pipeline::PipelineCache;
pub use scene::{Camera, RenderScene, ViewData, WorldSource};
pub use scene_renderer::SceneRenderer;
pub use sync::FrameSynchronizer;
