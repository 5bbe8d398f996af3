//! Reference render pass library: depth prepass, cascaded shadow maps,
//! opaque forward shading, sky background, and alpha-blended transparents.
//!
//! Every pass here owns its own interior-mutable GPU state (vertex/index/
//! instance buffers, uniform buffers, pipeline) and is configured by
//! plain setter methods called externally before each frame's
//! `RenderGraph::compile`/`execute` — [`crate::graph::RenderPass::setup`]
//! and [`crate::graph::RenderPass::execute`] both take `&self` and have no
//! access to scene or resource-manager state, so a pass's per-frame input
//! (world matrices, light direction, cascade depth handle) has to arrive
//! through its own API instead of through the trait.
//!
//! None of these passes read from [`crate::gpu::ResourceManager`] or any
//! material/mesh asset system — this crate has neither wired into the
//! pass execution path — so every pass renders a fixed procedural cube
//! (`common::CubeMesh`) driven by externally-supplied world matrices.

mod common;
mod opaque;
mod prepass;
mod shadow;
mod skybox;
mod transparent;

pub use common::{CubeMesh, InstanceBuffer, SceneViewUniform, MAX_INSTANCES};
pub use opaque::OpaquePass;
pub use prepass::DepthPrepass;
pub use shadow::{fit_light_view_projection, practical_splits, CascadeSplit, ShadowCascade};
pub use skybox::SkyboxPass;
pub use transparent::TransparentPass;
