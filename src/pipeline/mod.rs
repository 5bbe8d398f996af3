//! Shader-reflection-driven pipeline construction and caching.

mod cache;

pub use cache::{
    BlendMode, GraphicsPipelineKey, ObjectConstants, PipelineCache, ViewConstants,
};
