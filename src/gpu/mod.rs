//! GPU-resident resource management: upload scheduling, residency
//! tracking, and eviction.

mod resource_manager;

pub use resource_manager::{
    MeshGpuData, MeshUploadRequest, ResourceId, ResourceManager, ResourceManagerStats,
    SubmeshInfo, TextureGpuData, TextureUploadRequest, UploadPriority,
};
