//! Builds descriptor-set layouts from shader reflection metadata, caches
//! the resulting PSOs, and owns the per-view/per-object constant buffers
//! every pass binds.
//!
//! Grounded on `original_source/Render/Include/Render/PipelineCache.h`
//! for the `ViewConstants`/`ObjectConstants` cbuffer shapes and the
//! init/compile/layout/pipeline/view-buffer sequencing, and on the
//! teacher's `renderer/pipeline/cache.rs` for the canonical-key-hash
//! cache shape (here a single L2-style cache: this crate has no
//! material/geometry handle system to key an L1 fast path against).

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::error::{Result, WeftError};
use crate::rhi::device::{Device as _, WgpuDevice};
use crate::rhi::format::Format;
use crate::rhi::resources::{
    BindingKind, DescriptorSet, DescriptorSetLayout, Pipeline, PipelineLayout, ReflectedBinding,
    Shader,
};

/// Per-view constants, matching the original's `ViewConstants` cbuffer
/// layout so a ported HLSL/WGSL shader's `cbuffer`/`uniform` block lines
/// up byte-for-byte.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ViewConstants {
    pub view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub time: f32,
    pub light_direction: [f32; 3],
    pub _padding: f32,
}

/// Per-object constants, matching `ObjectConstants`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    AlphaBlend,
    Additive,
}

impl BlendMode {
    fn to_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Opaque => None,
            BlendMode::AlphaBlend => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            }),
        }
    }
}

/// Full-state key identifying one PSO. Two calls with an equal key reuse
/// the same `wgpu::RenderPipeline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineKey {
    pub debug_name: String,
    pub color_format: Format,
    pub depth_format: Option<Format>,
    pub blend: BlendMode,
    pub cull_back_face: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub sample_count: u32,
}

/// Caches PSOs by full-state key and owns the per-view/per-object
/// constant buffers and the descriptor set that binds them.
pub struct PipelineCache {
    device: Arc<WgpuDevice>,
    pipelines: FxHashMap<GraphicsPipelineKey, Pipeline>,
    layout_cache: FxHashMap<Vec<u32>, DescriptorSetLayout>,
    view_constants: ViewConstants,
    object_constants: ObjectConstants,
    view_buffer: crate::rhi::resources::Buffer,
    object_buffer: crate::rhi::resources::Buffer,
    view_descriptor_set: Option<DescriptorSet>,
}

impl PipelineCache {
    /// # Errors
    /// Returns [`WeftError::PipelineCreateFailed`] if the view/object
    /// constant buffers could not be created.
    pub fn new(device: Arc<WgpuDevice>) -> Result<Self> {
        use crate::rhi::format::{BufferUsage, MemoryType};
        use crate::rhi::resources::BufferDesc;

        let view_buffer = device
            .create_buffer(&BufferDesc {
                size: std::mem::size_of::<ViewConstants>() as u64,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
                memory_type: MemoryType::Default,
                stride: 0,
                debug_name: "view-constants".into(),
            })
            .ok_or_else(|| WeftError::PipelineCreateFailed("failed to create view constant buffer".into()))?;
        let object_buffer = device
            .create_buffer(&BufferDesc {
                size: std::mem::size_of::<ObjectConstants>() as u64,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
                memory_type: MemoryType::Default,
                stride: 0,
                debug_name: "object-constants".into(),
            })
            .ok_or_else(|| WeftError::PipelineCreateFailed("failed to create object constant buffer".into()))?;

        Ok(Self {
            device,
            pipelines: FxHashMap::default(),
            layout_cache: FxHashMap::default(),
            view_constants: ViewConstants::zeroed(),
            object_constants: ObjectConstants::zeroed(),
            view_buffer,
            object_buffer,
            view_descriptor_set: None,
        })
    }

    /// Updates the view constant buffer from the current camera state.
    /// Negates clip-space row 1 when the backend's clip space has Y
    /// pointing down, so a single shader's NDC convention works across
    /// backends without a shader variant.
    pub fn update_view_constants(&mut self, view_projection: Mat4, camera_position: Vec3, time: f32, light_direction: Vec3) {
        let mut vp = view_projection;
        if self.device.capabilities().clip_space_y_down {
            vp.y_axis = -vp.y_axis;
        }
        self.view_constants = ViewConstants {
            view_projection: vp.to_cols_array_2d(),
            camera_position: camera_position.into(),
            time,
            light_direction: light_direction.into(),
            _padding: 0.0,
        };
        self.device.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&self.view_constants));
    }

    pub fn update_object_constants(&mut self, world: Mat4) {
        self.object_constants = ObjectConstants {
            world: world.to_cols_array_2d(),
        };
        self.device
            .write_buffer(&self.object_buffer, 0, bytemuck::bytes_of(&self.object_constants));
    }

    #[must_use]
    pub fn view_buffer(&self) -> &crate::rhi::resources::Buffer {
        &self.view_buffer
    }

    #[must_use]
    pub fn object_buffer(&self) -> &crate::rhi::resources::Buffer {
        &self.object_buffer
    }

    /// Builds (or reuses, keyed by the sorted slot list) one
    /// `wgpu::BindGroupLayout` per distinct `set` referenced by the
    /// combined vertex+fragment reflection metadata.
    fn descriptor_set_layout_for(&mut self, set: u32, bindings: &[ReflectedBinding]) -> DescriptorSetLayout {
        let mut slots: Vec<u32> = bindings.iter().filter(|b| b.set == set).map(|b| b.slot).collect();
        slots.sort_unstable();
        let cache_key: Vec<u32> = std::iter::once(set).chain(slots).collect();
        if let Some(layout) = self.layout_cache.get(&cache_key) {
            return layout.clone();
        }

        let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .filter(|b| b.set == set)
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.slot,
                visibility: to_wgpu_stage_mask(b.stage_mask),
                ty: to_wgpu_binding_type(b.kind),
                count: None,
            })
            .collect();

        let raw = self
            .device
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("weft-set-{set}")),
                entries: &entries,
            });
        let layout = DescriptorSetLayout(Arc::new(raw));
        self.layout_cache.insert(cache_key, layout.clone());
        layout
    }

    /// Builds a pipeline layout spanning every `set` referenced by
    /// either shader's reflection metadata, in ascending set order.
    fn pipeline_layout_for(&mut self, vertex: &Shader, fragment: &Shader) -> PipelineLayout {
        let mut all_bindings = Vec::new();
        all_bindings.extend(vertex.bindings().iter().cloned());
        all_bindings.extend(fragment.bindings().iter().cloned());
        let mut sets: Vec<u32> = all_bindings.iter().map(|b| b.set).collect();
        sets.sort_unstable();
        sets.dedup();

        let set_layouts: Vec<DescriptorSetLayout> = sets
            .iter()
            .map(|&set| self.descriptor_set_layout_for(set, &all_bindings))
            .collect();
        let refs: Vec<&wgpu::BindGroupLayout> = set_layouts.iter().map(|l| l.raw()).collect();

        let raw = self.device.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("weft-pipeline-layout"),
            bind_group_layouts: &refs,
            push_constant_ranges: &[],
        });
        PipelineLayout(Arc::new(raw))
    }

    /// Looks up or creates the graphics PSO for `key`, compiling
    /// `vertex`/`fragment` and deriving the pipeline layout from their
    /// combined reflection metadata on a cache miss.
    pub fn get_or_create_graphics(
        &mut self,
        key: &GraphicsPipelineKey,
        vertex: &Shader,
        fragment: &Shader,
        vertex_buffers: &[wgpu::VertexBufferLayout<'_>],
    ) -> Pipeline {
        if let Some(p) = self.pipelines.get(key) {
            return p.clone();
        }

        let layout = self.pipeline_layout_for(vertex, fragment);
        let depth_stencil = key.depth_format.map(|fmt| wgpu::DepthStencilState {
            format: fmt.to_wgpu(),
            depth_write_enabled: key.depth_write,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::GreaterEqual // reverse-Z convention
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let raw = self.device.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&key.debug_name),
            layout: Some(layout.raw()),
            vertex: wgpu::VertexState {
                module: vertex.raw(),
                entry_point: Some("vs_main"),
                buffers: vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment.raw(),
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.color_format.to_wgpu(),
                    blend: key.blend.to_wgpu(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: if key.cull_back_face { Some(wgpu::Face::Back) } else { None },
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: key.sample_count.max(1),
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let pipeline = Pipeline::Graphics(Arc::new(raw));
        self.pipelines.insert(key.clone(), pipeline.clone());
        pipeline
    }

    #[must_use]
    pub fn cached_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
        self.layout_cache.clear();
    }
}

fn to_wgpu_stage_mask(mask: crate::rhi::resources::ShaderStageMask) -> wgpu::ShaderStages {
    use crate::rhi::resources::ShaderStageMask as M;
    let mut out = wgpu::ShaderStages::NONE;
    if mask.contains(M::VERTEX) {
        out |= wgpu::ShaderStages::VERTEX;
    }
    if mask.contains(M::FRAGMENT) {
        out |= wgpu::ShaderStages::FRAGMENT;
    }
    if mask.contains(M::COMPUTE) {
        out |= wgpu::ShaderStages::COMPUTE;
    }
    out
}

fn to_wgpu_binding_type(kind: BindingKind) -> wgpu::BindingType {
    match kind {
        BindingKind::ConstantBuffer | BindingKind::PushConstant => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::StorageBuffer => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        BindingKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        BindingKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    }
}
