//! Benchmarks `RenderGraph::compile`: access-graph construction, pass
//! culling, topological ordering, and barrier planning, scaled across a
//! chain of passes of varying length.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use weft::graph::{GraphBuilder, RenderGraph, RenderPass};
use weft::rhi::format::{Format, ResourceState, TextureUsage};
use weft::rhi::resources::{ShaderStageMask, TextureDesc};
use weft::scene::ViewData;

struct ChainPass {
    read: Option<weft::graph::RgTextureHandle>,
    write: weft::graph::RgTextureHandle,
    priority: i32,
}

impl RenderPass for ChainPass {
    fn name(&self) -> &str {
        "chain-pass"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, _view: &ViewData) {
        if let Some(read) = self.read {
            builder.read_texture(read, ShaderStageMask::FRAGMENT);
        }
        builder.write_texture(self.write, ResourceState::RenderTarget);
    }

    fn execute(&self, _ctx: &mut dyn weft::rhi::command_context::CommandContext, _view: &ViewData) {}
}

fn view_data() -> ViewData {
    ViewData {
        view: glam::Mat4::IDENTITY,
        projection: glam::Mat4::IDENTITY,
        view_projection: glam::Mat4::IDENTITY,
        inverse_view: glam::Mat4::IDENTITY,
        inverse_projection: glam::Mat4::IDENTITY,
        camera_position: glam::Vec3::ZERO,
        camera_forward: glam::Vec3::NEG_Z,
        near: 0.1,
        far: 1000.0,
        fov: 60.0,
        viewport_width: 1920,
        viewport_height: 1080,
        frame_number: 0,
        time: 0.0,
        delta_time: 0.0,
    }
}

/// Builds a linear chain of `length` passes, each reading the previous
/// pass's output texture and writing a new one, ending at an exported
/// back buffer — the worst case for barrier planning (every pass forces
/// a state transition on its input).
fn build_chain(graph: &mut RenderGraph<'_>, length: usize) -> Vec<ChainPass> {
    let desc = TextureDesc::texture_2d(1920, 1080, Format::Rgba8Unorm, TextureUsage::RENDER_TARGET);
    let mut handles = Vec::with_capacity(length + 1);
    handles.push(graph.create_texture("t0", desc.clone()));
    for i in 1..=length {
        handles.push(graph.create_texture(format!("t{i}"), desc.clone()));
    }
    graph.set_export_texture_state(*handles.last().unwrap(), ResourceState::Present);

    let mut passes = Vec::with_capacity(length);
    for i in 0..length {
        passes.push(ChainPass {
            read: if i == 0 { None } else { Some(handles[i]) },
            write: handles[i + 1],
            priority: i as i32,
        });
    }
    passes
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_graph_compile");
    for &length in &[4usize, 32, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.iter_batched(
                || {
                    let mut graph = RenderGraph::new();
                    let passes = build_chain(&mut graph, length);
                    (graph, passes)
                },
                |(mut graph, passes)| {
                    for pass in &passes {
                        graph.add_pass(pass);
                    }
                    graph.compile(&view_data()).expect("linear chains never cycle");
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
