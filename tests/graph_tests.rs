//! Integration tests for `RenderGraph::compile`: cycle detection, culling,
//! barrier placement, and memory-aliasing bounds, against small hand-built
//! graphs rather than a real GPU device (compile never touches the RHI).

use weft::graph::{priority, GraphBuilder, RenderGraph, RenderPass};
use weft::rhi::command_context::CommandContext;
use weft::rhi::format::{Format, ResourceState, TextureUsage};
use weft::rhi::resources::{ShaderStageMask, TextureDesc};
use weft::scene::ViewData;

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

fn color_desc(name: &str) -> TextureDesc {
    TextureDesc {
        debug_name: name.to_string(),
        ..TextureDesc::texture_2d(1920, 1080, Format::Rgba8Unorm, TextureUsage::RENDER_TARGET)
    }
}

/// A pass whose Setup is driven by a closure, so each test can declare
/// whatever read/write shape it needs without a new type per scenario.
struct FnPass<F: Fn(&mut GraphBuilder<'_>)> {
    name: &'static str,
    priority: i32,
    setup_fn: F,
}

impl<F: Fn(&mut GraphBuilder<'_>)> RenderPass for FnPass<F> {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn setup(&self, builder: &mut GraphBuilder<'_>, _view: &ViewData) {
        (self.setup_fn)(builder);
    }

    fn execute(&self, _ctx: &mut dyn CommandContext, _view: &ViewData) {}
}

#[test]
fn l1_identity_compile_of_an_empty_graph_is_zero_everything() {
    let mut graph = RenderGraph::new();
    graph.compile(&view_data()).expect("empty graph always compiles");
    let stats = graph.stats().unwrap();
    assert_eq!(stats.total_passes, 0);
    assert_eq!(stats.culled_passes, 0);
    assert_eq!(stats.barrier_count, 0);
    assert_eq!(stats.memory_with_aliasing, 0);
}

#[test]
fn l2_a_pass_that_writes_an_unexported_unread_transient_is_culled() {
    let mut graph = RenderGraph::new();
    let x = graph.create_texture("x", color_desc("x"));

    let p1 = FnPass {
        name: "p1-writes-x",
        priority: priority::OPAQUE,
        setup_fn: move |b: &mut GraphBuilder<'_>| {
            b.write_texture(x, ResourceState::RenderTarget);
        },
    };
    graph.add_pass(&p1);

    graph.compile(&view_data()).expect("no cycle");
    let stats = graph.stats().unwrap();
    assert_eq!(stats.total_passes, 1);
    assert_eq!(stats.culled_passes, 1, "p1 has no consumer and X is never exported");
}

#[test]
fn l3_aliasing_bound_never_exceeds_the_unaliased_total() {
    let mut graph = RenderGraph::new();
    let a = graph.create_texture("a", color_desc("a"));
    let back_buffer = graph.create_texture("back-buffer", color_desc("back-buffer"));
    graph.set_export_texture_state(back_buffer, ResourceState::Present);

    let p1 = FnPass {
        name: "p1-writes-a",
        priority: priority::DEPTH_PREPASS,
        setup_fn: move |b: &mut GraphBuilder<'_>| {
            b.write_texture(a, ResourceState::RenderTarget);
        },
    };
    let p2 = FnPass {
        name: "p2-reads-a-writes-back-buffer",
        priority: priority::OPAQUE,
        setup_fn: move |b: &mut GraphBuilder<'_>| {
            b.read_texture(a, ShaderStageMask::FRAGMENT);
            b.write_texture(back_buffer, ResourceState::RenderTarget);
        },
    };
    graph.add_pass(&p1);
    graph.add_pass(&p2);

    graph.compile(&view_data()).expect("no cycle");
    let stats = graph.stats().unwrap();
    assert!(stats.memory_with_aliasing <= stats.memory_without_aliasing);
}

#[test]
fn l4_disabling_aliasing_makes_aliased_and_unaliased_totals_equal() {
    let mut graph = RenderGraph::new();
    graph.set_memory_aliasing_enabled(false);

    let a = graph.create_texture("a", color_desc("a"));
    let b_tex = graph.create_texture("b", color_desc("b"));
    let back_buffer = graph.create_texture("back-buffer", color_desc("back-buffer"));
    graph.set_export_texture_state(back_buffer, ResourceState::Present);

    let p1 = FnPass {
        name: "p1-writes-a",
        priority: priority::DEPTH_PREPASS,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.write_texture(a, ResourceState::RenderTarget);
        },
    };
    let p2 = FnPass {
        name: "p2-reads-a-writes-b",
        priority: priority::SHADOW,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(a, ShaderStageMask::FRAGMENT);
            builder.write_texture(b_tex, ResourceState::RenderTarget);
        },
    };
    let p3 = FnPass {
        name: "p3-reads-b-writes-back-buffer",
        priority: priority::OPAQUE,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(b_tex, ShaderStageMask::FRAGMENT);
            builder.write_texture(back_buffer, ResourceState::RenderTarget);
        },
    };
    graph.add_pass(&p1);
    graph.add_pass(&p2);
    graph.add_pass(&p3);

    graph.compile(&view_data()).expect("no cycle");
    let stats = graph.stats().unwrap();
    assert_eq!(stats.memory_with_aliasing, stats.memory_without_aliasing);
    assert_eq!(stats.aliased_texture_count, 0);
    assert_eq!(stats.aliased_buffer_count, 0);
}

/// Transients A, B, C; P1 writes A, P2 reads A writes B, P3 reads A
/// writes C, P4 reads B and C and writes the (imported) back buffer. All
/// four passes must survive and the back buffer must end in `Present`.
#[test]
fn two_pass_diamond_all_four_passes_survive() {
    let mut graph = RenderGraph::new();
    let a = graph.create_texture("a", color_desc("a"));
    let b_tex = graph.create_texture("b", color_desc("b"));
    let c_tex = graph.create_texture("c", color_desc("c"));
    let back_buffer = graph.create_texture("back-buffer", color_desc("back-buffer"));
    graph.set_export_texture_state(back_buffer, ResourceState::Present);

    let p1 = FnPass {
        name: "p1-writes-a",
        priority: 100,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.write_texture(a, ResourceState::RenderTarget);
        },
    };
    let p2 = FnPass {
        name: "p2-reads-a-writes-b",
        priority: 200,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(a, ShaderStageMask::FRAGMENT);
            builder.write_texture(b_tex, ResourceState::RenderTarget);
        },
    };
    let p3 = FnPass {
        name: "p3-reads-a-writes-c",
        priority: 201,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(a, ShaderStageMask::FRAGMENT);
            builder.write_texture(c_tex, ResourceState::RenderTarget);
        },
    };
    let p4 = FnPass {
        name: "p4-reads-b-and-c-writes-back-buffer",
        priority: 300,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(b_tex, ShaderStageMask::FRAGMENT);
            builder.read_texture(c_tex, ShaderStageMask::FRAGMENT);
            builder.write_texture(back_buffer, ResourceState::RenderTarget);
        },
    };
    graph.add_pass(&p1);
    graph.add_pass(&p2);
    graph.add_pass(&p3);
    graph.add_pass(&p4);

    graph.compile(&view_data()).expect("no cycle");
    let stats = graph.stats().unwrap();
    assert_eq!(stats.total_passes, 4);
    assert_eq!(stats.culled_passes, 0);
    assert!(stats.barrier_count > 0, "at least the back-buffer export transition must appear");
}

/// Transient X written by P1 and never read: P1 is culled, no memory is
/// allocated for X.
#[test]
fn cull_pass_with_no_consumer_and_no_export() {
    let mut graph = RenderGraph::new();
    let x = graph.create_texture("x", color_desc("x"));

    let p1 = FnPass {
        name: "p1-writes-x-unread",
        priority: priority::OPAQUE,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.write_texture(x, ResourceState::RenderTarget);
        },
    };
    graph.add_pass(&p1);

    graph.compile(&view_data()).expect("no cycle");
    let stats = graph.stats().unwrap();
    assert_eq!(stats.culled_passes, 1);
    assert_eq!(stats.memory_with_aliasing, 0);
    assert_eq!(stats.memory_without_aliasing, 0);
}

#[test]
fn a_cycle_between_two_passes_is_reported_with_both_names() {
    let mut graph = RenderGraph::new();
    let a = graph.create_texture("a", color_desc("a"));
    let b_tex = graph.create_texture("b", color_desc("b"));
    graph.set_export_texture_state(a, ResourceState::ShaderResource);

    let p1 = FnPass {
        name: "p1",
        priority: 100,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(b_tex, ShaderStageMask::FRAGMENT);
            builder.write_texture(a, ResourceState::RenderTarget);
        },
    };
    let p2 = FnPass {
        name: "p2",
        priority: 100,
        setup_fn: move |builder: &mut GraphBuilder<'_>| {
            builder.read_texture(a, ShaderStageMask::FRAGMENT);
            builder.write_texture(b_tex, ResourceState::RenderTarget);
        },
    };
    graph.add_pass(&p1);
    graph.add_pass(&p2);

    let err = graph.compile(&view_data()).expect_err("p1 and p2 depend on each other's output");
    let message = err.to_string();
    assert!(message.contains("p1") && message.contains("p2"), "cycle error should name both passes: {message}");
}
