//! The compile pipeline: access graph, pass culling, lifetime
//! computation, execution ordering, and barrier planning.

use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::rhi::command_context::{Barrier, BarrierTarget};
use crate::rhi::format::{ResourceState, SubresourceRange};

use super::pass::{AccessKind, PassRecord, ResourceHandle};
use super::resource::{RgResource, RgResourceKind};
use super::stats::CompileStats;

/// The full mip/array-layer extent of `resource`, used as the implicit
/// range for an access whose handle carries no `subresource` (or for a
/// buffer, which has no subresource concept at all — it is tracked as a
/// single opaque region).
fn full_range(resource: &RgResource) -> SubresourceRange {
    match &resource.kind {
        RgResourceKind::TransientTexture(desc) => SubresourceRange::all(desc.mip_levels, desc.array_size),
        RgResourceKind::ImportedTexture(texture) => {
            SubresourceRange::all(texture.desc().mip_levels, texture.desc().array_size)
        }
        RgResourceKind::TransientBuffer(_) | RgResourceKind::ImportedBuffer(_) => SubresourceRange::all(1, 1),
    }
}

/// The rectangles of `a` (in mip x array-layer space) not covered by `b`.
/// Assumes `a.overlaps(b)`; returns up to four disjoint leftover ranges.
fn subtract_range(a: &SubresourceRange, b: &SubresourceRange) -> Vec<SubresourceRange> {
    let (a_mip0, a_mip1) = (a.base_mip, a.base_mip + a.mip_count);
    let (b_mip0, b_mip1) = (b.base_mip, b.base_mip + b.mip_count);
    let (a_layer0, a_layer1) = (a.base_array_layer, a.base_array_layer + a.array_layer_count);
    let (b_layer0, b_layer1) = (b.base_array_layer, b.base_array_layer + b.array_layer_count);

    let im0 = a_mip0.max(b_mip0);
    let im1 = a_mip1.min(b_mip1);
    let il0 = a_layer0.max(b_layer0);
    let il1 = a_layer1.min(b_layer1);

    let mut out = Vec::with_capacity(4);
    let rect = |mip0: u32, mip1: u32, layer0: u32, layer1: u32| SubresourceRange {
        base_mip: mip0,
        mip_count: mip1 - mip0,
        base_array_layer: layer0,
        array_layer_count: layer1 - layer0,
        aspect: a.aspect,
    };
    if a_mip0 < im0 {
        out.push(rect(a_mip0, im0, a_layer0, a_layer1));
    }
    if im1 < a_mip1 {
        out.push(rect(im1, a_mip1, a_layer0, a_layer1));
    }
    if a_layer0 < il0 {
        out.push(rect(im0, im1, a_layer0, il0));
    }
    if il1 < a_layer1 {
        out.push(rect(im0, im1, il1, a_layer1));
    }
    out
}

/// Per-resource subresource-state tracker: a set of disjoint ranges each
/// carrying their own last-known `ResourceState`, so a write to one mip
/// does not disturb the tracked state of an untouched, unrelated mip.
#[derive(Default)]
struct TrackedRegions(Vec<(SubresourceRange, ResourceState)>);

impl TrackedRegions {
    fn new(whole: SubresourceRange, initial_state: ResourceState) -> Self {
        Self(vec![(whole, initial_state)])
    }

    /// Transitions `range` to `new_state`, splitting any tracked region
    /// that only partially overlaps `range` so the untouched remainder
    /// keeps its prior state. Returns the distinct prior states found
    /// within `range` that actually differed from `new_state` — the
    /// "before" side of the barrier(s) the caller must plan.
    fn transition(&mut self, range: SubresourceRange, new_state: ResourceState) -> Vec<ResourceState> {
        let mut befores = Vec::new();
        let mut next = Vec::with_capacity(self.0.len() + 1);
        for (existing_range, existing_state) in self.0.drain(..) {
            if !existing_range.overlaps(&range) {
                next.push((existing_range, existing_state));
                continue;
            }
            if existing_state != new_state && !befores.contains(&existing_state) {
                befores.push(existing_state);
            }
            next.extend(subtract_range(&existing_range, &range).into_iter().map(|r| (r, existing_state)));
        }
        next.push((range, new_state));
        self.0 = next;
        befores
    }
}

/// One pass's resolved per-resource access: reads and writes declared
/// separately against the same handle collapse into a single `ReadWrite`
/// using the write's target state, so no spurious self-barrier is
/// planned and the write state is the one that sticks.
struct MergedAccess {
    state: ResourceState,
    is_write: bool,
}

/// One surviving pass in execution order, with the barriers that must be
/// emitted immediately before it.
pub struct CompiledPass {
    pub pass_index: usize,
    pub barriers: Vec<Barrier>,
}

pub struct CompiledPlan {
    pub order: Vec<CompiledPass>,
    pub final_barriers: Vec<Barrier>,
    pub stats: CompileStats,
    pub live: Vec<bool>,
}

/// Runs the full compile pipeline over `passes`/`resources` (mutated to
/// record producer/consumer lists) and returns the executable plan.
#[must_use]
pub fn compile(passes: &[PassRecord<'_>], resources: &mut [RgResource]) -> CompiledPlan {
    let mut stats = CompileStats { total_passes: passes.len() as u32, ..CompileStats::default() };

    // 1. Build the access graph: producer/consumer lists per resource.
    for r in resources.iter_mut() {
        r.producers.clear();
        r.consumers.clear();
    }
    for (pass_idx, pass) in passes.iter().enumerate() {
        for access in &pass.accesses {
            let idx = access.handle.index() as usize;
            let Some(resource) = resources.get_mut(idx) else { continue };
            match access.kind {
                AccessKind::Write => resource.producers.push(pass_idx),
                AccessKind::Read => resource.consumers.push(pass_idx),
                AccessKind::ReadWrite => {
                    resource.producers.push(pass_idx);
                    resource.consumers.push(pass_idx);
                }
            }
        }
    }

    // Edges: for every resource, the last producer before each consumer
    // implies producer -> consumer. We store this as adjacency over pass
    // indices for reachability and as a dependency count for topo sort.
    let mut depends_on: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); passes.len()];
    for resource in resources.iter() {
        for &consumer in &resource.consumers {
            for &producer in &resource.producers {
                if producer != consumer {
                    depends_on[consumer].insert(producer);
                }
            }
        }
        // A write after another write on the same resource is also an
        // ordering edge (so later producers run after earlier ones).
        for window in resource.producers.windows(2) {
            if window[0] != window[1] {
                depends_on[window[1]].insert(window[0]);
            }
        }
    }

    // 2. Pass culling: reverse reachability from passes that write an
    // exported or imported-with-final-state resource.
    let mut roots: FxHashSet<usize> = FxHashSet::default();
    for resource in resources.iter() {
        let exported = resource.export_final_state.is_some() || !resource.is_transient();
        if exported {
            roots.extend(resource.producers.iter().copied());
        }
    }
    let mut live = vec![false; passes.len()];
    let mut stack: Vec<usize> = roots.into_iter().collect();
    while let Some(p) = stack.pop() {
        if live[p] {
            continue;
        }
        live[p] = true;
        for &dep in &depends_on[p] {
            stack.push(dep);
        }
    }
    let culled = live.iter().filter(|&&l| !l).count() as u32;
    stats.culled_passes = culled;

    // 3 + 4. Execution order: stable topological sort honoring
    // dependency edges with original (priority, insertion_order) as the
    // tie-break among passes with no relative dependency.
    let mut candidates: Vec<usize> = (0..passes.len()).filter(|&i| live[i]).collect();
    candidates.sort_by_key(|&i| (passes[i].priority, passes[i].insertion_order));

    let mut order: Vec<usize> = Vec::with_capacity(candidates.len());
    let mut placed = vec![false; passes.len()];
    let mut remaining = candidates.len();
    while remaining > 0 {
        let mut progressed = false;
        for &i in &candidates {
            if placed[i] {
                continue;
            }
            let ready = depends_on[i].iter().all(|&dep| !live[dep] || placed[dep]);
            if ready {
                order.push(i);
                placed[i] = true;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            // Only reachable if the caller declared a cycle; the graph's
            // public entry point turns this into a caller-visible error
            // rather than looping forever.
            break;
        }
    }

    // 5. State tracking and barrier planning, at subresource granularity:
    // each resource tracks state per disjoint mip/layer range rather than
    // one state for the whole resource, so a write to one mip never
    // forces a barrier against an untouched, unrelated mip.
    let mut current_state: Vec<TrackedRegions> = resources
        .iter()
        .map(|r| TrackedRegions::new(full_range(r), r.initial_state))
        .collect();
    let mut compiled_order = Vec::with_capacity(order.len());

    for &pass_idx in &order {
        let pass = &passes[pass_idx];
        let mut barriers = Vec::new();

        // Collapse same-(resource, subresource) accesses declared
        // separately within one pass (e.g. a bare `read_texture` plus a
        // bare `write_texture` on the same handle) into a single
        // ReadWrite using the write's target state, per-key, in
        // first-seen order.
        let mut order_keys: Vec<(u32, Option<SubresourceRange>)> = Vec::new();
        let mut merged: FxHashMap<(u32, Option<SubresourceRange>), MergedAccess> = FxHashMap::default();
        for access in &pass.accesses {
            let key = (
                access.handle.index(),
                match access.handle {
                    ResourceHandle::Texture(h) => h.subresource,
                    ResourceHandle::Buffer(_) => None,
                },
            );
            let is_write = matches!(access.kind, AccessKind::Write | AccessKind::ReadWrite);
            match merged.entry(key) {
                Entry::Occupied(mut entry) => {
                    let m = entry.get_mut();
                    if is_write {
                        m.state = access.state;
                        m.is_write = true;
                    } else if !m.is_write {
                        m.state = access.state;
                    }
                }
                Entry::Vacant(entry) => {
                    order_keys.push(key);
                    entry.insert(MergedAccess { state: access.state, is_write });
                }
            }
        }

        for key in order_keys {
            let (idx, subresource) = key;
            let slot = idx as usize;
            let Some(resource) = resources.get(slot) else { continue };
            let m = &merged[&key];
            let range = subresource.unwrap_or_else(|| full_range(resource));
            let is_texture = resource.kind.is_texture();

            for before in current_state[slot].transition(range, m.state) {
                let target = BarrierTarget(idx);
                barriers.push(if is_texture {
                    Barrier::Texture { texture: target, before, after: m.state }
                } else {
                    Barrier::Buffer { buffer: target, before, after: m.state }
                });
                stats.barrier_count += 1;
                if is_texture {
                    stats.texture_barrier_count += 1;
                } else {
                    stats.buffer_barrier_count += 1;
                }
            }
        }

        compiled_order.push(CompiledPass { pass_index: pass_idx, barriers });
    }

    // Final transitions for exported resources: export state applies to
    // the whole resource, so any subresource still left in a different
    // state gets its own closing barrier.
    let mut final_barriers = Vec::new();
    for (idx, resource) in resources.iter().enumerate() {
        if let Some(final_state) = resource.export_final_state {
            let range = full_range(resource);
            for before in current_state[idx].transition(range, final_state) {
                let target = BarrierTarget(idx as u32);
                final_barriers.push(if resource.kind.is_texture() {
                    Barrier::Texture { texture: target, before, after: final_state }
                } else {
                    Barrier::Buffer { buffer: target, before, after: final_state }
                });
                stats.barrier_count += 1;
            }
        }
    }

    stats.total_transient_textures =
        resources.iter().filter(|r| r.is_transient() && r.kind.is_texture() && r.is_used()).count() as u32;
    stats.total_transient_buffers =
        resources.iter().filter(|r| r.is_transient() && !r.kind.is_texture() && r.is_used()).count() as u32;

    CompiledPlan { order: compiled_order, final_barriers, stats, live }
}

/// The `[first_use, last_use]` interval, in execution-order position
/// within `plan.order`, that a resource is touched by a surviving pass.
/// `None` if the resource was culled entirely.
#[must_use]
pub fn resource_lifetime(plan: &CompiledPlan, resource: &RgResource) -> Option<(usize, usize)> {
    let position_of: FxHashMap<usize, usize> =
        plan.order.iter().enumerate().map(|(slot, cp)| (cp.pass_index, slot)).collect();
    let touches: Vec<usize> = resource
        .producers
        .iter()
        .chain(resource.consumers.iter())
        .filter_map(|p| position_of.get(p).copied())
        .collect();
    if touches.is_empty() {
        return None;
    }
    Some((touches.iter().copied().min().unwrap(), touches.iter().copied().max().unwrap()))
}

/// Names of the live passes that never made it into `plan.order` — a
/// circular dependency among them prevented ordering.
#[must_use]
pub fn unresolved_pass_names(passes: &[PassRecord<'_>], plan: &CompiledPlan) -> Vec<String> {
    let placed: FxHashSet<usize> = plan.order.iter().map(|cp| cp.pass_index).collect();
    (0..passes.len())
        .filter(|&i| plan.live[i] && !placed.contains(&i))
        .map(|i| passes[i].name.clone())
        .collect()
}

/// Whether the candidate set could not fully order (a caller-declared
/// circular dependency among live passes).
#[must_use]
pub fn has_unresolvable_cycle(plan: &CompiledPlan) -> bool {
    let live_count = plan.stats.total_passes - plan.stats.culled_passes;
    (plan.order.len() as u32) < live_count
}
