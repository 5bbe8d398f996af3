//! Graphviz (`dot`) export of a compiled graph, for debugging.

use std::fmt::Write as _;

use super::compile::CompiledPlan;
use super::pass::{PassRecord, PassType};
use super::resource::RgResource;

fn pass_color(ty: PassType) -> &'static str {
    match ty {
        PassType::Graphics => "lightblue",
        PassType::Compute => "lightgreen",
        PassType::Copy => "lightyellow",
    }
}

/// Renders the compiled execution order as a `dot` graph: nodes are
/// passes (colored by type), edges are labelled with the resource name
/// and the state the consuming pass required.
#[must_use]
pub fn export_graphviz(passes: &[PassRecord<'_>], resources: &[RgResource], plan: &CompiledPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph RenderGraph {{");
    let _ = writeln!(out, "  rankdir=LR;");

    for compiled in &plan.order {
        let pass = &passes[compiled.pass_index];
        let _ = writeln!(
            out,
            "  p{} [label=\"{}\" style=filled fillcolor={}];",
            compiled.pass_index,
            pass.name,
            pass_color(pass.pass_type)
        );
    }

    for resource in resources {
        for &producer in &resource.producers {
            for &consumer in &resource.consumers {
                if producer == consumer || !plan.live.get(producer).copied().unwrap_or(false) {
                    continue;
                }
                let _ = writeln!(out, "  p{producer} -> p{consumer} [label=\"{}\"];", resource.name);
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}
