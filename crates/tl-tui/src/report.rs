//! Plain-text rendering of launch plans and reports for `--plan` and
//! `--headless`.

use std::fmt::Write;

use tl_core::models::{EdgeKind, LaunchReport, Lifetime, RunState};
use tl_core::services::topology::Topology;

use crate::app::ENDPOINT_HOST;

pub fn render_plan(topology: &Topology) -> String {
    let graph = topology.graph();
    let order: Vec<String> = graph
        .topological_order()
        .unwrap_or_else(|_| graph.services().map(String::from).collect());
    let width = order.iter().map(|n| n.len()).max().unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "Topology: {}", topology.name().unwrap_or("(unnamed)"));
    let _ = writeln!(out, "Network:  {}", topology.network());
    let _ = writeln!(out);
    let _ = writeln!(out, "Launch order:");

    for (i, name) in order.iter().enumerate() {
        let Some(def) = topology.definition(name) else {
            continue;
        };
        let persistent = if def.lifetime() == Lifetime::Persistent {
            " (persistent)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{:>3}. {name:<width$}  {}{persistent}",
            i + 1,
            def.image()
        );

        let wait_for = graph.dependencies(name, EdgeKind::WaitFor);
        if !wait_for.is_empty() {
            let _ = writeln!(out, "       wait for: {}", wait_for.join(", "));
        }
        if let Some(parent) = graph.dependencies(name, EdgeKind::ParentOf).first() {
            let _ = writeln!(out, "       parent:   {parent}");
        }
        for (label, url) in def.endpoint_urls(ENDPOINT_HOST) {
            let _ = writeln!(out, "       {label}: {url}");
        }
    }
    out
}

pub fn render_report(report: &LaunchReport) -> String {
    let width = report.services.keys().map(|n| n.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (name, status) in &report.services {
        let _ = write!(out, "{name:<width$}  {}", status.state);
        if let Some(ref reason) = status.reason {
            let _ = write!(out, ": {reason}");
        }
        let _ = writeln!(out);
    }
    if !report.services.is_empty() {
        let _ = writeln!(out);
    }
    let _ = writeln!(
        out,
        "{} ready, {} failed, {} skipped, {} cancelled",
        report.count(RunState::Ready),
        report.count(RunState::Failed),
        report.count(RunState::SkippedDueToDependencyFailure),
        report.count(RunState::Cancelled)
    );
    out
}
