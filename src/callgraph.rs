//! Call-graph extraction.
//!
//! Edges go from the caller's local name (`Class.method` for methods) to the
//! literal callee text recorded by the scanner. No resolution is attempted.

use crate::types::{CallGraph, EntityKind, EntityRecord};
use std::collections::BTreeSet;

/// Caller key used in the call graph for an entity.
pub fn caller_key(name: &str, class_name: Option<&str>) -> String {
    match class_name {
        Some(class) => format!("{class}.{name}"),
        None => name.to_string(),
    }
}

/// Build the call graph for one module from its scanner records.
///
/// Only functions and methods contribute edges. Duplicate call sites collapse
/// into one edge per caller/callee pair.
pub fn build_graph(entities: &[EntityRecord]) -> CallGraph {
    let mut graph = CallGraph::new();
    for entity in entities {
        match entity.kind {
            EntityKind::Function => add_edges(&mut graph, caller_key(&entity.name, None), &entity.calls),
            EntityKind::Class => {
                for method in &entity.methods {
                    add_edges(
                        &mut graph,
                        caller_key(&method.name, Some(&entity.name)),
                        &method.calls,
                    );
                }
            }
            EntityKind::Module | EntityKind::Method => {}
        }
    }
    graph
}

fn add_edges(graph: &mut CallGraph, caller: String, calls: &[String]) {
    let callees: BTreeSet<String> = calls
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if callees.is_empty() {
        return;
    }
    graph.entry(caller).or_default().extend(callees);
}

/// Literal number of edges: the sum of every caller's callee-set size.
pub fn edge_count(graph: &CallGraph) -> usize {
    graph.values().map(|callees| callees.len()).sum()
}

/// Flatten a graph into sorted `(caller, callee)` pairs.
pub fn edges(graph: &CallGraph) -> impl Iterator<Item = (&str, &str)> {
    graph.iter().flat_map(|(caller, callees)| {
        callees
            .iter()
            .map(move |callee| (caller.as_str(), callee.as_str()))
    })
}
