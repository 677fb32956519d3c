//! Acyclicity check for the prerequisite graph.
//!
//! # Edge Direction
//!
//! Edges run `prerequisite → dependent`. A topological order exists iff the
//! catalog is usable; when it does not, the strongly connected components
//! with more than one member (or a self-loop) are the cycles.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use super::{Template, TemplateId};

/// Build the prerequisite graph for a template list.
#[must_use]
pub fn prerequisite_graph(templates: &[Template]) -> DiGraphMap<TemplateId, ()> {
    let mut graph = DiGraphMap::new();
    for template in templates {
        graph.add_node(template.id);
        for prerequisite in &template.prerequisites {
            graph.add_edge(*prerequisite, template.id, ());
        }
    }
    graph
}

/// Return the members of one prerequisite cycle, if any exists.
///
/// Members are sorted by [`TemplateId`] order so the report is stable. When
/// several cycles exist the one containing the smallest id is reported.
#[must_use]
pub fn find_prerequisite_cycle(templates: &[Template]) -> Option<Vec<TemplateId>> {
    let graph = prerequisite_graph(templates);
    if toposort(&graph, None).is_ok() {
        return None;
    }

    let mut cycles: Vec<Vec<TemplateId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|node| graph.contains_edge(*node, *node))
        })
        .map(|mut component| {
            component.sort_unstable();
            component
        })
        .collect();

    cycles.sort_unstable();
    cycles.into_iter().next()
}

/// Prerequisite-first ordering of the catalog.
///
/// Returns `None` if the graph is cyclic.
#[must_use]
pub fn topological_order(templates: &[Template]) -> Option<Vec<TemplateId>> {
    toposort(&prerequisite_graph(templates), None).ok()
}
