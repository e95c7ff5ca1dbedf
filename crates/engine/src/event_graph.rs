//! Event graph construction (spec §4.6): translates the dependency
//! fragment each chosen possibility carries into a DAG of `Initiate`
//! (`set:w`) and `Complete` (`w`) events, resolves implicit Initiates
//! against the set of conductors that actually changed this round, and
//! topologically sorts the result into concurrent ranks.

use crate::component::{EventFragment, ExplicitEdges};
use crate::error::{EngineError, EngineResult};
use crate::topology::Topology;
use std::collections::{BTreeMap, BTreeSet};

const SET_PREFIX: &str = "set:";

fn set_node(w: &str) -> String {
    format!("{SET_PREFIX}{w}")
}

fn complete_node(w: &str) -> String {
    w.to_string()
}

#[derive(Debug, Default, Clone)]
pub struct EventGraph {
    pub nodes: BTreeSet<String>,
    /// `edges[a]` is the set of nodes that must happen after `a`.
    pub edges: BTreeMap<String, BTreeSet<String>>,
}

impl EventGraph {
    fn add_node(&mut self, node: &str) {
        self.nodes.insert(node.to_string());
        self.edges.entry(node.to_string()).or_default();
    }

    fn add_edge(&mut self, before: &str, after: &str) {
        if before == after {
            return;
        }
        self.add_node(before);
        self.add_node(after);
        self.edges.get_mut(before).expect("just inserted").insert(after.to_string());
    }

    /// Inverts `edges` into `{event_name: {predecessor_event_name, …}}`,
    /// the literal adjacency map shape spec §6 describes for
    /// `return_graph` artifacts.
    pub fn predecessor_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut predecessors: BTreeMap<String, BTreeSet<String>> =
            self.nodes.iter().map(|n| (n.clone(), BTreeSet::new())).collect();
        for (before, afters) in &self.edges {
            for after in afters {
                predecessors.entry(after.clone()).or_default().insert(before.clone());
            }
        }
        predecessors
    }

    /// Renders [`predecessor_map`](Self::predecessor_map) as the literal
    /// text spec §6 calls for: one `event_name: {predecessor, …}` line
    /// per event, sorted for reproducibility.
    pub fn render_predecessor_map(&self) -> String {
        self.predecessor_map()
            .into_iter()
            .map(|(event, preds)| {
                let preds = preds.into_iter().collect::<Vec<_>>().join(", ");
                format!("{event}: {{{preds}}}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Kahn's algorithm, grouping each round's zero-indegree nodes into one
    /// rank so the interleaver can treat them as concurrency candidates.
    /// Per spec §4.6, a remaining cycle is a synthesis error, not a panic.
    pub fn toposort_ranks(&self) -> EngineResult<Vec<Vec<String>>> {
        let mut indegree: BTreeMap<String, usize> = self.nodes.iter().map(|n| (n.clone(), 0)).collect();
        for targets in self.edges.values() {
            for t in targets {
                *indegree.entry(t.clone()).or_insert(0) += 1;
            }
        }

        let mut ranks = Vec::new();
        let mut remaining = indegree.clone();
        let mut placed = 0usize;

        while placed < self.nodes.len() {
            let rank: Vec<String> = remaining
                .iter()
                .filter(|(_, &deg)| deg == 0)
                .map(|(n, _)| n.clone())
                .collect();
            if rank.is_empty() {
                return Err(EngineError::Synthesis(
                    "event graph contains a cycle; sequence is infeasible".into(),
                ));
            }
            for n in &rank {
                remaining.remove(n);
                if let Some(targets) = self.edges.get(n) {
                    for t in targets {
                        if let Some(d) = remaining.get_mut(t) {
                            *d -= 1;
                        }
                    }
                }
            }
            placed += rank.len();
            ranks.push(rank);
        }
        Ok(ranks)
    }
}

/// Resolves one wire's dependency fragment into (possibly) a `Set` node,
/// given which conductors actually changed value this round. An implicit
/// fragment whose `causes` are all unchanged means the Initiate already
/// happened on a previous pass: it collapses to the `None` sentinel of
/// spec §9, and `strict_none_edges` decides whether ordering constraints
/// against it still bind (redirected onto the Complete event) or are
/// simply dropped, per the two historical behaviours preserved there.
fn resolve_fragment<'a>(
    fragment: &'a EventFragment,
    changed: &BTreeSet<String>,
) -> (Option<&'a ExplicitEdges>, Vec<String>) {
    match fragment {
        EventFragment::Explicit(edges) => (Some(edges), Vec::new()),
        EventFragment::Implicit { causes, edges } => {
            let triggers: Vec<String> = causes.intersection(changed).cloned().collect();
            if triggers.is_empty() {
                (None, Vec::new())
            } else {
                (Some(edges), triggers)
            }
        }
    }
}

/// Builds the event graph for one synthesized assignment. `chosen` maps
/// conductor name to the possibility index that was selected for it;
/// `changed` is the set of conductors whose value differs from the
/// platform's previously committed state. Conductors absent from
/// `changed` are omitted entirely unless `record_unchanged` is set.
pub fn build_event_graph(
    topology: &Topology,
    chosen: &BTreeMap<String, usize>,
    changed: &BTreeSet<String>,
    record_unchanged: bool,
    strict_none_edges: bool,
) -> EngineResult<EventGraph> {
    let mut graph = EventGraph::default();
    let mut initiated: BTreeMap<String, bool> = BTreeMap::new();
    // First pass: resolve every participating conductor's fragment and
    // populate `initiated` in full before any edge is bound against it --
    // `chosen` iterates in `BTreeMap` (alphabetical) order, so a target
    // referenced by an earlier-iterated conductor's `after_*`/`before_*`
    // edges may not have been visited yet; binding against a
    // partially-built `initiated` would mistake it for the `None`
    // sentinel instead of its real (possibly later-assigned) status.
    let mut resolved: Vec<(String, ExplicitEdges, Vec<String>)> = Vec::new();

    for (name, idx) in chosen {
        if !record_unchanged && !changed.contains(name) {
            continue;
        }
        let conductor = topology
            .conductors
            .get(name)
            .ok_or_else(|| EngineError::Wire(format!("unknown conductor '{name}'")))?;
        let possibility = conductor
            .possibilities
            .get(*idx)
            .ok_or_else(|| EngineError::Wire(format!("no possibility {idx} on '{name}'")))?;
        let owner_flags = &topology
            .components
            .get(&conductor.owner)
            .ok_or_else(|| EngineError::Wire(format!("unknown component '{}'", conductor.owner)))?
            .flags;
        let fragment = possibility.dependency.resolve(owner_flags);
        let (edges, triggers) = resolve_fragment(&fragment, changed);

        graph.add_node(&complete_node(name));
        match edges {
            None => {
                initiated.insert(name.clone(), false);
            }
            Some(edges) => {
                initiated.insert(name.clone(), true);
                resolved.push((name.clone(), edges.clone(), triggers));
            }
        }
    }

    for (name, edges, triggers) in &resolved {
        graph.add_edge(&set_node(name), &complete_node(name));
        for cause in triggers {
            graph.add_edge(&complete_node(cause), &set_node(name));
        }
        for target in &edges.before_set {
            bind_after(&mut graph, &set_node(name), target, &initiated, strict_none_edges, true);
        }
        for target in &edges.before_complete {
            bind_after(&mut graph, &set_node(name), target, &initiated, strict_none_edges, false);
        }
        for target in &edges.after_set {
            bind_before(&mut graph, target, &set_node(name), &initiated, strict_none_edges, true);
        }
        for target in &edges.after_complete {
            bind_before(&mut graph, target, &set_node(name), &initiated, strict_none_edges, false);
        }
    }

    Ok(graph)
}

/// Adds `from -> target`'s chosen node, where `target`'s Initiate may have
/// collapsed to `None`. `want_set` picks Set vs Complete when `target`
/// does have a live Initiate.
fn bind_after(
    graph: &mut EventGraph,
    from: &str,
    target: &str,
    initiated: &BTreeMap<String, bool>,
    strict_none_edges: bool,
    want_set: bool,
) {
    match initiated.get(target) {
        Some(true) => {
            let to = if want_set { set_node(target) } else { complete_node(target) };
            graph.add_edge(from, &to);
        }
        Some(false) => {
            if strict_none_edges {
                graph.add_edge(from, &complete_node(target));
            }
            // else: target already settled, no ordering left to express.
        }
        None => {
            // target was filtered out by record_unchanged; nothing to bind to.
        }
    }
}

fn bind_before(
    graph: &mut EventGraph,
    target: &str,
    to: &str,
    initiated: &BTreeMap<String, bool>,
    strict_none_edges: bool,
    want_set: bool,
) {
    match initiated.get(target) {
        Some(true) => {
            let from = if want_set { set_node(target) } else { complete_node(target) };
            graph.add_edge(&from, to);
        }
        Some(false) => {
            if strict_none_edges {
                graph.add_edge(&complete_node(target), to);
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_sorts_into_three_ranks() {
        let mut graph = EventGraph::default();
        graph.add_edge("set:a", "a");
        graph.add_edge("a", "set:b");
        graph.add_edge("set:b", "b");
        let ranks = graph.toposort_ranks().unwrap();
        assert_eq!(ranks.len(), 3);
        assert_eq!(ranks[0], vec!["set:a".to_string()]);
    }

    #[test]
    fn independent_nodes_share_a_rank() {
        let mut graph = EventGraph::default();
        graph.add_node("set:a");
        graph.add_node("set:b");
        let ranks = graph.toposort_ranks().unwrap();
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].len(), 2);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut graph = EventGraph::default();
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        assert!(graph.toposort_ranks().is_err());
    }
}
