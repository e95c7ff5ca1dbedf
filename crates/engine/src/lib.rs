//! Power-sequencing constraint engine (spec overview): a state-space
//! algebra over conductor value ranges, a catalogue of components wired
//! into a topology, a backtracking+SMT search that picks one feasible
//! assignment, and an event-graph/emitter pipeline that turns an
//! assignment into an ordered command sequence.
//!
//! The modules mirror the pipeline stages: [`state`] (§4.1) underlies
//! [`component`] (§4.2-4.3), which [`topology`] (§3, §4.2) assembles into
//! a concrete graph; [`search`] (§4.4) consumes it via [`smt`] (§4.5) to
//! produce a [`search::Solution`]; [`event_graph`] and [`interleave`]
//! (§4.6-§4.7) turn one or more solutions into an ordered DAG; and
//! [`emitter`] (§4.6) renders that DAG into commands.

pub mod component;
pub mod emitter;
pub mod error;
pub mod event_graph;
pub mod interleave;
pub mod search;
pub mod smt;
pub mod state;
pub mod topology;

pub use error::{EngineError, EngineResult};

use interleave::ConsumerTransition;
use search::{SearchFlags, Solution};
use smt::SmtAdapter;
use state::{Option_, StateDict};
use std::collections::BTreeSet;
use topology::Topology;

/// Conductors whose synthesized value differs from the topology's
/// currently committed value (or that have no committed value yet);
/// this is the `changed` set the event-graph builder uses to resolve
/// implicit Initiates and the `record_unchanged` filter.
fn changed_conductors(topology: &Topology, chosen: &std::collections::BTreeMap<String, Option_>) -> BTreeSet<String> {
    chosen
        .iter()
        .filter(|(name, value)| {
            topology
                .conductors
                .get(*name)
                .and_then(|c| c.current_state.as_ref())
                .map(|current| current != *value)
                .unwrap_or(true)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Runs the backtracking search alone, without building an event graph
/// or committing anything. Used for properties that only care about the
/// number or shape of feasible assignments (spec §8 target-state
/// scenarios).
pub fn search_solutions(
    topology: &Topology,
    requirements: &StateDict,
    flags: &SearchFlags,
    smt: &mut dyn SmtAdapter,
) -> EngineResult<Vec<Solution>> {
    let cap = if flags.all_solutions { None } else { Some(1) };
    search::synthesize(topology, requirements, flags, smt, cap)
}

/// One assignment's worth of rendered output: the chosen values, the
/// command text, and the event-graph ranks it was derived from.
/// `graph_text` is the literal `{event_name: {predecessor_event_name, …}}`
/// adjacency map (spec §6), populated only when `flags.return_graph` is
/// set, one per applied phase; callers write it out themselves — the
/// engine has no filesystem dependency.
#[derive(Debug, Clone)]
pub struct SequenceResult {
    pub solution: Solution,
    pub commands: String,
    pub ranks: Vec<Vec<String>>,
    pub graph_text: Option<String>,
}

/// Searches for one feasible assignment satisfying `requirements`, turns
/// it into an ordered event graph, renders the commands, and commits the
/// result into `topology`'s current state (spec §3: "updated atomically
/// after each successful sequence application").
pub fn synthesize_and_apply(
    topology: &mut Topology,
    requirements: &StateDict,
    flags: &SearchFlags,
    smt: &mut dyn SmtAdapter,
) -> EngineResult<SequenceResult> {
    let solution = search::synthesize(topology, requirements, flags, smt, Some(1))?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Synthesis("no assignment satisfies the given requirements".into()))?;
    apply_solution(topology, solution, flags)
}

/// Turns an already-chosen assignment into an ordered event graph,
/// renders the commands, and commits it into `topology`'s current state.
/// Shared by [`synthesize_and_apply`] (which searches for the
/// assignment first) and [`apply_consumer_transitions`] (which reuses
/// the assignment the interleaver already validated).
fn apply_solution(topology: &mut Topology, solution: Solution, flags: &SearchFlags) -> EngineResult<SequenceResult> {
    let changed = changed_conductors(topology, &solution.chosen);
    let graph = event_graph::build_event_graph(
        topology,
        &solution.possibility,
        &changed,
        flags.record_unchanged,
        flags.strict_none_edges,
    )?;
    let ranks = graph.toposort_ranks()?;
    let commands = if flags.no_output {
        String::new()
    } else {
        emitter::emit_commands(topology, &solution.chosen, &ranks)?
    };
    let graph_text = flags.return_graph.then(|| graph.render_predecessor_map());

    topology.commit(&solution.chosen);
    if !commands.is_empty() {
        topology.append_commands(&commands);
    }

    Ok(SequenceResult { solution, commands, ranks, graph_text })
}

/// Builds one [`ConsumerTransition`] from a consumer's current power
/// state to `to`, resolving its incremental steps via
/// [`component::ConsumerStates::resolve_absolute_steps`].
pub fn consumer_transition(
    topology: &Topology,
    consumer: &str,
    to: &str,
) -> EngineResult<ConsumerTransition> {
    let from = topology
        .current_node_state
        .get(consumer)
        .ok_or_else(|| EngineError::Wire(format!("'{consumer}' has no current power state")))?;
    let states = topology
        .consumer_states(consumer)
        .ok_or_else(|| EngineError::Wire(format!("'{consumer}' is not a stateful consumer")))?;
    let steps = states.resolve_absolute_steps(from, to)?;
    Ok(ConsumerTransition { name: consumer.to_string(), steps })
}

/// Commands plus, when `flags.return_graph` is set, one event-graph
/// adjacency-map text per applied phase (spec §6: "one text file per
/// applied phase"). `graphs[i]` corresponds to the `i`-th non-origin
/// lattice point the interleaver walked through.
#[derive(Debug, Clone, Default)]
pub struct TransitionOutcome {
    pub commands: String,
    pub graphs: Vec<String>,
}

/// Drives one or more consumers through a coordinated transition (spec
/// §4.6-§4.7): finds a feasible interleaving of their incremental steps,
/// then applies each lattice point as a whole-platform
/// [`synthesize_and_apply`] call in order, accumulating commands and
/// advancing `topology`'s recorded power state for every consumer that
/// reached its target this round.
pub fn apply_consumer_transitions(
    topology: &mut Topology,
    transitions: &[ConsumerTransition],
    targets: &std::collections::BTreeMap<String, String>,
    flags: &SearchFlags,
    smt: &mut dyn SmtAdapter,
) -> EngineResult<TransitionOutcome> {
    let plan = interleave::interleave(topology, transitions, flags, smt)?;

    let mut outcome = TransitionOutcome::default();
    // Skip the origin point (index 0): it is the platform's starting
    // state and requires no new commands.
    for point in plan.points.into_iter().skip(1) {
        let result = apply_solution(topology, point.solution, flags)?;
        if !result.commands.is_empty() {
            if !outcome.commands.is_empty() {
                outcome.commands.push('\n');
            }
            outcome.commands.push_str(&result.commands);
        }
        if let Some(graph_text) = result.graph_text {
            outcome.graphs.push(graph_text);
        }
    }

    for (consumer, target) in targets {
        topology.current_node_state.insert(consumer.clone(), target.clone());
    }

    Ok(outcome)
}
