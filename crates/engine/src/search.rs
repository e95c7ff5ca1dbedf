//! State-generation engine (spec §4.4): conflict-directed backtracking
//! selection of one possibility per conductor, with a final SMT pass
//! (`smt`) to concretise dimensions tied together by complex constraints.

use crate::component::ComplexConstraint;
use crate::error::{EngineError, EngineResult};
use crate::smt::{SmtAdapter, SmtProblem, VarDomain};
use crate::state::{intersect, select_dimension, unite_dict, Dimension, Option_, StateDict};
use crate::topology::Topology;
use std::collections::{BTreeMap, BTreeSet};

/// Search flags carried on every top-level call (spec §6), extended with
/// `strict_none_edges` per the §9 Open Question resolution recorded in
/// SPEC_FULL.md.
#[derive(Debug, Clone)]
pub struct SearchFlags {
    pub all_solutions: bool,
    pub extend: bool,
    pub ignore_nodes: BTreeSet<String>,
    pub record_unchanged: bool,
    pub no_output: bool,
    pub advanced_backtracking: bool,
    pub use_z3: bool,
    pub visualize: bool,
    pub return_graph: bool,
    pub prefer_concurrent_interleaving: bool,
    pub strict_none_edges: bool,
    pub restricted: bool,
}

impl Default for SearchFlags {
    fn default() -> Self {
        SearchFlags {
            all_solutions: false,
            extend: true,
            ignore_nodes: BTreeSet::new(),
            record_unchanged: false,
            no_output: false,
            advanced_backtracking: true,
            use_z3: false,
            visualize: false,
            return_graph: false,
            prefer_concurrent_interleaving: true,
            strict_none_edges: true,
            restricted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub chosen: BTreeMap<String, Option_>,
    pub possibility: BTreeMap<String, usize>,
}

struct Frame {
    conductor: String,
    candidates: Vec<usize>,
    working_snapshot: StateDict,
    last_chosen: Option<usize>,
}

fn try_apply(
    topology: &Topology,
    name: &str,
    candidate: usize,
    working_before: &StateDict,
    last_touched: &mut BTreeMap<String, String>,
) -> EngineResult<StateDict> {
    let conductor = topology
        .conductors
        .get(name)
        .ok_or_else(|| EngineError::Wire(format!("unknown conductor '{name}'")))?;
    let owner_flags = &topology
        .components
        .get(&conductor.owner)
        .ok_or_else(|| EngineError::Wire(format!("unknown component '{}'", conductor.owner)))?
        .flags;
    let target = working_before.get(name).cloned().unwrap_or_else(|| conductor.amr.clone());
    let possibility = conductor
        .possibilities
        .get(candidate)
        .ok_or_else(|| EngineError::Wire(format!("no possibility {candidate} on '{name}'")))?;

    let narrowed = intersect(&target, &possibility.state.resolve(owner_flags))
        .map_err(|_| EngineError::state_space(name, "possibility state does not meet requirement"))?;

    let mut new_working = working_before.clone();
    new_working.insert(name.to_string(), narrowed);
    unite_dict(&mut new_working, &possibility.requirements)
        .map_err(|_| EngineError::state_space(name, "possibility requirements conflict with working set"))?;

    last_touched.insert(name.to_string(), name.to_string());
    for key in possibility.requirements.keys() {
        last_touched.insert(key.clone(), name.to_string());
    }
    Ok(new_working)
}

/// Pops frames whose alternatives can't help, per the "worth-a-try"
/// filter of spec §4.4: in advanced mode, a frame is only offered its
/// remaining candidates if its conductor actually touched the value that
/// just produced a conflict (`implicated`). In naive mode every exhausted
/// frame is simply popped (chronological backtracking).
fn force_backtrack(
    frames: &mut Vec<Frame>,
    working: &mut StateDict,
    pos: &mut usize,
    implicated: Option<&BTreeSet<String>>,
) -> bool {
    loop {
        let discard = match frames.last() {
            None => return false,
            Some(frame) => {
                frame.candidates.is_empty()
                    || match implicated {
                        None => false,
                        Some(set) => !set.is_empty() && !set.contains(&frame.conductor),
                    }
            }
        };
        if discard {
            frames.pop();
            if *pos == 0 {
                return false;
            }
            *pos -= 1;
            continue;
        }
        let frame = frames.last().expect("checked above");
        *working = frame.working_snapshot.clone();
        // The retained frame is the current decision point: realign `pos`
        // to its index so the main loop re-enters the "consume next
        // candidate" branch for it instead of re-finalizing the same
        // (already-recorded) choice forever. A no-op when called from the
        // exhausted-top-frame path, where this already held.
        *pos = frames.len() - 1;
        return true;
    }
}

fn finalize(topology: &Topology, working: &StateDict, choices: &BTreeMap<String, usize>, smt: &mut dyn SmtAdapter) -> EngineResult<Option<Solution>> {
    let mut domains = Vec::new();
    let mut complex: Vec<ComplexConstraint> = Vec::new();
    let mut options: BTreeMap<String, Option_> = BTreeMap::new();

    for (name, idx) in choices {
        let conductor = topology
            .conductors
            .get(name)
            .ok_or_else(|| EngineError::Wire(format!("unknown conductor '{name}'")))?;
        let space = working.get(name).cloned().unwrap_or_else(|| conductor.amr.clone());
        let option = space
            .first()
            .cloned()
            .ok_or_else(|| EngineError::state_space(name, "no surviving option"))?;
        for (i, dim) in option.iter().enumerate() {
            domains.push(VarDomain { conductor: name.clone(), dim: i, domain: dim.clone() });
        }
        options.insert(name.clone(), option);
        let possibility = &conductor.possibilities[*idx];
        complex.extend(possibility.complex_constraints.iter().cloned());
    }

    let problem = SmtProblem { domains, complex };
    let assignment = smt.solve(&problem)?;
    let Some(assignment) = assignment else {
        return Ok(None);
    };

    let mut chosen = BTreeMap::new();
    for (name, option) in options {
        let resolved: Option_ = option
            .iter()
            .enumerate()
            .map(|(i, dim)| {
                if let Some(&v) = assignment.get(&(name.clone(), i)) {
                    match dim {
                        Dimension::Range(_, _) => Dimension::Range(v, v),
                        Dimension::Set(_) => Dimension::set([v]),
                    }
                } else {
                    select_dimension(dim)
                }
            })
            .collect();
        chosen.insert(name, resolved);
    }

    Ok(Some(Solution { chosen, possibility: choices.clone() }))
}

/// Fast path for the `restricted` search flag: if the platform's current
/// committed assignment already satisfies `requirements`, reuse it
/// without searching (spec §4.4).
fn restricted_search(topology: &Topology, requirements: &StateDict) -> Option<Solution> {
    let mut chosen = BTreeMap::new();
    let mut possibility = BTreeMap::new();
    for (name, conductor) in &topology.conductors {
        let current = conductor.current_state.as_ref()?;
        if let Some(required) = requirements.get(name) {
            let space = vec![current.clone()];
            if intersect(&space, required).is_err() {
                return None;
            }
        }
        let owner_flags = &topology.components.get(&conductor.owner)?.flags;
        let idx = conductor
            .possibilities
            .iter()
            .position(|p| intersect(&vec![current.clone()], &p.state.resolve(owner_flags)).is_ok())?;
        chosen.insert(name.clone(), current.clone());
        possibility.insert(name.clone(), idx);
    }
    Some(Solution { chosen, possibility })
}

/// Produces zero or more assignments satisfying `requirements` plus
/// (when `flags.extend`) the platform's current AMR union, choosing one
/// possibility per conductor.
pub fn synthesize(
    topology: &Topology,
    requirements: &StateDict,
    flags: &SearchFlags,
    smt: &mut dyn SmtAdapter,
    expected_solutions: Option<usize>,
) -> EngineResult<Vec<Solution>> {
    if flags.restricted {
        if let Some(sol) = restricted_search(topology, requirements) {
            tracing::debug!("restricted search reused the current assignment, skipping backtracking");
            return Ok(vec![sol]);
        }
    }

    let order = topology.sorted_wires.clone();
    let mut working = requirements.clone();
    if flags.extend {
        let amr = topology.platform_amr(&flags.ignore_nodes)?;
        unite_dict(&mut working, &amr)?;
    }

    let mut frames: Vec<Frame> = Vec::new();
    let mut last_touched: BTreeMap<String, String> = BTreeMap::new();
    let mut solutions = Vec::new();
    let mut pos = 0usize;

    loop {
        if pos == order.len() {
            let choices: BTreeMap<String, usize> = frames.iter().map(|f| (f.conductor.clone(), f.candidates_chosen())).collect();
            let outcome = finalize(topology, &working, &choices, smt)?;
            if let Some(solution) = outcome {
                let want_more = flags.all_solutions && expected_solutions.map(|n| solutions.len() + 1 < n).unwrap_or(true);
                solutions.push(solution);
                if !want_more {
                    break;
                }
            }
            if !force_backtrack(&mut frames, &mut working, &mut pos, None) {
                break;
            }
            continue;
        }

        if frames.len() == pos {
            let name = order[pos].clone();
            let conductor = topology
                .conductors
                .get(&name)
                .ok_or_else(|| EngineError::Wire(format!("unknown conductor '{name}'")))?;
            let target = working.get(&name).cloned().unwrap_or_else(|| conductor.amr.clone());
            let owner_flags = &topology.components[&conductor.owner].flags;
            let candidates: Vec<usize> = conductor
                .possibilities
                .iter()
                .enumerate()
                .filter(|(_, p)| intersect(&target, &p.state.resolve(owner_flags)).is_ok())
                .map(|(i, _)| i)
                .collect();
            frames.push(Frame { conductor: name, candidates, working_snapshot: working.clone(), last_chosen: None });
        }

        let top_has_candidates = !frames.last().expect("just ensured").candidates.is_empty();
        if !top_has_candidates {
            let implicated: BTreeSet<String> = last_touched
                .get(&frames.last().unwrap().conductor)
                .cloned()
                .into_iter()
                .collect();
            let opts = if flags.advanced_backtracking { Some(&implicated) } else { None };
            if !force_backtrack(&mut frames, &mut working, &mut pos, opts) {
                break;
            }
            continue;
        }

        let candidate = {
            let frame = frames.last_mut().expect("just ensured");
            frame.candidates.remove(0)
        };
        let name = frames.last().unwrap().conductor.clone();
        let snapshot = frames.last().unwrap().working_snapshot.clone();
        match try_apply(topology, &name, candidate, &snapshot, &mut last_touched) {
            Ok(new_working) => {
                working = new_working;
                frames.last_mut().unwrap().remember(candidate);
                pos += 1;
            }
            Err(_) => continue,
        }
    }

    tracing::debug!(count = solutions.len(), "backtracking search finished");
    Ok(solutions)
}

impl Frame {
    fn remember(&mut self, chosen: usize) {
        self.last_chosen = Some(chosen);
    }

    fn candidates_chosen(&self) -> usize {
        self.last_chosen.expect("finalize only reached after every frame decided")
    }
}
