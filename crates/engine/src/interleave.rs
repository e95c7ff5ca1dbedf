//! Consumer transition interleaving (spec §4.6-§4.7): given several
//! consumers each moving through an ordered sequence of incremental
//! steps, finds a reachability path through the product lattice of
//! per-consumer step indices, each lattice point requiring its own
//! whole-platform [`synthesize`] pass (search + event graph) to confirm
//! the combined delta is jointly satisfiable.
//!
//! The lattice is graded by the sum of its indices, so a breadth-first
//! sweep in increasing-sum order is a valid topological order: every
//! node's predecessors are at sum - 1 (single-consumer step) or lower.

use crate::error::{EngineError, EngineResult};
use crate::search::{synthesize, SearchFlags, Solution};
use crate::smt::SmtAdapter;
use crate::state::{unite_dict, StateDict};
use crate::topology::Topology;
use std::collections::BTreeMap;

/// One consumer's absolute step sequence (spec §3: each entry already
/// folds the prior deltas onto the origin AMR, per
/// `ConsumerStates::resolve_absolute_steps`).
#[derive(Debug, Clone)]
pub struct ConsumerTransition {
    pub name: String,
    pub steps: Vec<StateDict>,
}

#[derive(Debug, Clone)]
pub struct LatticePoint {
    pub indices: Vec<usize>,
    pub solution: Solution,
}

#[derive(Debug, Clone)]
pub struct InterleavePlan {
    pub points: Vec<LatticePoint>,
}

fn requirement_at(transitions: &[ConsumerTransition], indices: &[usize]) -> EngineResult<StateDict> {
    let mut acc = StateDict::new();
    for (t, &idx) in transitions.iter().zip(indices) {
        if idx == 0 {
            continue;
        }
        unite_dict(&mut acc, &t.steps[idx - 1])?;
    }
    Ok(acc)
}

/// Every way to advance `indices` by one step in a non-empty subset of
/// not-yet-finished consumers, largest subsets first when
/// `prefer_concurrent` is set (so a single combined lattice move is tried
/// before falling back to single-consumer moves), smallest (strictly
/// single-step) subsets only otherwise.
fn neighbor_candidates(indices: &[usize], lens: &[usize], prefer_concurrent: bool) -> Vec<Vec<usize>> {
    let ready: Vec<usize> = (0..indices.len()).filter(|&i| indices[i] < lens[i]).collect();
    if ready.is_empty() {
        return Vec::new();
    }
    if !prefer_concurrent {
        return ready
            .iter()
            .map(|&i| {
                let mut next = indices.to_vec();
                next[i] += 1;
                next
            })
            .collect();
    }

    let mut subsets: Vec<Vec<usize>> = Vec::new();
    let n = ready.len();
    for mask in (1u32..(1 << n)).rev() {
        let subset: Vec<usize> = (0..n).filter(|&b| mask & (1 << b) != 0).map(|b| ready[b]).collect();
        subsets.push(subset);
    }
    subsets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    subsets
        .into_iter()
        .map(|subset| {
            let mut next = indices.to_vec();
            for i in subset {
                next[i] += 1;
            }
            next
        })
        .collect()
}

/// Finds a path through the product lattice from the all-zero origin to
/// every consumer's final step, each lattice edge validated by a
/// whole-platform `synthesize` call. Per `flags.prefer_concurrent_interleaving`,
/// a node already reached keeps its first parent (a stable,
/// earliest-discovered path) when concurrency is preferred, or is
/// overwritten by the last parent found when it is not (a simpler,
/// non-stable strategy matching the flag's naive historical behaviour).
pub fn interleave(
    topology: &Topology,
    transitions: &[ConsumerTransition],
    flags: &SearchFlags,
    smt: &mut dyn SmtAdapter,
) -> EngineResult<InterleavePlan> {
    let lens: Vec<usize> = transitions.iter().map(|t| t.steps.len()).collect();
    let goal = lens.clone();
    let origin = vec![0usize; transitions.len()];

    let mut reached: BTreeMap<Vec<usize>, (Vec<usize>, Solution)> = BTreeMap::new();
    let origin_req = requirement_at(transitions, &origin)?;
    let origin_solution = synthesize(topology, &origin_req, flags, smt, Some(1))?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Synthesis("origin state is not synthesizable".into()))?;
    reached.insert(origin.clone(), (origin.clone(), origin_solution));

    let mut frontier = vec![origin.clone()];
    while !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for indices in &frontier {
            for candidate in neighbor_candidates(indices, &lens, flags.prefer_concurrent_interleaving) {
                let req = requirement_at(transitions, &candidate)?;
                let solved = synthesize(topology, &req, flags, smt, Some(1))?;
                let Some(solution) = solved.into_iter().next() else {
                    continue;
                };
                let is_new = !reached.contains_key(&candidate);
                if is_new || !flags.prefer_concurrent_interleaving {
                    reached.insert(candidate.clone(), (indices.clone(), solution));
                }
                if is_new {
                    next_frontier.push(candidate);
                }
            }
        }
        frontier = next_frontier;
    }

    if !reached.contains_key(&goal) {
        return Err(EngineError::Synthesis(
            "no feasible interleaving reaches every consumer's target state".into(),
        ));
    }

    // Walk parent pointers back from the goal to recover the path.
    let mut path = vec![goal.clone()];
    let mut cursor = goal;
    while cursor != origin {
        let (parent, _) = reached.get(&cursor).expect("reachable by construction").clone();
        path.push(parent.clone());
        cursor = parent;
    }
    path.reverse();

    let points = path
        .into_iter()
        .map(|indices| {
            let (_, solution) = reached.get(&indices).expect("every path node was reached").clone();
            LatticePoint { indices, solution }
        })
        .collect();

    Ok(InterleavePlan { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_candidates_single_step_only_without_concurrency() {
        let out = neighbor_candidates(&[0, 0], &[2, 1], false);
        assert_eq!(out.len(), 2);
        assert!(out.contains(&vec![1, 0]));
        assert!(out.contains(&vec![0, 1]));
    }

    #[test]
    fn neighbor_candidates_prefers_largest_subset_first() {
        let out = neighbor_candidates(&[0, 0], &[1, 1], true);
        assert_eq!(out[0], vec![1, 1]);
    }

    #[test]
    fn neighbor_candidates_empty_when_all_finished() {
        let out = neighbor_candidates(&[2, 1], &[2, 1], true);
        assert!(out.is_empty());
    }
}
