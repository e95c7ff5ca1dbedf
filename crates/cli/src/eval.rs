//! Evaluation harness (spec §10.5, §6: "an evaluation harness runs
//! measurement sweeps over permutations of conductor order and flag
//! combinations"). The statistical post-processing of this report is out
//! of scope (spec §1); this prints the raw CSV-like rows only.

use anyhow::Result;
use powerseq_engine::search::SearchFlags;
use powerseq_engine::search_solutions;
use powerseq_engine::smt::NativeSolver;
use powerseq_engine::state::StateDict;
use powerseq_engine::topology::Topology;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::time::Instant;

pub struct SweepRow {
    pub permutation: usize,
    pub advanced_backtracking: bool,
    pub all_solutions: bool,
    pub solution_count: usize,
    pub elapsed_ms: f64,
}

/// Shuffles the topology's conductor order `permutations` times, running
/// every combination of `advanced_backtracking` x `all_solutions` against
/// each shuffle, and restores the original order before returning.
pub fn run(topology: &mut Topology, permutations: usize) -> Result<Vec<SweepRow>> {
    let base_order = topology.sorted_wires.clone();
    let mut rows = Vec::with_capacity(permutations * 4);
    let mut rng = thread_rng();

    for permutation in 0..permutations {
        let mut order = base_order.clone();
        order.shuffle(&mut rng);
        topology.sorted_wires = order;

        for &advanced_backtracking in &[true, false] {
            for &all_solutions in &[true, false] {
                let flags = SearchFlags { advanced_backtracking, all_solutions, ..SearchFlags::default() };
                let mut smt = NativeSolver::new();

                let start = Instant::now();
                let solutions = search_solutions(topology, &StateDict::new(), &flags, &mut smt)?;
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

                rows.push(SweepRow {
                    permutation,
                    advanced_backtracking,
                    all_solutions,
                    solution_count: solutions.len(),
                    elapsed_ms,
                });
            }
        }
    }

    topology.sorted_wires = base_order;
    Ok(rows)
}

pub fn print_report(rows: &[SweepRow]) {
    println!("permutation,advanced_backtracking,all_solutions,solution_count,elapsed_ms");
    for row in rows {
        println!(
            "{},{},{},{},{:.3}",
            row.permutation, row.advanced_backtracking, row.all_solutions, row.solution_count, row.elapsed_ms
        );
    }
}
