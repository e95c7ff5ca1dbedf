//! SMT adapter (spec §4.5): the engine consumes constraint solving through
//! this narrow trait so a default in-process backend and an optional
//! `z3`-backed one are interchangeable without touching search logic.
//!
//! The "which possibility chosen" selector variable of §4.5 is handled by
//! the backtracker itself (`search`); what reaches the adapter is the
//! *intra-possibility* problem: a set of per-dimension variable domains
//! (already narrowed by the chosen possibilities' requirements) plus the
//! complex constraints relating them, and the adapter's job is purely to
//! find one assignment of concrete values that satisfies every complex
//! constraint, or to report none exists.

use crate::component::ComplexConstraint;
use crate::error::{EngineError, EngineResult};
use crate::state::Dimension;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct VarDomain {
    pub conductor: String,
    pub dim: usize,
    pub domain: Dimension,
}

#[derive(Debug, Clone, Default)]
pub struct SmtProblem {
    pub domains: Vec<VarDomain>,
    pub complex: Vec<ComplexConstraint>,
}

pub type Assignment = BTreeMap<(String, usize), i64>;

pub trait SmtAdapter {
    /// Finds one concrete assignment satisfying every complex constraint,
    /// or `None` if the problem is unsatisfiable.
    fn solve(&mut self, problem: &SmtProblem) -> EngineResult<Option<Assignment>>;
}

fn domain_values(dim: &Dimension) -> Vec<i64> {
    match dim {
        Dimension::Range(lo, hi) => (*lo..=*hi).collect(),
        Dimension::Set(s) => s.iter().copied().collect(),
    }
}

fn representative(dim: &Dimension) -> i64 {
    match dim {
        Dimension::Range(lo, hi) => (lo + hi).div_euclid(2),
        Dimension::Set(s) => *s.iter().next().unwrap_or(&0),
    }
}

fn constraints_on(problem: &SmtProblem, key: &(String, usize)) -> Vec<usize> {
    problem
        .complex
        .iter()
        .enumerate()
        .filter(|(_, c)| c.args.contains(key))
        .map(|(i, _)| i)
        .collect()
}

fn ready_to_check(problem: &SmtProblem, idx: usize, assignment: &Assignment) -> Option<bool> {
    let c = &problem.complex[idx];
    let values: Option<Vec<i64>> = c.args.iter().map(|k| assignment.get(k).copied()).collect();
    values.map(|vs| (c.predicate)(&vs))
}

/// Default backend: a small constraint-propagation CSP solver suited to
/// the shapes this engine actually emits (a handful of complex
/// constraints over otherwise-narrow per-dimension domains). Variables
/// untouched by any complex constraint are resolved immediately via the
/// same representative-value policy as `select_state`; only the
/// constrained subset is searched.
#[derive(Debug, Default)]
pub struct NativeSolver;

impl NativeSolver {
    pub fn new() -> Self {
        NativeSolver
    }

    fn backtrack(problem: &SmtProblem, order: &[(String, usize)], pos: usize, assignment: &mut Assignment) -> bool {
        if pos == order.len() {
            return true;
        }
        let key = &order[pos];
        let domain = problem
            .domains
            .iter()
            .find(|d| (&d.conductor, d.dim) == (&key.0, key.1))
            .expect("domain present for every key in order");

        let referenced = !constraints_on(problem, key).is_empty();
        if !referenced {
            assignment.insert(key.clone(), representative(&domain.domain));
            if Self::backtrack(problem, order, pos + 1, assignment) {
                return true;
            }
            assignment.remove(key);
            return false;
        }

        for v in domain_values(&domain.domain) {
            assignment.insert(key.clone(), v);
            let consistent = constraints_on(problem, key).into_iter().all(|idx| {
                ready_to_check(problem, idx, assignment).unwrap_or(true)
            });
            if consistent && Self::backtrack(problem, order, pos + 1, assignment) {
                return true;
            }
            assignment.remove(key);
        }
        false
    }
}

impl SmtAdapter for NativeSolver {
    fn solve(&mut self, problem: &SmtProblem) -> EngineResult<Option<Assignment>> {
        for c in &problem.complex {
            for arg in &c.args {
                if !problem.domains.iter().any(|d| (&d.conductor, d.dim) == (&arg.0, arg.1)) {
                    return Err(EngineError::Smt(format!(
                        "complex constraint '{}' references undeclared variable '{}[{}]'",
                        c.label, arg.0, arg.1
                    )));
                }
            }
        }
        // Constrained variables first, so the search prunes as early as
        // possible; unconstrained variables are free to resolve last (and
        // cheaply, via the fast path above).
        let mut order: Vec<(String, usize)> = problem.domains.iter().map(|d| (d.conductor.clone(), d.dim)).collect();
        order.sort_by_key(|k| std::cmp::Reverse(constraints_on(problem, k).len()));

        let mut assignment = Assignment::new();
        if Self::backtrack(problem, &order, 0, &mut assignment) {
            Ok(Some(assignment))
        } else {
            Ok(None)
        }
    }
}

#[cfg(feature = "z3-backend")]
pub mod z3_backend {
    //! Optional `z3`-backed adapter. Variable bounds are genuine z3
    //! assertions; complex constraints are opaque Rust predicates (spec
    //! §3: "an arbitrary Boolean over the referenced dimensions"), so this
    //! backend uses z3 purely to enumerate candidate bound-satisfying
    //! models and blocks each one the Rust predicate rejects until it
    //! finds a model that also passes, or exhausts the space.
    use super::*;
    use std::collections::HashMap;
    use z3::ast::{Ast, Int};
    use z3::{Config, Context, SatResult, Solver};

    pub struct Z3Solver {
        context: Context,
    }

    impl Z3Solver {
        pub fn new() -> Self {
            let cfg = Config::new();
            Z3Solver { context: Context::new(&cfg) }
        }
    }

    impl Default for Z3Solver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SmtAdapter for Z3Solver {
        fn solve(&mut self, problem: &SmtProblem) -> EngineResult<Option<Assignment>> {
            let ctx = &self.context;
            let solver = Solver::new(ctx);
            let mut vars: HashMap<(String, usize), Int> = HashMap::new();

            for d in &problem.domains {
                let key = (d.conductor.clone(), d.dim);
                let name = format!("{}__{}", d.conductor, d.dim);
                let v = Int::new_const(ctx, name);
                match &d.domain {
                    Dimension::Range(lo, hi) => {
                        solver.assert(&v.ge(&Int::from_i64(ctx, *lo)));
                        solver.assert(&v.le(&Int::from_i64(ctx, *hi)));
                    }
                    Dimension::Set(s) => {
                        let options: Vec<_> = s
                            .iter()
                            .map(|x| v._eq(&Int::from_i64(ctx, *x)))
                            .collect();
                        let refs: Vec<&_> = options.iter().collect();
                        solver.assert(&z3::ast::Bool::or(ctx, &refs));
                    }
                }
                vars.insert(key, v);
            }

            // Oracle loop: ask z3 for a bound-satisfying model, check the
            // opaque predicates in Rust, and block the model if it fails.
            for _ in 0..10_000 {
                match solver.check() {
                    SatResult::Unsat => return Ok(None),
                    SatResult::Unknown => return Err(EngineError::Smt("z3 returned unknown".into())),
                    SatResult::Sat => {
                        let model = solver.get_model().ok_or_else(|| EngineError::Smt("z3 produced no model".into()))?;
                        let mut assignment = Assignment::new();
                        for (key, var) in &vars {
                            let val = model
                                .eval(var, true)
                                .and_then(|v| v.as_i64())
                                .ok_or_else(|| EngineError::Smt("could not decode z3 model value".into()))?;
                            assignment.insert(key.clone(), val);
                        }
                        let ok = problem.complex.iter().all(|c| {
                            let values: Vec<i64> = c.args.iter().map(|k| assignment[k]).collect();
                            (c.predicate)(&values)
                        });
                        if ok {
                            return Ok(Some(assignment));
                        }
                        // Block this exact model and retry.
                        let mut blockers = Vec::new();
                        for (key, var) in &vars {
                            blockers.push(var._eq(&Int::from_i64(ctx, assignment[key])).not());
                        }
                        let refs: Vec<&_> = blockers.iter().collect();
                        solver.assert(&z3::ast::Bool::or(ctx, &refs));
                    }
                }
            }
            Err(EngineError::Smt("oracle loop exceeded iteration budget".into()))
        }
    }
}
