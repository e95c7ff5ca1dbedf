//! Raw generators for the state-space algebra's primitive types.

use powerseq_engine::state::{Dimension, Option_, StateSpace};
use proptest::prelude::*;

const MAX_BOUND: i64 = 64;

/// A range dimension with `lo <= hi`, both within a small bounded window
/// so generated intersections/differences are likely to actually overlap.
pub fn range_dimension() -> impl Strategy<Value = Dimension> {
    (0..MAX_BOUND, 0..MAX_BOUND).prop_map(|(a, b)| Dimension::range(a.min(b), a.max(b)))
}

/// A set dimension of 1-4 distinct small integers.
pub fn set_dimension() -> impl Strategy<Value = Dimension> {
    proptest::collection::btree_set(0i64..8, 1..4).prop_map(Dimension::set)
}

pub fn dimension() -> impl Strategy<Value = Dimension> {
    prop_oneof![range_dimension(), set_dimension()]
}

/// One option of a fixed dimension arity.
pub fn option_of_arity(arity: usize) -> impl Strategy<Value = Option_> {
    proptest::collection::vec(dimension(), arity..=arity)
}

/// A single-option state space (the common case a conductor's working
/// space narrows down to before `select_state`).
pub fn single_option_space(arity: usize) -> impl Strategy<Value = StateSpace> {
    option_of_arity(arity).prop_map(|o| vec![o])
}

/// A multi-option state space of 1-3 disjuncts, every option the same
/// arity (the shape `intersect`/`state_union` require).
pub fn multi_option_space(arity: usize) -> impl Strategy<Value = StateSpace> {
    proptest::collection::vec(option_of_arity(arity), 1..4)
}
