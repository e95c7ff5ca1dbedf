//! Property-based testing over the state-space algebra (spec §8). Built
//! behind the `property-based-tests` feature so `powerseq-testing` stays
//! lightweight for callers that only want [`crate::conformance`].

pub mod generators;
pub mod invariants;
pub mod strategies;
