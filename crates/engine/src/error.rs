//! Error taxonomy for the sequencer, per the five error kinds the engine
//! distinguishes: state space, set, wire, SMT and synthesis errors.
//!
//! State space errors are recovered locally by the backtracker and the
//! interleaver wherever they merely signal "this branch is infeasible" --
//! they are propagated as `Err` values like any other, but callers in
//! `search` and `interleave` are expected to catch and fold them into
//! local control flow rather than letting them reach the public API.
//! Wire, Set and Smt errors indicate a malformed platform description and
//! are expected to abort the run. Synthesis errors are the only ones
//! meant to reach an end user as "no feasible sequence".

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Intersection/union/difference produced an empty or ill-shaped result.
    #[error("state space error: {0}")]
    StateSpace(String),

    /// An output without an attached `set` renderer was asked to emit a
    /// control action.
    #[error("set error: {0}")]
    Set(String),

    /// Malformed wiring or possibility metadata.
    #[error("wire error: {0}")]
    Wire(String),

    /// Internal invariant violation between solver variable naming and
    /// state shape.
    #[error("smt error: {0}")]
    Smt(String),

    /// No assignment exists, or the event graph is not a DAG.
    #[error("synthesis error: {0}")]
    Synthesis(String),
}

impl EngineError {
    pub fn state_space(conductor: impl std::fmt::Display, detail: impl std::fmt::Display) -> Self {
        EngineError::StateSpace(format!("conductor '{conductor}': {detail}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Wire(format!("malformed platform description: {e}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
