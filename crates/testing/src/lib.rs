//! Conformance and property-based test support for `powerseq-engine`.
//!
//! [`conformance`] ports the concrete seed scenarios (spec §8) as plain
//! functions the [`powerseq-conformance`](../bin/conformance_runner.rs)
//! binary can run and report on outside of `cargo test`; [`property_based`]
//! (behind the `property-based-tests` feature) holds the proptest-driven
//! universal invariants over the state-space algebra.

pub mod conformance;
#[cfg(feature = "property-based-tests")]
pub mod property_based;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("test execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("engine error: {0}")]
    Engine(#[from] powerseq_engine::EngineError),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type TestResult<T> = Result<T, TestError>;

/// Mirrors the `env_logger`-backed logging the stand-alone test binaries of
/// this codebase's other crates set up for themselves.
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

pub fn current_timestamp() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// One conformance check's outcome, as reported by the
/// `powerseq-conformance` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_seed_scenario_reports_a_record() {
        let records = conformance::run_all();
        assert_eq!(records.len(), conformance::SCENARIO_COUNT);
        for record in &records {
            assert!(record.passed, "{}: {:?}", record.name, record.detail);
        }
    }

    #[test]
    fn records_round_trip_through_a_report_file() {
        let records = conformance::run_all();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conformance-report.json");

        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();
        let reloaded: Vec<TestRecord> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(reloaded.len(), records.len());
        for (original, reloaded) in records.iter().zip(&reloaded) {
            assert_eq!(original.name, reloaded.name);
            assert_eq!(original.passed, reloaded.passed);
        }
    }
}
