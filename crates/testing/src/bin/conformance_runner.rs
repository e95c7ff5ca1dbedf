// powerseq conformance runner.
// Entry point for running the engine's seed-scenario conformance suite
// outside of `cargo test`.

use powerseq_testing::{conformance, setup_logging};

fn main() {
    setup_logging();

    log::info!("powerseq conformance suite");
    log::info!("===========================");

    let records = conformance::run_all();
    let mut failures = 0;

    for record in &records {
        let status = if record.passed { "PASS" } else { "FAIL" };
        log::info!("  [{status}] {}", record.name);
        if let Some(detail) = &record.detail {
            log::error!("        {detail}");
            failures += 1;
        }
    }

    log::info!("");
    log::info!("{} scenarios, {} failed", records.len(), failures);

    if failures > 0 {
        std::process::exit(1);
    }
}
