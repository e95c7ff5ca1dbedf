//! `powerseqctl`: command-line shell for `powerseq-engine` (spec §6,
//! §10.1 — replaces the daemon's web-server role with a CLI tool).

mod catalogue;
mod eval;
mod platform;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use powerseq_engine::search::SearchFlags;
use powerseq_engine::smt::{NativeSolver, SmtAdapter};
use powerseq_engine::state::StateDict;
use powerseq_engine::synthesize_and_apply;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "powerseqctl", about = "Synthesize power-sequencing command scripts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a full power-up script for a platform description.
    Generate {
        /// Path to the platform description JSON file.
        platform: PathBuf,
        /// Where to write the generated command script.
        #[arg(long)]
        out: PathBuf,
        /// Enumerate every feasible assignment instead of the first.
        #[arg(long)]
        all_solutions: bool,
        /// Use the z3-backed SMT adapter instead of the native solver
        /// (only available when built with the `z3-backend` feature).
        #[arg(long)]
        use_z3: bool,
        /// Also write the event-graph adjacency map alongside the script,
        /// as `<out>.graph.txt` (spec §6: "one text file per applied
        /// phase containing the literal adjacency map").
        #[arg(long)]
        return_graph: bool,
    },
    /// Sweep random conductor-order permutations and search-flag
    /// combinations, printing a CSV-like measurement report.
    Eval {
        /// Path to the platform description JSON file.
        platform: PathBuf,
        /// Number of random conductor-order permutations to try.
        #[arg(long, default_value_t = 20)]
        permutations: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,powerseqctl=debug")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate { platform, out, all_solutions, use_z3, return_graph } => {
            generate(&platform, &out, all_solutions, use_z3, return_graph).await
        }
        Command::Eval { platform, permutations } => run_eval(&platform, permutations).await,
    }
}

async fn generate(
    platform_path: &PathBuf,
    out_path: &PathBuf,
    all_solutions: bool,
    use_z3: bool,
    return_graph: bool,
) -> Result<()> {
    let description = platform::load(platform_path)?;
    let mut topology = platform::build_topology(&description)?;

    let flags = SearchFlags { all_solutions, use_z3, return_graph, ..SearchFlags::default() };
    let mut smt = smt_adapter(use_z3)?;

    tracing::info!(platform = %platform_path.display(), "synthesizing power-up sequence");
    let result = synthesize_and_apply(&mut topology, &StateDict::new(), &flags, smt.as_mut())
        .with_context(|| format!("synthesizing a sequence for '{}'", platform_path.display()))?;

    tokio::fs::write(out_path, &result.commands)
        .await
        .with_context(|| format!("writing generated sequence to '{}'", out_path.display()))?;

    if let Some(graph_text) = &result.graph_text {
        let graph_path = out_path.with_extension("graph.txt");
        tokio::fs::write(&graph_path, graph_text)
            .await
            .with_context(|| format!("writing event graph to '{}'", graph_path.display()))?;
        tracing::info!(graph = %graph_path.display(), "event graph written");
    }

    tracing::info!(out = %out_path.display(), ranks = result.ranks.len(), "sequence written");
    Ok(())
}

/// Picks the native in-process solver by default, or the optional
/// `z3`-backed one when `--use-z3` is given and this binary was built
/// with the `z3-backend` feature (spec §4.5: "an optional `z3`-backed
/// implementation are interchangeable without touching engine logic").
fn smt_adapter(use_z3: bool) -> Result<Box<dyn SmtAdapter>> {
    if use_z3 {
        #[cfg(feature = "z3-backend")]
        {
            return Ok(Box::new(powerseq_engine::smt::z3_backend::Z3Solver::new()));
        }
        #[cfg(not(feature = "z3-backend"))]
        {
            anyhow::bail!("--use-z3 requires building powerseqctl with the 'z3-backend' feature");
        }
    }
    Ok(Box::new(NativeSolver::new()))
}

async fn run_eval(platform_path: &PathBuf, permutations: usize) -> Result<()> {
    let description = platform::load(platform_path)?;
    let mut topology = platform::build_topology(&description)?;

    tracing::info!(platform = %platform_path.display(), permutations, "running evaluation sweep");
    let rows = eval::run(&mut topology, permutations)?;
    eval::print_report(&rows);
    Ok(())
}
