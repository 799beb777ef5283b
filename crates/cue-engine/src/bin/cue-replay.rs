//! Verify a recorded session log.
//!
//! ```text
//! cue-replay session.json
//! RUST_LOG=debug cue-replay session.json
//! ```
//!
//! Exits with status 1 if a run diverges or the log cannot be replayed.

use std::process::ExitCode;

use anyhow::Context;
use cue_engine::replay::{verify_replay, ReplayLog};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: cue-replay <log.json>");
        return Ok(ExitCode::from(2));
    };

    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let log = ReplayLog::from_json(&json).with_context(|| format!("{path} is not a replay log"))?;
    tracing::info!(
        frames = log.frames.len(),
        runs = log.runs.len(),
        "replay log loaded"
    );

    let result = verify_replay(&log).with_context(|| format!("failed to replay {path}"))?;
    match &result.first_divergence {
        None => {
            println!(
                "{path}: {} runs over {} frames replayed identically",
                result.runs_checked,
                log.frames.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(divergence) => {
            println!(
                "{path}: run {} diverged after {} matching runs",
                divergence.run_index, result.runs_checked
            );
            println!("  expected {}", divergence.expected_hash);
            match &divergence.actual_hash {
                Some(actual) => println!("  actual   {actual}"),
                None => println!("  actual   <frames ran out before the run ended>"),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
