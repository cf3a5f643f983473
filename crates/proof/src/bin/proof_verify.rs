//! proof-verify - offline hash-chain verification
//!
//! Reads a JSONL row export and a head manifest, checks the chain, and
//! exits non-zero on the first break. Intended to run far away from the
//! database, against files handed over by an auditor or a backup.

use anyhow::Context;
use chainbank_proof::{read_manifest, read_rows, verify_min, verify_strong};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "proof-verify")]
#[command(about = "Verify an exported event-log hash chain offline", long_about = None)]
struct Cli {
    /// JSONL export of event rows, ordered by seq
    #[arg(long)]
    rows: PathBuf,

    /// JSON head manifest (seq_start, seq_end, count, head_hash_hex)
    #[arg(long)]
    manifest: PathBuf,

    /// Recompute every row hash from its material (strong check)
    #[arg(long)]
    strong: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let rows = read_rows(&cli.rows)
        .with_context(|| format!("read rows from {}", cli.rows.display()))?;
    let manifest = read_manifest(&cli.manifest)
        .with_context(|| format!("read manifest from {}", cli.manifest.display()))?;

    let result = if cli.strong {
        verify_strong(&rows, &manifest)
    } else {
        verify_min(&rows, &manifest)
    };

    match result {
        Ok(summary) => {
            println!(
                "OK: chain verified ({} rows). head={}",
                summary.rows, summary.head_hash_hex
            );
            Ok(true)
        }
        Err(brk) => {
            eprintln!("FAIL: {brk}");
            Ok(false)
        }
    }
}
