//! Proof export format
//!
//! Rows are written as JSONL (one JSON object per line, ordered by seq)
//! and the chain head as a small JSON manifest. A row carries the full
//! material fields so the strong check can recompute every hash; the
//! minimum check only needs `seq`, `prev_hash_hex` and `hash_hex`.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors reading or writing proof exports
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid row: {source}")]
    InvalidRow {
        line: usize,
        source: serde_json::Error,
    },

    #[error("invalid manifest: {0}")]
    InvalidManifest(#[source] serde_json::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One exported event row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofRow {
    pub seq: i64,
    pub prev_hash_hex: String,
    pub event_id: String,
    pub created_at: String,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub correlation_id: String,
    pub payload_hash_hex: String,
    pub hash_hex: String,
}

/// Chain head manifest accompanying an export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadManifest {
    pub seq_start: i64,
    pub seq_end: i64,
    pub count: i64,
    pub head_hash_hex: String,
}

/// Write rows as JSONL, one object per line, in the given order.
pub fn write_rows(path: impl AsRef<Path>, rows: &[ProofRow]) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        let json = serde_json::to_string(row)?;
        writeln!(writer, "{}", json)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSONL export. Blank lines are ignored.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<ProofRow>, ExportError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|source| ExportError::InvalidRow { line: i + 1, source })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write the head manifest as a single JSON document.
pub fn write_manifest(path: impl AsRef<Path>, manifest: &HeadManifest) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, manifest)?;
    writer.flush()?;
    Ok(())
}

/// Read a head manifest.
pub fn read_manifest(path: impl AsRef<Path>) -> Result<HeadManifest, ExportError> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(ExportError::InvalidManifest)
}
