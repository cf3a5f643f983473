//! Chainbank proof - offline chain verification
//!
//! The event log's hash chain is designed to be checkable without the
//! database: an export of rows plus a head manifest is enough to recompute
//! every link. This crate owns the material encoding (shared with the
//! online chain engine, so there is exactly one implementation of it), the
//! export row formats, and the offline verifier used by the
//! `proof-verify` binary.

pub mod export;
pub mod material;
pub mod verify;

pub use export::{read_manifest, read_rows, write_manifest, write_rows, ExportError, HeadManifest, ProofRow};
pub use material::EventMaterial;
pub use verify::{verify_min, verify_strong, ChainBreak, ProofSummary};
