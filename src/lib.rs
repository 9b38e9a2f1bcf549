// src/lib.rs

//! A2 repackaging engine
//!
//! Repackages third-party artifacts (from Maven-style repositories or
//! Eclipse-style bundled archives) into a normalized, self-describing A2
//! component repository: one archive per component, carrying corrected
//! metadata, license provenance, and optionally separated source code.
//!
//! # Architecture
//!
//! - Descriptor-driven: units are fully enumerated by property files,
//!   there is no transitive resolution
//! - Shared download cache, serialized fetches, idempotent re-entry
//! - Every content modification is tracked in a per-unit origin ledger
//!   and emitted as a structured change log for legal compliance
//! - Per-category parallelism over a process-wide license ledger

pub mod analyzer;
pub mod artifact;
pub mod config;
pub mod descriptor;
pub mod download;
mod error;
pub mod fsutil;
pub mod ledger;
pub mod license;
pub mod manifest;
pub mod merge;
pub mod package;
pub mod reconcile;
pub mod scheduler;
pub mod unit;

pub use analyzer::{CompileProgress, CompileUnit, DeclaredAnalyzer, MetadataAnalyzer, SourceCompiler};
pub use artifact::{version_branch, ArtifactId, NameVersion};
pub use config::RunConfig;
pub use download::Downloader;
pub use error::{Error, Result};
pub use ledger::OriginLedger;
pub use license::LicenseLedger;
pub use manifest::{HeaderKind, Headers};
pub use reconcile::{Divergence, Resolution};
pub use scheduler::{CategoryFailure, Repackager};
