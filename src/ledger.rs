// src/ledger.rs

//! Per-unit origin ledger
//!
//! Gathers modifications performed on the original binaries and sources,
//! in order to comply with their license requirements. Emitted into the
//! unit's structured change log before packaging.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Reserved subtree of a packaged unit holding origin information
/// (original metadata, per-origin legal files, change log).
pub const ORIGIN_DIR: &str = "A2-ORIGIN";
/// Structured change log, relative to the unit root.
pub const CHANGES_FILE: &str = "A2-ORIGIN/changes";

/// Record of every content modification made to one unit.
#[derive(Debug, Default)]
pub struct OriginLedger {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub moved: BTreeSet<String>,
}

impl OriginLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.moved.is_empty()
    }

    /// Append this ledger's entries to the change log under the given
    /// base directory. Does nothing when the ledger is empty; the log is
    /// append-only across merge passes.
    pub fn append_changes(&self, base_dir: &Path) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let changes_path = base_dir.join(CHANGES_FILE);
        if let Some(parent) = changes_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&changes_path)
            .map_err(|e| Error::IoError(format!("Cannot open {}: {}", changes_path.display(), e)))?;
        for msg in &self.added {
            writeln!(file, "- Added {}.", msg)?;
        }
        for msg in &self.modified {
            writeln!(file, "- Modified {}.", msg)?;
        }
        for msg in &self.moved {
            writeln!(file, "- Moved {}.", msg)?;
        }
        for msg in &self.deleted {
            writeln!(file, "- Deleted {}.", msg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = OriginLedger::new();
        ledger.append_changes(dir.path()).unwrap();
        assert!(!dir.path().join(CHANGES_FILE).exists());
    }

    #[test]
    fn test_changes_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = OriginLedger::new();
        ledger.deleted.insert("cryptographic signatures".to_string());
        ledger.append_changes(dir.path()).unwrap();

        let mut second = OriginLedger::new();
        second.added.insert("binary content of org.example:widget:1.0.0".to_string());
        second.append_changes(dir.path()).unwrap();

        let text = fs::read_to_string(dir.path().join(CHANGES_FILE)).unwrap();
        assert!(text.contains("- Deleted cryptographic signatures."));
        assert!(text.contains("- Added binary content of org.example:widget:1.0.0."));
    }

    #[test]
    fn test_entry_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = OriginLedger::new();
        ledger.deleted.insert("z".to_string());
        ledger.added.insert("a".to_string());
        ledger.moved.insert("m".to_string());
        ledger.modified.insert("c".to_string());
        ledger.append_changes(dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join(CHANGES_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["- Added a.", "- Modified c.", "- Moved m.", "- Deleted z."]
        );
    }
}
