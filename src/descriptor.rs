// src/descriptor.rs

//! Distribution unit descriptor parsing
//!
//! Descriptors are key-value property files (`.bnd`) plus a handful of
//! auxiliary files at the descriptors root: `uris.properties` (unit
//! directory name to archive URI), `eclipse.mirrors.txt` (mirror base URLs
//! for the well-known Eclipse download prefix), and per-unit
//! `includes.properties`/`excludes.properties` glob pattern files for
//! archive-based units.

use crate::error::{Error, Result};
use crate::manifest::Headers;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Descriptor carrying properties shared by a grouped distribution unit.
pub const COMMON_BND: &str = "common.bnd";
/// Descriptor merging several artifacts into one output unit.
pub const MERGE_BND: &str = "merge.bnd";
/// Directory name prefix marking an archive-based distribution unit.
pub const ARCHIVE_UNIT_PREFIX: &str = "eclipse-";
/// Archive URI lookup table at the descriptors root.
pub const URIS_PROPERTIES: &str = "uris.properties";
/// Mirror base list at the descriptors root.
pub const ECLIPSE_MIRRORS: &str = "eclipse.mirrors.txt";
/// URI prefix the mirror base list applies to.
pub const ECLIPSE_DOWNLOAD_PREFIX: &str = "https://www.eclipse.org/downloads";

/// Parse a property file: `key: value`, `key=value` or `key value` lines,
/// `#`/`!` comments, trailing-backslash continuations. A line without a
/// separator becomes a key with an empty value (used by pattern files).
pub fn parse_properties(text: &str) -> Headers {
    let mut props = Headers::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }
        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped);
            continue;
        }
        pending.push_str(line);
        let logical = std::mem::take(&mut pending);
        let (key, value) = split_property(&logical);
        if !key.is_empty() {
            props.put(key, value);
        }
    }
    if !pending.is_empty() {
        let (key, value) = split_property(&pending);
        if !key.is_empty() {
            props.put(key, value);
        }
    }
    props
}

/// Split one logical property line at the first `:`, `=` or whitespace.
fn split_property(line: &str) -> (String, String) {
    let sep = line
        .char_indices()
        .find(|(_, c)| *c == ':' || *c == '=' || c.is_whitespace())
        .map(|(i, _)| i);
    match sep {
        Some(i) => {
            let key = line[..i].trim().to_string();
            let value = line[i + 1..].trim().to_string();
            (key, value)
        }
        None => (line.trim().to_string(), String::new()),
    }
}

/// Load a property file from disk.
pub fn load_properties(path: &Path) -> Result<Headers> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Cannot load {}: {}", path.display(), e)))?;
    Ok(parse_properties(&text))
}

/// The three distribution unit shapes found in a category directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    /// A single descriptor file naming one artifact directly.
    Standalone(PathBuf),
    /// A directory with a `common.bnd` and N per-artifact descriptors,
    /// optionally a `merge.bnd`.
    Grouped(PathBuf),
    /// A directory describing an external archive whose entries are
    /// matched against include/exclude patterns.
    ArchiveBased(PathBuf),
}

/// Enumerate the distribution units of a category directory in
/// deterministic order: standalone descriptors first, then unit
/// directories, each sorted by name.
pub fn enumerate_units(category_dir: &Path) -> Result<Vec<UnitKind>> {
    let mut bnds = Vec::new();
    let mut dirs = Vec::new();
    let entries = fs::read_dir(category_dir)
        .map_err(|e| Error::IoError(format!("Cannot read {}: {}", category_dir.display(), e)))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::IoError(e.to_string()))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() {
            dirs.push((name, path));
        } else if name.ends_with(".bnd") && name != COMMON_BND && name != MERGE_BND {
            bnds.push((name, path));
        }
    }
    bnds.sort();
    dirs.sort();
    let mut units: Vec<UnitKind> = bnds.into_iter().map(|(_, p)| UnitKind::Standalone(p)).collect();
    for (name, path) in dirs {
        if name.starts_with(ARCHIVE_UNIT_PREFIX) {
            units.push(UnitKind::ArchiveBased(path));
        } else {
            units.push(UnitKind::Grouped(path));
        }
    }
    Ok(units)
}

/// Mirror table: ordered candidate base URLs keyed by URI prefix.
#[derive(Debug, Default)]
pub struct Mirrors {
    map: BTreeMap<String, Vec<String>>,
}

impl Mirrors {
    /// Load the mirror base list for the Eclipse download prefix from the
    /// descriptors root, if present. Blank lines are dropped.
    pub fn load(descriptors_base: &Path) -> Result<Self> {
        let mut map = BTreeMap::new();
        let path = descriptors_base.join(ECLIPSE_MIRRORS);
        let mut bases = Vec::new();
        if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| Error::IoError(format!("Cannot load {}: {}", path.display(), e)))?;
            for line in text.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    bases.push(line.to_string());
                }
            }
        }
        map.insert(ECLIPSE_DOWNLOAD_PREFIX.to_string(), bases);
        Ok(Self { map })
    }

    #[cfg(test)]
    pub fn with_entry(prefix: &str, bases: Vec<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(prefix.to_string(), bases);
        Self { map }
    }

    /// The mirror bases applying to a URI: the longest configured prefix
    /// with a non-empty base list.
    pub fn candidates(&self, uri: &str) -> Option<(&str, &[String])> {
        self.map
            .iter()
            .filter(|(prefix, bases)| uri.starts_with(prefix.as_str()) && !bases.is_empty())
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, bases)| (prefix.as_str(), bases.as_slice()))
    }
}

/// Include/exclude patterns of an archive-based unit. Patterns are the
/// keys of a property file, matched against full entry names with literal
/// path separators (`*` does not cross `/`, `**` does).
#[derive(Debug)]
pub struct EntryFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl EntryFilter {
    /// Load `includes.properties` (required) and `excludes.properties`
    /// (optional) from a unit directory.
    pub fn load(unit_dir: &Path) -> Result<Self> {
        let includes = load_patterns(&unit_dir.join("includes.properties"), true)?;
        let excludes = load_patterns(&unit_dir.join("excludes.properties"), false)?;
        Ok(Self { includes, excludes })
    }

    /// Whether an archive entry is selected for processing.
    pub fn matches(&self, entry_name: &str) -> bool {
        let included = self
            .includes
            .iter()
            .any(|p| p.matches_with(entry_name, MATCH_OPTIONS));
        if !included {
            return false;
        }
        let excluded = self
            .excludes
            .iter()
            .any(|p| p.matches_with(entry_name, MATCH_OPTIONS));
        if excluded {
            tracing::trace!("Skipping excluded {}", entry_name);
        }
        !excluded
    }
}

fn load_patterns(path: &Path, required: bool) -> Result<Vec<Pattern>> {
    if !path.exists() {
        if required {
            return Err(Error::ConfigError(format!("{} does not exist", path.display())));
        }
        return Ok(Vec::new());
    }
    let props = load_properties(path)?;
    let mut patterns = Vec::new();
    for key in props.keys() {
        match Pattern::new(key) {
            Ok(p) => patterns.push(p),
            Err(e) => {
                warn!("Ignoring invalid pattern '{}' in {}: {}", key, path.display(), e);
            }
        }
    }
    Ok(patterns)
}
