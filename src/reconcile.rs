// src/reconcile.rs

//! Metadata reconciliation
//!
//! Merges the declared/computed header set with the pre-existing original
//! header set into the final headers of a unit, under key-specific
//! precedence rules, returning an explicit record of every divergence and
//! feeding the unit's origin ledger.

use crate::artifact::NameVersion;
use crate::ledger::OriginLedger;
use crate::manifest::{HeaderKind, Headers};
use tracing::{debug, trace, warn};

/// Build-tool housekeeping headers always stripped from the final set.
pub const HOUSEKEEPING_HEADERS: &[&str] = &[
    "Archiver-Version",
    "Build-By",
    "Built-By",
    "Created-By",
    "Originally-Created-By",
    "Tool",
    "Bnd-LastModified",
];

/// Capability requirement emitted by the analyzer for pre-modular class
/// files; unsatisfiable at run time and therefore dropped.
const ANCIENT_EE_REQUIREMENT: &str = "osgi.ee;filter:=\"(&(osgi.ee=JavaSE)(version=1.1))\"";

/// Component identities whose capability headers are known-unsatisfiable
/// and stripped unconditionally.
const CAPABILITY_STRIPPED_UNITS: &[&str] = &["osgi.core", "osgi.cmpn"];

/// How a single key divergence was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The pre-existing original value was kept.
    KeptPrevious,
    /// The new (declared/computed) value replaced the original one.
    Overridden,
    /// The key did not exist in the original header set.
    Added,
}

/// Record of one effective difference between header layers.
#[derive(Debug, Clone)]
pub struct Divergence {
    pub key: String,
    pub previous: Option<String>,
    pub new: String,
    pub resolution: Resolution,
}

/// Drop analyzer housekeeping output and the unsatisfiable ancient
/// capability requirement from a computed header set.
pub fn filter_computed(computed: &Headers, ledger: &mut OriginLedger) -> Headers {
    let mut filtered = Headers::new();
    for (key, value) in computed.iter() {
        if matches!(key, "Tool" | "Bnd-LastModified" | "Created-By") {
            continue;
        }
        if key == "Require-Capability" && value == ANCIENT_EE_REQUIREMENT {
            ledger.deleted.insert(format!("MANIFEST header {}", key));
            continue;
        }
        filtered.put(key, value);
    }
    filtered
}

/// Reconcile the declared/computed entries against the original header
/// set of a unit. Returns the final headers plus the divergence records;
/// ledger entries are recorded for every effective change.
///
/// Severity of divergence logs, one consistent table: identity-defining
/// headers at `debug`, dependency-expression headers at `trace` (their
/// values are large and noisy), everything else at `warning`.
pub fn reconcile(
    unit: &NameVersion,
    entries: &Headers,
    original: Option<&Headers>,
    singleton: bool,
    ledger: &mut OriginLedger,
    context: &str,
) -> (Headers, Vec<Divergence>) {
    let mut finals = original.cloned().unwrap_or_default();
    let mut divergences = Vec::new();

    for (key, new_value) in entries.iter() {
        let previous = finals.get(key).map(str::to_string);
        let mut value = new_value.to_string();
        let was_different = previous.as_deref().is_some_and(|p| p != new_value);
        let mut kept_previous = false;
        if was_different {
            let previous_value = previous.as_deref().unwrap_or_default();
            if key == HeaderKind::SpdxLicenseIdentifier.name() {
                kept_previous = true;
            } else if key == HeaderKind::BundleVersion.name()
                && previous_value == format!("{}.0", new_value)
            {
                // typically a repository first release
                kept_previous = true;
            }
            if kept_previous {
                debug!(
                    "{}: {} was NOT modified, value kept is {}, not overridden with {}",
                    context, key, previous_value, new_value
                );
                value = previous_value.to_string();
            }
        }

        finals.put(key, &value);

        if was_different && !kept_previous {
            log_override(context, key, previous.as_deref().unwrap_or_default(), &value);
            ledger.modified.insert(format!("MANIFEST header {}", key));
        }
        if original.is_some() && previous.is_none() {
            ledger.added.insert(format!("MANIFEST header {}", key));
        }
        push_record(&mut divergences, key, previous, value, was_different, kept_previous);
    }

    // known-unsatisfiable capability requirements of foundational units
    if CAPABILITY_STRIPPED_UNITS.contains(&unit.name.as_str()) {
        for key in ["Provide-Capability", "Require-Capability"] {
            if finals.remove(key).is_some() {
                ledger.deleted.insert(format!("MANIFEST header {}", key));
            }
        }
    }
    if unit.name == "com.sun.jna.platform"
        && finals.remove(HeaderKind::RequireBundle.name()).is_some()
    {
        ledger
            .deleted
            .insert(format!("MANIFEST header {}", HeaderKind::RequireBundle));
    }

    // de-pollute
    for key in HOUSEKEEPING_HEADERS {
        if finals.remove(key).is_some() {
            ledger.deleted.insert(format!("MANIFEST header {}", key));
        }
    }

    // the identity value is replaced, but a singleton directive survives
    if singleton {
        if let Some(name) = HeaderKind::BundleSymbolicName.get(&finals).map(str::to_string) {
            if !name.contains("singleton:=true") {
                HeaderKind::BundleSymbolicName.put(&mut finals, format!("{};singleton:=true", name));
            }
        }
    }

    (finals, divergences)
}

fn log_override(context: &str, key: &str, previous: &str, value: &str) {
    if key == HeaderKind::ImportPackage.name() || key == HeaderKind::ExportPackage.name() {
        trace!("{}: {} was modified", context, key);
    } else if key == HeaderKind::BundleSymbolicName.name()
        || key == HeaderKind::AutomaticModuleName.name()
    {
        debug!("{}: {} was {}, overridden with {}", context, key, previous, value);
    } else {
        warn!("{}: {} was {}, overridden with {}", context, key, previous, value);
    }
}

fn push_record(
    records: &mut Vec<Divergence>,
    key: &str,
    previous: Option<String>,
    value: String,
    was_different: bool,
    kept_previous: bool,
) {
    let resolution = if previous.is_none() {
        Resolution::Added
    } else if kept_previous {
        Resolution::KeptPrevious
    } else if was_different {
        Resolution::Overridden
    } else {
        return; // same value, nothing diverged
    };
    records.push(Divergence {
        key: key.to_string(),
        previous,
        new: value,
        resolution,
    });
}
