// src/license.rs

//! License and provenance engine
//!
//! Normalizes the SPDX identifier of each unit, applies the per-family
//! override table, accumulates the process-wide license usage ledger, and
//! emits the human-readable provenance notice packaged with every unit.

use crate::error::{Error, Result};
use crate::ledger::CHANGES_FILE;
use crate::manifest::{HeaderKind, Headers};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::error;

/// File at the root of a repackaged unit, prominently notifying that the
/// component has been repackaged.
pub const README_REPACKAGED: &str = "README.repackaged";

/// Base URL for standard license texts.
const SPDX_LICENSES_URL: &str = "https://spdx.org/licenses/";

/// Known per-family identifier overrides, correcting repeatedly-wrong
/// upstream metadata. First matching prefix wins.
const LICENSE_OVERRIDES: &[(&str, &str)] = &[
    ("org.apache.", "Apache-2.0"),
    ("com.sun.jna.", "Apache-2.0"),
    ("com.ibm.icu.", "ICU"),
    ("javax.annotation.", "GPL-2.0-only WITH Classpath-exception-2.0"),
    ("javax.inject.", "Apache-2.0"),
    ("org.osgi.", "Apache-2.0"),
];

/// Process-wide summary of all licenses seen during the repackaging.
/// Safe for concurrent insertion from parallel category tasks.
#[derive(Debug, Default)]
pub struct LicenseLedger {
    inner: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl LicenseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a unit uses the given license identifier.
    pub fn record(&self, license_id: &str, qualified_name: String) {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(license_id.to_string())
            .or_default()
            .insert(qualified_name);
    }

    /// The end-of-run summary table: `license-id<TAB><TAB>unit` lines,
    /// the empty identifier printed as `Proprietary`.
    pub fn summary(&self) -> String {
        let map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out = String::new();
        for (license_id, names) in map.iter() {
            for name in names {
                let id = if license_id.is_empty() {
                    "Proprietary"
                } else {
                    license_id
                };
                let _ = writeln!(out, "{}\t\t{}", id, name);
            }
        }
        out
    }
}

/// Resolve the SPDX identifier of a unit, write it back into the final
/// headers, and record it in the process-wide ledger. The unit directory
/// name drives the override table; its parent names the category.
pub fn process_license(bundle_dir: &Path, headers: &mut Headers, licenses: &LicenseLedger) {
    let bundle_name = bundle_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let extracted = HeaderKind::SpdxLicenseIdentifier.get(headers).map(|raw| {
        // only the first licensing alternative is retained
        match raw.find(" OR ") {
            Some(index) => raw[..index].trim().to_string(),
            None => raw.trim().to_string(),
        }
    });

    // the override table corrects an extracted value, it never invents one
    let overridden = LICENSE_OVERRIDES
        .iter()
        .find(|(prefix, _)| bundle_name.starts_with(prefix))
        .map(|(_, id)| (*id).to_string());

    let resolved = match extracted.map(|id| overridden.unwrap_or(id)) {
        Some(id) => id,
        None => {
            error!(
                "{}: {} not available, {} is {:?}",
                bundle_name,
                HeaderKind::SpdxLicenseIdentifier,
                HeaderKind::BundleLicense,
                HeaderKind::BundleLicense.get(headers)
            );
            return;
        }
    };

    HeaderKind::SpdxLicenseIdentifier.put(headers, &resolved);
    let category = bundle_dir
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    licenses.record(&resolved, format!("{}/{}", category, bundle_name));
}

/// Write the provenance notice clarifying the repackaging and pointing to
/// license texts, origins, the change log and the sources.
pub fn write_notice(unit_dir: &Path, mapping: &Headers, separate_sources: bool) -> Result<()> {
    let mut text = String::new();
    let merged = HeaderKind::OriginM2Merge.get(mapping).is_some();
    if merged {
        text.push_str(
            "This component is a merging of third party components in order to comply with A2 packaging standards.\n",
        );
    } else {
        text.push_str(
            "This component is a repackaging of a third party component in order to comply with A2 packaging standards.\n",
        );
    }

    if let Some(spdx_id) = HeaderKind::SpdxLicenseIdentifier.get(mapping) {
        text.push_str("\nIt is redistributed under the following license:\n\n");
        let _ = writeln!(text, "SPDX-Identifier: {}\n", spdx_id);
        if !spdx_id.starts_with("LicenseRef") {
            match spdx_id.split_once(" WITH ") {
                Some((simple, exception)) => {
                    let _ = writeln!(
                        text,
                        "which are available here: {}{}\nand here: {}{}",
                        SPDX_LICENSES_URL,
                        simple.trim(),
                        SPDX_LICENSES_URL,
                        exception.trim()
                    );
                }
                None => {
                    let _ = writeln!(text, "which is available here: {}{}", SPDX_LICENSES_URL, spdx_id);
                }
            }
        } else {
            match HeaderKind::BundleLicense.get(mapping) {
                Some(url) => {
                    let _ = writeln!(text, "which is available here: {}", url);
                }
                None => error!("No license URL for {}", unit_dir.display()),
            }
        }
    } else {
        error!("No SPDX identifier available for {}", unit_dir.display());
    }

    if let Some(origin_uri) = HeaderKind::OriginUri.get(mapping) {
        let _ = writeln!(text, "\nThe original component comes from {}.", origin_uri);
    } else if let Some(coordinates) = HeaderKind::OriginM2.get(mapping) {
        let _ = writeln!(
            text,
            "\nThe original component has M2 coordinates:\n{}",
            coordinates.replace(',', "\n")
        );
        if let Some(repo) = HeaderKind::OriginM2Repo.get(mapping) {
            let _ = writeln!(text, "\nin M2 repository {}", repo);
        }
    } else {
        error!("Cannot find origin information in {}", unit_dir.display());
    }
    if let Some(sources_uri) = HeaderKind::OriginSourcesUri.get(mapping) {
        let _ = writeln!(text, "\nThe original sources come from {}.", sources_uri);
    }

    if unit_dir.join(CHANGES_FILE).exists() {
        let _ = writeln!(text, "\nA detailed list of changes is available under {}.", CHANGES_FILE);
    }

    let dir_name = unit_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if !dir_name.ends_with(".src") {
        // binary unit: point at the corresponding sources
        if separate_sources {
            let _ = writeln!(
                text,
                "Corresponding sources are available in the related archive named {}.src.jar.",
                dir_name
            );
        } else {
            text.push_str("Corresponding sources are available under OSGI-OPT/src.\n");
        }
    }

    let readme_path = unit_dir.join(README_REPACKAGED);
    if let Some(parent) = readme_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
    }
    fs::write(&readme_path, text)
        .map_err(|e| Error::IoError(format!("Cannot write {}: {}", readme_path.display(), e)))?;
    Ok(())
}
