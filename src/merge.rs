// src/merge.rs

//! Content merge engine
//!
//! Streams entries out of one or more source archives into a single unit
//! working tree, applying the universal exclusion rules (signatures,
//! module descriptors, multi-release shims, embedded sources), the legal
//! file relocation, the conflict policies (service-file append, known-safe
//! skip, hard failure) and the native library hoisting, while recording
//! every change in the unit's [`OriginLedger`].

use crate::artifact::{ArtifactId, NameVersion};
use crate::error::{Error, Result};
use crate::ledger::{OriginLedger, ORIGIN_DIR};
use crate::manifest::{Headers, MANIFEST_PATH};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;
use tracing::{debug, trace, warn};

/// Vendored subpackage prefixes known to be byte-identical across merged
/// artifacts; colliding entries under these are skipped silently.
const SAFE_DUPLICATE_PREFIXES: &[&str] = &["org/apache/batik/"];

/// Native shared-library extensions subject to hoisting.
const NATIVE_EXTENSIONS: &[&str] = &["so", "dll", "jnilib", "a"];

/// Legal file suffixes relocated into the per-origin subtree.
const LEGAL_SUFFIXES: &[&str] = &[
    "NOTICE",
    "NOTICE.txt",
    "NOTICE.md",
    "LICENSE",
    "LICENSE.md",
    "LICENSE-notice.md",
    "COPYING",
    "COPYING.LESSER",
];

/// Per-vendor rename rule applied when hoisting native libraries out of
/// an OS/architecture-specific component.
#[derive(Debug, Clone, Copy)]
pub struct NativeRenameRule {
    /// Unit name prefix the rule applies to.
    pub name_prefix: &'static str,
    /// OS/architecture token rewrites, e.g. `x86_64` to `x86-64`.
    pub tokens: &'static [(&'static str, &'static str)],
}

/// Built-in vendor rules. The JNA family spells architecture and OS
/// tokens differently from the A2 layout and nests libraries in
/// `<os>-<arch>` directories.
pub const NATIVE_RENAME_RULES: &[NativeRenameRule] = &[NativeRenameRule {
    name_prefix: "com.sun.jna",
    tokens: &[("x86_64", "x86-64"), ("macosx", "darwin")],
}];

/// Context for native library hoisting in an OS/arch-specific component.
#[derive(Debug, Clone)]
pub struct NativeContext {
    pub os: String,
    pub arch: String,
}

/// How one archive is merged into a working tree.
pub struct MergeOptions<'a> {
    /// Identity of the unit being assembled (drives the native rules).
    pub unit: &'a NameVersion,
    /// The contributing artifact, when merging repository artifacts.
    /// Drives per-origin relocation paths and ledger labels.
    pub origin: Option<&'a ArtifactId>,
    /// Restrict processing to the embedded-sources exclusion only.
    pub do_not_modify: bool,
    /// Present when the unit lives under the native components base.
    pub native: Option<NativeContext>,
}

impl MergeOptions<'_> {
    /// Suffix appended to ledger labels, naming the contributing artifact.
    fn origin_label(&self) -> String {
        match self.origin {
            Some(artifact) => format!(" from {}", artifact),
            None => String::new(),
        }
    }

    /// Directory where this origin's legal files and original metadata
    /// are preserved.
    fn origin_subtree(&self, tree: &Path) -> PathBuf {
        match self.origin {
            Some(artifact) => tree.join(ORIGIN_DIR).join(&artifact.group).join(&artifact.name),
            None => tree.join(ORIGIN_DIR),
        }
    }
}

/// Read the original header block out of an archive, if present.
pub fn read_manifest<R: Read + io::Seek>(archive: &mut ZipArchive<R>) -> Result<Option<Headers>> {
    match archive.by_name(MANIFEST_PATH) {
        Ok(mut entry) => {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            Ok(Some(Headers::parse(&bytes)?))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Merge the entries of one open archive into the working tree,
/// recording every modification in the ledger.
pub fn merge_archive<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    tree: &Path,
    opts: &MergeOptions<'_>,
    ledger: &mut OriginLedger,
) -> Result<()> {
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(rel) = entry.enclosed_name() else {
            warn!("Skipping unsafe entry path {}", name);
            continue;
        };

        if !opts.do_not_modify {
            if name.ends_with(".RSA") || name.ends_with(".DSA") || name.ends_with(".SF") {
                ledger
                    .deleted
                    .insert(format!("cryptographic signatures{}", opts.origin_label()));
                continue;
            }
            if name.ends_with("module-info.class") {
                ledger.deleted.insert(format!(
                    "Java module information (module-info.class){}",
                    opts.origin_label()
                ));
                continue;
            }
            if name.starts_with("META-INF/versions/") {
                ledger.deleted.insert(format!(
                    "additional Java versions (META-INF/versions){}",
                    opts.origin_label()
                ));
                continue;
            }
            if name.starts_with("META-INF/maven/") {
                ledger.deleted.insert(format!(
                    "Maven information (META-INF/maven){}",
                    opts.origin_label()
                ));
                continue;
            }
            if name.starts_with(".cache/") {
                ledger
                    .deleted
                    .insert(format!("cache directory (.cache){}", opts.origin_label()));
                continue;
            }
            if name == "META-INF/DEPENDENCIES" {
                ledger.deleted.insert(format!(
                    "dependencies list (META-INF/DEPENDENCIES){}",
                    opts.origin_label()
                ));
                continue;
            }
            // dropped so that merged archives never double-register a provider
            if name.starts_with("META-INF/services/java.nio.file.spi.FileSystemProvider") {
                ledger.deleted.insert(format!(
                    "file system providers (META-INF/services/java.nio.file.spi.FileSystemProvider){}",
                    opts.origin_label()
                ));
                continue;
            }
        }
        if name.starts_with("OSGI-OPT/src/") {
            ledger
                .deleted
                .insert(format!("embedded sources{}", opts.origin_label()));
            continue;
        }

        if name == MANIFEST_PATH {
            let target = opts.origin_subtree(tree).join("MANIFEST.MF");
            copy_entry(&mut entry, &target)?;
            let rel_target = target.strip_prefix(tree).unwrap_or(&target).to_path_buf();
            match opts.origin {
                Some(artifact) => {
                    ledger.added.insert(format!(
                        "original MANIFEST ({}) from {}",
                        rel_target.display(),
                        artifact
                    ));
                }
                None => {
                    ledger
                        .moved
                        .insert(format!("original MANIFEST to {}", rel_target.display()));
                }
            }
            continue;
        }

        if !opts.do_not_modify && LEGAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            let target = opts.origin_subtree(tree).join(&rel);
            copy_entry(&mut entry, &target)?;
            let rel_target = target.strip_prefix(tree).unwrap_or(&target).to_path_buf();
            let in_origin = match opts.origin {
                Some(artifact) => format!(" in {}", artifact),
                None => String::new(),
            };
            ledger
                .moved
                .insert(format!("{}{} to {}", name, in_origin, rel_target.display()));
            continue;
        }

        let target = tree.join(&rel);
        if !target.exists() {
            copy_entry(&mut entry, &target)?;
            trace!("Copied {}", target.display());
        } else if name.starts_with("META-INF/services/") {
            let mut file = OpenOptions::new().append(true).open(&target).map_err(|e| {
                Error::IoError(format!("Cannot append to {}: {}", target.display(), e))
            })?;
            file.write_all(b"\n")?;
            io::copy(&mut entry, &mut file)
                .map_err(|e| Error::IoError(format!("Cannot append entry {}: {}", name, e)))?;
            debug!("Appended {}{}", name, opts.origin_label());
            ledger
                .modified
                .insert(format!("{}, merging{}", name, opts.origin_label()));
        } else if SAFE_DUPLICATE_PREFIXES.iter().any(|p| name.starts_with(p)) {
            trace!("Skip {}", name);
        } else if name.starts_with("META-INF/NOTICE") {
            warn!("Skip {}{}", name, opts.origin_label());
        } else {
            return Err(Error::MergeConflict {
                path: name,
                origin: opts
                    .origin
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "the merged archive".to_string()),
            });
        }

        if let Some(native) = &opts.native {
            hoist_native_library(&name, &target, tree, opts.unit, native, ledger)?;
        }
    }
    Ok(())
}

/// Copy a native shared library one level up to the shared, platform-keyed
/// location and remove it from the component's own tree. Naming follows
/// the per-vendor rename rule table.
fn hoist_native_library(
    name: &str,
    target: &Path,
    tree: &Path,
    unit: &NameVersion,
    native: &NativeContext,
    ledger: &mut OriginLedger,
) -> Result<()> {
    let is_native = target
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| NATIVE_EXTENSIONS.contains(&e))
        .unwrap_or(false);
    if !is_native || !target.exists() {
        return Ok(());
    }
    let category_dir = tree
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent", tree.display())))?;
    let rel = target.strip_prefix(tree).unwrap_or(target);

    let rule = NATIVE_RENAME_RULES
        .iter()
        .find(|r| unit.name.starts_with(r.name_prefix));
    let (hoist, hoisted) = match rule {
        Some(rule) => {
            let mut os = native.os.clone();
            let mut arch = native.arch.clone();
            for (from, to) in rule.tokens {
                if os == *from {
                    os = (*to).to_string();
                }
                if arch == *from {
                    arch = (*to).to_string();
                }
            }
            // only the matching platform directory contributes, flattened
            let platform_dir = format!("{}-{}", os, arch);
            let matches = target
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy() == platform_dir)
                .unwrap_or(false);
            let file_name = target
                .file_name()
                .ok_or_else(|| Error::IoError(format!("{} has no file name", target.display())))?;
            (matches, category_dir.join(file_name))
        }
        None => (true, category_dir.join(rel)),
    };

    if hoist {
        if let Some(parent) = hoisted.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
        }
        if hoisted.exists() {
            fs::remove_file(&hoisted)
                .map_err(|e| Error::IoError(format!("Cannot replace {}: {}", hoisted.display(), e)))?;
        }
        fs::copy(target, &hoisted)
            .map_err(|e| Error::IoError(format!("Cannot hoist {}: {}", name, e)))?;
    }

    fs::remove_file(target)
        .map_err(|e| Error::IoError(format!("Cannot delete {}: {}", target.display(), e)))?;
    ledger.deleted.insert(rel.to_string_lossy().to_string());
    Ok(())
}

/// Merge a sources archive into the unit's source directory. Sources
/// never hard-conflict: existing targets are kept.
pub fn merge_source_archive<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    source_dir: &Path,
    merging_from: Option<&ArtifactId>,
    unmodified: bool,
    ledger: &mut OriginLedger,
) -> Result<()> {
    let merging_msg = match merging_from {
        Some(artifact) => format!(" of {}", artifact),
        None => String::new(),
    };
    fs::create_dir_all(source_dir)
        .map_err(|e| Error::IoError(format!("Cannot create {}: {}", source_dir.display(), e)))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name == MANIFEST_PATH {
            ledger
                .deleted
                .insert(format!("MANIFEST.MF from the sources{}", merging_msg));
            continue;
        }
        if !unmodified {
            if name.starts_with("module-info.java") {
                ledger.deleted.insert(format!(
                    "Java module information from the sources (module-info.java){}",
                    merging_msg
                ));
                continue;
            }
            if name.starts_with('/') {
                warn!("{} has an absolute path", name);
                ledger
                    .deleted
                    .insert(format!("{} from the sources{}", name, merging_msg));
                continue;
            }
        }
        let Some(rel) = entry.enclosed_name() else {
            warn!("Skipping unsafe source entry path {}", name);
            continue;
        };
        let target = source_dir.join(&rel);
        if target.exists() {
            trace!("{} already exists, skipping...", target.display());
            continue;
        }
        copy_entry(&mut entry, &target)?;
        trace!("Copied source {}", target.display());
    }
    Ok(())
}

fn copy_entry(entry: &mut impl Read, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
    }
    let mut file = File::create(target)
        .map_err(|e| Error::IoError(format!("Cannot create {}: {}", target.display(), e)))?;
    io::copy(entry, &mut file)
        .map_err(|e| Error::IoError(format!("Cannot write {}: {}", target.display(), e)))?;
    Ok(())
}
