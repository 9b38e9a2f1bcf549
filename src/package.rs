// src/package.rs

//! Archive packager
//!
//! Serializes a reconciled working tree into the unit's output archive,
//! with the final header block first, optionally splits the staged source
//! tree into a companion source archive, and always deletes the working
//! tree afterward. The archive is the only durable artifact.

use crate::error::{Error, Result};
use crate::fsutil::{self, TreeVisit};
use crate::ledger::OriginLedger;
use crate::license;
use crate::manifest::{HeaderKind, Headers, MANIFEST_PATH, MANIFEST_VERSION};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level for companion source archives; sources compress well and
/// are rarely read.
const SOURCE_COMPRESSION_LEVEL: i64 = 9;

/// Package a working tree as `<tree>.jar` next to it, then delete the
/// tree. Appends the change log and writes the provenance notice first,
/// so both are part of the archive. When sources are separated, the
/// staged `.src` sibling tree is packaged as well.
pub fn create_jar(
    bundle_dir: &Path,
    ledger: &OriginLedger,
    separate_sources: bool,
    a2_base: &Path,
    a2_src_base: &Path,
) -> Result<PathBuf> {
    let manifest_path = bundle_dir.join(MANIFEST_PATH);
    let manifest = Headers::read_from(&manifest_path)?;

    // legal requirements
    ledger.append_changes(bundle_dir)?;
    license::write_notice(bundle_dir, &manifest, separate_sources)?;

    let dir_name = bundle_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::IoError(format!("{} has no file name", bundle_dir.display())))?;
    let jar_path = bundle_dir
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent", bundle_dir.display())))?
        .join(format!("{}.jar", dir_name));

    write_tree_jar(&jar_path, &manifest, bundle_dir, None)?;
    fsutil::delete_directory(bundle_dir)?;
    debug!("Packaged {}", jar_path.display());

    if separate_sources {
        create_source_jar(bundle_dir, &manifest, None, separate_sources, a2_base, a2_src_base)?;
    }
    Ok(jar_path)
}

/// Package the staged `<unit>.src` tree as the companion source archive
/// under the source repository base, with a minimal header block naming
/// the binary unit, then delete the source tree. Skips with a warning
/// when no source tree was staged.
pub fn create_source_jar(
    bundle_dir: &Path,
    primary: &Headers,
    props: Option<&Headers>,
    separate_sources: bool,
    a2_base: &Path,
    a2_src_base: &Path,
) -> Result<()> {
    let dir_name = bundle_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::IoError(format!("{} has no file name", bundle_dir.display())))?;
    let category_dir = bundle_dir
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent", bundle_dir.display())))?;
    let source_dir = category_dir.join(format!("{}.src", dir_name));
    if !source_dir.exists() {
        warn!("{} does not exist, skipping...", source_dir.display());
        return Ok(());
    }

    let rel = category_dir.strip_prefix(a2_base).unwrap_or(category_dir);
    let src_category_dir = a2_src_base.join(rel);
    let src_jar_path = src_category_dir.join(format!("{}.src.jar", dir_name));

    let symbolic_name = HeaderKind::BundleSymbolicName
        .get(primary)
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .ok_or_else(|| {
            Error::ManifestError(format!(
                "No {} in headers of {}",
                HeaderKind::BundleSymbolicName,
                bundle_dir.display()
            ))
        })?;
    let version = HeaderKind::BundleVersion.get(primary).ok_or_else(|| {
        Error::ManifestError(format!(
            "No {} in headers of {}",
            HeaderKind::BundleVersion,
            bundle_dir.display()
        ))
    })?;

    let mut src_manifest = Headers::new();
    src_manifest.put(MANIFEST_VERSION, "1.0");
    HeaderKind::BundleSymbolicName.put(&mut src_manifest, format!("{}.src", symbolic_name));
    HeaderKind::BundleVersion.put(&mut src_manifest, version);
    HeaderKind::EclipseSourceBundle.put(
        &mut src_manifest,
        format!("{};version=\"{}\"", symbolic_name, version),
    );

    license::write_notice(&source_dir, props.unwrap_or(primary), separate_sources)?;
    write_tree_jar(&src_jar_path, &src_manifest, &source_dir, Some(SOURCE_COMPRESSION_LEVEL))?;
    fsutil::delete_directory(&source_dir)?;
    debug!("Packaged sources {}", src_jar_path.display());
    Ok(())
}

/// Serialize a tree into a jar: the header block is written first, the
/// remaining files follow in deterministic sorted order, and the header
/// block file itself is never re-added as a regular entry.
fn write_tree_jar(
    jar_path: &Path,
    manifest: &Headers,
    tree: &Path,
    compression_level: Option<i64>,
) -> Result<()> {
    if let Some(parent) = jar_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
    }
    let file = File::create(jar_path)
        .map_err(|e| Error::IoError(format!("Cannot create {}: {}", jar_path.display(), e)))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(compression_level);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(&manifest.to_bytes())
        .map_err(|e| Error::ArchiveError(format!("Cannot write header block: {}", e)))?;

    fsutil::visit_files(
        tree,
        |rel| {
            if rel == Path::new(MANIFEST_PATH) {
                TreeVisit::SkipEntry
            } else {
                TreeVisit::Keep
            }
        },
        |rel, abs| {
            let entry_name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            zip.start_file(entry_name, options)?;
            let mut input = File::open(abs)
                .map_err(|e| Error::IoError(format!("Cannot open {}: {}", abs.display(), e)))?;
            std::io::copy(&mut input, &mut zip)
                .map_err(|e| Error::ArchiveError(format!("Cannot write {}: {}", rel.display(), e)))?;
            Ok(())
        },
    )?;

    zip.finish()?;
    Ok(())
}
