// src/unit.rs

//! Distribution unit processor
//!
//! Drives resolver, merge engine, reconciliation, license engine and
//! packager for one distribution unit, for each of the three descriptor
//! shapes: standalone artifact, common-grouped artifacts with optional
//! merge, and archive-extraction based units.

use crate::analyzer::MetadataAnalyzer;
use crate::artifact::{ArtifactId, NameVersion};
use crate::config::RunConfig;
use crate::descriptor::{self, EntryFilter, COMMON_BND, MERGE_BND};
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::ledger::OriginLedger;
use crate::license::LicenseLedger;
use crate::manifest::{HeaderKind, Headers};
use crate::merge::{self, MergeOptions, NativeContext};
use crate::package;
use crate::{license, reconcile};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};
use zip::ZipArchive;

/// Processes the distribution units of one category.
pub struct UnitProcessor<'a> {
    pub cfg: &'a RunConfig,
    pub downloader: &'a Downloader,
    pub analyzer: &'a dyn MetadataAnalyzer,
    pub licenses: &'a LicenseLedger,
}

impl UnitProcessor<'_> {
    fn target_category(&self, category: &Path) -> PathBuf {
        self.cfg.a2_base.join(category)
    }

    /// Declared properties of a descriptor: run defaults, overlaid with
    /// the descriptor's own properties.
    fn declared_properties(&self, bnd_file: &Path) -> Result<Headers> {
        let mut props = self.cfg.defaults.clone();
        let file_props = descriptor::load_properties(bnd_file)?;
        for (key, value) in file_props.iter() {
            props.put(key, value);
        }
        Ok(props)
    }

    /*
     * STANDALONE AND GROUPED UNITS
     */

    /// Process a standalone artifact descriptor.
    pub fn process_standalone(&self, category: &Path, bnd_file: &Path) -> Result<()> {
        self.standalone_inner(category, bnd_file)
            .map_err(|e| e.in_unit(bnd_file.display().to_string()))
    }

    fn standalone_inner(&self, category: &Path, bnd_file: &Path) -> Result<()> {
        let mut props = self.declared_properties(bnd_file)?;
        default_symbolic_name(&mut props, bnd_file);

        let coordinates = HeaderKind::OriginM2.get(&props).ok_or_else(|| {
            Error::ConfigError(format!("No M2 coordinates available for {}", bnd_file.display()))
        })?;
        let artifact = ArtifactId::parse(coordinates)?;
        self.process_artifact(category, props, artifact)
    }

    /// Process a grouped distribution unit directory: a `common.bnd`
    /// property base shared by N artifact descriptors, optionally merged
    /// into a single unit by a `merge.bnd`.
    pub fn process_grouped(&self, category: &Path, du_dir: &Path) -> Result<()> {
        let merge_bnd = du_dir.join(MERGE_BND);
        if merge_bnd.exists() {
            self.process_merged(category, &merge_bnd)
                .map_err(|e| e.in_unit(merge_bnd.display().to_string()))?;
        }

        let common_bnd = du_dir.join(COMMON_BND);
        if !common_bnd.exists() {
            return Ok(());
        }
        let common_props = descriptor::load_properties(&common_bnd)?;
        let Some(common_version) = version_only_coordinates(&common_props, &common_bnd)? else {
            warn!(
                "Ignoring {} as it is not an M2-based distribution unit",
                du_dir.display()
            );
            return Ok(());
        };

        for unit in descriptor::enumerate_units(du_dir)? {
            let descriptor::UnitKind::Standalone(bnd_file) = unit else {
                continue;
            };
            self.grouped_single(category, &common_props, &common_version, &bnd_file)
                .map_err(|e| e.in_unit(bnd_file.display().to_string()))?;
        }
        Ok(())
    }

    fn grouped_single(
        &self,
        category: &Path,
        common_props: &Headers,
        common_version: &str,
        bnd_file: &Path,
    ) -> Result<()> {
        let file_props = descriptor::load_properties(bnd_file)?;
        let coordinates = HeaderKind::OriginM2.get(&file_props).ok_or_else(|| {
            Error::ConfigError(format!("No M2 coordinates available for {}", bnd_file.display()))
        })?;
        let mut artifact = ArtifactId::parse(coordinates)?;
        if artifact.version().is_none() {
            artifact.set_version(common_version);
        } else {
            debug!(
                "{}: Using version {} specified in descriptor rather than {} specified in {}",
                bnd_file.display(),
                artifact.version().unwrap_or_default(),
                common_version,
                COMMON_BND
            );
        }

        // defaults beneath common properties, file properties on top
        let mut merged = self.cfg.defaults.clone();
        for (key, value) in common_props.iter() {
            merged.put(key, value);
        }
        for (key, value) in file_props.iter() {
            if key == HeaderKind::OriginM2.name() {
                continue;
            }
            let overrides_common = common_props.get(key).is_some_and(|previous| previous != value);
            if let Some(previous) = merged.put(key, value) {
                if overrides_common {
                    warn!("{}: {} was {}, overridden with {}", bnd_file.display(), key, previous, value);
                }
            }
        }
        HeaderKind::OriginM2.put(&mut merged, artifact.coordinates());
        default_symbolic_name(&mut merged, bnd_file);

        self.process_artifact(category, merged, artifact)
    }

    /// Standalone-style flow for one resolved artifact: download,
    /// compute metadata, merge, sources, reconcile, license, package.
    fn process_artifact(&self, category: &Path, mut props: Headers, artifact: ArtifactId) -> Result<()> {
        let target_category = self.target_category(category);
        let downloaded = self.downloader.maven_artifact(&props, &artifact)?;

        if HeaderKind::OriginDoNotModify.is_set(&props) {
            return self.process_unmodified(&target_category, &downloaded, &props, &artifact);
        }

        let mut ledger = OriginLedger::new();
        let entries = if HeaderKind::OriginNoMetadataGeneration.is_set(&props) {
            // declared headers are kept untouched
            props.clone()
        } else {
            if !props.contains(HeaderKind::BundleVersion.name()) {
                HeaderKind::BundleVersion.put(&mut props, artifact.require_version()?);
            }
            if !props.contains(HeaderKind::ExportPackage.name()) {
                let version = HeaderKind::BundleVersion.get(&props).unwrap_or_default().to_string();
                HeaderKind::ExportPackage.put(&mut props, format!("*;version=\"{}\"", version));
            }
            let computed = self.analyzer.analyze(&downloaded, &props)?;
            reconcile::filter_computed(&computed, &mut ledger)
        };

        let label = downloaded
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bundle_dir = self.process_bundle_jar(
            &downloaded,
            &target_category,
            entries,
            Some(&artifact),
            &mut ledger,
            &label,
        )?;
        debug!("Processed {}", downloaded.display());

        self.process_sources(&props, &artifact, &bundle_dir, false, false)?;
        package::create_jar(
            &bundle_dir,
            &ledger,
            self.cfg.separate_sources,
            &self.cfg.a2_base,
            &self.cfg.a2_src_base,
        )?;
        Ok(())
    }

    /// Some proprietary or signed artifacts do not allow any modification;
    /// the archive is copied verbatim and only the sources are handled.
    fn process_unmodified(
        &self,
        target_category: &Path,
        downloaded: &Path,
        props: &Headers,
        artifact: &ArtifactId,
    ) -> Result<()> {
        let name = HeaderKind::BundleSymbolicName.get(props).ok_or_else(|| {
            Error::ConfigError(format!(
                "{} must be set for unmodified artifact {}",
                HeaderKind::BundleSymbolicName,
                artifact
            ))
        })?;
        let dir_name = format!("{}.{}", name, artifact.branch()?);
        let target = target_category.join(format!("{}.jar", dir_name));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
        }
        fs::copy(downloaded, &target)
            .map_err(|e| Error::IoError(format!("Cannot copy {}: {}", downloaded.display(), e)))?;

        let bundle_dir = target_category.join(dir_name);
        self.process_sources(props, artifact, &bundle_dir, false, true)?;

        let mut archive = open_zip(&target)?;
        let manifest = merge::read_manifest(&mut archive)?.unwrap_or_default();
        package::create_source_jar(
            &bundle_dir,
            &manifest,
            Some(props),
            self.cfg.separate_sources,
            &self.cfg.a2_base,
            &self.cfg.a2_src_base,
        )
    }

    /*
     * MERGED UNITS
     */

    /// Merge several artifacts into one output unit, under the
    /// cross-artifact conflict rules of the merge engine.
    fn process_merged(&self, category: &Path, merge_bnd: &Path) -> Result<()> {
        let du_dir = merge_bnd
            .parent()
            .ok_or_else(|| Error::ConfigError(format!("{} has no parent", merge_bnd.display())))?;
        let target_category = self.target_category(category);

        // common properties first, then the merge properties themselves
        let mut props = self.cfg.defaults.clone();
        let common_bnd = du_dir.join(COMMON_BND);
        if common_bnd.exists() {
            for (key, value) in descriptor::load_properties(&common_bnd)?.iter() {
                props.put(key, value);
            }
        }
        for (key, value) in descriptor::load_properties(merge_bnd)?.iter() {
            props.put(key, value);
        }

        let Some(version) = version_only_coordinates(&props, merge_bnd)? else {
            warn!(
                "Ignoring merging in {} as it is not an M2-based distribution unit",
                du_dir.display()
            );
            return Ok(());
        };
        HeaderKind::BundleVersion.put(&mut props, version.as_str());

        let merge_list = HeaderKind::OriginM2Merge
            .get(&props)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "{}: {} must be set",
                    merge_bnd.display(),
                    HeaderKind::OriginM2Merge
                ))
            })?;
        let name = HeaderKind::BundleSymbolicName
            .get(&props)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "{} must be set in {}",
                    HeaderKind::BundleSymbolicName,
                    merge_bnd.display()
                ))
            })?;
        let unit = NameVersion::new(name, version);
        let bundle_dir = target_category.join(unit.dir_name()?);
        let native = self.native_context(&bundle_dir);

        let mut ledger = OriginLedger::new();
        let mut origin_coordinates = Vec::new();
        for coordinates in merge_list.split(',') {
            let coordinates = coordinates.trim();
            if coordinates.is_empty() {
                continue;
            }
            let mut artifact = ArtifactId::parse(coordinates)?;
            if artifact.version().is_none() {
                artifact.set_version(&unit.version);
            }
            origin_coordinates.push(artifact.to_string());

            let downloaded = self.downloader.maven_artifact(&props, &artifact)?;
            let mut archive = open_zip(&downloaded)?;
            let opts = MergeOptions {
                unit: &unit,
                origin: Some(&artifact),
                do_not_modify: false,
                native: native.clone(),
            };
            merge::merge_archive(&mut archive, &bundle_dir, &opts, &mut ledger)
                .map_err(|e| e.in_unit(artifact.to_string()))?;
            ledger.added.insert(format!("binary content of {}", artifact));

            self.process_sources(&props, &artifact, &bundle_dir, true, false)?;
        }

        self.append_extra_services(du_dir, &bundle_dir, &mut ledger)?;

        let computed = self.analyzer.analyze(&bundle_dir, &props)?;
        let mut entries = reconcile::filter_computed(&computed, &mut ledger);
        HeaderKind::OriginM2.put(&mut entries, origin_coordinates.join(","));

        let (mut finals, _divergences) = reconcile::reconcile(
            &unit,
            &entries,
            None,
            false,
            &mut ledger,
            &merge_bnd.display().to_string(),
        );
        license::process_license(&bundle_dir, &mut finals, self.licenses);
        finals.write_to(&bundle_dir.join(crate::manifest::MANIFEST_PATH))?;

        package::create_jar(
            &bundle_dir,
            &ledger,
            self.cfg.separate_sources,
            &self.cfg.a2_base,
            &self.cfg.a2_src_base,
        )?;
        Ok(())
    }

    /// Additional declarative service registrations shipped next to the
    /// merge descriptor are appended into the merged tree.
    fn append_extra_services(
        &self,
        du_dir: &Path,
        bundle_dir: &Path,
        ledger: &mut OriginLedger,
    ) -> Result<()> {
        let services_dir = du_dir.join("services");
        if !services_dir.exists() {
            return Ok(());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&services_dir)
            .map_err(|e| Error::IoError(format!("Cannot read {}: {}", services_dir.display(), e)))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        for path in files {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let target = bundle_dir.join("META-INF/services").join(file_name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::IoError(format!("Cannot create {}: {}", parent.display(), e))
                })?;
            }
            let mut out = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&target)
                .map_err(|e| Error::IoError(format!("Cannot open {}: {}", target.display(), e)))?;
            out.write_all(b"\n")?;
            let mut input = File::open(&path)
                .map_err(|e| Error::IoError(format!("Cannot open {}: {}", path.display(), e)))?;
            io::copy(&mut input, &mut out)
                .map_err(|e| Error::IoError(format!("Cannot append {}: {}", path.display(), e)))?;
            debug!("Appended {}", path.display());
            let rel = target.strip_prefix(bundle_dir).unwrap_or(&target).to_path_buf();
            ledger.added.insert(rel.to_string_lossy().to_string());
        }
        Ok(())
    }

    /*
     * ARCHIVE-BASED UNITS
     */

    /// Process a downloadable archive whose matched entries each become
    /// an output unit or a companion source unit.
    pub fn process_archive(&self, category: &Path, du_dir: &Path) -> Result<()> {
        self.archive_inner(category, du_dir)
            .map_err(|e| e.in_unit(du_dir.display().to_string()))
    }

    fn archive_inner(&self, category: &Path, du_dir: &Path) -> Result<()> {
        let target_category = self.target_category(category);
        fs::create_dir_all(&target_category).map_err(|e| {
            Error::IoError(format!("Cannot create {}: {}", target_category.display(), e))
        })?;
        // stale working trees of a previous failed run are purged first
        for entry in fs::read_dir(&target_category)
            .map_err(|e| Error::IoError(format!("Cannot read {}: {}", target_category.display(), e)))?
        {
            let entry = entry.map_err(|e| Error::IoError(e.to_string()))?;
            if entry.path().is_dir() {
                fsutil::delete_directory(&entry.path())?;
            }
        }

        let common_bnd = du_dir.join(COMMON_BND);
        let mut common_props = self.cfg.defaults.clone();
        for (key, value) in descriptor::load_properties(&common_bnd)?.iter() {
            common_props.put(key, value);
        }
        let uri = match HeaderKind::OriginUri.get(&common_props) {
            Some(uri) => uri.to_string(),
            None => {
                let dir_name = du_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let uri = self.cfg.uris.get(&dir_name).map(str::to_string).ok_or_else(|| {
                    Error::ConfigError(format!("No URI available for {}", du_dir.display()))
                })?;
                HeaderKind::OriginUri.put(&mut common_props, uri.as_str());
                uri
            }
        };
        let downloaded = self.downloader.archive(&uri)?;
        let filter = EntryFilter::load(du_dir)?;

        let mut archive = open_zip(&downloaded)?;
        let mut origins: BTreeMap<PathBuf, OriginLedger> = BTreeMap::new();
        for index in 0..archive.len() {
            let entry_name;
            let temp_jar;
            {
                let mut entry = archive.by_index(index)?;
                if entry.is_dir() || !filter.matches(entry.name()) {
                    continue;
                }
                entry_name = entry.name().to_string();
                // nested archives are staged to a scratch file before opening
                let mut staged = tempfile::NamedTempFile::new()
                    .map_err(|e| Error::IoError(format!("Cannot create scratch file: {}", e)))?;
                io::copy(&mut entry, &mut staged)
                    .map_err(|e| Error::IoError(format!("Cannot stage {}: {}", entry_name, e)))?;
                temp_jar = staged;
            }

            let file_name = entry_name.rsplit('/').next().unwrap_or(&entry_name);
            if file_name.contains(".source_") {
                self.process_source_entry(temp_jar.path(), &target_category)
                    .map_err(|e| e.in_unit(entry_name.clone()))?;
                debug!("Processed source {}", entry_name);
            } else {
                let mut ledger = OriginLedger::new();
                let bundle_dir = self
                    .process_bundle_jar(
                        temp_jar.path(),
                        &target_category,
                        common_props.clone(),
                        None,
                        &mut ledger,
                        file_name,
                    )
                    .map_err(|e| e.in_unit(entry_name.clone()))?;
                origins.insert(bundle_dir, ledger);
                debug!("Processed {}", entry_name);
            }
        }

        for (bundle_dir, ledger) in origins {
            package::create_jar(
                &bundle_dir,
                &ledger,
                self.cfg.separate_sources,
                &self.cfg.a2_base,
                &self.cfg.a2_src_base,
            )?;
        }
        Ok(())
    }

    /// An archive entry recognized as a source companion; its identity
    /// comes from the source-bundle back reference header.
    fn process_source_entry(&self, jar: &Path, target_category: &Path) -> Result<()> {
        let mut archive = open_zip(jar)?;
        let manifest = merge::read_manifest(&mut archive)?.ok_or_else(|| {
            Error::ManifestError(format!("{} has no manifest", jar.display()))
        })?;
        let reference = HeaderKind::EclipseSourceBundle.get(&manifest).ok_or_else(|| {
            Error::ManifestError(format!(
                "{} is missing the {} header",
                jar.display(),
                HeaderKind::EclipseSourceBundle
            ))
        })?;
        let unit = NameVersion::parse_source_bundle_ref(reference)?;
        let bundle_dir = target_category.join(unit.dir_name()?);
        let source_dir = if self.cfg.separate_sources {
            target_category.join(format!("{}.src", unit.dir_name()?))
        } else {
            bundle_dir.join("OSGI-OPT/src")
        };

        let mut ledger = OriginLedger::new();
        merge::merge_source_archive(&mut archive, &source_dir, None, false, &mut ledger)?;
        if self.cfg.separate_sources {
            ledger.append_changes(&source_dir)?;
        } else {
            ledger.added.insert("source code under OSGI-OPT/src".to_string());
            ledger.append_changes(&bundle_dir)?;
        }
        Ok(())
    }

    /*
     * COMMON PROCESSING
     */

    /// Normalize a single (that is, non-merged) archive into its working
    /// tree: identity, merge, reconciliation, license, final manifest.
    fn process_bundle_jar(
        &self,
        jar: &Path,
        target_category: &Path,
        mut entries: Headers,
        origin: Option<&ArtifactId>,
        ledger: &mut OriginLedger,
        label: &str,
    ) -> Result<PathBuf> {
        let do_not_modify = HeaderKind::OriginDoNotModify.is_set(&entries);

        let mut archive = open_zip(jar)?;
        let original = merge::read_manifest(&mut archive)?;
        if original.is_none() {
            warn!("{} has no manifest", jar.display());
        }

        // singleton directive of the original identity header
        let singleton = original
            .as_ref()
            .and_then(|m| HeaderKind::BundleSymbolicName.get(m))
            .map(|raw| raw.split(';').skip(1).any(|d| d.trim() == "singleton:=true"))
            .unwrap_or(false);
        if singleton {
            debug!("{} is a singleton", label);
        }

        let unit = self.derive_identity(&mut entries, original.as_ref(), label)?;
        let bundle_dir = target_category.join(unit.dir_name()?);

        // force the Java module name
        HeaderKind::AutomaticModuleName.put(&mut entries, unit.name.as_str());

        let native = self.native_context(&bundle_dir);
        let opts = MergeOptions {
            unit: &unit,
            origin,
            do_not_modify,
            native,
        };
        merge::merge_archive(&mut archive, &bundle_dir, &opts, ledger)?;

        let (mut finals, _divergences) =
            reconcile::reconcile(&unit, &entries, original.as_ref(), singleton, ledger, label);
        license::process_license(&bundle_dir, &mut finals, self.licenses);
        ledger.modified.insert("MANIFEST (META-INF/MANIFEST.MF)".to_string());
        finals.write_to(&bundle_dir.join(crate::manifest::MANIFEST_PATH))?;
        Ok(bundle_dir)
    }

    /// Unit identity from declared entries when complete, else from the
    /// original header block; a declared symbolic name is always forced.
    fn derive_identity(
        &self,
        entries: &mut Headers,
        original: Option<&Headers>,
        label: &str,
    ) -> Result<NameVersion> {
        let our_name = HeaderKind::BundleSymbolicName.get(entries).map(str::to_string);
        let our_version = HeaderKind::BundleVersion.get(entries).map(str::to_string);
        if let (Some(name), Some(version)) = (&our_name, &our_version) {
            return Ok(NameVersion::new(name, version));
        }

        let mut unit = original
            .and_then(identity_from_manifest)
            .ok_or_else(|| {
                Error::ConfigError(format!("Could not compute name/version for {}", label))
            })?;
        if let Some(version) = &our_version {
            if unit.version != *version {
                warn!(
                    "{}: Original version is {} while new version is {}",
                    label, unit.version, version
                );
                unit.version = version.clone();
            }
        }
        if let Some(name) = &our_name {
            // the declared symbolic name is always forced
            unit.name = name.clone();
        }
        HeaderKind::BundleSymbolicName.put(entries, unit.name.as_str());
        HeaderKind::BundleVersion.put(entries, unit.version.as_str());
        Ok(unit)
    }

    /// Download and merge the sources companion; a missing sources
    /// archive only logs and the unit proceeds without sources.
    fn process_sources(
        &self,
        props: &Headers,
        artifact: &ArtifactId,
        bundle_dir: &Path,
        merging: bool,
        unmodified: bool,
    ) -> Result<()> {
        let downloaded = match self.downloader.maven_sources(props, artifact) {
            Ok(path) => path,
            Err(e) => {
                error!("Cannot download sources for {}: {}", artifact, e);
                return Ok(());
            }
        };
        let source_dir = if self.cfg.separate_sources || unmodified {
            let dir_name = bundle_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            bundle_dir
                .parent()
                .unwrap_or(Path::new("."))
                .join(format!("{}.src", dir_name))
        } else {
            bundle_dir.join("OSGI-OPT/src")
        };

        let mut ledger = OriginLedger::new();
        let mut archive = open_zip(&downloaded)?;
        merge::merge_source_archive(
            &mut archive,
            &source_dir,
            merging.then_some(artifact),
            unmodified,
            &mut ledger,
        )?;
        trace!("Processed sources {}", downloaded.display());

        if self.cfg.separate_sources || unmodified {
            ledger.append_changes(&source_dir)?;
        } else {
            ledger.added.insert("source code under OSGI-OPT/src".to_string());
            ledger.append_changes(bundle_dir)?;
        }
        Ok(())
    }

    /// OS and architecture of a unit under the native components base.
    fn native_context(&self, bundle_dir: &Path) -> Option<NativeContext> {
        let rel = bundle_dir.strip_prefix(&self.cfg.a2_lib_base).ok()?;
        let mut components = rel.components();
        let os = components.next()?.as_os_str().to_string_lossy().to_string();
        let arch = components.next()?.as_os_str().to_string_lossy().to_string();
        Some(NativeContext { os, arch })
    }
}

/// The descriptor file stem is the default symbolic name.
fn default_symbolic_name(props: &mut Headers, bnd_file: &Path) {
    if !props.contains(HeaderKind::BundleSymbolicName.name()) {
        if let Some(stem) = bnd_file.file_stem() {
            HeaderKind::BundleSymbolicName.put(props, stem.to_string_lossy().to_string());
        }
    }
}

/// The version-only origin coordinates (`:<version>`) of a common or
/// merge descriptor. A missing header means the directory is not
/// M2-based; anything but a version-only value is a configuration error.
fn version_only_coordinates(props: &Headers, descriptor_path: &Path) -> Result<Option<String>> {
    let Some(value) = HeaderKind::OriginM2.get(props) else {
        return Ok(None);
    };
    match value.strip_prefix(':') {
        Some(version) => Ok(Some(version.to_string())),
        None => Err(Error::ConfigError(format!(
            "{}: only the M2 version can be specified: {}",
            descriptor_path.display(),
            value
        ))),
    }
}

/// Identity from a header block: the symbolic name with directives
/// stripped, plus the version header.
fn identity_from_manifest(manifest: &Headers) -> Option<NameVersion> {
    let raw_name = HeaderKind::BundleSymbolicName.get(manifest)?;
    let name = raw_name.split(';').next()?.trim();
    let version = HeaderKind::BundleVersion.get(manifest)?;
    Some(NameVersion::new(name, version.trim()))
}

fn open_zip(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)
        .map_err(|e| Error::IoError(format!("Cannot open {}: {}", path.display(), e)))?;
    ZipArchive::new(file)
        .map_err(|e| Error::ArchiveError(format!("Cannot read {}: {}", path.display(), e)))
}
