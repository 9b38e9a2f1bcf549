// src/config.rs

//! Run configuration
//!
//! Environment-driven switches and the derived directory layout of a run:
//! output repository bases, download caches, and the descriptors root.

use crate::descriptor::{self, Mirrors, URIS_PROPERTIES};
use crate::error::{Error, Result};
use crate::manifest::Headers;
use std::path::{Path, PathBuf};
use tracing::info;

/// Whether sources are packaged as separate `.src` archives instead of
/// being embedded in the bundles.
pub const ENV_SOURCE_BUNDLES: &str = "A2_SOURCE_BUNDLES";
/// Whether category processing is forced sequential.
pub const ENV_SEQUENTIAL: &str = "A2_SEQUENTIAL";
/// Overrides the location of the metadata-defaults property file.
pub const ENV_METADATA_DEFAULTS: &str = "A2_METADATA_DEFAULTS";

/// Default metadata-defaults file name, relative to the descriptors root.
const DEFAULTS_BND: &str = "defaults.bnd";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Directory layout and switches of one repackaging run.
#[derive(Debug)]
pub struct RunConfig {
    /// A2 repository base for binary bundles.
    pub a2_base: PathBuf,
    /// A2 repository base for source bundles.
    pub a2_src_base: PathBuf,
    /// A2 base for native components.
    pub a2_lib_base: PathBuf,
    /// Location of the descriptors driving the packaging.
    pub descriptors_base: PathBuf,
    /// Download cache for non-repository archives.
    pub origin_base: PathBuf,
    /// Download cache for repository artifacts.
    pub maven_base: PathBuf,
    /// Archive URIs keyed by unit directory name.
    pub uris: Headers,
    /// Headers merged beneath every unit's declared properties.
    pub defaults: Headers,
    /// Whether sources are packaged separately.
    pub separate_sources: bool,
    /// Whether categories are processed sequentially.
    pub sequential: bool,
}

impl RunConfig {
    /// Build the run configuration from the environment and the auxiliary
    /// descriptor files at the descriptors root.
    pub fn from_env(a2_base: PathBuf, descriptors_base: PathBuf) -> Result<(Self, Mirrors)> {
        if !descriptors_base.exists() {
            return Err(Error::ConfigError(format!(
                "{} does not exist",
                descriptors_base.display()
            )));
        }
        let separate_sources = env_flag(ENV_SOURCE_BUNDLES);
        if separate_sources {
            info!("Sources will be packaged separately");
        }
        let sequential = env_flag(ENV_SEQUENTIAL);

        let home = dirs::home_dir()
            .ok_or_else(|| Error::ConfigError("Cannot determine home directory".to_string()))?;
        let origin_base = home.join(".cache").join("a2").join("origin");
        let maven_base = home.join(".m2").join("repository");

        let a2_src_base = if separate_sources {
            let name = a2_base
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            a2_base
                .parent()
                .unwrap_or(Path::new("."))
                .join(format!("{}.src", name))
        } else {
            a2_base.clone()
        };
        let a2_lib_base = a2_base.join("lib");

        let uris_path = descriptors_base.join(URIS_PROPERTIES);
        let uris = if uris_path.exists() {
            descriptor::load_properties(&uris_path)?
        } else {
            Headers::new()
        };

        let defaults_path = match std::env::var(ENV_METADATA_DEFAULTS) {
            Ok(p) => PathBuf::from(p),
            Err(_) => descriptors_base.join(DEFAULTS_BND),
        };
        let defaults = if defaults_path.exists() {
            descriptor::load_properties(&defaults_path)?
        } else {
            Headers::new()
        };

        let mirrors = Mirrors::load(&descriptors_base)?;

        Ok((
            Self {
                a2_base,
                a2_src_base,
                a2_lib_base,
                descriptors_base,
                origin_base,
                maven_base,
                uris,
                defaults,
                separate_sources,
                sequential,
            },
            mirrors,
        ))
    }
}
