// src/scheduler.rs

//! Category scheduler
//!
//! Top-level driver: enumerates the distribution units of each category
//! argument and fans out unit processing, either sequentially or as
//! parallel tasks over independent categories, joining before the global
//! license summary is reported.

use crate::analyzer::{DeclaredAnalyzer, MetadataAnalyzer};
use crate::config::RunConfig;
use crate::descriptor::{self, UnitKind};
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::license::LicenseLedger;
use crate::unit::UnitProcessor;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// One failed category, reported after all tasks have joined.
#[derive(Debug)]
pub struct CategoryFailure {
    pub category: PathBuf,
    pub error: Error,
}

/// Repackages categories of distribution units into the A2 repository.
pub struct Repackager {
    cfg: RunConfig,
    downloader: Downloader,
    analyzer: Box<dyn MetadataAnalyzer + Send + Sync>,
    licenses: LicenseLedger,
}

impl Repackager {
    /// Initialize a run rooted at the given output repository and
    /// descriptors directory.
    pub fn new(a2_base: PathBuf, descriptors_base: PathBuf) -> Result<Self> {
        let (cfg, mirrors) = RunConfig::from_env(a2_base, descriptors_base)?;
        let downloader = Downloader::new(cfg.maven_base.clone(), cfg.origin_base.clone(), mirrors)?;
        Ok(Self {
            cfg,
            downloader,
            analyzer: Box::new(DeclaredAnalyzer),
            licenses: LicenseLedger::new(),
        })
    }

    /// Replace the metadata-computation collaborator.
    pub fn with_analyzer(mut self, analyzer: Box<dyn MetadataAnalyzer + Send + Sync>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn sequential(&self) -> bool {
        self.cfg.sequential
    }

    /// Process all categories, returning the failures after every task
    /// has joined. Ordering between categories is not guaranteed in
    /// parallel mode.
    pub fn run(&self, categories: &[PathBuf]) -> Vec<CategoryFailure> {
        for category in categories {
            self.clean_previous_build(category);
        }
        let process = |category: &PathBuf| -> Option<CategoryFailure> {
            match self.process_category(category) {
                Ok(()) => None,
                Err(error) => {
                    error!("Cannot process category {}: {}", category.display(), error);
                    Some(CategoryFailure {
                        category: category.clone(),
                        error,
                    })
                }
            }
        };
        if self.cfg.sequential {
            categories.iter().filter_map(process).collect()
        } else {
            categories.par_iter().filter_map(process).collect()
        }
    }

    /// Deletes working trees remaining from a previous failed build.
    fn clean_previous_build(&self, category: &Path) {
        let output_category = self.cfg.a2_base.join(category);
        if !output_category.exists() {
            return;
        }
        let entries = match std::fs::read_dir(&output_category) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Cannot clean previous build in {}: {}", output_category.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                warn!(
                    "Bundle dir {} already exists, probably from a previous failed build, deleting it...",
                    path.display()
                );
                if let Err(e) = fsutil::delete_directory(&path) {
                    error!("Cannot clean previous build: {}", e);
                }
            }
        }
    }

    /// Process a whole category of distribution units.
    pub fn process_category(&self, category: &Path) -> Result<()> {
        let category_dir = self.cfg.descriptors_base.join(category);
        let processor = UnitProcessor {
            cfg: &self.cfg,
            downloader: &self.downloader,
            analyzer: self.analyzer.as_ref(),
            licenses: &self.licenses,
        };
        for unit in descriptor::enumerate_units(&category_dir)? {
            match unit {
                UnitKind::Standalone(bnd_file) => {
                    processor.process_standalone(category, &bnd_file)?;
                }
                UnitKind::Grouped(du_dir) => {
                    processor.process_grouped(category, &du_dir)?;
                }
                UnitKind::ArchiveBased(du_dir) => {
                    processor.process_archive(category, &du_dir)?;
                }
            }
        }
        Ok(())
    }

    /// The end-of-run license summary table.
    pub fn license_summary(&self) -> String {
        self.licenses.summary()
    }
}
