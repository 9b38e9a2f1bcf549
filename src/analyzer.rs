// src/analyzer.rs

//! External collaborator interfaces
//!
//! The engine treats source compilation and bytecode-level metadata
//! computation as opaque collaborators behind narrow traits. The shipped
//! [`DeclaredAnalyzer`] passes declared headers through with format
//! defaults; a real class-analysis engine plugs in behind
//! [`MetadataAnalyzer`] without touching the pipeline.

use crate::error::Result;
use crate::manifest::{HeaderKind, Headers, MANIFEST_VERSION};
use std::path::{Path, PathBuf};

/// Computes the header set of a unit from its compiled content plus the
/// declared property set. `content` is either a downloaded archive or a
/// merged working tree.
pub trait MetadataAnalyzer: Sync {
    fn analyze(&self, content: &Path, declared: &Headers) -> Result<Headers>;
}

/// One source-root/output-root pair handed to the batch compiler.
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
}

/// Incremental progress reported by the compiler collaborator.
#[derive(Debug, Clone, Copy)]
pub enum CompileProgress {
    Started { units: usize },
    Compiled { done: usize, total: usize },
}

/// Batch source compiler collaborator. Synchronous; reports progress
/// through the callback and success/failure through the result.
pub trait SourceCompiler {
    fn compile(
        &self,
        units: &[CompileUnit],
        classpath: &[PathBuf],
        progress: &mut dyn FnMut(CompileProgress),
    ) -> Result<()>;
}

/// Pass-through analyzer: declared headers become the computed set.
///
/// Only properties whose key starts with an uppercase letter are headers;
/// lowercase keys are analyzer instructions and never reach the manifest.
/// The manifest format headers are defaulted when absent.
pub struct DeclaredAnalyzer;

impl MetadataAnalyzer for DeclaredAnalyzer {
    fn analyze(&self, _content: &Path, declared: &Headers) -> Result<Headers> {
        let mut computed = Headers::new();
        computed.put(MANIFEST_VERSION, "1.0");
        computed.put("Bundle-ManifestVersion", "2");
        for (key, value) in declared.iter() {
            if key.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                computed.put(key, value);
            }
        }
        if let Some(name) = HeaderKind::BundleSymbolicName.get(&computed).map(str::to_string) {
            // identity without directives
            if let Some(plain) = name.split(';').next() {
                computed.put(HeaderKind::BundleSymbolicName.name(), plain.trim());
            }
        }
        Ok(computed)
    }
}
