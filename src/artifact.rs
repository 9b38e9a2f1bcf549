// src/artifact.rs

//! Artifact identity types
//!
//! Value types identifying a component by (category, name, version) and
//! deriving the two-segment "branch" (major.minor) used for directory and
//! archive naming in the A2 repository.

use crate::error::{Error, Result};
use std::fmt;

/// Derive the two-segment branch ("major.minor") from a version string.
///
/// Versions with fewer than two dot-separated components cannot name a
/// branch directory and are rejected.
pub fn version_branch(version: &str) -> Result<String> {
    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) if !major.is_empty() && !minor.is_empty() => {
            Ok(format!("{}.{}", major, minor))
        }
        _ => Err(Error::InvalidBranch {
            version: version.to_string(),
        }),
    }
}

/// A component name together with its full version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameVersion {
    pub name: String,
    pub version: String,
}

impl NameVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse a source-bundle back reference of the form
    /// `name;version="1.2.3"` (directive order after the name is ignored).
    pub fn parse_source_bundle_ref(value: &str) -> Result<Self> {
        let mut parts = value.split(';');
        let name = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::ConfigError(format!("Empty source bundle reference '{}'", value)))?;
        for directive in parts {
            let directive = directive.trim();
            if let Some(v) = directive.strip_prefix("version=") {
                let v = v.trim_matches('"');
                return Ok(Self::new(name, v));
            }
        }
        Err(Error::ConfigError(format!(
            "No version directive in source bundle reference '{}'",
            value
        )))
    }

    /// The unit's branch, `<major>.<minor>` of the version.
    pub fn branch(&self) -> Result<String> {
        version_branch(&self.version)
    }

    /// Directory name of the unit working tree, `<name>.<branch>`.
    pub fn dir_name(&self) -> Result<String> {
        Ok(format!("{}.{}", self.name, self.branch()?))
    }
}

impl fmt::Display for NameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Identity of a repository artifact: group (category), name, optional
/// version and classifier.
///
/// The version may be back-filled once from a shared common version before
/// first use; everything else is immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactId {
    pub group: String,
    pub name: String,
    version: Option<String>,
    classifier: Option<String>,
}

impl ArtifactId {
    /// Parse colon-joined coordinates `group:name[:version]`.
    pub fn parse(coordinates: &str) -> Result<Self> {
        let mut parts = coordinates.split(':');
        let group = parts.next().map(str::trim).unwrap_or("");
        let name = parts.next().map(str::trim).unwrap_or("");
        if group.is_empty() || name.is_empty() {
            return Err(Error::ConfigError(format!(
                "Invalid artifact coordinates '{}'",
                coordinates
            )));
        }
        let version = parts
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version,
            classifier: None,
        })
    }

    /// Same identity with a classifier (e.g. "sources").
    pub fn with_classifier(&self, classifier: &str) -> Self {
        let mut a = self.clone();
        a.classifier = Some(classifier.to_string());
        a
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Back-fill the version from a shared common version. Only allowed
    /// while no version is set.
    pub fn set_version(&mut self, version: &str) {
        debug_assert!(self.version.is_none());
        self.version = Some(version.to_string());
    }

    pub fn require_version(&self) -> Result<&str> {
        self.version.as_deref().ok_or_else(|| {
            Error::ConfigError(format!("No version set for artifact {}:{}", self.group, self.name))
        })
    }

    /// The two-segment branch of this artifact's version.
    pub fn branch(&self) -> Result<String> {
        version_branch(self.require_version()?)
    }

    /// Coordinates string `group:name[:version]`.
    pub fn coordinates(&self) -> String {
        match &self.version {
            Some(v) => format!("{}:{}:{}", self.group, self.name, v),
            None => format!("{}:{}", self.group, self.name),
        }
    }

    /// Conventional repository file name,
    /// `name-version[-classifier].jar`.
    pub fn file_name(&self) -> Result<String> {
        let version = self.require_version()?;
        let classifier = match &self.classifier {
            Some(c) => format!("-{}", c),
            None => String::new(),
        };
        Ok(format!("{}-{}{}.jar", self.name, version, classifier))
    }

    /// Conventional repository-relative path,
    /// `group/path/name/version/name-version[-classifier].jar`.
    pub fn repo_path(&self) -> Result<String> {
        Ok(format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.require_version()?,
            self.file_name()?
        ))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coordinates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_two_segments() {
        assert_eq!(version_branch("1.2").unwrap(), "1.2");
    }

    #[test]
    fn test_branch_many_segments() {
        assert_eq!(version_branch("3.9.500.v20230101").unwrap(), "3.9");
    }

    #[test]
    fn test_branch_single_segment_fails() {
        let err = version_branch("4").unwrap_err();
        match err {
            Error::InvalidBranch { version } => assert_eq!(version, "4"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_branch_trailing_dot_fails() {
        assert!(version_branch("4.").is_err());
    }

    #[test]
    fn test_parse_full_coordinates() {
        let a = ArtifactId::parse("org.example:widget:2.3.1").unwrap();
        assert_eq!(a.group, "org.example");
        assert_eq!(a.name, "widget");
        assert_eq!(a.version(), Some("2.3.1"));
        assert_eq!(a.coordinates(), "org.example:widget:2.3.1");
    }

    #[test]
    fn test_parse_versionless_coordinates() {
        let mut a = ArtifactId::parse("org.example:widget").unwrap();
        assert_eq!(a.version(), None);
        a.set_version("1.0.0");
        assert_eq!(a.version(), Some("1.0.0"));
        assert_eq!(a.branch().unwrap(), "1.0");
    }

    #[test]
    fn test_parse_invalid_coordinates() {
        assert!(ArtifactId::parse("justonename").is_err());
        assert!(ArtifactId::parse(":noname").is_err());
    }

    #[test]
    fn test_repo_path_with_classifier() {
        let a = ArtifactId::parse("org.example:widget:2.3.1")
            .unwrap()
            .with_classifier("sources");
        assert_eq!(
            a.repo_path().unwrap(),
            "org/example/widget/2.3.1/widget-2.3.1-sources.jar"
        );
    }

    #[test]
    fn test_source_bundle_ref() {
        let nv = NameVersion::parse_source_bundle_ref("org.example.widget;version=\"1.4.2\"").unwrap();
        assert_eq!(nv.name, "org.example.widget");
        assert_eq!(nv.version, "1.4.2");
        assert_eq!(nv.dir_name().unwrap(), "org.example.widget.1.4");
    }

    #[test]
    fn test_source_bundle_ref_missing_version() {
        assert!(NameVersion::parse_source_bundle_ref("org.example.widget").is_err());
    }
}
