// src/manifest.rs

//! Manifest header block handling
//!
//! [`Headers`] is the ordered string mapping used for both manifest header
//! blocks and descriptor property sets, read and written in jar manifest
//! format (72-byte line wrapping, CRLF, continuation lines).
//!
//! [`HeaderKind`] is the closed set of header kinds the engine knows about,
//! each exposing typed get/put accessors over a [`Headers`] value, so the
//! same accessor works against a manifest or a descriptor property set.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Header naming the manifest format version; always written first.
pub const MANIFEST_VERSION: &str = "Manifest-Version";

/// Location of the header block inside an archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// An ordered mapping of header name to string value.
///
/// Iteration order is insertion order; `Manifest-Version` is emitted first
/// on write regardless of when it was inserted, matching the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a value, returning the previous one if any.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        for (k, v) in &mut self.entries {
            if *k == key {
                return Some(std::mem::replace(v, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Parse a header block from raw bytes. Accepts LF and CRLF line ends;
    /// a leading space continues the previous header value; a blank line
    /// ends the main section (per-entry sections are ignored).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let mut headers = Headers::new();
        let mut current: Option<(String, String)> = None;
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break; // end of main section
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                match &mut current {
                    Some((_, v)) => v.push_str(continuation),
                    None => {
                        return Err(Error::ManifestError(
                            "Continuation line without a header".to_string(),
                        ))
                    }
                }
                continue;
            }
            if let Some((k, v)) = current.take() {
                headers.put(k, v);
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                Error::ManifestError(format!("Malformed header line '{}'", line))
            })?;
            current = Some((key.trim().to_string(), value.trim_start().to_string()));
        }
        if let Some((k, v)) = current.take() {
            headers.put(k, v);
        }
        Ok(headers)
    }

    /// Read a header block from a file on disk.
    pub fn read_from(path: &Path) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)
            .map_err(|e| Error::IoError(format!("Cannot open {}: {}", path.display(), e)))?
            .read_to_end(&mut bytes)?;
        Self::parse(&bytes)
    }

    /// Serialize to jar manifest wire format: `Manifest-Version` first,
    /// then insertion order, each header wrapped at 72 bytes per line with
    /// single-space continuations, CRLF line ends, trailing blank line.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(v) = self.get(MANIFEST_VERSION) {
            write_header(&mut out, MANIFEST_VERSION, v);
        }
        for (k, v) in self.iter() {
            if k != MANIFEST_VERSION {
                write_header(&mut out, k, v);
            }
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Write the header block to a file, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
        }
        let mut file = File::create(path)
            .map_err(|e| Error::IoError(format!("Cannot create {}: {}", path.display(), e)))?;
        file.write_all(&self.to_bytes())?;
        Ok(())
    }
}

/// Wrap one `Key: value` header at 72 bytes per line, continuation lines
/// prefixed with a single space. Splits on character boundaries so
/// multi-byte values stay valid.
fn write_header(out: &mut Vec<u8>, key: &str, value: &str) {
    const MAX_LINE: usize = 72;
    let mut line_len = 0;
    for ch in key.chars() {
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        line_len += ch.len_utf8();
    }
    out.extend_from_slice(b": ");
    line_len += 2;
    for ch in value.chars() {
        let ch_len = ch.len_utf8();
        if line_len + ch_len > MAX_LINE {
            out.extend_from_slice(b"\r\n ");
            line_len = 1;
        }
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        line_len += ch_len;
    }
    out.extend_from_slice(b"\r\n");
}

/// The closed set of header kinds the engine reads or writes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Unit symbolic name (identity header, may carry directives).
    BundleSymbolicName,
    /// Unit version.
    BundleVersion,
    /// License name/URL header, used when the SPDX identifier is non-standard.
    BundleLicense,
    /// Exported packages expression.
    ExportPackage,
    /// Imported packages expression.
    ImportPackage,
    /// Required bundles expression.
    RequireBundle,
    /// Path to an embedded jar.
    BundleClasspath,
    /// Java module name, forced to the unit name.
    AutomaticModuleName,
    /// Source-bundle back reference to the binary unit.
    EclipseSourceBundle,
    /// SPDX license identifier. See <https://spdx.org/licenses/>.
    SpdxLicenseIdentifier,
    /// Repository coordinates of the origin, possibly version-only in
    /// common descriptors.
    OriginM2,
    /// List of repository coordinates merged into one unit.
    OriginM2Merge,
    /// Repository base override, if not the default one.
    OriginM2Repo,
    /// Skip the metadata-computation collaborator for this unit; declared
    /// headers are kept untouched.
    OriginNoMetadataGeneration,
    /// Do not modify the original archive at all (required by some
    /// proprietary licenses).
    OriginDoNotModify,
    /// Non-repository origin URI of the component.
    OriginUri,
    /// Non-repository origin URI of the component's sources.
    OriginSourcesUri,
}

impl HeaderKind {
    /// The wire name of this header.
    pub const fn name(self) -> &'static str {
        match self {
            HeaderKind::BundleSymbolicName => "Bundle-SymbolicName",
            HeaderKind::BundleVersion => "Bundle-Version",
            HeaderKind::BundleLicense => "Bundle-License",
            HeaderKind::ExportPackage => "Export-Package",
            HeaderKind::ImportPackage => "Import-Package",
            HeaderKind::RequireBundle => "Require-Bundle",
            HeaderKind::BundleClasspath => "Bundle-Classpath",
            HeaderKind::AutomaticModuleName => "Automatic-Module-Name",
            HeaderKind::EclipseSourceBundle => "Eclipse-SourceBundle",
            HeaderKind::SpdxLicenseIdentifier => "SPDX-License-Identifier",
            HeaderKind::OriginM2 => "A2-Origin-M2",
            HeaderKind::OriginM2Merge => "A2-Origin-M2-Merge",
            HeaderKind::OriginM2Repo => "A2-Origin-M2-Repo",
            HeaderKind::OriginNoMetadataGeneration => "A2-Origin-NoMetadataGeneration",
            HeaderKind::OriginDoNotModify => "A2-Origin-Do-Not-Modify",
            HeaderKind::OriginUri => "A2-Origin-URI",
            HeaderKind::OriginSourcesUri => "A2-Origin-Sources-URI",
        }
    }

    /// Get this header's value from a manifest or a descriptor property set.
    pub fn get(self, map: &Headers) -> Option<&str> {
        map.get(self.name())
    }

    /// Put this header's value into a manifest or a descriptor property set.
    pub fn put(self, map: &mut Headers, value: impl Into<String>) -> Option<String> {
        map.put(self.name(), value)
    }

    /// Whether this header holds "true" in the given mapping.
    pub fn is_set(self, map: &Headers) -> bool {
        self.get(map)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_preserves_order() {
        let mut h = Headers::new();
        h.put("B", "2");
        h.put("A", "1");
        h.put("C", "3");
        let keys: Vec<&str> = h.keys().collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
        assert_eq!(h.get("A"), Some("1"));
    }

    #[test]
    fn test_put_replaces_in_place() {
        let mut h = Headers::new();
        h.put("A", "1");
        let previous = h.put("A", "2");
        assert_eq!(previous, Some("1".to_string()));
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("A"), Some("2"));
    }

    #[test]
    fn test_manifest_version_written_first() {
        let mut h = Headers::new();
        h.put("Bundle-SymbolicName", "org.example.widget");
        h.put(MANIFEST_VERSION, "1.0");
        let text = String::from_utf8(h.to_bytes()).unwrap();
        assert!(text.starts_with("Manifest-Version: 1.0\r\n"));
    }

    #[test]
    fn test_round_trip_long_value() {
        let mut h = Headers::new();
        h.put(MANIFEST_VERSION, "1.0");
        let long: String = (0..40).map(|i| format!("org.example.pkg{};", i)).collect();
        h.put("Export-Package", &long);
        let parsed = Headers::parse(&h.to_bytes()).unwrap();
        assert_eq!(parsed.get("Export-Package"), Some(long.as_str()));
    }

    #[test]
    fn test_wrapped_lines_stay_within_limit() {
        let mut h = Headers::new();
        let long = "x".repeat(500);
        h.put("Import-Package", &long);
        let bytes = h.to_bytes();
        for line in String::from_utf8(bytes).unwrap().split("\r\n") {
            assert!(line.len() <= 72, "line too long: {} bytes", line.len());
        }
    }

    #[test]
    fn test_parse_lf_only() {
        let parsed = Headers::parse(b"Manifest-Version: 1.0\nBundle-Version: 2.3.1\n\n").unwrap();
        assert_eq!(parsed.get("Bundle-Version"), Some("2.3.1"));
    }

    #[test]
    fn test_parse_stops_at_blank_line() {
        let bytes = b"Manifest-Version: 1.0\r\n\r\nName: foo/Bar.class\r\nSHA-256-Digest: xyz\r\n";
        let parsed = Headers::parse(bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(!parsed.contains("Name"));
    }

    #[test]
    fn test_header_kind_accessors() {
        let mut props = Headers::new();
        HeaderKind::BundleSymbolicName.put(&mut props, "org.example.widget");
        assert_eq!(
            HeaderKind::BundleSymbolicName.get(&props),
            Some("org.example.widget")
        );
        assert!(!HeaderKind::OriginDoNotModify.is_set(&props));
        HeaderKind::OriginDoNotModify.put(&mut props, "TRUE");
        assert!(HeaderKind::OriginDoNotModify.is_set(&props));
    }
}
