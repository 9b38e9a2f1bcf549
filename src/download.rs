// src/download.rs

//! Origin resolver and downloader
//!
//! Turns an artifact identity or an explicit URI into a local, readable
//! file. Downloads go through a single global critical section so that
//! parallel categories never race to write the same destination, and a
//! destination that already exists is returned without refetching (cache
//! content is immutable).

use crate::artifact::ArtifactId;
use crate::descriptor::Mirrors;
use crate::error::{Error, Result};
use crate::manifest::{HeaderKind, Headers};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default repository base for artifact-convention downloads.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// Timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves artifact identities and archive URIs to cached local files.
pub struct Downloader {
    client: Client,
    /// Serializes the whole check-create-fetch sequence.
    fetch_lock: Mutex<()>,
    maven_base: PathBuf,
    origin_base: PathBuf,
    mirrors: Mirrors,
}

impl Downloader {
    pub fn new(maven_base: PathBuf, origin_base: PathBuf, mirrors: Mirrors) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("Cannot create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            fetch_lock: Mutex::new(()),
            maven_base,
            origin_base,
            mirrors,
        })
    }

    /// Conventional repository URL of an artifact:
    /// `base/group/path/name/version/name-version[-classifier].jar`.
    pub fn artifact_url(repo_base: Option<&str>, artifact: &ArtifactId) -> Result<String> {
        let base = repo_base.unwrap_or(MAVEN_CENTRAL);
        let sep = if base.ends_with('/') { "" } else { "/" };
        Ok(format!("{}{}{}", base, sep, artifact.repo_path()?))
    }

    /// Resolve and download a repository artifact, honoring the
    /// descriptor's URI and repository-base overrides.
    pub fn maven_artifact(&self, props: &Headers, artifact: &ArtifactId) -> Result<PathBuf> {
        let uri = match HeaderKind::OriginUri.get(props) {
            Some(uri) => uri.to_string(),
            None => Self::artifact_url(HeaderKind::OriginM2Repo.get(props), artifact)?,
        };
        self.fetch(&uri, &self.maven_base, Some(artifact.repo_path()?))
    }

    /// Resolve and download the sources companion of an artifact. The
    /// caller decides whether a failure is fatal; for companion sources it
    /// is not.
    pub fn maven_sources(&self, props: &Headers, artifact: &ArtifactId) -> Result<PathBuf> {
        let sources = artifact.with_classifier("sources");
        let uri = match HeaderKind::OriginSourcesUri.get(props) {
            Some(uri) => uri.to_string(),
            None => Self::artifact_url(HeaderKind::OriginM2Repo.get(props), &sources)?,
        };
        self.fetch(&uri, &self.maven_base, Some(sources.repo_path()?))
    }

    /// Download an archive URI into the origin cache, rewriting it through
    /// the mirror table when a prefix matches. Mirrors are tried in order,
    /// falling through on a not-found; exhausting all of them is fatal.
    pub fn archive(&self, uri: &str) -> Result<PathBuf> {
        let Some((prefix, bases)) = self.mirrors.candidates(uri) else {
            return match self.fetch(uri, &self.origin_base, None) {
                Err(Error::NotFoundError(_)) => {
                    Err(Error::NotFoundError(format!("Cannot find {}", uri)))
                }
                other => other,
            };
        };
        let relative = &uri[prefix.len()..];
        for base in bases {
            let candidate = format!("{}{}", base, relative);
            match self.fetch(&candidate, &self.origin_base, None) {
                Ok(path) => return Ok(path),
                Err(Error::NotFoundError(_)) => {
                    warn!("Cannot download {}, trying another mirror", candidate);
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::NotFoundError(format!("Cannot find {}", uri)))
    }

    /// Effectively download. The whole sequence runs under the global
    /// fetch lock in order to avoid downloading twice in parallel.
    fn fetch(&self, uri: &str, dir: &Path, name: Option<String>) -> Result<PathBuf> {
        let name = match name {
            Some(n) => n,
            None => derive_archive_name(uri)?,
        };
        let dest = dir.join(&name);
        if dest.exists() {
            trace!("File {} already exists for {}, not downloading again", dest.display(), uri);
            return Ok(dest);
        }

        let _guard = self
            .fetch_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if dest.exists() {
            return Ok(dest);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Cannot create {}: {}", parent.display(), e)))?;
        }

        let tmp = dest.with_extension("tmp");
        if let Some(local) = uri.strip_prefix("file://") {
            let source = Path::new(local);
            if !source.exists() {
                return Err(Error::NotFoundError(uri.to_string()));
            }
            fs::copy(source, &tmp)
                .map_err(|e| Error::DownloadError(format!("Cannot copy {}: {}", uri, e)))?;
        } else {
            self.http_fetch(uri, &tmp)?;
        }
        fs::rename(&tmp, &dest).map_err(|e| {
            Error::IoError(format!(
                "Cannot move {} to {}: {}",
                tmp.display(),
                dest.display(),
                e
            ))
        })?;
        debug!("Downloaded {} from {}", dest.display(), uri);
        Ok(dest)
    }

    fn http_fetch(&self, uri: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .client
            .get(uri)
            .send()
            .map_err(|e| Error::DownloadError(format!("Cannot fetch {}: {}", uri, e)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFoundError(uri.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                uri
            )));
        }
        let mut file = File::create(dest)
            .map_err(|e| Error::IoError(format!("Cannot create {}: {}", dest.display(), e)))?;
        io::copy(&mut response, &mut file)
            .map_err(|e| Error::DownloadError(format!("Cannot write download data: {}", e)))?;
        Ok(())
    }
}

/// Cache file name for an archive URI: the last path segment, prefixed
/// with its parent segment when there is one, so that archives with a
/// fixed file name stay distinct across releases.
fn derive_archive_name(uri: &str) -> Result<String> {
    let url = url::Url::parse(uri)
        .map_err(|e| Error::DownloadError(format!("Invalid URI {}: {}", uri, e)))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [] => Err(Error::DownloadError(format!(
            "Cannot derive a file name from {}",
            uri
        ))),
        [only] => Ok((*only).to_string()),
        [.., parent, last] => Ok(format!("{}-{}", parent, last)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn file_uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    fn downloader(cache: &Path) -> Downloader {
        Downloader::new(
            cache.join("m2"),
            cache.join("origin"),
            Mirrors::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_artifact_url_convention() {
        let artifact = ArtifactId::parse("org.example:widget:2.3.1").unwrap();
        assert_eq!(
            Downloader::artifact_url(None, &artifact).unwrap(),
            "https://repo1.maven.org/maven2/org/example/widget/2.3.1/widget-2.3.1.jar"
        );
        assert_eq!(
            Downloader::artifact_url(Some("https://repo.example.org/releases"), &artifact).unwrap(),
            "https://repo.example.org/releases/org/example/widget/2.3.1/widget-2.3.1.jar"
        );
    }

    #[test]
    fn test_idempotent_download() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("payload").join("widget-2.3.1.jar");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"original").unwrap();

        let dl = downloader(dir.path());
        let artifact = ArtifactId::parse("org.example:widget:2.3.1").unwrap();
        let mut props = Headers::new();
        HeaderKind::OriginUri.put(&mut props, file_uri(&source));

        let first = dl.maven_artifact(&props, &artifact).unwrap();
        assert_eq!(fs::read(&first).unwrap(), b"original");

        // mutate the cached copy; a second resolution must not refetch
        fs::write(&first, b"mutated").unwrap();
        let second = dl.maven_artifact(&props, &artifact).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(&second).unwrap(), b"mutated");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(dir.path());
        let missing = dir.path().join("absent.zip");
        let err = dl.archive(&file_uri(&missing)).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
    }

    #[test]
    fn test_mirror_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("mirror-b").join("release").join("sdk.zip");
        fs::create_dir_all(good.parent().unwrap()).unwrap();
        fs::write(&good, b"archive").unwrap();

        let mirrors = Mirrors::with_entry(
            "https://downloads.example.org",
            vec![
                format!("file://{}", dir.path().join("mirror-a").display()),
                format!("file://{}", dir.path().join("mirror-b").display()),
            ],
        );
        let dl = Downloader::new(dir.path().join("m2"), dir.path().join("origin"), mirrors).unwrap();
        let path = dl
            .archive("https://downloads.example.org/release/sdk.zip")
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"archive");
    }

    #[test]
    fn test_all_mirrors_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mirrors = Mirrors::with_entry(
            "https://downloads.example.org",
            vec![format!("file://{}", dir.path().join("mirror-a").display())],
        );
        let dl = Downloader::new(dir.path().join("m2"), dir.path().join("origin"), mirrors).unwrap();
        let err = dl
            .archive("https://downloads.example.org/release/sdk.zip")
            .unwrap_err();
        match err {
            Error::NotFoundError(msg) => {
                assert!(msg.contains("https://downloads.example.org/release/sdk.zip"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_derive_archive_name() {
        assert_eq!(
            derive_archive_name("https://downloads.example.org/4.30/sdk.zip").unwrap(),
            "4.30-sdk.zip"
        );
        assert_eq!(derive_archive_name("file:///sdk.zip").unwrap(), "sdk.zip");
    }
}
