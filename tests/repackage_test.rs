// tests/repackage_test.rs

//! Integration tests for the repackaging pipeline
//!
//! These tests verify end-to-end unit processing across modules, driving
//! the processor against file-based fixture repositories.

use a2_repack::analyzer::DeclaredAnalyzer;
use a2_repack::descriptor::Mirrors;
use a2_repack::manifest::{Headers, MANIFEST_PATH};
use a2_repack::unit::UnitProcessor;
use a2_repack::{ArtifactId, Downloader, LicenseLedger, RunConfig};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

struct TestRun {
    _root: tempfile::TempDir,
    cfg: RunConfig,
    downloader: Downloader,
    licenses: LicenseLedger,
    m2_repo: PathBuf,
    descriptors: PathBuf,
}

impl TestRun {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let a2_base = root.path().join("a2");
        let descriptors = root.path().join("descriptors");
        let m2_repo = root.path().join("remote-repo");
        fs::create_dir_all(&descriptors).unwrap();
        fs::create_dir_all(&m2_repo).unwrap();
        let cfg = RunConfig {
            a2_base: a2_base.clone(),
            a2_src_base: a2_base.clone(),
            a2_lib_base: a2_base.join("lib"),
            descriptors_base: descriptors.clone(),
            origin_base: root.path().join("cache/origin"),
            maven_base: root.path().join("cache/m2"),
            uris: Headers::new(),
            defaults: Headers::new(),
            separate_sources: false,
            sequential: true,
        };
        let downloader = Downloader::new(
            cfg.maven_base.clone(),
            cfg.origin_base.clone(),
            Mirrors::default(),
        )
        .unwrap();
        Self {
            _root: root,
            cfg,
            downloader,
            licenses: LicenseLedger::new(),
            m2_repo,
            descriptors,
        }
    }

    fn processor(&self) -> UnitProcessor<'_> {
        UnitProcessor {
            cfg: &self.cfg,
            downloader: &self.downloader,
            analyzer: &DeclaredAnalyzer,
            licenses: &self.licenses,
        }
    }

    fn repo_uri(&self) -> String {
        format!("file://{}", self.m2_repo.display())
    }

    /// Lay an artifact out in the fixture repository at its conventional path.
    fn install_artifact(&self, coordinates: &str, entries: &[(&str, &[u8])]) {
        let artifact = ArtifactId::parse(coordinates).unwrap();
        let path = self.m2_repo.join(artifact.repo_path().unwrap());
        write_jar(&path, entries);
    }
}

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

fn read_entry(jar: &Path, entry: &str) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(jar).unwrap()).unwrap();
    let mut bytes = Vec::new();
    let result = match archive.by_name(entry) {
        Ok(mut e) => {
            e.read_to_end(&mut bytes).unwrap();
            Some(bytes)
        }
        Err(_) => None,
    };
    result
}

fn read_manifest(jar: &Path) -> Headers {
    Headers::parse(&read_entry(jar, MANIFEST_PATH).unwrap()).unwrap()
}

#[test]
fn test_standalone_unit_end_to_end() {
    let run = TestRun::new();
    run.install_artifact(
        "org.example:widget:1.2.3",
        &[("org/example/Widget.class", b"code")],
    );
    // sources companion
    let sources = ArtifactId::parse("org.example:widget:1.2.3")
        .unwrap()
        .with_classifier("sources");
    write_jar(
        &run.m2_repo.join(sources.repo_path().unwrap()),
        &[("org/example/Widget.java", b"class Widget {}")],
    );

    let category_dir = run.descriptors.join("org.example");
    fs::create_dir_all(&category_dir).unwrap();
    let bnd = category_dir.join("org.example.widget.bnd");
    fs::write(
        &bnd,
        format!(
            "A2-Origin-M2: org.example:widget:1.2.3\nA2-Origin-M2-Repo: {}\nSPDX-License-Identifier: EPL-2.0\n",
            run.repo_uri()
        ),
    )
    .unwrap();

    run.processor()
        .process_standalone(Path::new("org.example"), &bnd)
        .unwrap();

    let jar = run.cfg.a2_base.join("org.example/org.example.widget.1.2.jar");
    assert!(jar.exists(), "expected {} to exist", jar.display());
    // no working tree is left behind
    assert!(!run.cfg.a2_base.join("org.example/org.example.widget.1.2").exists());

    let manifest = read_manifest(&jar);
    // identity is forced from the descriptor file stem
    assert_eq!(manifest.get("Bundle-SymbolicName"), Some("org.example.widget"));
    assert_eq!(manifest.get("Automatic-Module-Name"), Some("org.example.widget"));
    assert_eq!(manifest.get("Bundle-Version"), Some("1.2.3"));
    // no housekeeping headers
    assert_eq!(manifest.get("Created-By"), None);
    assert_eq!(manifest.get("Tool"), None);
    assert_eq!(manifest.get("Bnd-LastModified"), None);

    // content, embedded sources, provenance notice
    assert!(read_entry(&jar, "org/example/Widget.class").is_some());
    assert!(read_entry(&jar, "OSGI-OPT/src/org/example/Widget.java").is_some());
    let notice = read_entry(&jar, "README.repackaged").unwrap();
    let notice = String::from_utf8(notice).unwrap();
    assert!(notice.contains("repackaging of a third party component"));
    assert!(notice.contains("SPDX-Identifier: EPL-2.0"));

    assert!(run.licenses.summary().contains("EPL-2.0\t\torg.example/org.example.widget.1.2"));
}

#[test]
fn test_missing_sources_are_not_fatal() {
    let run = TestRun::new();
    run.install_artifact(
        "org.example:nosrc:2.0.0",
        &[("org/example/NoSrc.class", b"code")],
    );

    let category_dir = run.descriptors.join("org.example");
    fs::create_dir_all(&category_dir).unwrap();
    let bnd = category_dir.join("org.example.nosrc.bnd");
    fs::write(
        &bnd,
        format!(
            "A2-Origin-M2: org.example:nosrc:2.0.0\nA2-Origin-M2-Repo: {}\nSPDX-License-Identifier: MIT\n",
            run.repo_uri()
        ),
    )
    .unwrap();

    run.processor()
        .process_standalone(Path::new("org.example"), &bnd)
        .unwrap();
    assert!(run.cfg.a2_base.join("org.example/org.example.nosrc.2.0.jar").exists());
}

#[test]
fn test_missing_primary_artifact_is_fatal() {
    let run = TestRun::new();
    let category_dir = run.descriptors.join("org.example");
    fs::create_dir_all(&category_dir).unwrap();
    let bnd = category_dir.join("org.example.absent.bnd");
    fs::write(
        &bnd,
        format!(
            "A2-Origin-M2: org.example:absent:1.0.0\nA2-Origin-M2-Repo: {}\n",
            run.repo_uri()
        ),
    )
    .unwrap();

    let err = run
        .processor()
        .process_standalone(Path::new("org.example"), &bnd)
        .unwrap_err();
    assert!(err.to_string().contains("org.example.absent.bnd"));
}

#[test]
fn test_license_precedence_end_to_end() {
    let run = TestRun::new();
    let original_manifest =
        b"Manifest-Version: 1.0\r\nSPDX-License-Identifier: Apache-2.0\r\n\r\n";
    run.install_artifact(
        "org.example:licensed:3.1.0",
        &[
            ("META-INF/MANIFEST.MF", original_manifest.as_slice()),
            ("org/example/Licensed.class", b"code"),
        ],
    );

    let category_dir = run.descriptors.join("org.example");
    fs::create_dir_all(&category_dir).unwrap();
    let bnd = category_dir.join("org.example.licensed.bnd");
    fs::write(
        &bnd,
        format!(
            "A2-Origin-M2: org.example:licensed:3.1.0\nA2-Origin-M2-Repo: {}\nSPDX-License-Identifier: MIT\n",
            run.repo_uri()
        ),
    )
    .unwrap();

    run.processor()
        .process_standalone(Path::new("org.example"), &bnd)
        .unwrap();

    let jar = run.cfg.a2_base.join("org.example/org.example.licensed.3.1.jar");
    let manifest = read_manifest(&jar);
    // the pre-existing license identifier always wins
    assert_eq!(manifest.get("SPDX-License-Identifier"), Some("Apache-2.0"));
    assert!(run.licenses.summary().contains("Apache-2.0"));
    // the original header block is preserved as a side artifact
    assert!(read_entry(&jar, "A2-ORIGIN/org.example/licensed/MANIFEST.MF").is_some());
}

#[test]
fn test_grouped_merge_end_to_end() {
    let run = TestRun::new();
    for (artifact, spi_impl) in [
        ("org.example:one:1.2.3", "com.one.Impl"),
        ("org.example:two:1.2.3", "com.two.Impl"),
        ("org.example:three:1.2.3", "com.three.Impl"),
    ] {
        let class_entry = format!(
            "org/example/{}/Impl.class",
            artifact.split(':').nth(1).unwrap()
        );
        run.install_artifact(
            artifact,
            &[
                ("META-INF/services/org.example.Spi", spi_impl.as_bytes()),
                (class_entry.as_str(), b"code"),
            ],
        );
    }

    let category_dir = run.descriptors.join("org.example");
    let du_dir = category_dir.join("bundle");
    fs::create_dir_all(&du_dir).unwrap();
    fs::write(
        du_dir.join("common.bnd"),
        format!(
            "A2-Origin-M2: :1.2.3\nA2-Origin-M2-Repo: {}\nSPDX-License-Identifier: Apache-2.0\n",
            run.repo_uri()
        ),
    )
    .unwrap();
    fs::write(
        du_dir.join("merge.bnd"),
        "Bundle-SymbolicName: org.example.bundle\nA2-Origin-M2-Merge: org.example:one,org.example:two,org.example:three\n",
    )
    .unwrap();

    run.processor()
        .process_grouped(Path::new("org.example"), &du_dir)
        .unwrap();

    let jar = run.cfg.a2_base.join("org.example/org.example.bundle.1.2.jar");
    assert!(jar.exists());

    // the three service registrations are newline-joined in merge order
    let services = read_entry(&jar, "META-INF/services/org.example.Spi").unwrap();
    let services = String::from_utf8(services).unwrap();
    assert_eq!(services, "com.one.Impl\ncom.two.Impl\ncom.three.Impl");

    // the change log records one modification per appending artifact
    let changes = String::from_utf8(read_entry(&jar, "A2-ORIGIN/changes").unwrap()).unwrap();
    let modified: Vec<&str> = changes
        .lines()
        .filter(|l| l.starts_with("- Modified META-INF/services/org.example.Spi"))
        .collect();
    assert_eq!(modified.len(), 2, "changes were:\n{}", changes);
    assert!(changes.contains("- Added binary content of org.example:one:1.2.3."));

    let manifest = read_manifest(&jar);
    assert_eq!(manifest.get("Bundle-SymbolicName"), Some("org.example.bundle"));
    assert_eq!(manifest.get("Bundle-Version"), Some("1.2.3"));
    assert_eq!(
        manifest.get("A2-Origin-M2"),
        Some("org.example:one:1.2.3,org.example:two:1.2.3,org.example:three:1.2.3")
    );

    let notice = String::from_utf8(read_entry(&jar, "README.repackaged").unwrap()).unwrap();
    assert!(notice.contains("merging of third party components"));
}

#[test]
fn test_grouped_singles_share_common_version() {
    let run = TestRun::new();
    run.install_artifact("org.example:alpha:4.5.6", &[("org/example/A.class", b"a")]);
    run.install_artifact("org.example:beta:4.5.6", &[("org/example/B.class", b"b")]);

    let category_dir = run.descriptors.join("org.example");
    let du_dir = category_dir.join("suite");
    fs::create_dir_all(&du_dir).unwrap();
    fs::write(
        du_dir.join("common.bnd"),
        format!(
            "A2-Origin-M2: :4.5.6\nA2-Origin-M2-Repo: {}\nSPDX-License-Identifier: MIT\n",
            run.repo_uri()
        ),
    )
    .unwrap();
    fs::write(
        du_dir.join("org.example.alpha.bnd"),
        "A2-Origin-M2: org.example:alpha\n",
    )
    .unwrap();
    fs::write(
        du_dir.join("org.example.beta.bnd"),
        "A2-Origin-M2: org.example:beta\n",
    )
    .unwrap();

    run.processor()
        .process_grouped(Path::new("org.example"), &du_dir)
        .unwrap();

    assert!(run.cfg.a2_base.join("org.example/org.example.alpha.4.5.jar").exists());
    assert!(run.cfg.a2_base.join("org.example/org.example.beta.4.5.jar").exists());
}

fn stage_archive_unit(run: &TestRun) -> PathBuf {
    // inner binary bundle with its own manifest
    let inner_manifest = "Manifest-Version: 1.0\r\nBundle-SymbolicName: org.example.core;singleton:=true\r\nBundle-Version: 1.2.3\r\nCreated-By: Example Build\r\n\r\n";
    let inner_jar_path = run._root.path().join("scratch/org.example.core_1.2.3.jar");
    write_jar(
        &inner_jar_path,
        &[
            ("META-INF/MANIFEST.MF", inner_manifest.as_bytes()),
            ("org/example/Core.class", b"code"),
        ],
    );
    // inner source bundle referencing the binary one
    let source_manifest = "Manifest-Version: 1.0\r\nEclipse-SourceBundle: org.example.core;version=\"1.2.3\"\r\n\r\n";
    let inner_src_path = run
        ._root
        .path()
        .join("scratch/org.example.core.source_1.2.3.jar");
    write_jar(
        &inner_src_path,
        &[
            ("META-INF/MANIFEST.MF", source_manifest.as_bytes()),
            ("org/example/Core.java", b"class Core {}"),
        ],
    );

    let archive_path = run._root.path().join("scratch/sdk.zip");
    write_jar(
        &archive_path,
        &[
            (
                "plugins/org.example.core_1.2.3.jar",
                fs::read(&inner_jar_path).unwrap().as_slice(),
            ),
            (
                "plugins/org.example.core.source_1.2.3.jar",
                fs::read(&inner_src_path).unwrap().as_slice(),
            ),
            ("plugins/unrelated.txt", b"ignored"),
        ],
    );

    let du_dir = run.descriptors.join("org.example").join("eclipse-sdk");
    fs::create_dir_all(&du_dir).unwrap();
    fs::write(
        du_dir.join("common.bnd"),
        format!(
            "A2-Origin-URI: file://{}\nSPDX-License-Identifier: EPL-2.0\n",
            archive_path.display()
        ),
    )
    .unwrap();
    fs::write(du_dir.join("includes.properties"), "plugins/*.jar\n").unwrap();
    fs::write(du_dir.join("excludes.properties"), "plugins/unrelated*\n").unwrap();
    du_dir
}

#[test]
fn test_archive_based_unit_end_to_end() {
    let run = TestRun::new();
    let du_dir = stage_archive_unit(&run);

    run.processor()
        .process_archive(Path::new("org.example"), &du_dir)
        .unwrap();

    let jar = run.cfg.a2_base.join("org.example/org.example.core.1.2.jar");
    assert!(jar.exists());
    let manifest = read_manifest(&jar);
    // the singleton directive survives the identity rewrite
    assert_eq!(
        manifest.get("Bundle-SymbolicName"),
        Some("org.example.core;singleton:=true")
    );
    assert_eq!(manifest.get("Created-By"), None);
    // the source companion was routed into the same unit
    assert!(read_entry(&jar, "OSGI-OPT/src/org/example/Core.java").is_some());
    assert!(read_entry(&jar, "org/example/Core.class").is_some());
}

#[test]
fn test_archive_rerun_purges_stale_working_tree() {
    let run = TestRun::new();
    let du_dir = stage_archive_unit(&run);

    // simulate a crashed previous run: working tree on disk, no archive
    let stale = run.cfg.a2_base.join("org.example/org.example.core.1.2");
    fs::create_dir_all(stale.join("org/example")).unwrap();
    fs::write(stale.join("org/example/Stale.class"), b"stale").unwrap();

    run.processor()
        .process_archive(Path::new("org.example"), &du_dir)
        .unwrap();

    let jar = run.cfg.a2_base.join("org.example/org.example.core.1.2.jar");
    assert!(jar.exists());
    assert!(!stale.exists());
    // the stale content did not leak into the fresh archive
    assert!(read_entry(&jar, "org/example/Stale.class").is_none());
    assert!(read_entry(&jar, "org/example/Core.class").is_some());
}

#[test]
fn test_separate_sources_produce_companion_archive() {
    let mut run = TestRun::new();
    run.cfg.separate_sources = true;
    run.cfg.a2_src_base = run._root.path().join("a2.src");

    run.install_artifact(
        "org.example:widget:1.2.3",
        &[("org/example/Widget.class", b"code")],
    );
    let sources = ArtifactId::parse("org.example:widget:1.2.3")
        .unwrap()
        .with_classifier("sources");
    write_jar(
        &run.m2_repo.join(sources.repo_path().unwrap()),
        &[("org/example/Widget.java", b"class Widget {}")],
    );

    let category_dir = run.descriptors.join("org.example");
    fs::create_dir_all(&category_dir).unwrap();
    let bnd = category_dir.join("org.example.widget.bnd");
    fs::write(
        &bnd,
        format!(
            "A2-Origin-M2: org.example:widget:1.2.3\nA2-Origin-M2-Repo: {}\nSPDX-License-Identifier: MIT\n",
            run.repo_uri()
        ),
    )
    .unwrap();

    run.processor()
        .process_standalone(Path::new("org.example"), &bnd)
        .unwrap();

    let jar = run.cfg.a2_base.join("org.example/org.example.widget.1.2.jar");
    assert!(jar.exists());
    // sources are not embedded
    assert!(read_entry(&jar, "OSGI-OPT/src/org/example/Widget.java").is_none());

    let src_jar = run
        .cfg
        .a2_src_base
        .join("org.example/org.example.widget.1.2.src.jar");
    assert!(src_jar.exists());
    let src_manifest = read_manifest(&src_jar);
    assert_eq!(src_manifest.get("Bundle-SymbolicName"), Some("org.example.widget.src"));
    assert_eq!(
        src_manifest.get("Eclipse-SourceBundle"),
        Some("org.example.widget;version=\"1.2.3\"")
    );
    assert!(read_entry(&src_jar, "org/example/Widget.java").is_some());
}
