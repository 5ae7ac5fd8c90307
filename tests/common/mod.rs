// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! Fixture releases are gzipped tarballs laid out like the real
//! git-native-issue release: a single top-level directory holding `bin/`,
//! optional `doc/`, and the documentation files. The `git-issue` binary is
//! a shell script that reports a configurable version.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use kettle::dependencies::StaticProbe;
use kettle::fetch::{Fetcher, LocalFetcher};
use kettle::hash::sha256;
use kettle::receipt::JsonReceiptStore;
use kettle::{Config, Installer, Recipe, parse_recipe};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Options for building a fixture release
pub struct Release {
    /// Version the `git-issue` script prints
    pub reported_version: String,
    /// Include `doc/git-issue.1`
    pub with_man_page: bool,
    /// Include the `bin/` directory
    pub with_binaries: bool,
}

impl Release {
    pub fn reporting(version: &str) -> Self {
        Self {
            reported_version: version.to_string(),
            with_man_page: true,
            with_binaries: true,
        }
    }

    pub fn without_man_page(mut self) -> Self {
        self.with_man_page = false;
        self
    }

    pub fn without_binaries(mut self) -> Self {
        self.with_binaries = false;
        self
    }

    /// Build the release as gzipped tar bytes
    pub fn build(&self) -> Vec<u8> {
        let top = "git-native-issue-v1.0.2";
        let script = format!(
            "#!/bin/sh\ncase \"$1\" in\n  version) echo \"git-issue version {}\" ;;\n  *) echo \"usage: git-issue version\" >&2; exit 1 ;;\nesac\n",
            self.reported_version
        );

        let mut entries: Vec<(String, Vec<u8>, u32)> = vec![
            (format!("{}/README.md", top), b"# git-native-issue\n".to_vec(), 0o644),
            (format!("{}/LICENSE", top), b"GPL-2.0-only\n".to_vec(), 0o644),
            (format!("{}/ISSUE-FORMAT.md", top), b"# Issue format\n".to_vec(), 0o644),
        ];
        if self.with_binaries {
            entries.push((format!("{}/bin/git-issue", top), script.into_bytes(), 0o755));
            entries.push((
                format!("{}/bin/git-issue-create", top),
                b"#!/bin/sh\nexit 0\n".to_vec(),
                0o755,
            ));
        }
        if self.with_man_page {
            entries.push((
                format!("{}/doc/git-issue.1", top),
                b".TH GIT-ISSUE 1\n".to_vec(),
                0o644,
            ));
        }

        let mut builder = tar::Builder::new(Vec::new());
        for (path, content, mode) in &entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_slice()).unwrap();
        }
        let tar = builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar).unwrap();
        encoder.finish().unwrap()
    }

    /// Write the release into `dir` and return its path and digest
    pub fn write_to(&self, dir: &Path) -> (PathBuf, String) {
        let bytes = self.build();
        let path = dir.join("git-native-issue-v1.0.2.tar.gz");
        fs::write(&path, &bytes).unwrap();
        (path, sha256(&bytes))
    }
}

/// The shipped recipe's install rules pointed at a local artifact
pub fn recipe_for(artifact: &Path, digest: &str) -> Recipe {
    let url = url::Url::from_file_path(artifact).unwrap();
    parse_recipe(&format!(
        r#"
[package]
name = "git-native-issue"
version = "1.0.2"
description = "Distributed issue tracking system built on Git"
license = "GPL-2.0-only"
requires = ["git"]

[source]
url = "{url}"
sha256 = "{digest}"

[[install]]
sources = ["bin/*"]
category = "binary"

[[install]]
sources = ["doc/*.1"]
category = "man1"
if_exists = "doc"

[[install]]
sources = ["README.md", "LICENSE", "ISSUE-FORMAT.md"]
category = "doc"

[test]
command = ["%(bin)s/git-issue", "version"]
"#
    ))
    .unwrap()
}

/// A scratch install environment: prefix, cache and state under one TempDir
pub struct Sandbox {
    pub temp: TempDir,
    pub config: Config,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::isolated(temp.path());
        Self { temp, config }
    }

    /// Scratch directory for fixture artifacts
    pub fn artifacts(&self) -> PathBuf {
        let dir = self.temp.path().join("artifacts");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn prefix(&self) -> &Path {
        &self.config.prefix
    }

    /// Installer reading local artifacts, with `git` reported present
    pub fn installer(&self) -> Installer {
        self.installer_with(Box::new(LocalFetcher::new()))
    }

    pub fn installer_with(&self, fetcher: Box<dyn Fetcher>) -> Installer {
        Installer::new(
            self.config.clone(),
            fetcher,
            Box::new(StaticProbe::new(["git"])),
            Box::new(JsonReceiptStore::new(&self.config.state_dir())),
        )
    }
}

/// Relative paths of every file under `root`, sorted
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
