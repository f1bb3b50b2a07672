//! The shared on-disk package cache.
//!
//! Layout: `{root}/{name}/{version}/` holding the package manifest, the
//! original archive, the detached hash marker, and the extracted tree. The
//! legacy flat layout `{root}/{name}.{version}/` is honored on lookup but
//! never written.
//!
//! The hash marker is the sole installed-ness signal: a directory with
//! content but no marker is incomplete and must be re-installed.

use std::fs;
use std::path::{Path, PathBuf};

use keel_core::version::{Version, VersionConstraint};
use keel_util::errors::KeelError;
use keel_util::hash::sha512_base64_file;

use crate::manifest::{self, PackageManifest};
use crate::repository::PackageFeed;

/// Handle to the shared package cache directory.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

/// A package directory found on disk, with the canonical on-disk name
/// (lookups are case-insensitive, file names inside the entry are not).
#[derive(Debug, Clone)]
struct CacheEntry {
    dir: PathBuf,
    name: String,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical install directory for a package.
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }

    /// Legacy flat-layout directory.
    pub fn legacy_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(format!("{name}.{version}"))
    }

    /// Path to the original archive inside an install directory.
    pub fn archive_path(dir: &Path, name: &str, version: &str) -> PathBuf {
        dir.join(PackageFeed::archive_name(name, version))
    }

    /// Path to the detached hash marker inside an install directory.
    pub fn hash_marker_path(dir: &Path, name: &str, version: &str) -> PathBuf {
        dir.join(format!("{}.sha512", PackageFeed::archive_name(name, version)))
    }

    /// Path to the package manifest inside an install directory.
    pub fn manifest_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.pkgspec"))
    }

    /// The directory a package occupies, if any: canonical layout first,
    /// then legacy flat, then a case-insensitive scan of the name level.
    pub fn locate(&self, name: &str, version: &str) -> Option<PathBuf> {
        self.locate_entry(name, version).map(|e| e.dir)
    }

    fn locate_entry(&self, name: &str, version: &str) -> Option<CacheEntry> {
        let canonical = self.package_dir(name, version);
        if canonical.is_dir() {
            return Some(CacheEntry {
                dir: canonical,
                name: name.to_string(),
            });
        }
        let legacy = self.legacy_dir(name, version);
        if legacy.is_dir() {
            return Some(CacheEntry {
                dir: legacy,
                name: name.to_string(),
            });
        }
        let name_dir = self.name_dir(name)?;
        let on_disk = name_dir.file_name()?.to_string_lossy().to_string();
        let dir = name_dir.join(version);
        dir.is_dir().then_some(CacheEntry { dir, name: on_disk })
    }

    fn name_dir(&self, name: &str) -> Option<PathBuf> {
        let exact = self.root.join(name);
        if exact.is_dir() {
            return Some(exact);
        }
        let entries = fs::read_dir(&self.root).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(name)
            {
                return Some(path);
            }
        }
        None
    }

    /// Whether the package is present with a completed install.
    pub fn is_installed(&self, name: &str, version: &str) -> bool {
        self.installed_entry(name, version).is_some()
    }

    /// The install directory, only when its hash marker exists.
    pub fn installed_dir(&self, name: &str, version: &str) -> Option<PathBuf> {
        self.installed_entry(name, version).map(|e| e.dir)
    }

    fn installed_entry(&self, name: &str, version: &str) -> Option<CacheEntry> {
        let entry = self.locate_entry(name, version)?;
        Self::hash_marker_path(&entry.dir, &entry.name, version)
            .is_file()
            .then_some(entry)
    }

    /// The base64 SHA-512 recorded by the install's hash marker.
    pub fn recorded_hash(&self, name: &str, version: &str) -> Option<String> {
        let entry = self.installed_entry(name, version)?;
        let marker = Self::hash_marker_path(&entry.dir, &entry.name, version);
        fs::read_to_string(marker)
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// All files of an installed package, relative paths sorted, with the
    /// hash marker itself excluded.
    pub fn files(&self, name: &str, version: &str) -> miette::Result<Vec<String>> {
        let entry = self
            .installed_entry(name, version)
            .ok_or_else(|| KeelError::Install {
                message: format!("{name} {version} is not installed"),
            })?;
        let marker = format!(
            "{}.sha512",
            PackageFeed::archive_name(&entry.name, version)
        );
        let files = keel_util::fs::relative_files(&entry.dir)
            .map_err(KeelError::Io)?
            .into_iter()
            .filter(|f| f != &marker)
            .collect();
        Ok(files)
    }

    /// Parse the manifest of an installed package.
    pub fn get_manifest(&self, name: &str, version: &str) -> Option<PackageManifest> {
        let entry = self.installed_entry(name, version)?;
        // Manifest names are normalized at install time, but tolerate any
        // single .pkgspec for legacy entries
        let canonical = Self::manifest_path(&entry.dir, &entry.name);
        let path = if canonical.is_file() {
            canonical
        } else {
            find_pkgspec(&entry.dir)?
        };
        let content = fs::read_to_string(path).ok()?;
        manifest::parse_manifest(&content).ok()
    }

    /// Completed installed versions of a package name.
    pub fn installed_versions(&self, name: &str) -> Vec<Version> {
        let mut versions = Vec::new();
        if let Some(name_dir) = self.name_dir(name) {
            let on_disk = name_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| name.to_string());
            if let Ok(entries) = fs::read_dir(&name_dir) {
                for entry in entries.flatten() {
                    let version_str = entry.file_name().to_string_lossy().to_string();
                    if let Some(version) = Version::parse(&version_str) {
                        if Self::hash_marker_path(&entry.path(), &on_disk, &version_str).is_file() {
                            versions.push(version);
                        }
                    }
                }
            }
        }
        versions.sort();
        versions
    }

    /// The highest completed installed version satisfying `constraint`.
    pub fn best_installed(&self, name: &str, constraint: &VersionConstraint) -> Option<Version> {
        self.installed_versions(name)
            .into_iter()
            .filter(|v| constraint.satisfied_by(v))
            .max()
    }

    /// Recompute the archive hash and compare against the marker.
    pub fn verify(&self, name: &str, version: &str) -> miette::Result<bool> {
        let entry = match self.installed_entry(name, version) {
            Some(entry) => entry,
            None => return Ok(false),
        };
        let archive = Self::archive_path(&entry.dir, &entry.name, version);
        let marker = Self::hash_marker_path(&entry.dir, &entry.name, version);
        let recorded = fs::read_to_string(marker).map_err(KeelError::Io)?;
        let actual = sha512_base64_file(&archive).map_err(KeelError::Io)?;
        Ok(recorded.trim() == actual)
    }
}

fn find_pkgspec(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "pkgspec") {
            return Some(path);
        }
    }
    None
}
