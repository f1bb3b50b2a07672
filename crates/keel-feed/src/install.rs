//! Package acquisition: cross-process at-most-once installation into the
//! shared cache.
//!
//! All cache mutation funnels through a per-package exclusive file lock.
//! Under the lock, the presence of the detached hash marker is the only
//! "already installed" signal; the marker is always the final write, so a
//! reader never observes a half-extracted directory as installed.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use reqwest::Client;

use keel_util::errors::KeelError;
use keel_util::hash::sha512_base64;

use crate::cache::PackageCache;
use crate::checksum;
use crate::download;
use crate::repository::PackageFeed;

/// What an install call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// This call performed the installation.
    Installed,
    /// A completed install was already present; no writes were performed.
    AlreadyInstalled,
}

/// Exclusive cross-process lock scoped to one package's install directory.
///
/// Held via `flock(LOCK_EX)` on a sibling lock file; released on drop.
pub struct InstallLock {
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl InstallLock {
    /// Acquire the lock, blocking until available.
    pub fn acquire(path: &Path) -> miette::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(KeelError::Io)?;
        }
        let file = File::create(path).map_err(KeelError::Io)?;
        file.lock_exclusive().map_err(|e| KeelError::Install {
            message: format!("Failed to acquire install lock {}: {e}", path.display()),
        })?;
        tracing::debug!("Acquired install lock at {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        // Lock is released when the file handle closes
        tracing::debug!("Released install lock at {}", self.path.display());
    }
}

fn lock_path(cache: &PackageCache, name: &str, version: &str) -> PathBuf {
    cache.root().join(name).join(format!(".{version}.lock"))
}

/// Install a package into the cache from its archive bytes.
///
/// Safe to race across processes: the loser observes the winner's hash
/// marker under the lock and performs no writes.
pub fn install_from_bytes(
    cache: &PackageCache,
    name: &str,
    version: &str,
    archive: &[u8],
) -> miette::Result<InstallOutcome> {
    let _lock = InstallLock::acquire(&lock_path(cache, name, version))?;

    let dir = cache.package_dir(name, version);
    if PackageCache::hash_marker_path(&dir, name, version).is_file() {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    fs::create_dir_all(&dir).map_err(KeelError::Io)?;

    let install_err = |message: String| KeelError::Install { message };

    let mut tmp = tempfile::Builder::new()
        .prefix(".incoming-")
        .tempfile_in(&dir)
        .map_err(KeelError::Io)?;
    tmp.write_all(archive).map_err(KeelError::Io)?;
    tmp.flush().map_err(KeelError::Io)?;
    tmp.as_file_mut()
        .seek(SeekFrom::Start(0))
        .map_err(KeelError::Io)?;

    {
        let mut zip = zip::ZipArchive::new(tmp.as_file_mut()).map_err(|e| {
            install_err(format!("{name} {version}: archive is not a valid package: {e}"))
        })?;
        zip.extract(&dir).map_err(|e| {
            install_err(format!("{name} {version}: failed to extract archive: {e}"))
        })?;
    }

    normalize_manifest_name(&dir, name)?;

    let archive_path = PackageCache::archive_path(&dir, name, version);
    tmp.persist(&archive_path).map_err(|e| {
        install_err(format!("{name} {version}: failed to persist archive: {e}"))
    })?;

    // The marker is the final write: its presence is the completion signal
    let marker = PackageCache::hash_marker_path(&dir, name, version);
    fs::write(&marker, sha512_base64(archive)).map_err(KeelError::Io)?;

    tracing::debug!("Installed {name} {version} into {}", dir.display());
    Ok(InstallOutcome::Installed)
}

/// Rename whatever `.pkgspec` the archive carried to the canonical
/// `{name}.pkgspec`.
fn normalize_manifest_name(dir: &Path, name: &str) -> miette::Result<()> {
    let canonical = PackageCache::manifest_path(dir, name);
    if canonical.is_file() {
        return Ok(());
    }
    let entries = fs::read_dir(dir).map_err(KeelError::Io)?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "pkgspec") {
            fs::rename(&path, &canonical).map_err(KeelError::Io)?;
            return Ok(());
        }
    }
    Ok(())
}

/// Ensure a package has a completed install, downloading from the first
/// feed that carries it.
pub async fn ensure_installed(
    cache: &PackageCache,
    feeds: &[PackageFeed],
    client: &Client,
    name: &str,
    version: &str,
) -> miette::Result<InstallOutcome> {
    if cache.is_installed(name, version) {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let mut last_err: Option<miette::Report> = None;
    for feed in feeds {
        let url = feed.archive_url(name, version);
        let label = format!("{name} {version}");
        match download::download_archive(client, feed, &url, &label).await {
            Ok(Some(bytes)) => {
                checksum::verify(client, feed, &url, &bytes).await?;
                return install_from_bytes(cache, name, version, &bytes);
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Feed '{}' failed for {name} {version}: {e}", feed.name);
                last_err = Some(e);
                continue;
            }
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => Err(KeelError::Install {
            message: format!("Package {name} {version} not found in any configured feed"),
        }
        .into()),
    }
}
