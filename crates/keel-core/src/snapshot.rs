//! The durable lock snapshot: the versioned record of a completed
//! resolution, consumed by a runtime loader to map library names to on-disk
//! assembly paths without re-running resolution.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use keel_util::errors::KeelError;

/// Current snapshot schema version.
pub const LOCK_SNAPSHOT_VERSION: i32 = 1;

/// File name of the lock snapshot.
pub const SNAPSHOT_FILENAME: &str = "keel.lock.json";

/// Top-level snapshot document.
///
/// All maps are `BTreeMap` so serialization is byte-stable: resolving the
/// same inputs twice must produce identical snapshot bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSnapshot {
    pub locked: bool,
    pub version: i32,
    /// framework short-name -> "name/version" -> per-framework assets.
    pub targets: BTreeMap<String, BTreeMap<String, FrameworkGroup>>,
    /// "name/version" -> content hash and file manifest.
    pub libraries: BTreeMap<String, LockLibrary>,
    /// framework short-name (or empty string for root) -> direct
    /// dependency range strings.
    pub project_file_dependency_groups: BTreeMap<String, Vec<String>>,
}

/// The per-target-framework slice of one library's assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkGroup {
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub framework_assemblies: Vec<String>,
    #[serde(default)]
    pub runtime_assemblies: Vec<String>,
    #[serde(default)]
    pub compile_assemblies: Vec<String>,
}

/// A library's durable record: content hash plus full file manifest, so a
/// later load can detect tampering or staleness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLibrary {
    pub sha512: String,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Default for LockSnapshot {
    fn default() -> Self {
        Self {
            locked: false,
            version: LOCK_SNAPSHOT_VERSION,
            targets: BTreeMap::new(),
            libraries: BTreeMap::new(),
            project_file_dependency_groups: BTreeMap::new(),
        }
    }
}

impl LockSnapshot {
    /// The `"name/version"` key under which a library is recorded.
    pub fn library_key(name: &str, version: &str) -> String {
        format!("{name}/{version}")
    }

    /// Load and parse a snapshot file. Rejects schema versions newer than
    /// this build understands.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KeelError::Snapshot {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        let snapshot: LockSnapshot =
            serde_json::from_str(&content).map_err(|e| KeelError::Snapshot {
                message: format!("Failed to parse {}: {e}", path.display()),
            })?;
        if snapshot.version > LOCK_SNAPSHOT_VERSION {
            return Err(KeelError::Snapshot {
                message: format!(
                    "Snapshot schema version {} is newer than supported version {}",
                    snapshot.version, LOCK_SNAPSHOT_VERSION
                ),
            }
            .into());
        }
        Ok(snapshot)
    }

    /// Serialize to the canonical byte form: pretty JSON, trailing newline.
    pub fn to_json_string(&self) -> miette::Result<String> {
        let mut out = serde_json::to_string_pretty(self).map_err(|e| KeelError::Snapshot {
            message: format!("Failed to serialize snapshot: {e}"),
        })?;
        out.push('\n');
        Ok(out)
    }

    /// Write the snapshot, skipping the write when the on-disk bytes are
    /// already identical.
    pub fn write_to(&self, path: &Path) -> miette::Result<bool> {
        let content = self.to_json_string()?;
        if let Ok(existing) = std::fs::read_to_string(path) {
            if existing == content {
                return Ok(false);
            }
        }
        std::fs::write(path, content).map_err(|e| KeelError::Snapshot {
            message: format!("Failed to write {}: {e}", path.display()),
        })?;
        Ok(true)
    }

    /// Whether the recorded direct dependency groups match the project's
    /// current ones.
    pub fn matches_dependency_groups(&self, groups: &BTreeMap<String, Vec<String>>) -> bool {
        self.project_file_dependency_groups == *groups
    }

    /// The locked fast path: a `locked = true` snapshot whose direct
    /// dependency groups are unchanged may be trusted as-is, skipping
    /// resolution entirely.
    pub fn can_skip_resolution(&self, groups: &BTreeMap<String, Vec<String>>) -> bool {
        self.locked && self.matches_dependency_groups(groups)
    }

    /// Locked `"name/version"` pairs, split apart for callers that need the
    /// parts rather than the key.
    pub fn library_entries(&self) -> impl Iterator<Item = (&str, &str, &LockLibrary)> {
        self.libraries.iter().filter_map(|(key, lib)| {
            key.split_once('/').map(|(name, version)| (name, version, lib))
        })
    }
}
