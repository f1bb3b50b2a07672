//! Project manifest (`keel.toml`) parsing and sibling-project discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use keel_util::errors::KeelError;

use crate::framework::TargetFramework;
use crate::library::{
    DependencyFlags, LibraryDependency, LibraryKind, LibraryRange,
};
use crate::version::{Version, VersionConstraint};

/// File name of the project manifest.
pub const MANIFEST_FILENAME: &str = "keel.toml";

/// A parsed project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub package: PackageSection,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
    #[serde(default)]
    pub frameworks: BTreeMap<String, FrameworkSection>,
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedEntry>,
}

/// The `[package]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
}

/// A per-framework `[frameworks.<tfm>]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkSection {
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

/// A dependency declaration: shorthand version string or detailed form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Short(String),
    Detailed(DetailedDependency),
}

/// A dependency with explicit constraint and optional metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedDependency {
    pub version: String,
    /// Restrict resolution to one library kind (`"project"`, `"package"`).
    #[serde(default)]
    pub kind: Option<String>,
    /// Whether the edge is re-emitted into an output package manifest.
    #[serde(default)]
    pub package_dependency: Option<bool>,
    #[serde(default)]
    pub build_only: bool,
}

/// A feed declaration: bare URL or detailed form with credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Url(String),
    Detailed {
        url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl ProjectManifest {
    /// Load and parse a `keel.toml` from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KeelError::Project {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    /// Parse manifest TOML text.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            KeelError::Project {
                message: format!("Failed to parse manifest: {e}"),
            }
            .into()
        })
    }

    /// The project's own version.
    pub fn version(&self) -> miette::Result<Version> {
        Version::parse(&self.package.version).ok_or_else(|| {
            KeelError::Project {
                message: format!("Invalid package version '{}'", self.package.version),
            }
            .into()
        })
    }

    /// Target frameworks declared by this project, in sorted short-name
    /// order.
    pub fn target_frameworks(&self) -> miette::Result<Vec<TargetFramework>> {
        self.frameworks
            .keys()
            .map(|name| {
                TargetFramework::parse(name).ok_or_else(|| {
                    KeelError::Project {
                        message: format!("Invalid target framework '{name}'"),
                    }
                    .into()
                })
            })
            .collect()
    }

    /// Direct dependencies effective for one target framework: root-level
    /// entries plus the matching `[frameworks.<tfm>]` section, with the
    /// framework-specific entry winning on a name collision.
    pub fn dependencies_for(
        &self,
        framework: &TargetFramework,
    ) -> miette::Result<Vec<LibraryDependency>> {
        let mut merged: BTreeMap<String, &DependencySpec> = BTreeMap::new();
        for (name, spec) in &self.dependencies {
            merged.insert(name.clone(), spec);
        }
        if let Some(section) = self.frameworks.get(framework.short_name()) {
            for (name, spec) in &section.dependencies {
                merged.insert(name.clone(), spec);
            }
        }
        merged
            .into_iter()
            .map(|(name, spec)| spec_to_dependency(&name, spec))
            .collect()
    }

    /// Direct dependency range strings grouped as the lock snapshot records
    /// them: the empty key for root-level entries, one key per framework.
    pub fn dependency_groups(&self) -> miette::Result<BTreeMap<String, Vec<String>>> {
        let mut groups = BTreeMap::new();
        groups.insert(String::new(), group_strings(&self.dependencies)?);
        for (tfm, section) in &self.frameworks {
            groups.insert(tfm.clone(), group_strings(&section.dependencies)?);
        }
        Ok(groups)
    }
}

fn group_strings(deps: &BTreeMap<String, DependencySpec>) -> miette::Result<Vec<String>> {
    let mut out = Vec::new();
    for (name, spec) in deps {
        let dep = spec_to_dependency(name, spec)?;
        out.push(dep.range.to_string());
    }
    out.sort();
    Ok(out)
}

/// Convert a manifest dependency entry into a walker edge.
fn spec_to_dependency(name: &str, spec: &DependencySpec) -> miette::Result<LibraryDependency> {
    let bad_constraint = |v: &str| KeelError::Project {
        message: format!("Invalid version constraint '{v}' for dependency '{name}'"),
    };

    match spec {
        DependencySpec::Short(version) => {
            let constraint =
                VersionConstraint::parse(version).ok_or_else(|| bad_constraint(version))?;
            Ok(LibraryDependency::new(LibraryRange::any(name, constraint)))
        }
        DependencySpec::Detailed(d) => {
            let constraint =
                VersionConstraint::parse(&d.version).ok_or_else(|| bad_constraint(&d.version))?;
            let kinds = match d.kind.as_deref() {
                None => None,
                Some("project") => Some(vec![LibraryKind::Project]),
                Some("package") => Some(vec![LibraryKind::Package]),
                Some(other) => {
                    return Err(KeelError::Project {
                        message: format!("Unknown dependency kind '{other}' for '{name}'"),
                    }
                    .into())
                }
            };
            let range = LibraryRange {
                name: name.to_string(),
                constraint,
                kinds,
            };
            let flags = if d.build_only {
                DependencyFlags::build()
            } else {
                DependencyFlags {
                    package_dependency: d.package_dependency.unwrap_or(true),
                    build_only: false,
                }
            };
            Ok(LibraryDependency { range, flags })
        }
    }
}

/// A project found on disk: its manifest and root directory.
#[derive(Debug, Clone)]
pub struct LocatedProject {
    pub manifest: ProjectManifest,
    pub root: PathBuf,
}

/// Looks up sibling projects by name for the project-reference provider.
pub trait ProjectLocator: Send + Sync {
    fn locate(&self, name: &str) -> Option<&LocatedProject>;
}

/// Directory-based locator: the workspace root plus each immediate child
/// directory that carries a manifest.
#[derive(Debug, Default)]
pub struct WorkspaceProjects {
    projects: Vec<LocatedProject>,
}

impl WorkspaceProjects {
    /// Scan `workspace_root` and its immediate children for manifests.
    /// Unparseable manifests are skipped with a warning.
    pub fn discover(workspace_root: &Path) -> miette::Result<Self> {
        let mut projects = Vec::new();

        let mut candidates = vec![workspace_root.to_path_buf()];
        if let Ok(entries) = std::fs::read_dir(workspace_root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    candidates.push(path);
                }
            }
        }

        for dir in candidates {
            let manifest_path = dir.join(MANIFEST_FILENAME);
            if !manifest_path.is_file() {
                continue;
            }
            match ProjectManifest::from_path(&manifest_path) {
                Ok(manifest) => projects.push(LocatedProject {
                    manifest,
                    root: dir,
                }),
                Err(e) => {
                    tracing::warn!("Skipping unparseable manifest {}: {e}", manifest_path.display());
                }
            }
        }

        Ok(Self { projects })
    }
}

impl ProjectLocator for WorkspaceProjects {
    fn locate(&self, name: &str) -> Option<&LocatedProject> {
        self.projects
            .iter()
            .find(|p| p.manifest.package.name.eq_ignore_ascii_case(name))
    }
}
