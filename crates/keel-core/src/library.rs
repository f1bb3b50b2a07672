//! The library model: identities, ranges, dependency edges, and resolved
//! payloads used throughout the walker and conflict resolver.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionConstraint};

/// The kind of resolvable unit a library is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LibraryKind {
    /// A sibling project in the same workspace.
    Project,
    /// A package acquired from a feed into the shared cache.
    Package,
    /// An assembly from a platform redistributable list.
    ReferenceAssembly,
    /// An assembly from the machine-wide assembly registry.
    PlatformAssembly,
    /// No provider could satisfy the request.
    Unresolved,
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LibraryKind::Project => "project",
            LibraryKind::Package => "package",
            LibraryKind::ReferenceAssembly => "referenceAssembly",
            LibraryKind::PlatformAssembly => "platformAssembly",
            LibraryKind::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}

/// A resolved library identity. Two identities refer to the same logical
/// library iff their names match case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryIdentity {
    pub name: String,
    pub version: Version,
    pub kind: LibraryKind,
}

impl LibraryIdentity {
    pub fn new(name: impl Into<String>, version: Version, kind: LibraryKind) -> Self {
        Self {
            name: name.into(),
            version,
            kind,
        }
    }

    /// Case-insensitive logical-library comparison.
    pub fn same_name(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// `name/version` key used by lock snapshots and cache lookups.
    pub fn key(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl fmt::Display for LibraryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// One edge's request: a name, an acceptable version window, and an optional
/// restriction on which kinds of provider may answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRange {
    pub name: String,
    pub constraint: VersionConstraint,
    pub kinds: Option<Vec<LibraryKind>>,
}

impl LibraryRange {
    /// A range any provider may answer.
    pub fn any(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            kinds: None,
        }
    }

    /// A range restricted to the given library kinds.
    pub fn restricted(
        name: impl Into<String>,
        constraint: VersionConstraint,
        kinds: Vec<LibraryKind>,
    ) -> Self {
        Self {
            name: name.into(),
            constraint,
            kinds: Some(kinds),
        }
    }

    /// Whether this range's kind restriction permits the given kind.
    pub fn permits(&self, kind: LibraryKind) -> bool {
        match &self.kinds {
            None => true,
            Some(kinds) => kinds.contains(&kind),
        }
    }
}

impl fmt::Display for LibraryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.constraint)
    }
}

/// Edge annotations controlling how a dependency is re-emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyFlags {
    /// The edge is re-emitted into an output package manifest.
    pub package_dependency: bool,
    /// The edge exists only at build time and never reaches the runtime
    /// closure.
    pub build_only: bool,
}

impl DependencyFlags {
    /// A regular reference: flows into output package manifests.
    pub fn reference() -> Self {
        Self {
            package_dependency: true,
            build_only: false,
        }
    }

    /// A platform/framework reference: consumed in place, never re-emitted.
    pub fn framework() -> Self {
        Self {
            package_dependency: false,
            build_only: false,
        }
    }

    /// A build-time-only edge.
    pub fn build() -> Self {
        Self {
            package_dependency: false,
            build_only: true,
        }
    }
}

impl Default for DependencyFlags {
    fn default() -> Self {
        Self::reference()
    }
}

/// One dependency edge: the requested range plus its flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDependency {
    pub range: LibraryRange,
    pub flags: DependencyFlags,
}

impl LibraryDependency {
    pub fn new(range: LibraryRange) -> Self {
        Self {
            range,
            flags: DependencyFlags::default(),
        }
    }
}

/// A resolved node payload. `resolved = false` marks a request no provider
/// could satisfy; it still occupies a graph slot so the failure can be
/// reported with its full ancestry.
#[derive(Debug, Clone)]
pub struct Library {
    pub range: LibraryRange,
    pub identity: LibraryIdentity,
    pub dependencies: Vec<LibraryDependency>,
    pub resolved: bool,
    pub path: Option<PathBuf>,
}

impl Library {
    /// The placeholder payload for a request no provider satisfied.
    pub fn unresolved(range: &LibraryRange) -> Self {
        let version = range
            .constraint
            .min
            .as_ref()
            .map(|b| b.version.clone())
            .unwrap_or_else(Version::zero);
        Self {
            identity: LibraryIdentity::new(range.name.clone(), version, LibraryKind::Unresolved),
            range: range.clone(),
            dependencies: Vec::new(),
            resolved: false,
            path: None,
        }
    }
}
