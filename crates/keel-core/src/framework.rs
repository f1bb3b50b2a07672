//! Target framework monikers: parsing, compatibility, and the rules that
//! gate legacy framework-assembly references.

use std::fmt;

use crate::version::Version;

/// Framework identifiers whose targets never receive legacy framework
/// assembly references in a lock snapshot.
pub const NO_LEGACY_FRAMEWORK_ASSEMBLIES: &[&str] = &["core"];

/// Identifier of the classic desktop framework family.
pub const DESKTOP_IDENTIFIER: &str = "net";

/// A parsed target framework: lowercase identifier plus version.
///
/// Short names pack the version as bare digits (`net45` is `net` 4.5,
/// `core10` is `core` 1.0) or spell it with dots (`std1.3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetFramework {
    pub identifier: String,
    pub version: Version,
    short_name: String,
}

impl TargetFramework {
    /// Parse a short framework name. Returns `None` for malformed input.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }
        let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        let (ident, ver) = s.split_at(split);
        if ident.is_empty() || !ident.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let version = if ver.is_empty() {
            Version::zero()
        } else if ver.contains('.') {
            Version::parse(ver)?
        } else {
            // Packed digits: one numeric part per digit
            let parts: Vec<String> = ver.chars().map(|c| c.to_string()).collect();
            if parts.iter().any(|p| !p.chars().all(|c| c.is_ascii_digit())) {
                return None;
            }
            Version::parse(&parts.join("."))?
        };

        Some(Self {
            identifier: ident.to_ascii_lowercase(),
            version,
            short_name: s.to_ascii_lowercase(),
        })
    }

    /// The canonical short name used as a map key in lock snapshots.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Whether this is a classic desktop framework.
    pub fn is_desktop(&self) -> bool {
        self.identifier == DESKTOP_IDENTIFIER
    }

    /// Whether lock snapshots for this target carry legacy framework
    /// assembly references.
    pub fn supports_framework_assemblies(&self) -> bool {
        !NO_LEGACY_FRAMEWORK_ASSEMBLIES.contains(&self.identifier.as_str())
    }

    /// Whether an asset group built for `candidate` can be consumed by this
    /// target: same identifier, candidate version not newer than ours.
    pub fn supports(&self, candidate: &TargetFramework) -> bool {
        self.identifier == candidate.identifier && candidate.version <= self.version
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name)
    }
}

/// Pick the best asset group for a target from candidate group names.
///
/// Candidates are short framework names; `None` entries are ungrouped
/// fallbacks that match any target but lose to every specific match.
/// Returns the index of the winning candidate.
pub fn nearest_group(
    target: &TargetFramework,
    candidates: &[Option<TargetFramework>],
) -> Option<usize> {
    let mut best: Option<(usize, Option<&TargetFramework>)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        match candidate {
            Some(fw) => {
                if !target.supports(fw) {
                    continue;
                }
                let better = match best {
                    Some((_, Some(cur))) => fw.version > cur.version,
                    Some((_, None)) => true,
                    None => true,
                };
                if better {
                    best = Some((i, Some(fw)));
                }
            }
            None => {
                if best.is_none() {
                    best = Some((i, None));
                }
            }
        }
    }
    best.map(|(i, _)| i)
}
