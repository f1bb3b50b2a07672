//! Version parsing, comparison, and constraint matching.
//!
//! Versions carry up to four numeric parts plus an optional prerelease tag:
//! - Numeric parts compare as numbers, missing parts count as zero
//! - A release sorts after any prerelease of the same numeric version
//! - Prerelease tags compare case-insensitively
//!
//! Constraints are windows with optional inclusive/exclusive bounds and a
//! floating flag meaning "resolve to the latest available at resolution
//! time"; once satisfied, a floating constraint is fixed for the remainder
//! of that resolution.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A parsed version: `major.minor.patch[.revision][-prerelease]`.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    pub prerelease: Option<String>,
    original: String,
}

impl Version {
    /// Parse a version string. Returns `None` for malformed input.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }
        let (numeric, prerelease) = match s.split_once('-') {
            Some((n, p)) if !p.is_empty() => (n, Some(p.to_string())),
            Some(_) => return None,
            None => (s, None),
        };

        let mut parts = [0u64; 4];
        let segments: Vec<&str> = numeric.split('.').collect();
        if segments.is_empty() || segments.len() > 4 {
            return None;
        }
        for (i, seg) in segments.iter().enumerate() {
            parts[i] = seg.parse().ok()?;
        }

        Some(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            revision: parts[3],
            prerelease,
            original: s.to_string(),
        })
    }

    pub fn zero() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            revision: 0,
            prerelease: None,
            original: "0.0.0".to_string(),
        }
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    fn numeric(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.numeric().cmp(&other.numeric()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numeric().hash(state);
        self.prerelease.as_ref().map(|p| p.to_lowercase()).hash(state);
    }
}

/// One end of a version window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionBound {
    pub version: Version,
    pub inclusive: bool,
}

/// A version window with optional bounds and a floating flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub min: Option<VersionBound>,
    pub max: Option<VersionBound>,
    pub floating: bool,
}

impl VersionConstraint {
    /// Parse a constraint string.
    ///
    /// Accepted forms: `"1.2.3"` (at least), `"1.2-*"` / `"*"` (floating),
    /// and bracket ranges `"[1.0,2.0)"`, `"(,2.0]"`, `"[1.5]"` (exact).
    /// Returns `None` for malformed input.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        if s.is_empty() {
            return None;
        }

        if s == "*" {
            return Some(Self {
                min: None,
                max: None,
                floating: true,
            });
        }

        if s.starts_with('[') || s.starts_with('(') {
            return Self::parse_range(s);
        }

        if let Some(base) = s.strip_suffix("-*") {
            let version = Version::parse(base)?;
            return Some(Self {
                min: Some(VersionBound {
                    version,
                    inclusive: true,
                }),
                max: None,
                floating: true,
            });
        }

        let version = Version::parse(s)?;
        Some(Self {
            min: Some(VersionBound {
                version,
                inclusive: true,
            }),
            max: None,
            floating: false,
        })
    }

    fn parse_range(s: &str) -> Option<Self> {
        if s.len() < 3 || !(s.ends_with(']') || s.ends_with(')')) {
            return None;
        }
        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];

        if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            Some(Self {
                min: if lower.is_empty() {
                    None
                } else {
                    Some(VersionBound {
                        version: Version::parse(lower)?,
                        inclusive: open_inclusive,
                    })
                },
                max: if upper.is_empty() {
                    None
                } else {
                    Some(VersionBound {
                        version: Version::parse(upper)?,
                        inclusive: close_inclusive,
                    })
                },
                floating: false,
            })
        } else {
            // Exact window: [1.5] means exactly 1.5
            if !open_inclusive || !close_inclusive {
                return None;
            }
            let v = Version::parse(inner.trim())?;
            Some(Self::exact(v))
        }
    }

    /// A constraint satisfied by exactly one version.
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(VersionBound {
                version: version.clone(),
                inclusive: true,
            }),
            max: Some(VersionBound {
                version,
                inclusive: true,
            }),
            floating: false,
        }
    }

    pub fn is_exact(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(lo), Some(hi)) => {
                lo.inclusive && hi.inclusive && lo.version == hi.version
            }
            _ => false,
        }
    }

    /// Check if a version lies inside this window.
    pub fn satisfied_by(&self, version: &Version) -> bool {
        if let Some(ref lower) = self.min {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.max {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// Intersect two windows requested for the same library name.
    ///
    /// Returns `None` when the windows do not overlap. The result floats
    /// only if both inputs float.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = tighter_bound(self.min.as_ref(), other.min.as_ref(), Ordering::Greater);
        let max = tighter_bound(self.max.as_ref(), other.max.as_ref(), Ordering::Less);

        if let (Some(lo), Some(hi)) = (&min, &max) {
            match lo.version.cmp(&hi.version) {
                Ordering::Greater => return None,
                Ordering::Equal if !(lo.inclusive && hi.inclusive) => return None,
                _ => {}
            }
        }

        Some(Self {
            min,
            max,
            floating: self.floating && other.floating,
        })
    }

    /// Fix a floating constraint to the concrete version it resolved to.
    pub fn fixed_to(&self, version: &Version) -> Self {
        Self::exact(version.clone())
    }
}

fn tighter_bound(
    a: Option<&VersionBound>,
    b: Option<&VersionBound>,
    prefer: Ordering,
) -> Option<VersionBound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            let pick = match x.version.cmp(&y.version) {
                ord if ord == prefer => x,
                Ordering::Equal => {
                    // Exclusive is the tighter of equal bounds
                    if x.inclusive {
                        y
                    } else {
                        x
                    }
                }
                _ => y,
            };
            Some(pick.clone())
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            let v = &self.min.as_ref().expect("exact has min").version;
            return write!(f, "= {v}");
        }
        match (&self.min, &self.max) {
            (Some(lo), None) => {
                let op = if lo.inclusive { ">=" } else { ">" };
                write!(f, "{op} {}", lo.version)?;
                if self.floating {
                    write!(f, " (floating)")?;
                }
                Ok(())
            }
            (None, Some(hi)) => {
                let op = if hi.inclusive { "<=" } else { "<" };
                write!(f, "{op} {}", hi.version)
            }
            (Some(lo), Some(hi)) => {
                let open = if lo.inclusive { '[' } else { '(' };
                let close = if hi.inclusive { ']' } else { ')' };
                write!(f, "{open}{}, {}{close}", lo.version, hi.version)
            }
            (None, None) => {
                if self.floating {
                    write!(f, "*")
                } else {
                    write!(f, ">= 0.0.0")
                }
            }
        }
    }
}
