//! Nearest-wins conflict resolution: collapse a walked tree to one accepted
//! version per library name, flag the rest, and report what could not be
//! resolved.

use std::fmt;

use keel_core::framework::TargetFramework;
use keel_core::library::{Library, LibraryKind};
use keel_core::version::VersionConstraint;

use crate::graph::{DependencyGraph, Disposition};

/// The flat outcome of a conflict pass over one framework's tree.
pub struct ResolvedSet {
    pub framework: TargetFramework,
    /// Winning libraries, root excluded, sorted by lowercase name.
    pub accepted: Vec<Library>,
    /// Names no provider satisfied, with the ancestry that requested them.
    pub unresolved: Vec<UnresolvedLibrary>,
    pub conflicts: ConflictReport,
}

impl ResolvedSet {
    /// Look up an accepted library by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&Library> {
        self.accepted.iter().find(|l| l.identity.same_name(name))
    }

    /// Accepted libraries of one kind.
    pub fn of_kind(&self, kind: LibraryKind) -> Vec<&Library> {
        self.accepted
            .iter()
            .filter(|l| l.identity.kind == kind)
            .collect()
    }

    /// Accepted package-type libraries (the acquisition work list).
    pub fn packages(&self) -> Vec<&Library> {
        self.of_kind(LibraryKind::Package)
    }
}

/// A request no provider satisfied, reported with its full ancestry rather
/// than aborting resolution.
#[derive(Debug, Clone)]
pub struct UnresolvedLibrary {
    pub name: String,
    pub requested: String,
    /// Library names from the root down to the unresolved request.
    pub ancestry: Vec<String>,
}

impl fmt::Display for UnresolvedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (via {})",
            self.name,
            self.requested,
            self.ancestry.join(" -> ")
        )
    }
}

/// A report of all version conflicts encountered during resolution.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// A single conflict where a requested version lost to the accepted one.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub name: String,
    pub requested: String,
    pub resolved: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(
                f,
                "  {} requested {} but resolved {} ({})",
                c.name, c.requested, c.resolved, c.reason
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.name, self.requested, self.resolved, self.reason
        )
    }
}

/// Run the conflict pass over a completed tree.
///
/// Selection per name: resolved candidates beat unresolved ones, then the
/// smallest depth wins, then the highest version among depth ties. Every
/// position leaves in `Accepted` or `Rejected`; a surviving `Acceptable`
/// is a programmer error.
pub fn resolve_conflicts(graph: &mut DependencyGraph) -> ResolvedSet {
    let mut conflicts = ConflictReport::new();
    let mut accepted: Vec<Library> = Vec::new();
    let mut unresolved: Vec<UnresolvedLibrary> = Vec::new();
    let root = graph.root();

    for name in graph.names() {
        let positions = graph.positions_of(&name).to_vec();

        let winner = positions
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let na = graph.node(a);
                let nb = graph.node(b);
                nb.library
                    .resolved
                    .cmp(&na.library.resolved)
                    .then(na.depth.cmp(&nb.depth))
                    .then(nb.library.identity.version.cmp(&na.library.identity.version))
            })
            .expect("name index never holds an empty position list");

        let winner_version = graph.node(winner).library.identity.version.clone();
        let winner_depth = graph.node(winner).depth;

        for &idx in &positions {
            if idx == winner {
                graph.node_mut(idx).disposition = Disposition::Accepted;
                continue;
            }
            graph.node_mut(idx).disposition = Disposition::Rejected;

            let loser = graph.node(idx);
            if loser.library.identity.version != winner_version && loser.library.resolved {
                let reason = if loser.depth == winner_depth {
                    "higher version wins at equal depth".to_string()
                } else {
                    format!("nearest wins (depth {} vs {})", winner_depth, loser.depth)
                };
                conflicts.add(VersionConflict {
                    name: loser.library.identity.name.clone(),
                    requested: loser.library.identity.version.to_string(),
                    resolved: winner_version.to_string(),
                    reason,
                });
            }
            if !loser.library.range.constraint.satisfied_by(&winner_version) {
                tracing::warn!(
                    "Accepted {} {} violates the range {} requested via {}",
                    loser.library.identity.name,
                    winner_version,
                    loser.library.range.constraint,
                    graph.ancestry(idx).join(" -> ")
                );
                conflicts.add(VersionConflict {
                    name: loser.library.identity.name.clone(),
                    requested: loser.library.range.constraint.to_string(),
                    resolved: winner_version.to_string(),
                    reason: "accepted version outside requested range".to_string(),
                });
            }
        }

        // When the requesting windows have no common intersection, no
        // single version could have satisfied every edge; worth a note
        // even though the heuristic carries on
        if positions.len() > 1 {
            let mut windows = positions
                .iter()
                .map(|&idx| &graph.node(idx).library.range.constraint);
            let first: VersionConstraint = windows.next().expect("non-empty").clone();
            let combined = windows.try_fold(first, |acc, c| acc.intersect(c));
            if combined.is_none() {
                tracing::warn!("No single version of {name} satisfies every requester");
            }
        }

        if Some(winner) == root {
            continue;
        }
        let winner_node = graph.node(winner);
        if winner_node.library.resolved {
            accepted.push(winner_node.library.clone());
        } else {
            unresolved.push(UnresolvedLibrary {
                name: winner_node.library.range.name.clone(),
                requested: winner_node.library.range.constraint.to_string(),
                ancestry: graph.ancestry(winner),
            });
        }
    }

    for idx in graph.node_indices().collect::<Vec<_>>() {
        assert!(
            graph.node(idx).disposition != Disposition::Acceptable,
            "conflict resolution left {} in its initial disposition",
            graph.node(idx).library.identity
        );
    }

    accepted.sort_by(|a, b| {
        a.identity
            .name
            .to_lowercase()
            .cmp(&b.identity.name.to_lowercase())
    });

    ResolvedSet {
        framework: graph.framework().clone(),
        accepted,
        unresolved,
        conflicts,
    }
}
