//! The dependency walker: recursive descent over providers, one tree per
//! target framework.
//!
//! Cycle detection and floating-version memoization are explicit state
//! threaded through the recursion, never ambient: the visiting set holds
//! `(name, constraint)` pairs on the active path, and the floating memo
//! fixes each floating range to a concrete version on first touch for the
//! remainder of that walk.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use petgraph::graph::NodeIndex;

use keel_core::framework::TargetFramework;
use keel_core::library::{Library, LibraryIdentity, LibraryKind, LibraryRange};
use keel_core::version::Version;

use crate::graph::DependencyGraph;
use crate::provider::DependencyProvider;

/// Drives providers to build one dependency tree per target framework.
pub struct DependencyWalker {
    providers: Vec<Arc<dyn DependencyProvider>>,
    /// Advisory snapshot pins: lowercased name -> locked version. Applied
    /// only where the requested window still admits the pinned version.
    pinned: HashMap<String, Version>,
}

struct WalkState {
    /// `(lowercased name, constraint)` pairs on the active path.
    visiting: HashSet<(String, String)>,
    /// Floating ranges already fixed during this walk.
    floating: HashMap<String, Version>,
}

impl DependencyWalker {
    /// Provider order is significant: the first non-`None` result wins.
    pub fn new(providers: Vec<Arc<dyn DependencyProvider>>) -> Self {
        Self {
            providers,
            pinned: HashMap::new(),
        }
    }

    /// Pin versions from an advisory lock snapshot. A pin only takes effect
    /// where the requesting window still admits the pinned version.
    pub fn with_pinned(mut self, pinned: HashMap<String, Version>) -> Self {
        self.pinned = pinned;
        self
    }

    /// Build the full tree for one root range and target framework.
    pub async fn walk(
        &self,
        root: &LibraryRange,
        framework: &TargetFramework,
    ) -> miette::Result<DependencyGraph> {
        let mut graph = DependencyGraph::new(framework.clone());
        let mut state = WalkState {
            visiting: HashSet::new(),
            floating: HashMap::new(),
        };
        self.expand(root.clone(), None, framework, &mut graph, &mut state)
            .await?;
        Ok(graph)
    }

    fn expand<'a>(
        &'a self,
        mut range: LibraryRange,
        parent: Option<NodeIndex>,
        framework: &'a TargetFramework,
        graph: &'a mut DependencyGraph,
        state: &'a mut WalkState,
    ) -> BoxFuture<'a, miette::Result<NodeIndex>> {
        async move {
            let name_key = range.name.to_lowercase();

            // A floating range already fixed during this walk stays fixed
            if range.constraint.floating {
                if let Some(version) = state.floating.get(&name_key) {
                    range.constraint = range.constraint.fixed_to(version);
                }
            }

            if let Some(version) = self.pinned.get(&name_key) {
                if !range.constraint.is_exact() && range.constraint.satisfied_by(version) {
                    range.constraint = range.constraint.fixed_to(version);
                }
            }

            let visit_key = (name_key.clone(), range.constraint.to_string());
            if state.visiting.contains(&visit_key) {
                // Back-reference through the active path: terminate the
                // branch with a resolved, dependency-free stub
                let node = cycle_stub(&range);
                let idx = match parent {
                    Some(parent) => graph.add_child(parent, node),
                    None => graph.add_root(node),
                };
                return Ok(idx);
            }

            let library = self.resolve_range(&range, framework).await?;

            if library.resolved && range.constraint.floating {
                state
                    .floating
                    .entry(name_key)
                    .or_insert_with(|| library.identity.version.clone());
            }

            let dependencies = library.dependencies.clone();
            let idx = match parent {
                Some(parent) => graph.add_child(parent, library),
                None => graph.add_root(library),
            };

            state.visiting.insert(visit_key.clone());
            for dependency in dependencies {
                self.expand(dependency.range, Some(idx), framework, graph, state)
                    .await?;
            }
            state.visiting.remove(&visit_key);

            Ok(idx)
        }
        .boxed()
    }

    /// Try providers in caller order; the first non-`None` result wins.
    /// A range no provider satisfies still occupies a graph slot.
    async fn resolve_range(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> miette::Result<Library> {
        for provider in &self.providers {
            if !provider.supports(range.kinds.as_deref()) {
                continue;
            }
            if let Some(library) = provider.resolve(range, framework).await? {
                return Ok(library);
            }
        }
        tracing::debug!("No provider satisfied {range}");
        Ok(Library::unresolved(range))
    }
}

/// The stub payload for a branch terminated by cycle detection:
/// resolved-but-empty, so the ancestor position wins conflict resolution.
fn cycle_stub(range: &LibraryRange) -> Library {
    let version = range
        .constraint
        .min
        .as_ref()
        .map(|b| b.version.clone())
        .unwrap_or_else(Version::zero);
    Library {
        identity: LibraryIdentity::new(range.name.clone(), version, LibraryKind::Unresolved),
        range: range.clone(),
        dependencies: Vec::new(),
        resolved: true,
        path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Disposition;
    use crate::testutil::StaticProvider;
    use keel_core::version::VersionConstraint;

    fn range(name: &str, constraint: &str) -> LibraryRange {
        LibraryRange::any(name, VersionConstraint::parse(constraint).unwrap())
    }

    fn net45() -> TargetFramework {
        TargetFramework::parse("net45").unwrap()
    }

    #[tokio::test]
    async fn walks_transitive_closure() {
        let provider = StaticProvider::new()
            .with("app", "1.0.0", &[("PackageA", "1.0.0")])
            .with("PackageA", "1.0.0", &[("PackageB", "2.0.0")])
            .with("PackageB", "2.0.0", &[]);
        let walker = DependencyWalker::new(vec![Arc::new(provider)]);

        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.positions_of("PackageB").len(), 1);
    }

    #[tokio::test]
    async fn first_provider_wins() {
        let first = StaticProvider::new().with("app", "1.0.0", &[("X", "1.0.0")]).with("X", "1.0.0", &[]);
        let second = StaticProvider::new().with("X", "9.9.9", &[]);
        let walker = DependencyWalker::new(vec![Arc::new(first), Arc::new(second)]);

        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        let x = graph.positions_of("X")[0];
        assert_eq!(graph.node(x).library.identity.version.to_string(), "1.0.0");
    }

    #[tokio::test]
    async fn unresolved_range_occupies_a_slot() {
        let provider = StaticProvider::new().with("app", "1.0.0", &[("Ghost", "1.0.0")]);
        let walker = DependencyWalker::new(vec![Arc::new(provider)]);

        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        let ghost = graph.positions_of("Ghost")[0];
        assert!(!graph.node(ghost).library.resolved);
        assert_eq!(graph.ancestry(ghost), vec!["app", "Ghost"]);
    }

    #[tokio::test]
    async fn cycles_terminate() {
        let provider = StaticProvider::new()
            .with("app", "1.0.0", &[("A", "1.0.0")])
            .with("A", "1.0.0", &[("B", "1.0.0")])
            .with("B", "1.0.0", &[("A", "1.0.0")]);
        let walker = DependencyWalker::new(vec![Arc::new(provider)]);

        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        // app, A, B, plus the stub closing the cycle
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.positions_of("A").len(), 2);
    }

    #[tokio::test]
    async fn floating_fixed_on_first_touch() {
        let provider = StaticProvider::new()
            .with("app", "1.0.0", &[("F", "1.0-*"), ("Mid", "1.0.0")])
            .with("Mid", "1.0.0", &[("F", "1.0-*")])
            .with("F", "1.4.0", &[]);
        let walker = DependencyWalker::new(vec![Arc::new(provider)]);

        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        let positions = graph.positions_of("F");
        assert_eq!(positions.len(), 2);
        for idx in positions {
            assert_eq!(
                graph.node(*idx).library.identity.version.to_string(),
                "1.4.0"
            );
        }
        // The second request arrived already fixed
        assert!(graph
            .positions_of("F")
            .iter()
            .any(|idx| graph.node(*idx).library.range.constraint.is_exact()));
    }

    #[tokio::test]
    async fn walk_is_deterministic() {
        let build = || {
            StaticProvider::new()
                .with("app", "1.0.0", &[("A", "1.0.0"), ("B", "1.0.0")])
                .with("A", "1.0.0", &[("X", "1.0.0")])
                .with("B", "1.0.0", &[("X", "2.0.0")])
                .with("X", "1.0.0", &[])
                .with("X", "2.0.0", &[])
        };
        let walker1 = DependencyWalker::new(vec![Arc::new(build())]);
        let walker2 = DependencyWalker::new(vec![Arc::new(build())]);

        let g1 = walker1.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        let g2 = walker2.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        assert_eq!(g1.render_tree(), g2.render_tree());
    }

    #[tokio::test]
    async fn pins_apply_only_inside_the_requested_window() {
        let provider = StaticProvider::new()
            .with("app", "1.0.0", &[("A", "1.0.0"), ("B", "3.0.0")])
            .with("A", "1.0.0", &[])
            .with("A", "1.2.0", &[])
            .with("B", "3.0.0", &[]);
        let mut pinned = HashMap::new();
        pinned.insert("a".to_string(), Version::parse("1.0.0").unwrap());
        // A stale pin outside the window must not apply
        pinned.insert("b".to_string(), Version::parse("2.0.0").unwrap());

        let walker = DependencyWalker::new(vec![Arc::new(provider)]).with_pinned(pinned);
        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();

        let a = graph.positions_of("A")[0];
        assert_eq!(graph.node(a).library.identity.version.to_string(), "1.0.0");
        let b = graph.positions_of("B")[0];
        assert_eq!(graph.node(b).library.identity.version.to_string(), "3.0.0");
    }

    #[tokio::test]
    async fn all_positions_start_acceptable() {
        let provider = StaticProvider::new()
            .with("app", "1.0.0", &[("A", "1.0.0")])
            .with("A", "1.0.0", &[]);
        let walker = DependencyWalker::new(vec![Arc::new(provider)]);

        let graph = walker.walk(&range("app", "1.0.0"), &net45()).await.unwrap();
        for idx in graph.node_indices() {
            assert_eq!(graph.node(idx).disposition, Disposition::Acceptable);
        }
    }
}
