//! The dependency tree: an arena of nodes indexed by integer id, one node
//! per tree position, with a name side index for the conflict pass.
//!
//! The same logical library name may occupy several tree positions (diamond
//! dependencies); conflict resolution later marks exactly one position per
//! name `Accepted`.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use keel_core::framework::TargetFramework;
use keel_core::library::Library;

/// Tri-state conflict marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Initial state; must not survive conflict resolution.
    Acceptable,
    /// The winning position for its library name.
    Accepted,
    /// A losing position for its library name.
    Rejected,
}

/// One tree position.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub library: Library,
    pub disposition: Disposition,
    pub depth: usize,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.library.identity)
    }
}

/// A dependency tree for one target framework.
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, ()>,
    /// Lowercased library name -> every tree position carrying it.
    by_name: HashMap<String, Vec<NodeIndex>>,
    root: Option<NodeIndex>,
    framework: TargetFramework,
}

impl DependencyGraph {
    pub fn new(framework: TargetFramework) -> Self {
        Self {
            graph: DiGraph::new(),
            by_name: HashMap::new(),
            root: None,
            framework,
        }
    }

    pub fn framework(&self) -> &TargetFramework {
        &self.framework
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Add the root position (depth 0). There is exactly one.
    pub fn add_root(&mut self, library: Library) -> NodeIndex {
        debug_assert!(self.root.is_none(), "graph already has a root");
        let idx = self.insert(library, 0);
        self.root = Some(idx);
        idx
    }

    /// Add a child position under `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, library: Library) -> NodeIndex {
        let depth = self.graph[parent].depth + 1;
        let idx = self.insert(library, depth);
        self.graph.add_edge(parent, idx, ());
        idx
    }

    fn insert(&mut self, library: Library, depth: usize) -> NodeIndex {
        let name_key = library.identity.name.to_lowercase();
        let idx = self.graph.add_node(GraphNode {
            library,
            disposition: Disposition::Acceptable,
            depth,
        });
        self.by_name.entry(name_key).or_default().push(idx);
        idx
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut GraphNode {
        &mut self.graph[idx]
    }

    /// Every position carrying `name` (case-insensitive).
    pub fn positions_of(&self, name: &str) -> &[NodeIndex] {
        self.by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All distinct library names, sorted for deterministic iteration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Direct children of a position, in insertion order.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        // petgraph yields outgoing edges newest-first
        children.reverse();
        children
    }

    /// The single parent of a position (`None` for the root).
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.source())
            .next()
    }

    /// Library names from the root down to (and including) the position.
    pub fn ancestry(&self, idx: NodeIndex) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(idx);
        while let Some(node) = current {
            chain.push(self.graph[node].library.identity.name.clone());
            current = self.parent(node);
        }
        chain.reverse();
        chain
    }

    /// Number of positions, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Render the tree for diagnostics, one position per line.
    pub fn render_tree(&self) -> String {
        let mut output = String::new();
        let root = match self.root {
            Some(r) => r,
            None => return output,
        };
        output.push_str(&format!("{}\n", self.graph[root]));
        let children = self.children(root);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.render_subtree(&mut output, child, "", i == count - 1);
        }
        output
    }

    fn render_subtree(&self, output: &mut String, idx: NodeIndex, prefix: &str, is_last: bool) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        let marker = match node.disposition {
            Disposition::Rejected => " (rejected)",
            _ => "",
        };
        output.push_str(&format!("{prefix}{connector}{node}{marker}\n"));

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.children(idx);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.render_subtree(output, child, &child_prefix, i == count - 1);
        }
    }
}
