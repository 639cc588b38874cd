// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-request dependency graphs
//!
//! A [`DependencyGraph`] is the transitive closure of the followed edges of one
//! root version. It is never persisted; build a fresh one per request.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{DependencyError, Result};
use crate::store::DependencyStore;
use crate::types::{
    external_key, DependencyEdge, DependencyTarget, DependencyType, ResourceSummary, ResourceVersion,
};

/// Default expansion depth guard
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Which edges a build follows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Follow OPTIONAL edges as well
    pub include_optional: bool,
}

impl BuildOptions {
    /// Whether an edge of this type is expanded
    #[must_use]
    pub fn follows(self, dependency_type: DependencyType) -> bool {
        match dependency_type {
            DependencyType::Required | DependencyType::Embedded => true,
            DependencyType::Optional => self.include_optional,
            DependencyType::Incompatible => false,
        }
    }
}

/// Identity of a graph node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeKey {
    /// A concrete resource version
    Version(String),
    /// An external target, by normalized name
    External(String),
    /// An internal resource with no installable version
    Unresolved(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(id) | Self::External(id) => f.write_str(id),
            Self::Unresolved(id) => write!(f, "unresolved:{id}"),
        }
    }
}

/// What a graph node stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDetail {
    /// Hydrated platform version
    Version {
        /// The version
        version: ResourceVersion,
        /// Its resource's display metadata
        resource: ResourceSummary,
    },
    /// Off-platform leaf
    External {
        /// Display name
        name: String,
        /// Where to get it, as first declared
        url: String,
        /// Different URLs other edges gave for the same name
        #[serde(skip_serializing_if = "Vec::is_empty")]
        other_urls: Vec<String>,
    },
    /// Internal target that has nothing installable yet
    Unresolved {
        /// Target resource's display metadata
        resource: ResourceSummary,
    },
}

/// A node of a dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// Identity
    pub key: NodeKey,
    /// Hops from the root
    pub depth: usize,
    /// Payload
    pub detail: NodeDetail,
}

impl GraphNode {
    /// Resource ID for version and unresolved nodes
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        match &self.detail {
            NodeDetail::Version { resource, .. } | NodeDetail::Unresolved { resource } => {
                Some(&resource.id)
            }
            NodeDetail::External { .. } => None,
        }
    }

    /// Resource or external name
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.detail {
            NodeDetail::Version { resource, .. } | NodeDetail::Unresolved { resource } => {
                &resource.name
            }
            NodeDetail::External { name, .. } => name,
        }
    }

    /// The selected version, for version nodes
    #[must_use]
    pub fn version(&self) -> Option<&ResourceVersion> {
        match &self.detail {
            NodeDetail::Version { version, .. } => Some(version),
            _ => None,
        }
    }

    fn dot_attrs(&self) -> String {
        match &self.detail {
            NodeDetail::Version { version, resource } => {
                format!("label=\"{}\\n{}\"", escape(&resource.name), escape(&version.version_number))
            }
            NodeDetail::External { name, .. } => {
                format!("label=\"{}\\nexternal\", style=dashed", escape(name))
            }
            NodeDetail::Unresolved { resource } => {
                format!("label=\"{}\\nunresolved\", color=red", escape(&resource.name))
            }
        }
    }
}

/// Edge in the presentation view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEdge {
    /// Stored edge ID
    pub id: String,
    /// Dependent node
    pub from: String,
    /// Dependency node
    pub to: String,
    /// Relationship
    pub dependency_type: DependencyType,
    /// Minimum version on the edge
    pub min_version: Option<String>,
}

/// Serializable graph handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    /// Root node ID
    pub root: String,
    /// Nodes in discovery order
    pub nodes: Vec<GraphNode>,
    /// Followed edges
    pub edges: Vec<ViewEdge>,
}

/// Transitive dependency graph of one root version
///
/// Edges point from dependent to dependency. Edges the build did not follow
/// (INCOMPATIBLE, and OPTIONAL unless requested) are kept aside in
/// [`DependencyGraph::unfollowed`] for constraint checking.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: NodeKey,
    graph: DiGraph<GraphNode, DependencyEdge>,
    node_indices: HashMap<NodeKey, NodeIndex>,
    unfollowed: Vec<DependencyEdge>,
    options: BuildOptions,
}

impl DependencyGraph {
    fn new(root: NodeKey, options: BuildOptions) -> Self {
        Self {
            root,
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            unfollowed: Vec::new(),
            options,
        }
    }

    fn insert_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&node.key) {
            return idx;
        }
        let key = node.key.clone();
        let idx = self.graph.add_node(node);
        self.node_indices.insert(key, idx);
        idx
    }

    /// Keep a second URL declared for an external name that is already a node
    fn note_external_url(&mut self, key: &NodeKey, url: &str, declared_by: &str) {
        let Some(&idx) = self.node_indices.get(key) else {
            return;
        };
        if let NodeDetail::External { name, url: first, other_urls } = &mut self.graph[idx].detail {
            if first.as_str() != url && !other_urls.iter().any(|u| u == url) {
                warn!(
                    "External dependency {} from {} points at {}, already seen at {}",
                    name, declared_by, url, first
                );
                other_urls.push(url.to_string());
            }
        }
    }

    fn connect(&mut self, from: &NodeKey, to: &NodeKey, edge: DependencyEdge) {
        if let (Some(&from_idx), Some(&to_idx)) = (self.node_indices.get(from), self.node_indices.get(to)) {
            self.graph.add_edge(from_idx, to_idx, edge);
        }
    }

    /// Root node key
    #[must_use]
    pub fn root(&self) -> &NodeKey {
        &self.root
    }

    /// Options the graph was built with
    #[must_use]
    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.node_indices.get(key).map(|&idx| &self.graph[idx])
    }

    /// Whether a node is present
    #[must_use]
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.node_indices.contains_key(key)
    }

    /// Whether a version is present
    #[must_use]
    pub fn contains_version(&self, version_id: &str) -> bool {
        self.contains(&NodeKey::Version(version_id.to_string()))
    }

    /// All nodes, in discovery order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// All followed edges as (dependent, dependency, edge)
    pub fn edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphNode, &DependencyEdge)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], e.weight()))
    }

    /// Direct dependencies of a node, in the order they were discovered
    #[must_use]
    pub fn dependencies_of(&self, key: &NodeKey) -> Vec<(&GraphNode, &DependencyEdge)> {
        let Some(&idx) = self.node_indices.get(key) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges_directed(idx, Direction::Outgoing).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| (&self.graph[e.target()], e.weight()))
            .collect()
    }

    /// Edges seen on visited versions but not expanded
    #[must_use]
    pub fn unfollowed(&self) -> &[DependencyEdge] {
        &self.unfollowed
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of followed edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, DependencyEdge> {
        &self.graph
    }

    pub(crate) fn index_of(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.node_indices.get(key).copied()
    }

    /// Presentation view
    #[must_use]
    pub fn to_view(&self) -> GraphView {
        GraphView {
            root: self.root.to_string(),
            nodes: self.nodes().cloned().collect(),
            edges: self
                .edges()
                .map(|(from, to, edge)| ViewEdge {
                    id: edge.id.clone(),
                    from: from.key.to_string(),
                    to: to.key.to_string(),
                    dependency_type: edge.dependency_type,
                    min_version: edge.target.min_version().map(String::from),
                })
                .collect(),
        }
    }

    /// Export to DOT format for Graphviz
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph dependencies {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box, style=rounded];\n\n");

        for node in self.nodes() {
            dot.push_str(&format!("  \"{}\" [{}];\n", escape(&node.key.to_string()), node.dot_attrs()));
        }

        dot.push('\n');

        for (from, to, edge) in self.edges() {
            let mut label = edge.dependency_type.to_string();
            if let Some(min) = edge.target.min_version() {
                label.push_str(&format!(" >= {}", escape(min)));
            }
            let style = match edge.dependency_type {
                DependencyType::Optional => ", style=dashed",
                DependencyType::Embedded => ", style=bold",
                _ => "",
            };
            dot.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"{}];\n",
                escape(&from.key.to_string()),
                escape(&to.key.to_string()),
                label,
                style
            ));
        }

        dot.push_str("}\n");
        dot
    }

    /// Export to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_view())
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Breadth-first expansion of a root version's dependencies
pub struct GraphBuilder<'a, B: Backend> {
    store: &'a DependencyStore<B>,
    max_depth: usize,
}

impl<'a, B: Backend> GraphBuilder<'a, B> {
    /// Builder with the default depth guard
    pub fn new(store: &'a DependencyStore<B>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the depth guard
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Configured depth guard
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Expand `root_version_id`
    ///
    /// Internal targets resolve to their resource's newest published version
    /// and are expanded in turn; external targets are leaves. Every node is
    /// visited once, so shared dependencies collapse into one node.
    pub fn build(&self, root_version_id: &str, options: BuildOptions) -> Result<DependencyGraph> {
        let root = self.store.version(root_version_id)?;
        let root_key = NodeKey::Version(root.id.clone());
        let mut graph = DependencyGraph::new(root_key.clone(), options);

        let resource = self.store.summary(&root.resource_id)?;
        let mut queue: VecDeque<(NodeKey, String, usize)> = VecDeque::new();
        queue.push_back((root_key.clone(), root.id.clone(), 0));
        graph.insert_node(GraphNode {
            key: root_key,
            depth: 0,
            detail: NodeDetail::Version { version: root, resource },
        });

        while let Some((key, version_id, depth)) = queue.pop_front() {
            for edge in self.store.list_edges(&version_id)? {
                if !options.follows(edge.dependency_type) {
                    graph.unfollowed.push(edge);
                    continue;
                }

                let (child_key, child) = self.child_of(&edge.target)?;

                if !graph.contains(&child_key) {
                    let child_depth = depth + 1;
                    if child_depth > self.max_depth {
                        warn!(
                            "Dependency graph of {} exceeds depth {} at {} (possible data corruption)",
                            root_version_id, self.max_depth, child_key
                        );
                        return Err(DependencyError::GraphTooDeep {
                            root: root_version_id.to_string(),
                            max_depth: self.max_depth,
                        });
                    }

                    if let NodeDetail::Version { version, .. } = &child {
                        queue.push_back((child_key.clone(), version.id.clone(), child_depth));
                    }
                    graph.insert_node(GraphNode {
                        key: child_key.clone(),
                        depth: child_depth,
                        detail: child,
                    });
                } else if let NodeDetail::External { url, .. } = &child {
                    graph.note_external_url(&child_key, url, &edge.version_id);
                }

                graph.connect(&key, &child_key, edge);
            }
        }

        debug!(
            "Built graph for {}: {} node(s), {} edge(s), {} unfollowed",
            root_version_id,
            graph.node_count(),
            graph.edge_count(),
            graph.unfollowed.len()
        );
        Ok(graph)
    }

    fn child_of(&self, target: &DependencyTarget) -> Result<(NodeKey, NodeDetail)> {
        Ok(match target {
            DependencyTarget::Internal { resource_id, .. } => {
                let resource = self.store.summary(resource_id)?;
                match self.store.latest_installable(resource_id)? {
                    Some(version) => (
                        NodeKey::Version(version.id.clone()),
                        NodeDetail::Version { version, resource },
                    ),
                    None => (
                        NodeKey::Unresolved(resource_id.clone()),
                        NodeDetail::Unresolved { resource },
                    ),
                }
            }
            DependencyTarget::External { name, url, .. } => (
                NodeKey::External(external_key(name)),
                NodeDetail::External {
                    name: name.clone(),
                    url: url.clone(),
                    other_urls: Vec::new(),
                },
            ),
        })
    }
}
