// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Constraint resolution and install ordering
//!
//! The resolver turns a [`DependencyGraph`] into an [`InstallPlan`]: the
//! versions to install in dependency-first order, the versions bundled inside
//! them, and the off-platform requirements the user must satisfy by hand.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::{DependencyError, ErrorKind, Incompatibility, Result};
use crate::graph::{BuildOptions, DependencyGraph, GraphBuilder, GraphNode, NodeDetail, NodeKey};
use crate::store::DependencyStore;
use crate::types::{external_key, DependencyTarget, DependencyType};
use crate::version;

/// Resolution lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionState {
    /// Not started
    Pending,
    /// Expanding the graph
    BuildingGraph,
    /// Checking minimums, incompatibilities and ordering
    CheckingConstraints,
    /// Produced a plan
    Resolved,
    /// The dependency data is contradictory; the user can fix it
    Conflict,
    /// Corrupt data or a storage failure
    Error,
}

impl ResolutionState {
    /// Whether resolution has finished
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Conflict | Self::Error)
    }
}

/// Caller choices for one resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Install OPTIONAL targets too
    pub include_optional: bool,
}

/// One version to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallStep {
    /// Version to install
    pub version_id: String,
    /// Its resource
    pub resource_id: String,
    /// Resource display name
    pub resource_name: String,
    /// Selected version number
    pub version_number: String,
    /// Highest minimum any dependent asked for
    pub min_version: Option<String>,
    /// Names of the installed resources that pull this one in
    pub required_by: Vec<String>,
}

/// A version shipped inside another one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundledVersion {
    /// Bundled version
    pub version_id: String,
    /// Resource display name
    pub resource_name: String,
    /// Version number
    pub version_number: String,
    /// Names of the resources embedding it
    pub embedded_in: Vec<String>,
}

/// A requirement outside the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalRequirement {
    /// Display name
    pub name: String,
    /// Where to get it
    pub url: String,
    /// Conflicting URLs other dependents declared
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other_urls: Vec<String>,
    /// Highest minimum asked for
    pub min_version: Option<String>,
    /// Names of the resources requiring it
    pub required_by: Vec<String>,
}

/// An OPTIONAL edge that was left out of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDependency {
    /// Edge ID
    pub edge_id: String,
    /// Name of the resource declaring it
    pub declared_by: String,
    /// Target description
    pub target: String,
}

/// Ordered install plan for a root version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    /// Root version
    pub root: String,
    /// Dependencies first, root last
    pub steps: Vec<InstallStep>,
    /// Versions shipped inside installed ones
    pub bundled: Vec<BundledVersion>,
    /// Off-platform requirements
    pub external: Vec<ExternalRequirement>,
    /// OPTIONAL edges not requested
    pub skipped_optional: Vec<SkippedDependency>,
}

impl InstallPlan {
    /// Version IDs in install order
    #[must_use]
    pub fn version_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.version_id.as_str()).collect()
    }

    /// Install position of a version
    #[must_use]
    pub fn position(&self, version_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.version_id == version_id)
    }

    /// Step for a version
    #[must_use]
    pub fn step(&self, version_id: &str) -> Option<&InstallStep> {
        self.steps.iter().find(|s| s.version_id == version_id)
    }

    /// Number of install steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there is nothing to install
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of [`ConstraintResolver::run`]
#[derive(Debug, Serialize)]
pub struct ResolutionReport {
    /// Root version
    pub root: String,
    /// Final state
    pub state: ResolutionState,
    /// States passed through, in order
    pub history: Vec<ResolutionState>,
    /// Plan, when resolved
    pub plan: Option<InstallPlan>,
    /// Failure, otherwise
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<DependencyError>,
}

impl ResolutionReport {
    /// Convert back into a plain result
    pub fn into_result(self) -> Result<InstallPlan> {
        match (self.plan, self.error) {
            (Some(plan), None) => Ok(plan),
            (_, Some(err)) => Err(err),
            (None, None) => Err(DependencyError::validation("resolution did not finish")),
        }
    }
}

fn serialize_error<S: Serializer>(error: &Option<DependencyError>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Reported {
        kind: ErrorKind,
        message: String,
    }

    error
        .as_ref()
        .map(|e| Reported {
            kind: e.kind(),
            message: e.to_string(),
        })
        .serialize(serializer)
}

/// Terminal state for a failure
///
/// A cycle seen at read time means the write-time check was bypassed, so it is
/// treated as corrupt data rather than a user conflict.
fn classify(error: &DependencyError) -> ResolutionState {
    match error {
        DependencyError::CycleDetected { .. } => ResolutionState::Error,
        e => match e.kind() {
            ErrorKind::Conflict | ErrorKind::Validation => ResolutionState::Conflict,
            ErrorKind::NotFound | ErrorKind::Error => ResolutionState::Error,
        },
    }
}

/// Highest minimum version per target, with the edge that set it
struct Minimum {
    value: String,
    edge_id: String,
}

/// Resolves root versions into install plans
pub struct ConstraintResolver<'a, B: Backend> {
    builder: GraphBuilder<'a, B>,
}

impl<'a, B: Backend> ConstraintResolver<'a, B> {
    /// Resolver with the default depth guard
    pub fn new(store: &'a DependencyStore<B>) -> Self {
        Self {
            builder: GraphBuilder::new(store),
        }
    }

    /// Resolver using a configured builder
    pub fn with_builder(builder: GraphBuilder<'a, B>) -> Self {
        Self { builder }
    }

    /// Resolve REQUIRED dependencies of `root_version_id`
    pub fn resolve(&self, root_version_id: &str) -> Result<InstallPlan> {
        self.resolve_with(root_version_id, ResolveOptions::default())
    }

    /// Resolve with explicit options
    pub fn resolve_with(&self, root_version_id: &str, options: ResolveOptions) -> Result<InstallPlan> {
        self.run(root_version_id, options).into_result()
    }

    /// Resolve and record every state transition
    pub fn run(&self, root_version_id: &str, options: ResolveOptions) -> ResolutionReport {
        let mut report = ResolutionReport {
            root: root_version_id.to_string(),
            state: ResolutionState::Pending,
            history: vec![ResolutionState::Pending],
            plan: None,
            error: None,
        };

        let advance = |report: &mut ResolutionReport, state: ResolutionState| {
            debug!("Resolution of {}: {:?} -> {:?}", root_version_id, report.state, state);
            report.state = state;
            report.history.push(state);
        };

        advance(&mut report, ResolutionState::BuildingGraph);
        let build = BuildOptions {
            include_optional: options.include_optional,
        };
        let outcome = self.builder.build(root_version_id, build).and_then(|graph| {
            advance(&mut report, ResolutionState::CheckingConstraints);
            plan(&graph)
        });

        match outcome {
            Ok(plan) => {
                info!(
                    "Resolved {}: {} step(s), {} bundled, {} external",
                    root_version_id,
                    plan.steps.len(),
                    plan.bundled.len(),
                    plan.external.len()
                );
                advance(&mut report, ResolutionState::Resolved);
                report.plan = Some(plan);
            }
            Err(err) => {
                let state = classify(&err);
                info!("Resolution of {} failed ({:?}): {}", root_version_id, state, err);
                advance(&mut report, state);
                report.error = Some(err);
            }
        }

        report
    }
}

/// Which edge types pull a target into the install set
fn installs(dependency_type: DependencyType, include_optional: bool) -> bool {
    match dependency_type {
        DependencyType::Required => true,
        DependencyType::Optional => include_optional,
        DependencyType::Embedded | DependencyType::Incompatible => false,
    }
}

/// Turn a built graph into a plan
fn plan(graph: &DependencyGraph) -> Result<InstallPlan> {
    let include_optional = graph.options().include_optional;
    let inner = graph.inner();
    let Some(root_idx) = graph.index_of(graph.root()) else {
        return Err(DependencyError::not_found("version", graph.root().to_string()));
    };

    // Install set: reachable from the root through installing edges only
    let mut install: HashSet<NodeIndex> = HashSet::from([root_idx]);
    let mut queue = VecDeque::from([root_idx]);
    while let Some(idx) = queue.pop_front() {
        for edge in inner.edges_directed(idx, Direction::Outgoing) {
            if installs(edge.weight().dependency_type, include_optional) && install.insert(edge.target()) {
                queue.push_back(edge.target());
            }
        }
    }

    let minimums = aggregate_minimums(graph)?;

    for &idx in &install {
        let node = &inner[idx];
        if let NodeDetail::Unresolved { resource } = &node.detail {
            return Err(DependencyError::UnsatisfiedConstraint {
                target: resource.id.clone(),
                requirement: minimums.get(&node.key).map(|m| m.value.clone()),
                selected: None,
            });
        }
    }

    for node in graph.nodes() {
        check_minimum(node, minimums.get(&node.key))?;
    }

    check_incompatible(graph)?;

    let order = install_order(graph, root_idx, &install)?;

    let steps = order
        .into_iter()
        .filter_map(|idx| {
            let node = &inner[idx];
            let version = node.version()?;
            let required_by = names_of(
                inner
                    .edges_directed(idx, Direction::Incoming)
                    .filter(|e| install.contains(&e.source()))
                    .filter(|e| installs(e.weight().dependency_type, include_optional))
                    .map(|e| &inner[e.source()]),
            );
            Some(InstallStep {
                version_id: version.id.clone(),
                resource_id: version.resource_id.clone(),
                resource_name: node.name().to_string(),
                version_number: version.version_number.clone(),
                min_version: minimums.get(&node.key).map(|m| m.value.clone()),
                required_by,
            })
        })
        .collect();

    let mut bundled = Vec::new();
    let mut external = Vec::new();
    for idx in inner.node_indices() {
        let node = &inner[idx];
        let dependents = inner.edges_directed(idx, Direction::Incoming).map(|e| &inner[e.source()]);
        match &node.detail {
            NodeDetail::Version { version, .. } if !install.contains(&idx) => {
                bundled.push(BundledVersion {
                    version_id: version.id.clone(),
                    resource_name: node.name().to_string(),
                    version_number: version.version_number.clone(),
                    embedded_in: names_of(dependents),
                });
            }
            NodeDetail::External { name, url, other_urls } => external.push(ExternalRequirement {
                name: name.clone(),
                url: url.clone(),
                other_urls: other_urls.clone(),
                min_version: minimums.get(&node.key).map(|m| m.value.clone()),
                required_by: names_of(dependents),
            }),
            _ => {}
        }
    }

    let skipped_optional = graph
        .unfollowed()
        .iter()
        .filter(|e| e.dependency_type == DependencyType::Optional)
        .map(|e| SkippedDependency {
            edge_id: e.id.clone(),
            declared_by: name_of_version(graph, &e.version_id),
            target: e.target.to_string(),
        })
        .collect();

    Ok(InstallPlan {
        root: graph.root().to_string(),
        steps,
        bundled,
        external,
        skipped_optional,
    })
}

fn names_of<'g>(nodes: impl Iterator<Item = &'g GraphNode>) -> Vec<String> {
    nodes
        .map(|n| n.name().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn name_of_version(graph: &DependencyGraph, version_id: &str) -> String {
    graph
        .node(&NodeKey::Version(version_id.to_string()))
        .map_or_else(|| version_id.to_string(), |n| n.name().to_string())
}

/// Highest minimum version per target node
fn aggregate_minimums(graph: &DependencyGraph) -> Result<HashMap<NodeKey, Minimum>> {
    let mut minimums: HashMap<NodeKey, Minimum> = HashMap::new();

    for (_, to, edge) in graph.edges() {
        let Some(min) = edge.target.min_version() else {
            continue;
        };
        match minimums.get_mut(&to.key) {
            None => {
                minimums.insert(
                    to.key.clone(),
                    Minimum {
                        value: min.to_string(),
                        edge_id: edge.id.clone(),
                    },
                );
            }
            Some(current) => match version::compare(min, &current.value) {
                Some(Ordering::Greater) => {
                    current.value = min.to_string();
                    current.edge_id.clone_from(&edge.id);
                }
                Some(_) => {}
                None => {
                    return Err(DependencyError::AmbiguousConstraint {
                        target: edge.target.key(),
                        left: current.value.clone(),
                        left_edge: current.edge_id.clone(),
                        right: min.to_string(),
                        right_edge: edge.id.clone(),
                    });
                }
            },
        }
    }

    Ok(minimums)
}

/// Selected version must meet the aggregated minimum
///
/// A selected version that cannot be ordered against the minimum does not
/// meet it.
fn check_minimum(node: &GraphNode, minimum: Option<&Minimum>) -> Result<()> {
    let (Some(selected), Some(minimum)) = (node.version(), minimum) else {
        return Ok(());
    };

    if version::satisfies(&selected.version_number, &minimum.value) == Some(true) {
        return Ok(());
    }
    debug!(
        "{} {} does not meet minimum {} (edge {})",
        selected.resource_id, selected.version_number, minimum.value, minimum.edge_id
    );
    Err(DependencyError::UnsatisfiedConstraint {
        target: selected.resource_id.clone(),
        requirement: Some(minimum.value.clone()),
        selected: Some(selected.version_number.clone()),
    })
}

/// INCOMPATIBLE edges declared by selected versions against other selected targets
fn check_incompatible(graph: &DependencyGraph) -> Result<()> {
    let mut selected_by_resource: HashMap<&str, &GraphNode> = HashMap::new();
    let mut selected_external: HashSet<&NodeKey> = HashSet::new();
    for node in graph.nodes() {
        match &node.detail {
            NodeDetail::Version { version, .. } => {
                selected_by_resource.insert(version.resource_id.as_str(), node);
            }
            NodeDetail::External { .. } => {
                selected_external.insert(&node.key);
            }
            NodeDetail::Unresolved { .. } => {}
        }
    }

    let mut conflicts = Vec::new();
    for edge in graph.unfollowed() {
        if edge.dependency_type != DependencyType::Incompatible {
            continue;
        }
        let conflicts_with = match &edge.target {
            DependencyTarget::Internal { resource_id, min_version } => {
                let Some(node) = selected_by_resource.get(resource_id.as_str()) else {
                    continue;
                };
                let in_range = match (min_version, node.version()) {
                    (Some(min), Some(selected)) => {
                        version::satisfies(&selected.version_number, min).unwrap_or(true)
                    }
                    _ => true,
                };
                if !in_range {
                    continue;
                }
                node.name().to_string()
            }
            DependencyTarget::External { name, .. } => {
                if !selected_external.contains(&NodeKey::External(external_key(name))) {
                    continue;
                }
                name.clone()
            }
        };
        conflicts.push(Incompatibility {
            edge_id: edge.id.clone(),
            declared_by: name_of_version(graph, &edge.version_id),
            conflicts_with,
        });
    }

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(DependencyError::IncompatibleDependency { conflicts })
    }
}

/// Dependency-first order of the install set
fn install_order(
    graph: &DependencyGraph,
    root_idx: NodeIndex,
    install: &HashSet<NodeIndex>,
) -> Result<Vec<NodeIndex>> {
    let inner = graph.inner();
    let root_resource = inner[root_idx].resource_id().unwrap_or_default().to_string();

    // A second version of the root's own resource means the root depends on itself
    for &idx in install {
        if idx != root_idx && inner[idx].resource_id() == Some(root_resource.as_str()) {
            return Err(DependencyError::CycleDetected {
                source_version: graph.root().to_string(),
                target: root_resource,
                path: vec![graph.root().to_string(), inner[idx].key.to_string()],
            });
        }
    }

    // Dependency -> dependent, so a topological order installs dependencies first
    let mut ordering: DiGraph<NodeIndex, ()> = DiGraph::new();
    let mut local: BTreeMap<NodeIndex, NodeIndex> = BTreeMap::new();
    let mut members: Vec<NodeIndex> = install.iter().copied().collect();
    members.sort();
    for idx in members {
        local.insert(idx, ordering.add_node(idx));
    }
    for edge in inner.edge_references() {
        if !installs(edge.weight().dependency_type, graph.options().include_optional) {
            continue;
        }
        if let (Some(&from), Some(&to)) = (local.get(&edge.target()), local.get(&edge.source())) {
            ordering.add_edge(from, to, ());
        }
    }

    match toposort(&ordering, None) {
        Ok(order) => Ok(order.into_iter().map(|i| ordering[i]).collect()),
        Err(cycle) => {
            let start = ordering[cycle.node_id()];
            let path = tarjan_scc(&ordering)
                .into_iter()
                .find(|scc| scc.iter().any(|&i| ordering[i] == start))
                .unwrap_or_default()
                .into_iter()
                .map(|i| inner[ordering[i]].key.to_string())
                .collect();
            Err(DependencyError::CycleDetected {
                source_version: graph.root().to_string(),
                target: inner[start].key.to_string(),
                path,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorePolicy;
    use crate::types::{NewDependency, Resource, ResourceKind, ResourceVersion};

    fn relaxed() -> DependencyStore {
        DependencyStore::default().with_policy(StorePolicy { require_editable_version: false })
    }

    fn published(store: &DependencyStore, name: &str, number: &str) -> String {
        let resource_id = Resource::generate_id(name);
        if store.backend().find_resource(&resource_id).unwrap().is_none() {
            store.register_resource(Resource::new(name, ResourceKind::Mod)).unwrap();
        }
        let id = store
            .register_version(ResourceVersion::draft(&resource_id, number))
            .unwrap()
            .id;
        store.publish_version(&id).unwrap();
        id
    }

    fn depend(store: &DependencyStore, from: &str, target: DependencyTarget, dependency_type: DependencyType) -> String {
        store.add_edge(from, NewDependency::new(dependency_type, target)).unwrap().id
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        let store = relaxed();
        let a = published(&store, "alpha", "1.0.0");
        let b = published(&store, "beta", "1.0.0");
        let c = published(&store, "gamma", "1.0.0");
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);
        depend(&store, &b, DependencyTarget::internal("res:gamma"), DependencyType::Required);

        let plan = ConstraintResolver::new(&store).resolve(&a).unwrap();
        assert_eq!(plan.version_ids(), vec![c.as_str(), b.as_str(), a.as_str()]);
        assert_eq!(plan.step(&b).unwrap().required_by, vec!["alpha".to_string()]);
    }

    #[test]
    fn test_higher_minimum_wins() {
        let store = relaxed();
        let a = published(&store, "alpha", "1.0.0");
        let b = published(&store, "beta", "1.0.0");
        let d = published(&store, "delta", "1.4.0");
        for number in ["1.2.0", "1.3.0"] {
            store.register_version(ResourceVersion::draft("res:delta", number)).unwrap();
        }
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);
        depend(&store, &a, DependencyTarget::internal_at_least("res:delta", "1.2.0"), DependencyType::Required);
        depend(&store, &b, DependencyTarget::internal_at_least("res:delta", "1.3.0"), DependencyType::Required);

        let plan = ConstraintResolver::new(&store).resolve(&a).unwrap();
        assert_eq!(plan.step(&d).unwrap().min_version.as_deref(), Some("1.3.0"));
    }

    #[test]
    fn test_selected_below_minimum_is_unsatisfied() {
        let store = relaxed();
        let a = published(&store, "alpha", "1.0.0");
        let b1 = published(&store, "beta", "2.0.0");
        let b2 = store.register_version(ResourceVersion::draft("res:beta", "2.5.0")).unwrap().id;
        depend(&store, &a, DependencyTarget::internal_at_least("res:beta", "2.5.0"), DependencyType::Required);
        assert_ne!(b1, b2);

        let err = ConstraintResolver::new(&store).resolve(&a).unwrap_err();
        assert!(matches!(
            err,
            DependencyError::UnsatisfiedConstraint { ref selected, .. } if selected.as_deref() == Some("2.0.0")
        ));
    }

    #[test]
    fn test_unpublished_required_target_is_unsatisfied() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        store.register_resource(Resource::new("beta", ResourceKind::Mod)).unwrap();
        store.register_version(ResourceVersion::draft("res:beta", "1")).unwrap();
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);

        let report = ConstraintResolver::new(&store).run(&a, ResolveOptions::default());
        assert_eq!(report.state, ResolutionState::Conflict);
        assert!(matches!(report.error, Some(DependencyError::UnsatisfiedConstraint { selected: None, .. })));
    }

    #[test]
    fn test_incomparable_minimums_are_ambiguous() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let b = published(&store, "beta", "1");
        published(&store, "delta", "1.0.0");
        store.register_version(ResourceVersion::draft("res:delta", "nightly")).unwrap();
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);
        depend(&store, &a, DependencyTarget::internal_at_least("res:delta", "1.0.0"), DependencyType::Required);
        depend(&store, &b, DependencyTarget::internal_at_least("res:delta", "nightly"), DependencyType::Required);

        let err = ConstraintResolver::new(&store).resolve(&a).unwrap_err();
        assert!(matches!(err, DependencyError::AmbiguousConstraint { .. }));
    }

    #[test]
    fn test_free_text_minimum_matching_selected() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let b = published(&store, "beta", "1");
        let nightly = published(&store, "delta", "nightly");
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);
        depend(&store, &a, DependencyTarget::internal_at_least("res:delta", "nightly"), DependencyType::Required);
        depend(&store, &b, DependencyTarget::internal_at_least("res:delta", "nightly"), DependencyType::Required);

        let plan = ConstraintResolver::new(&store).resolve(&a).unwrap();
        assert_eq!(plan.step(&nightly).unwrap().min_version.as_deref(), Some("nightly"));
        assert_eq!(plan.position(&a), Some(plan.len() - 1));
    }

    #[test]
    fn test_selected_incomparable_with_minimum_is_unsatisfied() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        published(&store, "delta", "1.0.0");
        store.register_version(ResourceVersion::draft("res:delta", "nightly")).unwrap();
        depend(&store, &a, DependencyTarget::internal_at_least("res:delta", "nightly"), DependencyType::Required);

        let err = ConstraintResolver::new(&store).resolve(&a).unwrap_err();
        assert!(matches!(
            err,
            DependencyError::UnsatisfiedConstraint { ref requirement, ref selected, .. }
                if requirement.as_deref() == Some("nightly") && selected.as_deref() == Some("1.0.0")
        ));
    }

    #[test]
    fn test_transitive_incompatibility() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let b = published(&store, "beta", "1");
        published(&store, "gamma", "1");
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);
        depend(&store, &a, DependencyTarget::internal("res:gamma"), DependencyType::Required);
        let edge = depend(&store, &b, DependencyTarget::internal("res:gamma"), DependencyType::Incompatible);

        let report = ConstraintResolver::new(&store).run(&a, ResolveOptions::default());
        assert_eq!(report.state, ResolutionState::Conflict);
        match report.error {
            Some(DependencyError::IncompatibleDependency { conflicts }) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].edge_id, edge);
                assert_eq!(conflicts[0].declared_by, "beta");
                assert_eq!(conflicts[0].conflicts_with, "gamma");
            }
            other => panic!("expected incompatibility, got {other:?}"),
        }
    }

    #[test]
    fn test_incompatible_below_minimum_is_fine() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let b = published(&store, "beta", "1");
        published(&store, "gamma", "1.0.0");
        store.register_version(ResourceVersion::draft("res:gamma", "2.0.0")).unwrap();
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);
        depend(&store, &a, DependencyTarget::internal("res:gamma"), DependencyType::Required);
        depend(&store, &b, DependencyTarget::internal_at_least("res:gamma", "2.0.0"), DependencyType::Incompatible);

        assert!(ConstraintResolver::new(&store).resolve(&a).is_ok());
    }

    #[test]
    fn test_optional_only_when_requested() {
        let store = relaxed();
        let a = published(&store, "alpha", "1.0");
        published(&store, "beta", "2.0");
        let b = published(&store, "beta", "2.1");
        let c = published(&store, "gamma", "1.0");
        depend(&store, &a, DependencyTarget::internal_at_least("res:beta", "2.0"), DependencyType::Required);
        depend(&store, &a, DependencyTarget::internal("res:gamma"), DependencyType::Optional);

        let resolver = ConstraintResolver::new(&store);
        let plan = resolver.resolve(&a).unwrap();
        assert_eq!(plan.version_ids(), vec![b.as_str(), a.as_str()]);
        assert_eq!(plan.skipped_optional.len(), 1);

        let plan = resolver.resolve_with(&a, ResolveOptions { include_optional: true }).unwrap();
        assert!(plan.position(&c).unwrap() < plan.position(&a).unwrap());
        assert!(plan.skipped_optional.is_empty());
    }

    #[test]
    fn test_embedded_is_bundled_not_installed() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let b = published(&store, "beta", "1");
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Embedded);

        let plan = ConstraintResolver::new(&store).resolve(&a).unwrap();
        assert_eq!(plan.version_ids(), vec![a.as_str()]);
        assert_eq!(plan.bundled[0].version_id, b);
        assert_eq!(plan.bundled[0].embedded_in, vec!["alpha".to_string()]);
    }

    #[test]
    fn test_external_requirements_listed() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        depend(
            &store,
            &a,
            DependencyTarget::external("Server Core", "https://example.com/core", Some("3.1")),
            DependencyType::Required,
        );

        let plan = ConstraintResolver::new(&store).resolve(&a).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.external[0].name, "Server Core");
        assert_eq!(plan.external[0].min_version.as_deref(), Some("3.1"));
    }

    #[test]
    fn test_state_history() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let report = ConstraintResolver::new(&store).run(&a, ResolveOptions::default());
        assert_eq!(
            report.history,
            vec![
                ResolutionState::Pending,
                ResolutionState::BuildingGraph,
                ResolutionState::CheckingConstraints,
                ResolutionState::Resolved,
            ]
        );
        assert!(report.state.is_terminal());
    }

    #[test]
    fn test_unknown_root_is_error_state() {
        let store = relaxed();
        let report = ConstraintResolver::new(&store).run("ver:ghost@1", ResolveOptions::default());
        assert_eq!(report.state, ResolutionState::Error);
        assert_eq!(report.history.last(), Some(&ResolutionState::Error));
        assert!(!report.history.contains(&ResolutionState::CheckingConstraints));
    }

    #[test]
    fn test_corrupt_cycle_is_error_state() {
        let store = relaxed();
        let a = published(&store, "alpha", "1");
        let b = published(&store, "beta", "1");
        depend(&store, &a, DependencyTarget::internal("res:beta"), DependencyType::Required);

        // Bypass the store's write-time check
        let target = DependencyTarget::internal("res:alpha");
        store
            .backend()
            .create_edge(crate::types::DependencyEdge {
                id: crate::types::DependencyEdge::generate_id(&b, &target.key()),
                version_id: b.clone(),
                dependency_type: DependencyType::Required,
                target,
                created_at: chrono::Utc::now(),
            })
            .unwrap();

        let report = ConstraintResolver::new(&store).run(&a, ResolveOptions::default());
        assert_eq!(report.state, ResolutionState::Error);
        assert!(matches!(report.error, Some(DependencyError::CycleDetected { .. })));
    }

    #[test]
    fn test_report_serializes_error() {
        let store = relaxed();
        let report = ConstraintResolver::new(&store).run("ver:ghost@1", ResolveOptions::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "ERROR");
        assert_eq!(json["error"]["kind"], "not_found");
        assert!(json["plan"].is_null());
    }
}
