// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Dependency store - validated, cycle-checked edge management over a backend

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{Backend, CommitGuard, MemoryBackend};
use crate::cycle::CycleDetector;
use crate::error::{DependencyError, Result};
use crate::types::{
    DependencyEdge, DependencyTarget, DependencyType, EdgeUpdate, NewDependency, Resource,
    ResourceSummary, ResourceVersion, VersionStatus,
};
use crate::version;

/// Longest accepted external dependency name
pub const MAX_EXTERNAL_NAME_LEN: usize = 200;
/// Longest accepted minimum version string
pub const MAX_MIN_VERSION_LEN: usize = 50;

/// Write rules enforced by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Only DRAFT and REJECTED versions may have their edges changed
    pub require_editable_version: bool,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            require_editable_version: true,
        }
    }
}

/// A version that depends on some resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentVersion {
    /// Version ID
    pub id: String,
    /// Version number
    pub version_number: String,
}

/// A resource with one or more versions depending on the queried resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependent {
    /// The depending resource
    pub resource: ResourceSummary,
    /// Relationship of its first listed edge
    pub dependency_type: DependencyType,
    /// Minimum version of its first listed edge
    pub min_version: Option<String>,
    /// Depending versions on this page
    pub versions: Vec<DependentVersion>,
}

/// One page of reverse dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentsPage {
    /// Grouped dependents
    pub dependents: Vec<Dependent>,
    /// Number of edges targeting the resource
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    /// Edges per page
    pub limit: usize,
    /// Number of pages
    pub total_pages: usize,
}

/// Owns the dependency edge set
///
/// Every write holds a store-wide commit lock across its checks and the
/// write: two concurrent additions (A -> B and B -> A) live on different
/// source versions, so a per-version lock could not stop them from jointly
/// closing a cycle. The backend's [`CommitGuard`] extends the same exclusion
/// to other handles on the same data.
#[derive(Debug)]
pub struct DependencyStore<B: Backend = MemoryBackend> {
    backend: B,
    policy: StorePolicy,
    commit_lock: Mutex<()>,
}

impl Default for DependencyStore<MemoryBackend> {
    fn default() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: Backend> DependencyStore<B> {
    /// Create a store over `backend` with the default policy
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            policy: StorePolicy::default(),
            commit_lock: Mutex::new(()),
        }
    }

    /// Replace the write policy
    #[must_use]
    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Active write policy
    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    fn commit(&self) -> Result<(MutexGuard<'_, ()>, CommitGuard)> {
        let local = self.commit_lock.lock().map_err(|_| DependencyError::Poisoned)?;
        let shared = self.backend.begin_commit()?;
        Ok((local, shared))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Register a new resource
    pub fn register_resource(&self, resource: Resource) -> Result<Resource> {
        if resource.name.trim().is_empty() {
            return Err(DependencyError::validation("resource name must not be empty"));
        }
        if resource.slug.is_empty() {
            return Err(DependencyError::validation(format!(
                "resource name {:?} has no usable slug",
                resource.name
            )));
        }

        let _commit = self.commit()?;
        if self.backend.find_resource(&resource.id)?.is_some() {
            return Err(DependencyError::validation(format!(
                "resource {} already exists",
                resource.id
            )));
        }
        self.backend.put_resource(resource.clone())?;
        debug!("Registered resource {}", resource.id);
        Ok(resource)
    }

    /// Register a new version of an existing resource
    pub fn register_version(&self, version: ResourceVersion) -> Result<ResourceVersion> {
        if version.version_number.trim().is_empty() {
            return Err(DependencyError::validation("version number must not be empty"));
        }

        let _commit = self.commit()?;
        self.resource(&version.resource_id)?;
        if self.backend.find_version(&version.id)?.is_some() {
            return Err(DependencyError::validation(format!(
                "version {} already exists",
                version.id
            )));
        }
        self.backend.put_version(version.clone())?;
        debug!("Registered version {}", version.id);
        Ok(version)
    }

    /// Move a version to PUBLISHED, stamping its publish time
    pub fn publish_version(&self, version_id: &str) -> Result<ResourceVersion> {
        let _commit = self.commit()?;
        let mut version = self.version(version_id)?;
        match version.status {
            VersionStatus::Published => return Ok(version),
            VersionStatus::Archived => {
                return Err(DependencyError::validation(format!(
                    "version {version_id} is archived and cannot be published"
                )));
            }
            VersionStatus::Draft | VersionStatus::Pending | VersionStatus::Rejected => {}
        }
        version.status = VersionStatus::Published;
        version.published_at = Some(Utc::now());
        self.backend.put_version(version.clone())?;
        info!("Published {}", version.id);
        Ok(version)
    }

    /// Delete a version together with the edges it owns
    pub fn delete_version(&self, version_id: &str) -> Result<bool> {
        let _commit = self.commit()?;
        let removed = self.backend.delete_version(version_id)?;
        if removed {
            info!("Deleted version {} and its dependencies", version_id);
        }
        Ok(removed)
    }

    /// Look up a resource
    pub fn resource(&self, resource_id: &str) -> Result<Resource> {
        self.backend
            .find_resource(resource_id)?
            .ok_or_else(|| DependencyError::not_found("resource", resource_id))
    }

    /// All registered resources
    pub fn resources(&self) -> Result<Vec<Resource>> {
        self.backend.list_resources()
    }

    /// Look up a version
    pub fn version(&self, version_id: &str) -> Result<ResourceVersion> {
        self.backend
            .find_version(version_id)?
            .ok_or_else(|| DependencyError::not_found("version", version_id))
    }

    /// All versions of a resource, oldest first
    pub fn versions_of(&self, resource_id: &str) -> Result<Vec<ResourceVersion>> {
        self.resource(resource_id)?;
        let mut versions = self.backend.versions_of(resource_id)?;
        versions.sort_by(version::release_order);
        Ok(versions)
    }

    /// Newest PUBLISHED version of a resource
    pub fn latest_installable(&self, resource_id: &str) -> Result<Option<ResourceVersion>> {
        Ok(self
            .backend
            .versions_of(resource_id)?
            .into_iter()
            .filter(|v| v.status.is_installable())
            .max_by(version::release_order))
    }

    /// Display metadata for a resource, falling back to its ID when absent
    pub fn summary(&self, resource_id: &str) -> Result<ResourceSummary> {
        Ok(match self.backend.find_resource(resource_id)? {
            Some(resource) => resource.summary(),
            None => ResourceSummary {
                id: resource_id.to_string(),
                name: resource_id.to_string(),
                slug: resource_id.strip_prefix("res:").unwrap_or(resource_id).to_string(),
                icon_url: None,
            },
        })
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Outgoing edges of a version, REQUIRED first then oldest first
    pub fn list_edges(&self, version_id: &str) -> Result<Vec<DependencyEdge>> {
        self.version(version_id)?;
        let mut edges = self.backend.list_edges_for_version(version_id)?;
        edges.sort_by(|a, b| {
            a.dependency_type
                .cmp(&b.dependency_type)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(edges)
    }

    /// Add a dependency edge to a version
    ///
    /// Fails with `CycleDetected` when a REQUIRED internal edge would close a
    /// cycle; in that case nothing is written.
    pub fn add_edge(&self, source_version_id: &str, dependency: NewDependency) -> Result<DependencyEdge> {
        let _commit = self.commit()?;

        let source = self.version(source_version_id)?;
        self.ensure_editable(&source)?;
        self.validate_target(&source, &dependency.target)?;

        let key = dependency.target.key();
        let existing = self.backend.list_edges_for_version(&source.id)?;
        if existing.iter().any(|e| e.target.key() == key) {
            return Err(DependencyError::validation(match &dependency.target {
                DependencyTarget::Internal { resource_id, .. } => {
                    format!("{} already depends on {resource_id}", source.id)
                }
                DependencyTarget::External { name, .. } => {
                    format!("external dependency {name:?} already exists for {}", source.id)
                }
            }));
        }

        if dependency.dependency_type == DependencyType::Required {
            self.reject_cycle(&source.id, &dependency.target)?;
        }

        let edge = DependencyEdge {
            id: DependencyEdge::generate_id(&source.id, &key),
            version_id: source.id.clone(),
            dependency_type: dependency.dependency_type,
            target: dependency.target,
            created_at: Utc::now(),
        };
        self.backend.create_edge(edge.clone())?;

        info!(
            "Added {} dependency {} -> {}",
            edge.dependency_type, edge.version_id, edge.target
        );
        Ok(edge)
    }

    /// Change the type and/or minimum version of an existing edge
    pub fn update_edge(&self, edge_id: &str, update: EdgeUpdate) -> Result<DependencyEdge> {
        let _commit = self.commit()?;

        let mut edge = self
            .backend
            .find_edge(edge_id)?
            .ok_or_else(|| DependencyError::not_found("edge", edge_id))?;
        let source = self.version(&edge.version_id)?;
        self.ensure_editable(&source)?;

        if let Some(min_version) = update.min_version {
            edge.target.set_min_version(min_version);
        }
        self.validate_target(&source, &edge.target)?;

        let becomes = update.dependency_type.unwrap_or(edge.dependency_type);
        if becomes == DependencyType::Required {
            self.reject_cycle(&source.id, &edge.target)?;
        }
        edge.dependency_type = becomes;

        self.backend.replace_edge(edge.clone())?;
        info!("Updated dependency {} ({})", edge.id, edge.dependency_type);
        Ok(edge)
    }

    /// Remove an edge; absent edges are not an error
    pub fn remove_edge(&self, edge_id: &str) -> Result<bool> {
        let _commit = self.commit()?;

        let Some(edge) = self.backend.find_edge(edge_id)? else {
            debug!("Edge {} already absent", edge_id);
            return Ok(false);
        };
        if let Some(source) = self.backend.find_version(&edge.version_id)? {
            self.ensure_editable(&source)?;
        }

        let removed = self.backend.delete_edge(edge_id)?;
        if removed {
            info!("Removed dependency {} -> {}", edge.version_id, edge.target);
        }
        Ok(removed)
    }

    /// Versions that depend on `resource_id`, grouped by depending resource
    ///
    /// Pagination runs over edges, newest first; `page` is 1-based.
    pub fn dependents(&self, resource_id: &str, page: usize, limit: usize) -> Result<DependentsPage> {
        if page == 0 || limit == 0 {
            return Err(DependencyError::validation("page and limit must be at least 1"));
        }
        self.resource(resource_id)?;

        let mut edges = self.backend.edges_targeting(resource_id)?;
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = edges.len();

        let mut dependents: Vec<Dependent> = Vec::new();
        let mut by_resource: HashMap<String, usize> = HashMap::new();

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| DependencyError::validation(format!("page {page} with limit {limit} is out of range")))?;

        for edge in edges.into_iter().skip(offset).take(limit) {
            let Some(version) = self.backend.find_version(&edge.version_id)? else {
                warn!("Edge {} belongs to missing version {}", edge.id, edge.version_id);
                continue;
            };
            let entry = DependentVersion {
                id: version.id.clone(),
                version_number: version.version_number.clone(),
            };
            if let Some(&idx) = by_resource.get(&version.resource_id) {
                dependents[idx].versions.push(entry);
            } else {
                by_resource.insert(version.resource_id.clone(), dependents.len());
                dependents.push(Dependent {
                    resource: self.summary(&version.resource_id)?,
                    dependency_type: edge.dependency_type,
                    min_version: edge.target.min_version().map(String::from),
                    versions: vec![entry],
                });
            }
        }

        Ok(DependentsPage {
            dependents,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn ensure_editable(&self, version: &ResourceVersion) -> Result<()> {
        if self.policy.require_editable_version && !version.status.is_editable() {
            return Err(DependencyError::validation(format!(
                "dependencies can only be modified on DRAFT or REJECTED versions ({} is {:?})",
                version.id, version.status
            )));
        }
        Ok(())
    }

    fn validate_target(&self, source: &ResourceVersion, target: &DependencyTarget) -> Result<()> {
        if let Some(min) = target.min_version() {
            if min.trim().is_empty() {
                return Err(DependencyError::validation("minimum version must not be blank"));
            }
            if min.chars().count() > MAX_MIN_VERSION_LEN {
                return Err(DependencyError::validation(format!(
                    "minimum version longer than {MAX_MIN_VERSION_LEN} characters"
                )));
            }
        }

        match target {
            DependencyTarget::Internal { resource_id, min_version } => {
                if *resource_id == source.resource_id {
                    return Err(DependencyError::validation("a resource cannot depend on itself"));
                }
                if self.backend.find_resource(resource_id)?.is_none() {
                    return Err(DependencyError::validation(format!(
                        "dependency resource not found: {resource_id}"
                    )));
                }
                if let Some(min) = min_version {
                    let known = self
                        .backend
                        .versions_of(resource_id)?
                        .iter()
                        .any(|v| v.version_number == *min);
                    if !known {
                        return Err(DependencyError::validation(format!(
                            "minimum version {min} not found for {resource_id}"
                        )));
                    }
                }
            }
            DependencyTarget::External { name, url, .. } => {
                if name.trim().is_empty() {
                    return Err(DependencyError::validation("external dependency requires a name"));
                }
                if name.chars().count() > MAX_EXTERNAL_NAME_LEN {
                    return Err(DependencyError::validation(format!(
                        "external dependency name longer than {MAX_EXTERNAL_NAME_LEN} characters"
                    )));
                }
                let parsed = url::Url::parse(url).map_err(|e| {
                    DependencyError::validation(format!("invalid external URL {url:?}: {e}"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(DependencyError::validation(format!(
                        "external URL must use http or https: {url}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn reject_cycle(&self, source_version_id: &str, target: &DependencyTarget) -> Result<()> {
        let Some(resource_id) = target.resource_id() else {
            return Ok(());
        };
        if let Some(path) = CycleDetector::new(&self.backend).find_cycle(source_version_id, resource_id)? {
            warn!(
                "Rejected REQUIRED dependency {} -> {}: cycle {}",
                source_version_id,
                resource_id,
                path.join(" -> ")
            );
            return Err(DependencyError::CycleDetected {
                source_version: source_version_id.to_string(),
                target: resource_id.to_string(),
                path,
            });
        }
        Ok(())
    }
}
