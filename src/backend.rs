// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Persistence backends for resources, versions and dependency edges

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fs2::FileExt;
use tracing::{debug, trace};

use crate::error::{DependencyError, Result};
use crate::types::{Catalog, DependencyEdge, Resource, ResourceVersion};

/// Exclusive write access held across a check-then-write sequence
///
/// Released on drop.
#[derive(Debug, Default)]
#[must_use]
pub struct CommitGuard {
    _file: Option<File>,
}

/// Contract the dependency core needs from a persistent store
///
/// Writes are individually atomic. Callers that need a check-then-write to be
/// atomic (edge creation) serialize through [`crate::store::DependencyStore`],
/// which holds [`Backend::begin_commit`] for the whole sequence.
pub trait Backend: Send + Sync {
    /// Look up a resource
    fn find_resource(&self, id: &str) -> Result<Option<Resource>>;
    /// Look up a version
    fn find_version(&self, id: &str) -> Result<Option<ResourceVersion>>;
    /// All versions of a resource, in insertion order
    fn versions_of(&self, resource_id: &str) -> Result<Vec<ResourceVersion>>;
    /// All resources
    fn list_resources(&self) -> Result<Vec<Resource>>;
    /// Outgoing edges of a version
    fn list_edges_for_version(&self, version_id: &str) -> Result<Vec<DependencyEdge>>;
    /// Internal edges whose target is the given resource
    fn edges_targeting(&self, resource_id: &str) -> Result<Vec<DependencyEdge>>;
    /// Look up an edge
    fn find_edge(&self, id: &str) -> Result<Option<DependencyEdge>>;
    /// Insert or replace a resource
    fn put_resource(&self, resource: Resource) -> Result<()>;
    /// Insert or replace a version
    fn put_version(&self, version: ResourceVersion) -> Result<()>;
    /// Delete a version and every edge it owns; `false` if absent
    fn delete_version(&self, id: &str) -> Result<bool>;
    /// Insert a new edge; fails if the ID is already taken
    fn create_edge(&self, edge: DependencyEdge) -> Result<()>;
    /// Replace an existing edge with the same ID
    fn replace_edge(&self, edge: DependencyEdge) -> Result<()>;
    /// Delete an edge; `false` if absent
    fn delete_edge(&self, id: &str) -> Result<bool>;

    /// Take exclusive write access against other handles on the same data
    /// and bring this handle's view up to date
    fn begin_commit(&self) -> Result<CommitGuard> {
        Ok(CommitGuard::default())
    }
}

// Catalog mutations shared by both backends

fn upsert_resource(catalog: &mut Catalog, resource: Resource) {
    if let Some(existing) = catalog.resources.iter_mut().find(|r| r.id == resource.id) {
        *existing = resource;
    } else {
        catalog.resources.push(resource);
    }
}

fn upsert_version(catalog: &mut Catalog, version: ResourceVersion) {
    if let Some(existing) = catalog.versions.iter_mut().find(|v| v.id == version.id) {
        *existing = version;
    } else {
        catalog.versions.push(version);
    }
}

fn remove_version(catalog: &mut Catalog, id: &str) -> bool {
    let before = catalog.versions.len();
    catalog.versions.retain(|v| v.id != id);
    if catalog.versions.len() == before {
        return false;
    }
    let edges_before = catalog.edges.len();
    catalog.edges.retain(|e| e.version_id != id);
    trace!(
        "Deleted version {} and {} owned edge(s)",
        id,
        edges_before - catalog.edges.len()
    );
    true
}

fn insert_edge(catalog: &mut Catalog, edge: DependencyEdge) -> Result<()> {
    if catalog.edges.iter().any(|e| e.id == edge.id) {
        return Err(DependencyError::validation(format!(
            "edge {} already exists",
            edge.id
        )));
    }
    catalog.edges.push(edge);
    Ok(())
}

fn swap_edge(catalog: &mut Catalog, edge: DependencyEdge) -> Result<()> {
    let existing = catalog
        .edges
        .iter_mut()
        .find(|e| e.id == edge.id)
        .ok_or_else(|| DependencyError::not_found("edge", edge.id.clone()))?;
    *existing = edge;
    Ok(())
}

fn remove_edge(catalog: &mut Catalog, id: &str) -> bool {
    let before = catalog.edges.len();
    catalog.edges.retain(|e| e.id != id);
    catalog.edges.len() < before
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    catalog: RwLock<Catalog>,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing catalog
    #[must_use]
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    /// Copy of the current catalog
    pub fn snapshot(&self) -> Result<Catalog> {
        Ok(self.read()?.clone())
    }

    /// Swap in a whole catalog
    pub fn replace(&self, catalog: Catalog) -> Result<()> {
        *self.write()? = catalog;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.catalog.read().map_err(|_| DependencyError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.catalog.write().map_err(|_| DependencyError::Poisoned)
    }
}

impl Backend for MemoryBackend {
    fn find_resource(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self.read()?.resources.iter().find(|r| r.id == id).cloned())
    }

    fn find_version(&self, id: &str) -> Result<Option<ResourceVersion>> {
        Ok(self.read()?.versions.iter().find(|v| v.id == id).cloned())
    }

    fn versions_of(&self, resource_id: &str) -> Result<Vec<ResourceVersion>> {
        Ok(self
            .read()?
            .versions
            .iter()
            .filter(|v| v.resource_id == resource_id)
            .cloned()
            .collect())
    }

    fn list_resources(&self) -> Result<Vec<Resource>> {
        Ok(self.read()?.resources.clone())
    }

    fn list_edges_for_version(&self, version_id: &str) -> Result<Vec<DependencyEdge>> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|e| e.version_id == version_id)
            .cloned()
            .collect())
    }

    fn edges_targeting(&self, resource_id: &str) -> Result<Vec<DependencyEdge>> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|e| e.target.resource_id() == Some(resource_id))
            .cloned()
            .collect())
    }

    fn find_edge(&self, id: &str) -> Result<Option<DependencyEdge>> {
        Ok(self.read()?.edges.iter().find(|e| e.id == id).cloned())
    }

    fn put_resource(&self, resource: Resource) -> Result<()> {
        upsert_resource(&mut *self.write()?, resource);
        Ok(())
    }

    fn put_version(&self, version: ResourceVersion) -> Result<()> {
        upsert_version(&mut *self.write()?, version);
        Ok(())
    }

    fn delete_version(&self, id: &str) -> Result<bool> {
        Ok(remove_version(&mut *self.write()?, id))
    }

    fn create_edge(&self, edge: DependencyEdge) -> Result<()> {
        insert_edge(&mut *self.write()?, edge)
    }

    fn replace_edge(&self, edge: DependencyEdge) -> Result<()> {
        swap_edge(&mut *self.write()?, edge)
    }

    fn delete_edge(&self, id: &str) -> Result<bool> {
        Ok(remove_edge(&mut *self.write()?, id))
    }
}

/// File-backed store: `deps.json` inside a data directory
///
/// The whole catalog is kept in memory. Every mutation is applied to a copy,
/// written out, and only then swapped in, so a failed write leaves this
/// handle unchanged. [`Backend::begin_commit`] takes an advisory lock on
/// `deps.json.lock` and reloads the file, so handles in other processes
/// cannot overwrite each other's commits.
#[derive(Debug)]
pub struct JsonBackend {
    path: PathBuf,
    inner: MemoryBackend,
    write_lock: Mutex<()>,
}

impl JsonBackend {
    /// File name inside the data directory
    pub const FILE_NAME: &'static str = "deps.json";
    /// Advisory lock file next to the catalog
    pub const LOCK_FILE_NAME: &'static str = "deps.json.lock";

    /// Open (or start) the store in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(Self::FILE_NAME);
        let catalog = Self::read_catalog(&path)?.unwrap_or_default();

        debug!(
            "Loaded {} resource(s), {} version(s), {} edge(s) from {}",
            catalog.resources.len(),
            catalog.versions.len(),
            catalog.edges.len(),
            path.display()
        );

        Ok(Self {
            path,
            inner: MemoryBackend::from_catalog(catalog),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_catalog(path: &Path) -> Result<Option<Catalog>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| DependencyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = serde_json::from_str(&content).map_err(|source| DependencyError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(catalog))
    }

    /// Write `catalog` out, replacing the file atomically
    fn save(&self, catalog: &Catalog) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| DependencyError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(catalog).map_err(|source| DependencyError::Serde {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| DependencyError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| DependencyError::Io {
            path: self.path.clone(),
            source,
        })?;

        trace!("Saved catalog to {}", self.path.display());
        Ok(())
    }

    /// Apply `change` to a copy of the catalog, persist it, then swap it in
    fn mutate<T>(&self, change: impl FnOnce(&mut Catalog) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().map_err(|_| DependencyError::Poisoned)?;
        let mut next = self.inner.snapshot()?;
        let out = change(&mut next)?;
        self.save(&next)?;
        self.inner.replace(next)?;
        Ok(out)
    }
}

impl Backend for JsonBackend {
    fn find_resource(&self, id: &str) -> Result<Option<Resource>> {
        self.inner.find_resource(id)
    }

    fn find_version(&self, id: &str) -> Result<Option<ResourceVersion>> {
        self.inner.find_version(id)
    }

    fn versions_of(&self, resource_id: &str) -> Result<Vec<ResourceVersion>> {
        self.inner.versions_of(resource_id)
    }

    fn list_resources(&self) -> Result<Vec<Resource>> {
        self.inner.list_resources()
    }

    fn list_edges_for_version(&self, version_id: &str) -> Result<Vec<DependencyEdge>> {
        self.inner.list_edges_for_version(version_id)
    }

    fn edges_targeting(&self, resource_id: &str) -> Result<Vec<DependencyEdge>> {
        self.inner.edges_targeting(resource_id)
    }

    fn find_edge(&self, id: &str) -> Result<Option<DependencyEdge>> {
        self.inner.find_edge(id)
    }

    fn put_resource(&self, resource: Resource) -> Result<()> {
        self.mutate(|c| {
            upsert_resource(c, resource);
            Ok(())
        })
    }

    fn put_version(&self, version: ResourceVersion) -> Result<()> {
        self.mutate(|c| {
            upsert_version(c, version);
            Ok(())
        })
    }

    fn delete_version(&self, id: &str) -> Result<bool> {
        if self.inner.find_version(id)?.is_none() {
            return Ok(false);
        }
        self.mutate(|c| Ok(remove_version(c, id)))
    }

    fn create_edge(&self, edge: DependencyEdge) -> Result<()> {
        self.mutate(|c| insert_edge(c, edge))
    }

    fn replace_edge(&self, edge: DependencyEdge) -> Result<()> {
        self.mutate(|c| swap_edge(c, edge))
    }

    fn delete_edge(&self, id: &str) -> Result<bool> {
        if self.inner.find_edge(id)?.is_none() {
            return Ok(false);
        }
        self.mutate(|c| Ok(remove_edge(c, id)))
    }

    fn begin_commit(&self) -> Result<CommitGuard> {
        let lock_path = self.path.with_file_name(Self::LOCK_FILE_NAME);
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir).map_err(|source| DependencyError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| DependencyError::Io {
                path: lock_path.clone(),
                source,
            })?;
        file.lock_exclusive().map_err(|source| DependencyError::Io {
            path: lock_path.clone(),
            source,
        })?;

        if let Some(catalog) = Self::read_catalog(&self.path)? {
            let _guard = self.write_lock.lock().map_err(|_| DependencyError::Poisoned)?;
            self.inner.replace(catalog)?;
            trace!("Reloaded {} under commit lock", self.path.display());
        }

        Ok(CommitGuard { _file: Some(file) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DependencyTarget, DependencyType, ResourceKind};
    use chrono::Utc;
    use tempfile::TempDir;

    fn edge(version_id: &str, target: &str) -> DependencyEdge {
        DependencyEdge {
            id: DependencyEdge::generate_id(version_id, target),
            version_id: version_id.into(),
            dependency_type: DependencyType::Required,
            target: DependencyTarget::internal(target),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_edge_rejects_duplicate_id() {
        let backend = MemoryBackend::new();
        backend.create_edge(edge("ver:a@1", "res:b")).unwrap();
        let err = backend.create_edge(edge("ver:a@1", "res:b")).unwrap_err();
        assert!(matches!(err, DependencyError::Validation(_)));
        assert_eq!(backend.list_edges_for_version("ver:a@1").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_version_cascades_edges() {
        let backend = MemoryBackend::new();
        backend.put_version(ResourceVersion::draft("res:a", "1")).unwrap();
        backend.create_edge(edge("ver:a@1", "res:b")).unwrap();
        backend.create_edge(edge("ver:c@1", "res:b")).unwrap();

        assert!(backend.delete_version("ver:a@1").unwrap());
        assert!(backend.list_edges_for_version("ver:a@1").unwrap().is_empty());
        assert_eq!(backend.edges_targeting("res:b").unwrap().len(), 1);
        assert!(!backend.delete_version("ver:a@1").unwrap());
    }

    #[test]
    fn test_delete_edge_is_idempotent() {
        let backend = MemoryBackend::new();
        let e = edge("ver:a@1", "res:b");
        let id = e.id.clone();
        backend.create_edge(e).unwrap();
        assert!(backend.delete_edge(&id).unwrap());
        assert!(!backend.delete_edge(&id).unwrap());
    }

    #[test]
    fn test_json_backend_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let backend = JsonBackend::open(dir.path()).unwrap();
            backend.put_resource(Resource::new("Alpha", ResourceKind::Mod)).unwrap();
            backend.put_version(ResourceVersion::draft("res:alpha", "1.0.0")).unwrap();
            backend.create_edge(edge("ver:alpha@1.0.0", "res:beta")).unwrap();
        }

        let reopened = JsonBackend::open(dir.path()).unwrap();
        assert!(reopened.find_resource("res:alpha").unwrap().is_some());
        assert!(reopened.find_version("ver:alpha@1.0.0").unwrap().is_some());
        assert_eq!(reopened.list_edges_for_version("ver:alpha@1.0.0").unwrap().len(), 1);
        assert!(dir.path().join(JsonBackend::FILE_NAME).exists());
    }

    #[test]
    fn test_json_backend_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(JsonBackend::FILE_NAME), "{ not json").unwrap();
        let err = JsonBackend::open(dir.path()).unwrap_err();
        assert!(matches!(err, DependencyError::Serde { .. }));
    }
}
