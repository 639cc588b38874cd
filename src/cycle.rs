// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Write-time cycle detection over REQUIRED edges
//!
//! Only REQUIRED edges force a transitive install, so only they can make an
//! install unsatisfiable. EMBEDDED targets ship inside their dependent and are
//! never a separate install step, so they are not followed here either.
//!
//! Cycles are checked at resource granularity: an internal edge names a
//! resource, and any of its non-archived versions may end up selected, so the
//! search fans out to all of them. Reaching any version of the source's
//! resource closes a cycle.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::backend::Backend;
use crate::error::{DependencyError, Result};
use crate::types::{DependencyType, VersionStatus};

/// Depth-first search for paths back to a source version's resource
pub struct CycleDetector<'a, B: Backend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> CycleDetector<'a, B> {
    /// Create a detector reading from `backend`
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Would an edge from `source_version_id` to `candidate_target_version_id`
    /// close a REQUIRED cycle?
    pub fn would_create_cycle(
        &self,
        source_version_id: &str,
        candidate_target_version_id: &str,
    ) -> Result<bool> {
        let source = self
            .backend
            .find_version(source_version_id)?
            .ok_or_else(|| DependencyError::not_found("version", source_version_id))?;

        let path = self.search(&source.resource_id, vec![candidate_target_version_id.to_string()])?;
        Ok(path.is_some())
    }

    /// Path of version IDs that a REQUIRED edge from `source_version_id` to
    /// `target_resource_id` would close, starting and ending at the source
    pub fn find_cycle(
        &self,
        source_version_id: &str,
        target_resource_id: &str,
    ) -> Result<Option<Vec<String>>> {
        let source = self
            .backend
            .find_version(source_version_id)?
            .ok_or_else(|| DependencyError::not_found("version", source_version_id))?;

        if source.resource_id == target_resource_id {
            return Ok(Some(vec![source.id.clone(), source.id]));
        }

        let starts = self.candidates(target_resource_id)?;
        let path = self.search(&source.resource_id, starts)?;

        Ok(path.map(|mut p| {
            p.insert(0, source.id);
            p
        }))
    }

    /// Versions of a resource an internal edge could resolve to
    fn candidates(&self, resource_id: &str) -> Result<Vec<String>> {
        Ok(self
            .backend
            .versions_of(resource_id)?
            .into_iter()
            .filter(|v| v.status != VersionStatus::Archived)
            .map(|v| v.id)
            .collect())
    }

    fn search(&self, source_resource_id: &str, starts: Vec<String>) -> Result<Option<Vec<String>>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut stack: Vec<String> = starts.into_iter().rev().collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }

            let Some(version) = self.backend.find_version(&id)? else {
                continue;
            };

            if version.resource_id == source_resource_id {
                return Ok(Some(unwind(&parent, id)));
            }

            for edge in self.backend.list_edges_for_version(&id)? {
                if edge.dependency_type != DependencyType::Required {
                    continue;
                }
                let Some(target) = edge.target.resource_id() else {
                    continue;
                };
                for next in self.candidates(target)? {
                    if visited.contains(&next) {
                        continue;
                    }
                    trace!("cycle search: {} -> {}", id, next);
                    parent.entry(next.clone()).or_insert_with(|| id.clone());
                    stack.push(next);
                }
            }
        }

        Ok(None)
    }
}

/// Rebuild the path from a search start to `end`
fn unwind(parent: &HashMap<String, String>, end: String) -> Vec<String> {
    let mut path = vec![end];
    while let Some(prev) = path.last().and_then(|last| parent.get(last)) {
        if path.contains(prev) {
            break;
        }
        path.push(prev.clone());
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::{DependencyEdge, DependencyTarget, ResourceVersion};
    use chrono::Utc;

    fn version(backend: &MemoryBackend, resource: &str, number: &str) -> String {
        let v = ResourceVersion::draft(&format!("res:{resource}"), number);
        let id = v.id.clone();
        backend.put_version(v).unwrap();
        id
    }

    fn link(backend: &MemoryBackend, from: &str, to_resource: &str, dependency_type: DependencyType) {
        let target = DependencyTarget::internal(&format!("res:{to_resource}"));
        backend
            .create_edge(DependencyEdge {
                id: DependencyEdge::generate_id(from, &target.key()),
                version_id: from.into(),
                dependency_type,
                target,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    #[test]
    fn test_direct_back_edge_is_a_cycle() {
        let backend = MemoryBackend::new();
        let a = version(&backend, "a", "1.0.0");
        let b = version(&backend, "b", "1.0.0");
        link(&backend, &a, "b", DependencyType::Required);

        let detector = CycleDetector::new(&backend);
        assert!(detector.would_create_cycle(&b, &a).unwrap());

        let path = detector.find_cycle(&b, "res:a").unwrap().unwrap();
        assert_eq!(path, vec![b.clone(), a.clone(), b]);
    }

    #[test]
    fn test_transitive_cycle() {
        let backend = MemoryBackend::new();
        let a = version(&backend, "a", "1");
        let b = version(&backend, "b", "1");
        let c = version(&backend, "c", "1");
        link(&backend, &a, "b", DependencyType::Required);
        link(&backend, &b, "c", DependencyType::Required);

        let detector = CycleDetector::new(&backend);
        assert!(detector.would_create_cycle(&c, &a).unwrap());
        assert!(detector.find_cycle(&c, "res:a").unwrap().is_some());
        assert!(!detector.would_create_cycle(&a, &c).unwrap());
    }

    #[test]
    fn test_non_required_edges_do_not_count() {
        let backend = MemoryBackend::new();
        let a = version(&backend, "a", "1");
        let b = version(&backend, "b", "1");
        let c = version(&backend, "c", "1");
        link(&backend, &a, "b", DependencyType::Optional);
        link(&backend, &c, "b", DependencyType::Embedded);

        let detector = CycleDetector::new(&backend);
        assert!(!detector.would_create_cycle(&b, &a).unwrap());
        assert!(detector.find_cycle(&b, "res:a").unwrap().is_none());
        assert!(detector.find_cycle(&b, "res:c").unwrap().is_none());
    }

    #[test]
    fn test_any_version_of_source_resource_closes_cycle() {
        let backend = MemoryBackend::new();
        let a1 = version(&backend, "a", "1.0.0");
        let a2 = version(&backend, "a", "2.0.0");
        let b = version(&backend, "b", "1.0.0");
        link(&backend, &b, "a", DependencyType::Required);

        let detector = CycleDetector::new(&backend);
        assert!(detector.find_cycle(&a2, "res:b").unwrap().is_some());
        assert!(detector.find_cycle(&a1, "res:b").unwrap().is_some());
    }

    #[test]
    fn test_self_target_is_a_cycle() {
        let backend = MemoryBackend::new();
        let a = version(&backend, "a", "1");
        let detector = CycleDetector::new(&backend);
        assert!(detector.find_cycle(&a, "res:a").unwrap().is_some());
    }

    #[test]
    fn test_unknown_source_is_not_found() {
        let backend = MemoryBackend::new();
        let detector = CycleDetector::new(&backend);
        let err = detector.would_create_cycle("ver:nope@1", "ver:a@1").unwrap_err();
        assert!(matches!(err, DependencyError::NotFound { .. }));
    }
}
