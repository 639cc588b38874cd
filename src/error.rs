// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error taxonomy for the dependency core
//!
//! Every failure is a deterministic function of the stored data, so nothing
//! here is retried. [`DependencyError::kind`] tells callers how to surface it.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = DependencyError> = std::result::Result<T, E>;

/// How an error should be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced version, resource or edge is absent (404-equivalent)
    NotFound,
    /// Malformed input (400-equivalent)
    Validation,
    /// User-correctable conflict in the dependency data
    Conflict,
    /// Data-integrity or storage failure
    Error,
}

/// One pair of selected resources that must not be installed together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incompatibility {
    /// Edge that declared the incompatibility
    pub edge_id: String,
    /// Name of the resource declaring it
    pub declared_by: String,
    /// Name of the resource it excludes
    pub conflicts_with: String,
}

/// Errors produced by the store, graph builder and resolver
#[derive(Debug, Error)]
pub enum DependencyError {
    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (version, resource, edge)
        entity: &'static str,
        /// Requested ID
        id: String,
    },

    /// Input failed validation
    #[error("invalid dependency: {0}")]
    Validation(String),

    /// Committing the edge would close a REQUIRED cycle
    #[error("circular dependency detected: {}", .path.join(" -> "))]
    CycleDetected {
        /// Source version of the rejected edge, or the root being resolved
        source_version: String,
        /// Target of the rejected edge
        target: String,
        /// Version IDs along the cycle
        path: Vec<String>,
    },

    /// Two selected resources exclude each other
    #[error("incompatible dependencies: {}", describe_incompatibilities(.conflicts))]
    IncompatibleDependency {
        /// Every conflicting pair found
        conflicts: Vec<Incompatibility>,
    },

    /// Minimum versions on the same target cannot be ordered
    #[error("ambiguous minimum versions for {target}: {left} (edge {left_edge}) vs {right} (edge {right_edge})")]
    AmbiguousConstraint {
        /// Target resource ID or external key
        target: String,
        /// First constraint
        left: String,
        /// Edge carrying the first constraint
        left_edge: String,
        /// Second constraint
        right: String,
        /// Edge carrying the second constraint
        right_edge: String,
    },

    /// No installable version satisfies the aggregated minimum
    #[error("no installable version of {target} satisfies {}", .requirement.as_deref().unwrap_or("any version"))]
    UnsatisfiedConstraint {
        /// Target resource ID
        target: String,
        /// Highest minimum version seen, if any
        requirement: Option<String>,
        /// Version that would have been selected, if any
        selected: Option<String>,
    },

    /// Expansion exceeded the depth guard
    #[error("dependency graph of {root} exceeds maximum depth {max_depth}")]
    GraphTooDeep {
        /// Root version being expanded
        root: String,
        /// Configured limit
        max_depth: usize,
    },

    /// Reading or writing persisted data failed
    #[error("failed to access {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Persisted data could not be (de)serialized
    #[error("failed to (de)serialize {path}: {source}")]
    Serde {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A backend lock was poisoned by a panicking writer
    #[error("storage lock poisoned")]
    Poisoned,
}

impl DependencyError {
    /// Shorthand for [`DependencyError::Validation`]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`DependencyError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Classification used by callers to decide how to surface the error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::IncompatibleDependency { .. }
            | Self::AmbiguousConstraint { .. }
            | Self::UnsatisfiedConstraint { .. }
            | Self::CycleDetected { .. } => ErrorKind::Conflict,
            Self::GraphTooDeep { .. } | Self::Io { .. } | Self::Serde { .. } | Self::Poisoned => {
                ErrorKind::Error
            }
        }
    }
}

fn describe_incompatibilities(conflicts: &[Incompatibility]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} is incompatible with {}", c.declared_by, c.conflicts_with))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(DependencyError::not_found("version", "ver:a@1").kind(), ErrorKind::NotFound);
        assert_eq!(DependencyError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(
            DependencyError::GraphTooDeep { root: "ver:a@1".into(), max_depth: 50 }.kind(),
            ErrorKind::Error
        );
    }

    #[test]
    fn test_incompatible_message_lists_both_names() {
        let err = DependencyError::IncompatibleDependency {
            conflicts: vec![Incompatibility {
                edge_id: "dep:1".into(),
                declared_by: "Alpha".into(),
                conflicts_with: "Beta".into(),
            }],
        };
        assert_eq!(err.to_string(), "incompatible dependencies: Alpha is incompatible with Beta");
    }

    #[test]
    fn test_cycle_message_shows_path() {
        let err = DependencyError::CycleDetected {
            source_version: "ver:b@1".into(),
            target: "res:a".into(),
            path: vec!["ver:b@1".into(), "ver:a@1".into(), "ver:b@1".into()],
        };
        assert!(err.to_string().contains("ver:b@1 -> ver:a@1 -> ver:b@1"));
    }
}
