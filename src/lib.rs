// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! resdeps library - dependency graph core for marketplace resources
//!
//! This crate owns the dependency edges between published resource versions,
//! expands them into per-request graphs, rejects mandatory cycles at write
//! time and computes ordered, conflict-checked install plans.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod commands;
pub mod config;
pub mod cycle;
pub mod error;
pub mod graph;
pub mod resolver;
pub mod store;
pub mod version;

/// Core data types shared by the store, graph builder and resolver
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use sha2::{Digest, Sha256};
    use std::fmt;
    use std::str::FromStr;

    use crate::error::DependencyError;

    // =========================================================================
    // Resource
    // =========================================================================

    /// What kind of downloadable a resource is
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ResourceKind {
        /// Gameplay modification
        Mod,
        /// Server-side plugin
        Plugin,
        /// Playable world or map
        World,
        /// Curated bundle of other resources
        Modpack,
        /// Anything else
        Other,
    }

    impl FromStr for ResourceKind {
        type Err = DependencyError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.to_ascii_lowercase().as_str() {
                "mod" => Ok(Self::Mod),
                "plugin" => Ok(Self::Plugin),
                "world" => Ok(Self::World),
                "modpack" => Ok(Self::Modpack),
                "other" => Ok(Self::Other),
                other => Err(DependencyError::validation(format!(
                    "unknown resource kind: {other}. Valid: mod, plugin, world, modpack, other"
                ))),
            }
        }
    }

    /// A platform-hosted downloadable item
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Resource {
        /// Unique identifier: res:<slug>
        pub id: String,
        /// Display name
        pub name: String,
        /// URL slug
        pub slug: String,
        /// Icon reference for the presentation layer
        #[serde(default)]
        pub icon_url: Option<String>,
        /// Resource kind
        pub kind: ResourceKind,
        /// When the resource was registered
        pub created_at: DateTime<Utc>,
    }

    impl Resource {
        /// Generate the deterministic ID for a slug
        #[must_use]
        pub fn generate_id(slug: &str) -> String {
            format!("res:{slug}")
        }

        /// Build a resource from a display name, deriving its slug
        #[must_use]
        pub fn new(name: &str, kind: ResourceKind) -> Self {
            let slug = slugify(name);
            Self {
                id: Self::generate_id(&slug),
                name: name.to_string(),
                slug,
                icon_url: None,
                kind,
                created_at: Utc::now(),
            }
        }

        /// The metadata the presentation layer shows for this resource
        #[must_use]
        pub fn summary(&self) -> ResourceSummary {
            ResourceSummary {
                id: self.id.clone(),
                name: self.name.clone(),
                slug: self.slug.clone(),
                icon_url: self.icon_url.clone(),
            }
        }
    }

    /// Display metadata used to hydrate internal targets
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ResourceSummary {
        /// Resource ID
        pub id: String,
        /// Display name
        pub name: String,
        /// URL slug
        pub slug: String,
        /// Icon reference
        pub icon_url: Option<String>,
    }

    /// Lowercase, dash-separated form of a display name
    #[must_use]
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        slug.trim_matches('-').to_string()
    }

    // =========================================================================
    // ResourceVersion
    // =========================================================================

    /// Moderation lifecycle of a version
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum VersionStatus {
        /// Being prepared by its owner
        Draft,
        /// Submitted for moderation
        Pending,
        /// Live and installable
        Published,
        /// Sent back by moderation
        Rejected,
        /// Superseded and hidden
        Archived,
    }

    impl VersionStatus {
        /// Whether dependency edges on a version in this state may change
        #[must_use]
        pub fn is_editable(self) -> bool {
            matches!(self, Self::Draft | Self::Rejected)
        }

        /// Whether a version in this state can be selected for installation
        #[must_use]
        pub fn is_installable(self) -> bool {
            self == Self::Published
        }
    }

    /// One immutable published build of a resource
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ResourceVersion {
        /// Unique identifier: ver:<slug>@<version_number>
        pub id: String,
        /// Owning resource ID
        pub resource_id: String,
        /// Semantic-version-like number
        pub version_number: String,
        /// Moderation status
        pub status: VersionStatus,
        /// When the version went live
        #[serde(default)]
        pub published_at: Option<DateTime<Utc>>,
        /// When the version was created
        pub created_at: DateTime<Utc>,
    }

    impl ResourceVersion {
        /// Generate the deterministic ID for a resource's version
        #[must_use]
        pub fn generate_id(resource_id: &str, version_number: &str) -> String {
            let slug = resource_id.strip_prefix("res:").unwrap_or(resource_id);
            format!("ver:{slug}@{version_number}")
        }

        /// A fresh draft version of `resource_id`
        #[must_use]
        pub fn draft(resource_id: &str, version_number: &str) -> Self {
            Self {
                id: Self::generate_id(resource_id, version_number),
                resource_id: resource_id.to_string(),
                version_number: version_number.to_string(),
                status: VersionStatus::Draft,
                published_at: None,
                created_at: Utc::now(),
            }
        }
    }

    // =========================================================================
    // Dependency edges
    // =========================================================================

    /// Relationship carried by a dependency edge
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum DependencyType {
        /// Must be installed before the dependent
        Required,
        /// Installed only on request
        Optional,
        /// Must not be installed alongside the dependent
        Incompatible,
        /// Bundled inside the dependent, never a separate install step
        Embedded,
    }

    impl DependencyType {
        /// Upper-case wire name
        #[must_use]
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Required => "REQUIRED",
                Self::Optional => "OPTIONAL",
                Self::Incompatible => "INCOMPATIBLE",
                Self::Embedded => "EMBEDDED",
            }
        }
    }

    impl fmt::Display for DependencyType {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for DependencyType {
        type Err = DependencyError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.to_ascii_uppercase().as_str() {
                "REQUIRED" => Ok(Self::Required),
                "OPTIONAL" => Ok(Self::Optional),
                "INCOMPATIBLE" => Ok(Self::Incompatible),
                "EMBEDDED" => Ok(Self::Embedded),
                other => Err(DependencyError::validation(format!(
                    "unknown dependency type: {other}. Valid: required, optional, incompatible, embedded"
                ))),
            }
        }
    }

    /// What a dependency edge points at
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "target", rename_all = "snake_case")]
    pub enum DependencyTarget {
        /// Another resource hosted on the platform
        Internal {
            /// Target resource ID
            resource_id: String,
            /// Lowest acceptable version number
            #[serde(default)]
            min_version: Option<String>,
        },
        /// An off-platform artifact, opaque to resolution
        External {
            /// Display name
            name: String,
            /// Where to find it
            url: String,
            /// Free-text minimum version
            #[serde(default)]
            min_version: Option<String>,
        },
    }

    impl DependencyTarget {
        /// Internal target without a minimum version
        #[must_use]
        pub fn internal(resource_id: &str) -> Self {
            Self::Internal {
                resource_id: resource_id.to_string(),
                min_version: None,
            }
        }

        /// Internal target with a minimum version
        #[must_use]
        pub fn internal_at_least(resource_id: &str, min_version: &str) -> Self {
            Self::Internal {
                resource_id: resource_id.to_string(),
                min_version: Some(min_version.to_string()),
            }
        }

        /// External target
        #[must_use]
        pub fn external(name: &str, url: &str, min_version: Option<&str>) -> Self {
            Self::External {
                name: name.to_string(),
                url: url.to_string(),
                min_version: min_version.map(String::from),
            }
        }

        /// Identity used for duplicate detection and edge IDs
        #[must_use]
        pub fn key(&self) -> String {
            match self {
                Self::Internal { resource_id, .. } => resource_id.clone(),
                Self::External { name, .. } => external_key(name),
            }
        }

        /// Minimum version, if any
        #[must_use]
        pub fn min_version(&self) -> Option<&str> {
            match self {
                Self::Internal { min_version, .. } | Self::External { min_version, .. } => {
                    min_version.as_deref()
                }
            }
        }

        /// Replace the minimum version
        pub fn set_min_version(&mut self, value: Option<String>) {
            match self {
                Self::Internal { min_version, .. } | Self::External { min_version, .. } => {
                    *min_version = value;
                }
            }
        }

        /// Target resource ID for internal targets
        #[must_use]
        pub fn resource_id(&self) -> Option<&str> {
            match self {
                Self::Internal { resource_id, .. } => Some(resource_id),
                Self::External { .. } => None,
            }
        }

        /// Whether the target is hosted on the platform
        #[must_use]
        pub fn is_internal(&self) -> bool {
            matches!(self, Self::Internal { .. })
        }
    }

    impl fmt::Display for DependencyTarget {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Internal { resource_id, min_version } => {
                    write!(f, "{resource_id}")?;
                    if let Some(min) = min_version {
                        write!(f, " >= {min}")?;
                    }
                    Ok(())
                }
                Self::External { name, url, min_version } => {
                    write!(f, "{name} <{url}>")?;
                    if let Some(min) = min_version {
                        write!(f, " >= {min}")?;
                    }
                    Ok(())
                }
            }
        }
    }

    /// Normalized identity of an external target
    #[must_use]
    pub fn external_key(name: &str) -> String {
        format!("ext:{}", name.trim().to_lowercase())
    }

    /// Directed edge from a version to its dependency
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DependencyEdge {
        /// Content-hash ID: dep:<hash of (version_id, target key)>
        pub id: String,
        /// Source version ID (the owner of this edge)
        pub version_id: String,
        /// Relationship
        pub dependency_type: DependencyType,
        /// What the edge points at
        pub target: DependencyTarget,
        /// When the edge was created
        pub created_at: DateTime<Utc>,
    }

    impl DependencyEdge {
        /// Generate a deterministic ID for an edge
        #[must_use]
        pub fn generate_id(version_id: &str, target_key: &str) -> String {
            let mut hasher = Sha256::new();
            hasher.update(version_id.as_bytes());
            hasher.update(b"\0");
            hasher.update(target_key.as_bytes());
            let hash = hex::encode(hasher.finalize());
            format!("dep:{}", &hash[..12])
        }
    }

    /// Input for creating an edge
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NewDependency {
        /// Relationship
        pub dependency_type: DependencyType,
        /// What the edge points at
        pub target: DependencyTarget,
    }

    impl NewDependency {
        /// Shorthand constructor
        #[must_use]
        pub fn new(dependency_type: DependencyType, target: DependencyTarget) -> Self {
            Self { dependency_type, target }
        }
    }

    /// Partial update of an existing edge
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EdgeUpdate {
        /// New relationship, if changing
        pub dependency_type: Option<DependencyType>,
        /// New minimum version: `Some(None)` clears it
        pub min_version: Option<Option<String>>,
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Everything a backend persists
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Catalog {
        /// All resources
        #[serde(default)]
        pub resources: Vec<Resource>,
        /// All versions
        #[serde(default)]
        pub versions: Vec<ResourceVersion>,
        /// All dependency edges
        #[serde(default)]
        pub edges: Vec<DependencyEdge>,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::backend::{Backend, JsonBackend, MemoryBackend};
    pub use crate::error::{DependencyError, ErrorKind};
    pub use crate::graph::{BuildOptions, DependencyGraph, GraphBuilder};
    pub use crate::resolver::{ConstraintResolver, InstallPlan, ResolutionState, ResolveOptions};
    pub use crate::store::DependencyStore;
    pub use crate::types::*;
}
