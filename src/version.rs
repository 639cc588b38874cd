// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Version number ordering
//!
//! Version numbers on the marketplace are free text. Anything that looks like
//! `major[.minor[.patch]]` (optionally prefixed with `v`) is ordered
//! numerically; everything else is incomparable and callers must not guess.

use chrono::{DateTime, Utc};
use semver::{BuildMetadata, Version};
use std::cmp::Ordering;

use crate::types::ResourceVersion;

/// Parse a version number leniently
///
/// `1.2` becomes `1.2.0`, `v3` becomes `3.0.0`, build metadata is dropped.
#[must_use]
pub fn parse(s: &str) -> Option<Version> {
    let s = s.trim();
    let s = s.strip_prefix('v').or_else(|| s.strip_prefix('V')).unwrap_or(s);

    if let Ok(mut v) = Version::parse(s) {
        v.build = BuildMetadata::EMPTY;
        return Some(v);
    }

    let parts: Vec<&str> = s.split('.').collect();
    match parts.as_slice() {
        [major] => Some(Version::new(major.parse().ok()?, 0, 0)),
        [major, minor] => Some(Version::new(major.parse().ok()?, minor.parse().ok()?, 0)),
        _ => None,
    }
}

/// Compare two version numbers
///
/// Identical strings are equal even when free text; otherwise `None` when
/// either side is not semantic.
#[must_use]
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    if a.trim() == b.trim() {
        return Some(Ordering::Equal);
    }
    Some(parse(a)?.cmp(&parse(b)?))
}

/// Whether `version` is at or above `min`; `None` when incomparable
#[must_use]
pub fn satisfies(version: &str, min: &str) -> Option<bool> {
    compare(version, min).map(Ordering::is_ge)
}

/// Order two versions of the same resource, oldest first
///
/// Total order on `(semantic number, publish time, creation time, id)`.
/// Free-text numbers have no semantic key and rank below every semantic one.
#[must_use]
pub fn release_order(a: &ResourceVersion, b: &ResourceVersion) -> Ordering {
    release_key(a).cmp(&release_key(b))
}

fn release_key(v: &ResourceVersion) -> (Option<Version>, Option<DateTime<Utc>>, DateTime<Utc>, &str) {
    (parse(&v.version_number), v.published_at, v.created_at, v.id.as_str())
}
