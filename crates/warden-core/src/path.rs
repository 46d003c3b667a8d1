// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential path normalization and permission path matching.
//!
//! A permission path is either an exact credential name (`/team/db-password`)
//! or a wildcard pattern ending in `/*` (`/team/*`). A wildcard governs every
//! path strictly beneath its prefix: `/team/*` matches `/team/a` and
//! `/team/a/b` but not `/team` itself, and not `/teammate/a`. The pattern `/*`
//! governs every path.

use std::cmp::Ordering;

use crate::error::ValidationError;

pub const WILDCARD_SUFFIX: &str = "/*";

pub const MAX_PATH_LENGTH: usize = 1024;

/// Prefixes `/` when missing. Credential names are accepted with or without
/// the leading slash and always stored with it.
pub fn normalize(path: &str) -> String {
	if path.starts_with('/') {
		path.to_string()
	} else {
		format!("/{path}")
	}
}

/// Normalizes then validates a credential name or permission path.
pub fn normalize_and_validate(path: &str) -> Result<String, ValidationError> {
	let normalized = normalize(path);
	validate(&normalized)?;
	Ok(normalized)
}

/// Validates an already normalized path.
///
/// `*` may only appear as the final segment of a wildcard pattern.
pub fn validate(path: &str) -> Result<(), ValidationError> {
	let invalid = |reason| ValidationError::InvalidPath {
		path: path.to_string(),
		reason,
	};

	if path.is_empty() || path == "/" {
		return Err(invalid("path must not be empty"));
	}
	if path.len() > MAX_PATH_LENGTH {
		return Err(invalid("path exceeds maximum length"));
	}
	if !path.starts_with('/') {
		return Err(invalid("path must start with '/'"));
	}
	if path.contains("//") {
		return Err(invalid("path must not contain '//'"));
	}
	if path.ends_with('/') {
		return Err(invalid("path must not end with '/'"));
	}

	let body = path.strip_suffix(WILDCARD_SUFFIX).unwrap_or(path);
	if body.contains('*') {
		return Err(invalid("'*' is only allowed as a trailing '/*'"));
	}

	Ok(())
}

pub fn is_wildcard(path: &str) -> bool {
	path.ends_with(WILDCARD_SUFFIX)
}

/// Whether a permission entry with `entry_path` governs `requested_path`.
pub fn matches(entry_path: &str, requested_path: &str) -> bool {
	specificity(entry_path, requested_path).is_some()
}

/// How closely a permission path governs a requested path.
///
/// Ordering: every exact match outranks every wildcard match; among wildcard
/// matches the longer literal prefix ranks higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
	/// Carries the byte length of the literal prefix before `/*`.
	Wildcard(usize),
	Exact,
}

/// Returns `None` when `entry_path` does not govern `requested_path`.
pub fn specificity(entry_path: &str, requested_path: &str) -> Option<Specificity> {
	if entry_path == requested_path {
		return Some(Specificity::Exact);
	}

	let prefix = entry_path.strip_suffix(WILDCARD_SUFFIX)?;
	let rest = requested_path.strip_prefix(prefix)?;
	if rest.len() > 1 && rest.starts_with('/') {
		Some(Specificity::Wildcard(prefix.len()))
	} else {
		None
	}
}

/// Orders two entry paths by how specifically they govern `requested_path`.
/// Non-matching paths sort lowest.
pub fn compare_specificity(a: &str, b: &str, requested_path: &str) -> Ordering {
	specificity(a, requested_path).cmp(&specificity(b, requested_path))
}
