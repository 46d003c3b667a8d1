// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pure authorization decisions over a set of permission entries.
//!
//! These functions perform no I/O. The checking service loads an actor's
//! entries and hands them here, which keeps every decision testable without a
//! database.

use tracing::instrument;

use crate::operation::PermissionOperation;
use crate::path;
use crate::permission::PermissionData;
use crate::types::Actor;

/// Whether `actor` holds `operation` on `requested_path` through any entry.
///
/// Entries belonging to other actors are ignored, so callers may pass a
/// broader set than the actor's own.
#[instrument(
    level = "debug",
    skip(entries),
    fields(actor = %actor, path = %requested_path, operation = %operation)
)]
pub fn has_permission(
	entries: &[PermissionData],
	actor: &Actor,
	requested_path: &str,
	operation: PermissionOperation,
) -> bool {
	granting_entry(entries, actor, requested_path, operation).is_some()
}

/// The most specific of `actor`'s entries that governs `requested_path` and
/// grants `operation`.
pub fn granting_entry<'a>(
	entries: &'a [PermissionData],
	actor: &Actor,
	requested_path: &str,
	operation: PermissionOperation,
) -> Option<&'a PermissionData> {
	governing_entries(entries, requested_path)
		.into_iter()
		.find(|entry| entry.actor == *actor && entry.has_operation(operation))
}

/// Entries that govern `requested_path`, most specific first.
fn governing_entries<'a>(
	entries: &'a [PermissionData],
	requested_path: &str,
) -> Vec<&'a PermissionData> {
	let mut governing: Vec<&PermissionData> = entries
		.iter()
		.filter(|entry| path::matches(&entry.path, requested_path))
		.collect();
	governing.sort_by(|a, b| path::compare_specificity(&b.path, &a.path, requested_path));
	governing
}

/// False when the acting identity is the actor whose grant would change.
///
/// An actor must never be able to raise or revoke its own access.
pub fn user_allowed_to_operate_on_actor(acting: &Actor, target: &Actor) -> bool {
	acting != target
}
