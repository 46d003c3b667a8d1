// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Startup grants from `[[authorization.permissions]]`.

use warden_core::{Actor, PermissionGrant, SaveMode};
use warden_server_config::BootstrapPermission;
use warden_server_db::PermissionStore;

use crate::error::Result;

/// Apply every configured grant, one entry per listed actor.
///
/// Grants are merged into existing entries, so running this on every start
/// only ever adds operations. Returns the number of entries written.
#[tracing::instrument(skip(store, permissions), fields(count = permissions.len()))]
pub async fn apply_bootstrap_permissions(
	store: &dyn PermissionStore,
	permissions: &[BootstrapPermission],
) -> Result<usize> {
	let grants = permissions
		.iter()
		.flat_map(|permission| {
			permission.actors.iter().map(move |actor| {
				PermissionGrant::new(
					Actor::new(actor.trim()),
					&permission.path,
					&permission.operations,
				)
			})
		})
		.collect::<std::result::Result<Vec<_>, _>>()?;

	if grants.is_empty() {
		return Ok(0);
	}

	let saved = store.save(&grants, SaveMode::Merge).await?;
	tracing::info!(entries = saved.len(), "applied bootstrap permissions");
	Ok(saved.len())
}
