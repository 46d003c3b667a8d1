// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission entry mutations and lookups.
//!
//! This layer enforces the entry invariants (uniqueness, identity match on
//! update) and translates storage outcomes into [`PermissionError`]s. It does
//! not authorize; [`crate::PermissionsHandler`] does that before calling in.

use std::sync::Arc;

use warden_core::{
	normalize_operations, path, Actor, CredentialVersion, PermissionData, PermissionGrant,
	PermissionId, PermissionOperation, SaveMode,
};
use warden_server_db::{PermissionStore, PermissionUpdate};

use crate::error::{PermissionError, Result};

#[derive(Clone)]
pub struct PermissionService {
	store: Arc<dyn PermissionStore>,
}

impl PermissionService {
	pub fn new(store: Arc<dyn PermissionStore>) -> Self {
		Self { store }
	}

	/// Entries literally attached to the version's credential name, in
	/// creation order. Wildcard entries that also govern it are not included.
	#[tracing::instrument(skip(self, version), fields(credential = %version.name))]
	pub async fn get_permissions(
		&self,
		version: &CredentialVersion,
	) -> Result<Vec<PermissionData>> {
		Ok(self.store.find_by_path(&version.name).await?)
	}

	#[tracing::instrument(skip(self, grants), fields(grants = grants.len(), mode = ?mode))]
	pub async fn save_permissions_for_user(
		&self,
		grants: &[PermissionGrant],
		mode: SaveMode,
	) -> Result<Vec<PermissionData>> {
		Ok(self.store.save(grants, mode).await?)
	}

	/// Create a new entry. An existing entry for the same `(actor, path)` is a
	/// conflict whatever its operations.
	pub async fn create(&self, grant: PermissionGrant) -> Result<PermissionData> {
		let mut saved = self
			.save_permissions_for_user(std::slice::from_ref(&grant), SaveMode::CreateOnly)
			.await?;
		match saved.len() {
			1 => saved.pop().ok_or(PermissionError::NotFound),
			actual => Err(PermissionError::InvalidNumberOfPermissions {
				expected: 1,
				actual,
			}),
		}
	}

	/// Resolve an identifier. Unknown and malformed identifiers are both
	/// `NotFound`.
	#[tracing::instrument(skip(self))]
	pub async fn find_by_uuid(&self, uuid: &str) -> Result<PermissionData> {
		let id = parse_uuid(uuid)?;
		self.store
			.find_by_id(&id)
			.await?
			.ok_or(PermissionError::NotFound)
	}

	#[tracing::instrument(skip(self), fields(actor = %actor))]
	pub async fn find_by_path_and_actor(
		&self,
		path: &str,
		actor: &Actor,
	) -> Result<PermissionData> {
		let path = path::normalize_and_validate(path)?;
		self.store
			.find_by_actor_and_path(actor, &path)
			.await?
			.ok_or(PermissionError::NotFound)
	}

	/// Replace the operations of an entry, requiring its actor and path to
	/// equal the expected values when supplied.
	#[tracing::instrument(skip(self, expected_actor, expected_path, operations))]
	pub async fn update_operations(
		&self,
		uuid: &str,
		expected_actor: Option<&Actor>,
		expected_path: Option<&str>,
		operations: &[PermissionOperation],
	) -> Result<PermissionData> {
		let id = parse_uuid(uuid)?;
		let operations = normalize_operations(operations)?;
		let expected_path = expected_path.map(path::normalize_and_validate).transpose()?;

		match self
			.store
			.update_operations(&id, expected_actor, expected_path.as_deref(), &operations)
			.await?
		{
			PermissionUpdate::Updated(entry) => Ok(entry),
			PermissionUpdate::Missing => Err(PermissionError::NotFound),
			PermissionUpdate::IdentityMismatch(_) => Err(PermissionError::IdentityMismatch),
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_by_uuid(&self, uuid: &str) -> Result<PermissionData> {
		let id = parse_uuid(uuid)?;
		self.store
			.delete_by_id(&id)
			.await?
			.ok_or(PermissionError::NotFound)
	}

	/// Delete the entry for `(actor, path)`.
	///
	/// # Returns
	/// `false` if there was no such entry.
	pub async fn delete_permissions(&self, path: &str, actor: &Actor) -> Result<bool> {
		Ok(self.remove_permission(path, actor).await?.is_some())
	}

	#[tracing::instrument(skip(self), fields(actor = %actor))]
	pub async fn remove_permission(
		&self,
		path: &str,
		actor: &Actor,
	) -> Result<Option<PermissionData>> {
		let path = path::normalize_and_validate(path)?;
		Ok(self.store.delete_by_actor_and_path(actor, &path).await?)
	}
}

fn parse_uuid(uuid: &str) -> Result<PermissionId> {
	PermissionId::parse(uuid).ok_or(PermissionError::NotFound)
}
