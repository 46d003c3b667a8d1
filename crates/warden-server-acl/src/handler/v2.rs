// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The identifier-addressed (V2) permission surface.

use serde_json::json;
use warden_core::{
	path, Actor, PermissionGrant, PermissionOperation, PermissionPatchRequest,
	PermissionsV2Request, PermissionsV2View, SetPermissionsRequest,
};
use warden_server_audit::{AuditEventType, AuditOutcome};

use super::{Denial, PermissionsHandler};
use crate::error::{PermissionError, Result};

impl PermissionsHandler {
	/// Read one entry by identifier. Requires READ_ACL on the entry's path.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn get_permission(&self, acting: &Actor, uuid: &str) -> Result<PermissionsV2View> {
		let entry = self.service.find_by_uuid(uuid).await?;
		self.authorize(
			acting,
			&entry.path,
			PermissionOperation::ReadAcl,
			AuditEventType::AclAccess,
			Denial::Forbidden,
		)
		.await?;

		self.record(
			AuditEventType::AclAccess,
			acting,
			&entry.path,
			PermissionOperation::ReadAcl,
			AuditOutcome::Success,
			json!({ "uuid": entry.id }),
		);
		Ok(entry.to_view())
	}

	/// Read the entry for `(path, actor)`. Requires READ_ACL on `path`.
	#[tracing::instrument(skip(self), fields(acting = %acting, actor = %actor))]
	pub async fn find_permission(
		&self,
		acting: &Actor,
		path: &str,
		actor: &Actor,
	) -> Result<PermissionsV2View> {
		let path = path::normalize_and_validate(path)?;
		self.authorize(
			acting,
			&path,
			PermissionOperation::ReadAcl,
			AuditEventType::AclAccess,
			Denial::Forbidden,
		)
		.await?;

		let entry = self.service.find_by_path_and_actor(&path, actor).await?;
		self.record(
			AuditEventType::AclAccess,
			acting,
			&path,
			PermissionOperation::ReadAcl,
			AuditOutcome::Success,
			json!({ "uuid": entry.id }),
		);
		Ok(entry.to_view())
	}

	/// Create a new entry. Conflicts if `(actor, path)` already has one.
	pub async fn create_permission(
		&self,
		acting: &Actor,
		request: &PermissionsV2Request,
	) -> Result<PermissionsV2View> {
		let mut saved = self
			.set_permissions(acting, &SetPermissionsRequest::V2(request.clone()))
			.await?;
		saved
			.pop()
			.map(|entry| entry.to_view())
			.ok_or(PermissionError::InvalidNumberOfPermissions {
				expected: 1,
				actual: 0,
			})
	}

	/// Replace the operations of an entry. `actor`/`path` in the request, when
	/// present, must equal the stored values.
	#[tracing::instrument(skip(self, request), fields(acting = %acting))]
	pub async fn patch_permission(
		&self,
		acting: &Actor,
		uuid: &str,
		request: &PermissionPatchRequest,
	) -> Result<PermissionsV2View> {
		self.update_by_uuid(
			acting,
			uuid,
			request.actor.as_ref(),
			request.path.as_deref(),
			&request.operations,
		)
		.await
	}

	/// Idempotent replace. The request's actor and path must equal the stored
	/// entry's.
	#[tracing::instrument(skip(self, request), fields(acting = %acting))]
	pub async fn put_permission(
		&self,
		acting: &Actor,
		uuid: &str,
		request: &PermissionsV2Request,
	) -> Result<PermissionsV2View> {
		let grant =
			PermissionGrant::new(request.actor.clone(), &request.path, &request.operations)?;
		self.update_by_uuid(
			acting,
			uuid,
			Some(&grant.actor),
			Some(&grant.path),
			&grant.operations,
		)
		.await
	}

	/// Delete by identifier, returning what was deleted.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn delete_permission(
		&self,
		acting: &Actor,
		uuid: &str,
	) -> Result<PermissionsV2View> {
		let entry = self.service.find_by_uuid(uuid).await?;
		self.authorize(
			acting,
			&entry.path,
			PermissionOperation::WriteAcl,
			AuditEventType::AclDelete,
			Denial::Absent,
		)
		.await?;
		self.guard_self_modification(
			acting,
			&entry.actor,
			&entry.path,
			AuditEventType::AclDelete,
		)?;

		let result = self.service.delete_by_uuid(uuid).await;
		self.record_result(
			AuditEventType::AclDelete,
			acting,
			&entry.path,
			json!({ "uuid": entry.id, "actor": entry.actor }),
			&result,
		);
		Ok(result?.to_view())
	}

	/// Delete the entry for `(path, actor)`, returning what was deleted.
	#[tracing::instrument(skip(self), fields(acting = %acting, actor = %actor))]
	pub async fn delete_permission_by_path(
		&self,
		acting: &Actor,
		path: &str,
		actor: &Actor,
	) -> Result<PermissionsV2View> {
		let path = path::normalize_and_validate(path)?;
		self.authorize(
			acting,
			&path,
			PermissionOperation::WriteAcl,
			AuditEventType::AclDelete,
			Denial::Absent,
		)
		.await?;
		self.guard_self_modification(acting, actor, &path, AuditEventType::AclDelete)?;

		let result = self
			.service
			.remove_permission(&path, actor)
			.await
			.and_then(|deleted| deleted.ok_or(PermissionError::NotFound));
		self.record_result(
			AuditEventType::AclDelete,
			acting,
			&path,
			json!({ "actor": actor }),
			&result,
		);
		Ok(result?.to_view())
	}

	async fn update_by_uuid(
		&self,
		acting: &Actor,
		uuid: &str,
		expected_actor: Option<&Actor>,
		expected_path: Option<&str>,
		operations: &[PermissionOperation],
	) -> Result<PermissionsV2View> {
		let entry = self.service.find_by_uuid(uuid).await?;
		self.authorize(
			acting,
			&entry.path,
			PermissionOperation::WriteAcl,
			AuditEventType::AclUpdate,
			Denial::Absent,
		)
		.await?;
		self.guard_self_modification(
			acting,
			&entry.actor,
			&entry.path,
			AuditEventType::AclUpdate,
		)?;

		// The stored identity is the fallback condition, so a concurrent
		// delete surfaces as NotFound rather than updating a replacement.
		let result = self
			.service
			.update_operations(
				uuid,
				Some(expected_actor.unwrap_or(&entry.actor)),
				Some(expected_path.unwrap_or(&entry.path)),
				operations,
			)
			.await;
		self.record_result(
			AuditEventType::AclUpdate,
			acting,
			&entry.path,
			json!({ "uuid": entry.id, "operations": operations }),
			&result,
		);
		Ok(result?.to_view())
	}
}
