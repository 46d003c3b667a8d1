// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-facing orchestration of the ACL surface.
//!
//! Every operation authorizes first (READ_ACL or WRITE_ACL on the target
//! path), then applies the self-modification guard to mutations, and only
//! then reaches the [`PermissionService`]. Both request shapes reduce to
//! [`NormalizedPermissions`] and share one save path.
//!
//! A missing READ_ACL is always the generic credential-access denial. A
//! missing WRITE_ACL on the V2 surface answers as if the entry did not exist.

mod v2;

use std::sync::Arc;

use serde_json::json;
use warden_core::{
	path, Actor, NormalizedPermissions, PermissionData, PermissionOperation, PermissionsView,
	SetPermissionsRequest,
};
use warden_server_audit::{AuditEventType, AuditLogEntry, AuditOutcome, AuditRecorder};
use warden_server_db::CredentialStore;

use crate::checking::PermissionCheckingService;
use crate::error::{PermissionError, Result};
use crate::service::PermissionService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Denial {
	Forbidden,
	Absent,
}

impl Denial {
	fn into_error(self) -> PermissionError {
		match self {
			Denial::Forbidden => PermissionError::Forbidden,
			Denial::Absent => PermissionError::NotFound,
		}
	}
}

#[derive(Clone)]
pub struct PermissionsHandler {
	checking: PermissionCheckingService,
	service: PermissionService,
	credentials: Arc<dyn CredentialStore>,
	audit: Arc<dyn AuditRecorder>,
}

impl PermissionsHandler {
	pub fn new(
		checking: PermissionCheckingService,
		service: PermissionService,
		credentials: Arc<dyn CredentialStore>,
		audit: Arc<dyn AuditRecorder>,
	) -> Self {
		Self {
			checking,
			service,
			credentials,
			audit,
		}
	}

	pub fn checking(&self) -> &PermissionCheckingService {
		&self.checking
	}

	/// Every entry attached to `credential_name` (legacy read).
	///
	/// Requires READ_ACL. A missing credential is reported with the same
	/// denial as missing authorization.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn get_permissions(
		&self,
		acting: &Actor,
		credential_name: &str,
	) -> Result<PermissionsView> {
		let name = path::normalize_and_validate(credential_name)?;
		self.authorize(
			acting,
			&name,
			PermissionOperation::ReadAcl,
			AuditEventType::AclAccess,
			Denial::Forbidden,
		)
		.await?;

		let Some(version) = self.credentials.find_most_recent(&name).await? else {
			self.record(
				AuditEventType::AclAccess,
				acting,
				&name,
				PermissionOperation::ReadAcl,
				AuditOutcome::Failed,
				json!({ "reason": "credential_not_found" }),
			);
			return Err(PermissionError::Forbidden);
		};

		let entries = self.service.get_permissions(&version).await?;
		self.record(
			AuditEventType::AclAccess,
			acting,
			&name,
			PermissionOperation::ReadAcl,
			AuditOutcome::Success,
			json!({ "entries": entries.len() }),
		);

		Ok(PermissionsView {
			credential_name: version.name,
			permissions: entries.iter().map(PermissionData::to_entry).collect(),
		})
	}

	/// Grant permissions from either request shape.
	///
	/// Legacy requests add to any existing grant for the same actor and must
	/// store exactly one entry when they name one actor. V2 requests create a
	/// new entry and conflict with an existing one.
	#[tracing::instrument(skip(self, request), fields(acting = %acting))]
	pub async fn set_permissions(
		&self,
		acting: &Actor,
		request: &SetPermissionsRequest,
	) -> Result<Vec<PermissionData>> {
		let denial = match request {
			SetPermissionsRequest::Legacy(_) => Denial::Forbidden,
			SetPermissionsRequest::V2(_) => Denial::Absent,
		};
		let normalized = request.normalize()?;
		self.apply(acting, normalized, denial).await
	}

	/// Remove `actor`'s entry on `credential_name` (legacy delete).
	#[tracing::instrument(skip(self), fields(acting = %acting, actor = %actor))]
	pub async fn delete_permission_entry(
		&self,
		acting: &Actor,
		credential_name: &str,
		actor: &Actor,
	) -> Result<()> {
		let name = path::normalize_and_validate(credential_name)?;
		self.authorize(
			acting,
			&name,
			PermissionOperation::WriteAcl,
			AuditEventType::AclDelete,
			Denial::Forbidden,
		)
		.await?;
		self.guard_self_modification(acting, actor, &name, AuditEventType::AclDelete)?;

		let result = match self.service.delete_permissions(&name, actor).await {
			Ok(true) => Ok(()),
			Ok(false) => Err(PermissionError::EntryNotFound),
			Err(e) => Err(e),
		};
		self.record_result(
			AuditEventType::AclDelete,
			acting,
			&name,
			json!({ "actor": actor }),
			&result,
		);
		result
	}

	async fn apply(
		&self,
		acting: &Actor,
		normalized: NormalizedPermissions,
		denial: Denial,
	) -> Result<Vec<PermissionData>> {
		self.authorize(
			acting,
			&normalized.scope,
			PermissionOperation::WriteAcl,
			AuditEventType::AclUpdate,
			denial,
		)
		.await?;

		for grant in &normalized.grants {
			self.guard_self_modification(
				acting,
				&grant.actor,
				&normalized.scope,
				AuditEventType::AclUpdate,
			)?;
		}

		let result = self
			.service
			.save_permissions_for_user(&normalized.grants, normalized.mode)
			.await
			.and_then(|saved| {
				if normalized.expect_single && saved.len() != 1 {
					tracing::error!(
						expected = 1,
						actual = saved.len(),
						"save stored an unexpected number of permissions"
					);
					return Err(PermissionError::InvalidNumberOfPermissions {
						expected: 1,
						actual: saved.len(),
					});
				}
				Ok(saved)
			});

		let actors: Vec<&Actor> = normalized.grants.iter().map(|g| &g.actor).collect();
		self.record_result(
			AuditEventType::AclUpdate,
			acting,
			&normalized.scope,
			json!({ "actors": actors, "mode": format!("{:?}", normalized.mode) }),
			&result,
		);
		result
	}

	/// Checks `operation` on `path`, recording a denial.
	async fn authorize(
		&self,
		acting: &Actor,
		path: &str,
		operation: PermissionOperation,
		event_type: AuditEventType,
		denial: Denial,
	) -> Result<()> {
		if self.checking.has_permission(acting, path, operation).await? {
			return Ok(());
		}
		self.record(
			event_type,
			acting,
			path,
			operation,
			AuditOutcome::Denied,
			json!({ "reason": "missing_permission" }),
		);
		Err(denial.into_error())
	}

	fn guard_self_modification(
		&self,
		acting: &Actor,
		target: &Actor,
		path: &str,
		event_type: AuditEventType,
	) -> Result<()> {
		if self.checking.user_allowed_to_operate_on_actor(acting, target) {
			return Ok(());
		}
		tracing::info!(acting = %acting, path, "refused self-modification of access control");
		self.record(
			event_type,
			acting,
			path,
			PermissionOperation::WriteAcl,
			AuditOutcome::Denied,
			json!({ "reason": "self_modification" }),
		);
		Err(PermissionError::SelfModification)
	}

	fn record_result<T>(
		&self,
		event_type: AuditEventType,
		acting: &Actor,
		path: &str,
		mut details: serde_json::Value,
		result: &Result<T>,
	) {
		let outcome = match result {
			Ok(_) => AuditOutcome::Success,
			Err(e) => {
				details["error"] = json!(format!("{:?}", e.kind()));
				AuditOutcome::Failed
			}
		};
		let operation = match event_type {
			AuditEventType::AclAccess => PermissionOperation::ReadAcl,
			_ => PermissionOperation::WriteAcl,
		};
		self.record(event_type, acting, path, operation, outcome, details);
	}

	fn record(
		&self,
		event_type: AuditEventType,
		acting: &Actor,
		path: &str,
		operation: PermissionOperation,
		outcome: AuditOutcome,
		details: serde_json::Value,
	) {
		self.audit.record(
			AuditLogEntry::builder(event_type)
				.outcome(outcome)
				.actor(acting)
				.credential(path)
				.operation(operation)
				.details(details)
				.build(),
		);
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use async_trait::async_trait;
	use chrono::Utc;
	use warden_core::{
		CredentialType, EncryptedValue, PermissionEntry, PermissionGrant, PermissionId,
		PermissionsRequest, PermissionsV2Request, SaveMode,
	};
	use warden_server_audit::MemoryAuditRecorder;
	use warden_server_db::testing::create_test_pool;
	use warden_server_db::{
		CredentialRepository, DbError, PermissionRepository, PermissionStore, PermissionUpdate,
	};
	use PermissionOperation::*;

	pub(crate) struct Fixture {
		pub handler: PermissionsHandler,
		pub permissions: PermissionRepository,
		pub credentials: CredentialRepository,
		pub audit: Arc<MemoryAuditRecorder>,
		pub admin: Actor,
	}

	pub(crate) async fn fixture() -> Fixture {
		let pool = create_test_pool().await;
		let permissions = PermissionRepository::new(pool.clone());
		let credentials = CredentialRepository::new(pool);
		let audit = Arc::new(MemoryAuditRecorder::new());
		let admin = Actor::new("uaa-client:admin");

		permissions
			.save(
				&[PermissionGrant::new(admin.clone(), "/*", &PermissionOperation::ALL).unwrap()],
				SaveMode::CreateOnly,
			)
			.await
			.unwrap();

		let store: Arc<dyn PermissionStore> = Arc::new(permissions.clone());
		let handler = PermissionsHandler::new(
			PermissionCheckingService::new(store.clone(), true),
			PermissionService::new(store),
			Arc::new(credentials.clone()),
			audit.clone(),
		);

		Fixture {
			handler,
			permissions,
			credentials,
			audit,
			admin,
		}
	}

	pub(crate) async fn create_credential(credentials: &CredentialRepository, name: &str) {
		credentials
			.set_version(
				name,
				CredentialType::Password,
				EncryptedValue {
					ciphertext: vec![0; 8],
					nonce: vec![0; 12],
					encrypted_key: vec![0; 48],
					key_nonce: vec![0; 12],
				},
				false,
			)
			.await
			.unwrap();
	}

	fn legacy(name: &str, actor: &str, ops: &[PermissionOperation]) -> SetPermissionsRequest {
		SetPermissionsRequest::Legacy(PermissionsRequest {
			credential_name: name.to_string(),
			permissions: vec![PermissionEntry {
				actor: Actor::new(actor),
				path: String::new(),
				operations: ops.to_vec(),
			}],
		})
	}

	#[tokio::test]
	async fn test_get_permissions_requires_read_acl() {
		let f = fixture().await;
		create_credential(&f.credentials, "/test").await;
		f.handler
			.set_permissions(&f.admin, &legacy("/test", "x", &[Write]))
			.await
			.unwrap();

		let err = f
			.handler
			.get_permissions(&Actor::new("x"), "/test")
			.await
			.unwrap_err();
		assert!(matches!(err, PermissionError::Forbidden));

		let view = f.handler.get_permissions(&f.admin, "test").await.unwrap();
		assert_eq!(view.credential_name, "/test");
		assert_eq!(view.permissions.len(), 1);
		assert_eq!(view.permissions[0].actor, Actor::new("x"));
		assert_eq!(view.permissions[0].operations, vec![Write]);

		let denied = f.audit.entries_of(AuditEventType::AclAccess);
		assert_eq!(denied[0].outcome, AuditOutcome::Denied);
		assert_eq!(denied[1].outcome, AuditOutcome::Success);
	}

	#[tokio::test]
	async fn test_get_permissions_for_missing_credential_is_forbidden() {
		let f = fixture().await;
		let err = f
			.handler
			.get_permissions(&f.admin, "/does/not/exist")
			.await
			.unwrap_err();
		assert!(matches!(err, PermissionError::Forbidden));
	}

	#[tokio::test]
	async fn test_get_permissions_is_repeatable() {
		let f = fixture().await;
		create_credential(&f.credentials, "/test").await;
		for actor in ["c", "a", "b"] {
			f.handler
				.set_permissions(&f.admin, &legacy("/test", actor, &[Read]))
				.await
				.unwrap();
		}

		let first = f.handler.get_permissions(&f.admin, "/test").await.unwrap();
		let second = f.handler.get_permissions(&f.admin, "/test").await.unwrap();
		assert_eq!(first, second);
		let actors: Vec<_> = first.permissions.iter().map(|p| p.actor.as_str()).collect();
		assert_eq!(actors, vec!["c", "a", "b"]);
	}

	#[tokio::test]
	async fn test_legacy_set_merges_operations() {
		let f = fixture().await;
		f.handler
			.set_permissions(&f.admin, &legacy("/test", "x", &[Read]))
			.await
			.unwrap();
		let saved = f
			.handler
			.set_permissions(&f.admin, &legacy("/test", "x", &[Write]))
			.await
			.unwrap();

		assert_eq!(saved.len(), 1);
		assert_eq!(saved[0].operations, vec![Read, Write]);
	}

	#[tokio::test]
	async fn test_legacy_set_rewrites_entry_path_to_credential_name() {
		let f = fixture().await;
		let request = SetPermissionsRequest::Legacy(PermissionsRequest {
			credential_name: "/test".to_string(),
			permissions: vec![PermissionEntry {
				actor: Actor::new("x"),
				path: "/elsewhere".to_string(),
				operations: vec![Read],
			}],
		});

		let saved = f.handler.set_permissions(&f.admin, &request).await.unwrap();
		assert_eq!(saved[0].path, "/test");
	}

	#[tokio::test]
	async fn test_set_without_write_acl_is_denied_per_surface() {
		let f = fixture().await;
		let mallory = Actor::new("mallory");

		let v1 = f
			.handler
			.set_permissions(&mallory, &legacy("/test", "x", &[Read]))
			.await
			.unwrap_err();
		assert!(matches!(v1, PermissionError::Forbidden));

		let v2 = f
			.handler
			.set_permissions(
				&mallory,
				&SetPermissionsRequest::V2(PermissionsV2Request {
					actor: Actor::new("x"),
					path: "/test".to_string(),
					operations: vec![Read],
				}),
			)
			.await
			.unwrap_err();
		assert!(matches!(v2, PermissionError::NotFound));

		assert!(f.permissions.find_by_path("/test").await.unwrap().is_empty());
		assert!(f
			.audit
			.entries()
			.iter()
			.all(|e| e.outcome == AuditOutcome::Denied));
	}

	#[tokio::test]
	async fn test_set_own_grant_is_refused() {
		let f = fixture().await;
		let err = f
			.handler
			.set_permissions(&f.admin, &legacy("/test", f.admin.as_str(), &[Read]))
			.await
			.unwrap_err();
		assert!(matches!(err, PermissionError::SelfModification));
		assert!(f.permissions.find_by_path("/test").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_unknown_operation_is_bad_request() {
		let f = fixture().await;
		let request: std::result::Result<SetPermissionsRequest, _> = serde_json::from_value(json!({
			"credential_name": "/test",
			"permissions": [{ "actor": "x", "operations": ["read", "frobnicate"] }]
		}));
		assert!(request.is_err());

		let err = f
			.handler
			.set_permissions(&f.admin, &legacy("/test", "x", &[]))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), crate::ErrorKind::BadRequest);
	}

	#[tokio::test]
	async fn test_delete_permission_entry() {
		let f = fixture().await;
		f.handler
			.set_permissions(&f.admin, &legacy("/test", "x", &[Write]))
			.await
			.unwrap();

		f.handler
			.delete_permission_entry(&f.admin, "/test", &Actor::new("x"))
			.await
			.unwrap();

		let err = f
			.handler
			.delete_permission_entry(&f.admin, "/test", &Actor::new("x"))
			.await
			.unwrap_err();
		assert!(matches!(err, PermissionError::EntryNotFound));
		assert_eq!(err.kind(), crate::ErrorKind::NotFound);
		assert_eq!(
			err.to_string(),
			"The request could not be completed because the credential does not exist or you do not have sufficient authorization."
		);

		let deletes = f.audit.entries_of(AuditEventType::AclDelete);
		assert_eq!(deletes[0].outcome, AuditOutcome::Success);
		assert_eq!(deletes[1].outcome, AuditOutcome::Failed);
	}

	#[tokio::test]
	async fn test_delete_own_entry_is_refused() {
		let f = fixture().await;
		let err = f
			.handler
			.delete_permission_entry(&f.admin, "/test", &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, PermissionError::SelfModification));
	}

	/// Grants everything to everyone and reports two stored entries per save.
	struct DoublingStore;

	fn fake_entry(actor: &Actor, path: &str) -> PermissionData {
		PermissionData {
			id: PermissionId::generate(),
			actor: actor.clone(),
			path: path.to_string(),
			operations: PermissionOperation::ALL.to_vec(),
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[async_trait]
	impl PermissionStore for DoublingStore {
		async fn find_by_id(
			&self,
			_id: &PermissionId,
		) -> std::result::Result<Option<PermissionData>, DbError> {
			Ok(None)
		}

		async fn find_by_actor(
			&self,
			actor: &Actor,
		) -> std::result::Result<Vec<PermissionData>, DbError> {
			Ok(vec![fake_entry(actor, "/*")])
		}

		async fn find_by_path(
			&self,
			_path: &str,
		) -> std::result::Result<Vec<PermissionData>, DbError> {
			Ok(Vec::new())
		}

		async fn find_by_actor_and_path(
			&self,
			_actor: &Actor,
			_path: &str,
		) -> std::result::Result<Option<PermissionData>, DbError> {
			Ok(None)
		}

		async fn save(
			&self,
			grants: &[PermissionGrant],
			_mode: SaveMode,
		) -> std::result::Result<Vec<PermissionData>, DbError> {
			let grant = &grants[0];
			Ok(vec![
				fake_entry(&grant.actor, &grant.path),
				fake_entry(&grant.actor, &grant.path),
			])
		}

		async fn update_operations(
			&self,
			_id: &PermissionId,
			_expected_actor: Option<&Actor>,
			_expected_path: Option<&str>,
			_operations: &[PermissionOperation],
		) -> std::result::Result<PermissionUpdate, DbError> {
			Ok(PermissionUpdate::Missing)
		}

		async fn delete_by_id(
			&self,
			_id: &PermissionId,
		) -> std::result::Result<Option<PermissionData>, DbError> {
			Ok(None)
		}

		async fn delete_by_actor_and_path(
			&self,
			_actor: &Actor,
			_path: &str,
		) -> std::result::Result<Option<PermissionData>, DbError> {
			Ok(None)
		}
	}

	async fn doubling_handler() -> (PermissionsHandler, Arc<MemoryAuditRecorder>) {
		let pool = create_test_pool().await;
		let store: Arc<dyn PermissionStore> = Arc::new(DoublingStore);
		let audit = Arc::new(MemoryAuditRecorder::new());
		let handler = PermissionsHandler::new(
			PermissionCheckingService::new(store.clone(), true),
			PermissionService::new(store),
			Arc::new(CredentialRepository::new(pool)),
			audit.clone(),
		);
		(handler, audit)
	}

	#[tokio::test]
	async fn test_unexpected_save_count_fails_fast() {
		let (handler, audit) = doubling_handler().await;

		let err = handler
			.set_permissions(&Actor::new("admin"), &legacy("/test", "x", &[Read]))
			.await
			.unwrap_err();

		assert!(matches!(
			err,
			PermissionError::InvalidNumberOfPermissions {
				expected: 1,
				actual: 2
			}
		));
		assert_eq!(err.to_string(), "INVALID_NUMBER_OF_PERMISSIONS");
		assert_eq!(audit.entries()[0].outcome, AuditOutcome::Failed);
	}

	#[tokio::test]
	async fn test_unexpected_save_count_fails_fast_for_v2_request() {
		let (handler, audit) = doubling_handler().await;
		let request = PermissionsV2Request {
			actor: Actor::new("x"),
			path: "/test".to_string(),
			operations: vec![Read, Write],
		};

		let err = handler
			.set_permissions(&Actor::new("admin"), &SetPermissionsRequest::V2(request.clone()))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			PermissionError::InvalidNumberOfPermissions {
				expected: 1,
				actual: 2
			}
		));
		assert_eq!(err.kind(), crate::ErrorKind::Internal);
		assert_eq!(err.to_string(), "INVALID_NUMBER_OF_PERMISSIONS");

		let err = handler
			.create_permission(&Actor::new("admin"), &request)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			PermissionError::InvalidNumberOfPermissions { actual: 2, .. }
		));

		let updates = audit.entries_of(AuditEventType::AclUpdate);
		assert_eq!(updates.len(), 2);
		assert!(updates.iter().all(|e| e.outcome == AuditOutcome::Failed));
	}
}
