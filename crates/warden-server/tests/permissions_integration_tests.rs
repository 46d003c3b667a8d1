// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end permission scenarios against a file-backed database.
//!
//! Tests cover:
//! - WRITE without READ_ACL on the same path
//! - Revoking the sole grant for a credential
//! - Create/read/patch round trip by UUID
//! - (actor, path) uniqueness, including concurrent creates
//! - Patch racing delete on one UUID
//! - Wildcard matching through the checking service
//! - Self-modification and audit records for denials
//! - Audit retention purge

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::{tempdir, TempDir};
use warden_core::{
	Actor, PermissionEntry, PermissionOperation, PermissionPatchRequest, PermissionsRequest,
	PermissionsV2Request, SetCredentialRequest, SetPermissionsRequest, SystemClock,
};
use warden_server::{ServerConfig, Warden};
use warden_server_acl::ErrorKind;
use warden_server_audit::{AuditEventType, AuditOutcome, MemoryAuditRecorder};
use warden_server_config::{BootstrapPermission, MasterKey, MASTER_KEY_SIZE};
use warden_server_credentials::CredentialError;
use warden_server_db::{create_pool, run_migrations, AuditQuery};
use PermissionOperation::*;

const ADMIN: &str = "uaa-client:credhub_admin";
const X: &str = "uaa-user:x";

struct TestServer {
	warden: Warden,
	audit: Arc<MemoryAuditRecorder>,
	_dir: TempDir,
}

fn test_config(dir: &TempDir) -> ServerConfig {
	let mut config = ServerConfig::default();
	config.database.url = format!("sqlite:{}?mode=rwc", dir.path().join("warden.db").display());
	config.encryption.master_key = Some(MasterKey::new("42".repeat(MASTER_KEY_SIZE)));
	config.authorization.permissions = vec![BootstrapPermission {
		path: "/*".to_string(),
		actors: vec![ADMIN.to_string()],
		operations: PermissionOperation::ALL.to_vec(),
	}];
	config
}

/// Creates a server with an isolated database and an in-memory audit recorder.
async fn setup_with(configure: impl FnOnce(&mut ServerConfig)) -> TestServer {
	let dir = tempdir().unwrap();
	let mut config = test_config(&dir);
	configure(&mut config);

	let pool = create_pool(&config.database.url, config.database.max_connections)
		.await
		.unwrap();
	run_migrations(&pool).await.unwrap();

	let audit = Arc::new(MemoryAuditRecorder::new());
	let warden = Warden::from_parts(config, pool, Arc::new(SystemClock), audit.clone());
	warden.bootstrap().await.unwrap();

	TestServer {
		warden,
		audit,
		_dir: dir,
	}
}

async fn setup() -> TestServer {
	setup_with(|_| {}).await
}

fn admin() -> Actor {
	Actor::new(ADMIN)
}

fn x() -> Actor {
	Actor::new(X)
}

fn v2(actor: &str, path: &str, operations: &[PermissionOperation]) -> PermissionsV2Request {
	PermissionsV2Request {
		actor: Actor::new(actor),
		path: path.to_string(),
		operations: operations.to_vec(),
	}
}

fn password(name: &str) -> SetCredentialRequest {
	SetCredentialRequest {
		name: name.to_string(),
		credential_type: "password".to_string(),
		value: Some(json!("s3cret")),
		overwrite: true,
	}
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn write_grant_does_not_expose_acl() {
	let server = setup().await;
	let handler = server.warden.permissions();
	let credentials = server.warden.credentials().unwrap();

	let created = handler
		.create_permission(&admin(), &v2(X, "/test", &[Write]))
		.await
		.unwrap();

	credentials.set(&x(), &password("/test")).await.unwrap();

	let err = handler.find_permission(&x(), "/test", &x()).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Forbidden);

	let err = handler
		.get_permission(&x(), &created.uuid.to_string())
		.await
		.unwrap_err();
	assert_eq!(err.kind().status_code(), 403);

	let view = handler.find_permission(&admin(), "/test", &x()).await.unwrap();
	assert_eq!(view.actor, x());
	assert_eq!(view.path, "/test");
	assert_eq!(view.operations, vec![Write]);
}

#[tokio::test]
async fn deleting_sole_grant_revokes_write() {
	let server = setup().await;
	let handler = server.warden.permissions();
	let credentials = server.warden.credentials().unwrap();

	let created = handler
		.create_permission(&admin(), &v2(X, "/test", &[Write]))
		.await
		.unwrap();
	credentials.set(&x(), &password("/test")).await.unwrap();

	let deleted = handler
		.delete_permission(&admin(), &created.uuid.to_string())
		.await
		.unwrap();
	assert_eq!(deleted, created);

	let err = credentials.set(&x(), &password("/test")).await.unwrap_err();
	assert!(matches!(err, CredentialError::Forbidden));

	handler
		.create_permission(&admin(), &v2(X, "/test", &[Write]))
		.await
		.unwrap();
	credentials.set(&x(), &password("/test")).await.unwrap();
}

#[tokio::test]
async fn create_read_patch_round_trip() {
	let server = setup().await;
	let handler = server.warden.permissions();

	let created = handler
		.create_permission(&admin(), &v2(X, "/round/trip", &[Read, Write]))
		.await
		.unwrap();
	let uuid = created.uuid.to_string();

	let read = handler.get_permission(&admin(), &uuid).await.unwrap();
	assert_eq!(read.operations, vec![Read, Write]);

	handler
		.patch_permission(
			&admin(),
			&uuid,
			&PermissionPatchRequest {
				operations: vec![Write],
				actor: None,
				path: None,
			},
		)
		.await
		.unwrap();

	let read = handler.get_permission(&admin(), &uuid).await.unwrap();
	assert_eq!(read.operations, vec![Write]);
	assert_eq!(read.uuid, created.uuid);
}

#[tokio::test]
async fn second_create_for_same_actor_and_path_conflicts() {
	let server = setup().await;
	let handler = server.warden.permissions();

	handler
		.create_permission(&admin(), &v2(X, "/test", &[Read]))
		.await
		.unwrap();

	let err = handler
		.create_permission(&admin(), &v2(X, "/test", &[Delete]))
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn concurrent_duplicate_creates_yield_one_conflict() {
	let server = setup().await;

	let tasks: Vec<_> = (0..4)
		.map(|_| {
			let handler = server.warden.permissions().clone();
			tokio::spawn(async move {
				handler
					.create_permission(&admin(), &v2(X, "/race", &[Read]))
					.await
			})
		})
		.collect();

	let mut created = 0;
	let mut conflicts = 0;
	for task in tasks {
		match task.await.unwrap() {
			Ok(_) => created += 1,
			Err(e) => {
				assert_eq!(e.kind(), ErrorKind::Conflict, "unexpected error: {e}");
				conflicts += 1;
			}
		}
	}

	assert_eq!(created, 1);
	assert_eq!(conflicts, 3);
}

#[tokio::test]
async fn concurrent_patch_and_delete_never_resurrect_entry() {
	let server = setup().await;

	for round in 0..8 {
		let path = format!("/race/{round}");
		let created = server
			.warden
			.permissions()
			.create_permission(&admin(), &v2(X, &path, &[Read]))
			.await
			.unwrap();
		let uuid = created.uuid.to_string();

		let patch = {
			let handler = server.warden.permissions().clone();
			let uuid = uuid.clone();
			tokio::spawn(async move {
				handler
					.patch_permission(
						&admin(),
						&uuid,
						&PermissionPatchRequest {
							operations: vec![Read, Write],
							actor: None,
							path: None,
						},
					)
					.await
			})
		};
		let delete = {
			let handler = server.warden.permissions().clone();
			let uuid = uuid.clone();
			tokio::spawn(async move { handler.delete_permission(&admin(), &uuid).await })
		};

		let deleted = delete.await.unwrap().unwrap();
		assert_eq!(deleted.uuid, created.uuid);
		match patch.await.unwrap() {
			Ok(patched) => assert_eq!(patched.operations, vec![Read, Write]),
			Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound, "unexpected error: {e}"),
		}

		let handler = server.warden.permissions();
		let err = handler.get_permission(&admin(), &uuid).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
		let err = handler.find_permission(&admin(), &path, &x()).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
		assert!(!server
			.warden
			.checking()
			.has_permission(&x(), &path, Read)
			.await
			.unwrap());
	}
}

#[tokio::test]
async fn legacy_read_is_idempotent() {
	let server = setup().await;
	let handler = server.warden.permissions();
	let credentials = server.warden.credentials().unwrap();

	credentials.set(&admin(), &password("/legacy")).await.unwrap();
	for actor in ["uaa-user:a", "uaa-user:b"] {
		handler
			.set_permissions(
				&admin(),
				&SetPermissionsRequest::Legacy(PermissionsRequest {
					credential_name: "legacy".to_string(),
					permissions: vec![PermissionEntry {
						actor: Actor::new(actor),
						path: String::new(),
						operations: vec![Read],
					}],
				}),
			)
			.await
			.unwrap();
	}

	let first = handler.get_permissions(&admin(), "/legacy").await.unwrap();
	let second = handler.get_permissions(&admin(), "/legacy").await.unwrap();
	assert_eq!(first, second);

	let actors: Vec<_> = first.permissions.iter().map(|e| e.actor.as_str()).collect();
	assert_eq!(actors, vec!["uaa-user:a", "uaa-user:b"]);
}

#[tokio::test]
async fn wildcard_grants_cover_descendants_only() {
	let server = setup().await;
	server
		.warden
		.permissions()
		.create_permission(&admin(), &v2("uaa-user:a", "/user-a/*", &[Read]))
		.await
		.unwrap();

	let checking = server.warden.checking();
	let a = Actor::new("uaa-user:a");
	for (path, expected) in [
		("/user-a/foo", true),
		("/user-a/foo/bar", true),
		("/user-b/foo", false),
		("/user-a", false),
	] {
		assert_eq!(
			checking.has_permission(&a, path, Read).await.unwrap(),
			expected,
			"path {path}"
		);
	}
	assert!(!checking.has_permission(&a, "/user-a/foo", Write).await.unwrap());
}

#[tokio::test]
async fn admin_cannot_revoke_own_grant() {
	let server = setup().await;
	let handler = server.warden.permissions();

	assert!(!server
		.warden
		.checking()
		.user_allowed_to_operate_on_actor(&admin(), &admin()));

	let err = handler
		.delete_permission_by_path(&admin(), "/*", &admin())
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Forbidden);

	let view = handler.find_permission(&admin(), "/*", &admin()).await.unwrap();
	assert_eq!(view.operations, PermissionOperation::ALL.to_vec());
}

#[tokio::test]
async fn denials_are_audited() {
	let server = setup().await;
	let handler = server.warden.permissions();

	let _ = handler.find_permission(&x(), "/test", &x()).await;
	let _ = handler
		.create_permission(&x(), &v2("uaa-user:y", "/test", &[Read]))
		.await;

	let access = server.audit.entries_of(AuditEventType::AclAccess);
	assert_eq!(access.len(), 1);
	assert_eq!(access[0].outcome, AuditOutcome::Denied);
	assert_eq!(access[0].actor, Some(x()));

	let updates = server.audit.entries_of(AuditEventType::AclUpdate);
	assert_eq!(updates.len(), 1);
	assert_eq!(updates[0].outcome, AuditOutcome::Denied);
}

#[tokio::test]
async fn disabled_acls_allow_everything() {
	let server = setup_with(|config| config.authorization.acls_enabled = false).await;
	let credentials = server.warden.credentials().unwrap();
	let stranger = Actor::new("uaa-user:stranger");

	credentials.set(&stranger, &password("/open")).await.unwrap();
	let value = credentials.get_value(&stranger, "/open").await.unwrap();
	assert_eq!(value.credential.name, "/open");
}

#[tokio::test]
async fn credentials_require_master_key() {
	let server = setup_with(|config| config.encryption.master_key = None).await;
	assert!(matches!(
		server.warden.credentials(),
		Err(warden_server::ServerError::Credential(
			CredentialError::MissingMasterKey
		))
	));
}

// ============================================================================
// Full wiring
// ============================================================================

#[tokio::test]
async fn connect_persists_and_purges_audit_logs() {
	let dir = tempdir().unwrap();
	let warden = Warden::connect(&test_config(&dir)).await.unwrap();
	warden.bootstrap().await.unwrap();

	let credentials = warden.credentials().unwrap();
	assert!(credentials.set(&x(), &password("/test")).await.is_err());

	let logs = warden.audit_logs();
	let query = AuditQuery {
		event_type: Some(AuditEventType::CredentialUpdate),
		..AuditQuery::default()
	};

	let mut total = 0;
	for _ in 0..50 {
		total = logs.query_logs(&query).await.unwrap().1;
		if total > 0 {
			break;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	assert_eq!(total, 1);

	let cutoff = warden.clock().now() + chrono::Duration::days(1);
	assert_eq!(logs.delete_before(cutoff).await.unwrap(), 1);
	assert_eq!(logs.query_logs(&query).await.unwrap().1, 0);
}
