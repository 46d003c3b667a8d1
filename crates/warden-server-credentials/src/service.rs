// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential data plane gated by the permission checker.
//!
//! Each operation authorizes against the credential name before touching
//! storage: WRITE to set, READ to read any version, DELETE to delete.

use std::sync::Arc;

use serde_json::json;
use warden_core::{
	path, Actor, CredentialValue, CredentialValueView, CredentialVersion, CredentialVersionId,
	CredentialView, PermissionOperation, SetCredentialRequest,
};
use warden_server_acl::PermissionCheckingService;
use warden_server_audit::{AuditEventType, AuditLogEntry, AuditOutcome, AuditRecorder};
use warden_server_db::CredentialStore;

use crate::encryption::EncryptionProvider;
use crate::error::{CredentialError, CredentialResult};

#[derive(Clone)]
pub struct PermissionedCredentialService {
	store: Arc<dyn CredentialStore>,
	checking: PermissionCheckingService,
	encryption: Arc<dyn EncryptionProvider>,
	audit: Arc<dyn AuditRecorder>,
}

impl PermissionedCredentialService {
	pub fn new(
		store: Arc<dyn CredentialStore>,
		checking: PermissionCheckingService,
		encryption: Arc<dyn EncryptionProvider>,
		audit: Arc<dyn AuditRecorder>,
	) -> Self {
		Self {
			store,
			checking,
			encryption,
			audit,
		}
	}

	/// Validate and store a new version. Requires WRITE.
	///
	/// Without `overwrite`, an existing credential is returned unchanged.
	#[tracing::instrument(skip(self, request), fields(acting = %acting, name = %request.name))]
	pub async fn set(
		&self,
		acting: &Actor,
		request: &SetCredentialRequest,
	) -> CredentialResult<CredentialView> {
		let new = request.validate()?;
		self.authorize(
			acting,
			&new.name,
			PermissionOperation::Write,
			AuditEventType::CredentialUpdate,
		)
		.await?;

		let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(&new.value)?);
		let sealed = self.encryption.encrypt(&plaintext)?;

		let (version, created) = self
			.store
			.set_version(&new.name, new.value.credential_type(), sealed, new.overwrite)
			.await?;

		self.record(
			AuditEventType::CredentialUpdate,
			acting,
			&new.name,
			PermissionOperation::Write,
			AuditOutcome::Success,
			json!({ "version": version.id, "created": created }),
		);
		Ok(CredentialView::from(&version))
	}

	/// Metadata of the current version. Requires READ.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn find_most_recent(
		&self,
		acting: &Actor,
		name: &str,
	) -> CredentialResult<CredentialView> {
		let version = self.current_version(acting, name).await?;
		Ok(CredentialView::from(&version))
	}

	/// The current version with its decrypted value. Requires READ.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn get_value(&self, acting: &Actor, name: &str) -> CredentialResult<CredentialValueView> {
		let version = self.current_version(acting, name).await?;
		self.reveal(&version)
	}

	/// Every version, newest first, with values. Requires READ.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn find_all_versions(
		&self,
		acting: &Actor,
		name: &str,
	) -> CredentialResult<Vec<CredentialValueView>> {
		let name = path::normalize_and_validate(name)?;
		self.authorize(
			acting,
			&name,
			PermissionOperation::Read,
			AuditEventType::CredentialAccess,
		)
		.await?;

		let versions = self.store.find_all_versions(&name).await?;
		if versions.is_empty() {
			return Err(CredentialError::Forbidden);
		}

		self.record_read(acting, &name, json!({ "versions": versions.len() }));
		versions.iter().map(|v| self.reveal(v)).collect()
	}

	/// One version by identifier. Requires READ on the version's credential.
	/// Unknown and malformed identifiers are denied like missing access.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn find_version_by_id(
		&self,
		acting: &Actor,
		id: &str,
	) -> CredentialResult<CredentialValueView> {
		let Some(id) = CredentialVersionId::parse(id) else {
			return Err(CredentialError::Forbidden);
		};
		let Some(version) = self.store.find_version(&id).await? else {
			return Err(CredentialError::Forbidden);
		};

		self.authorize(
			acting,
			&version.name,
			PermissionOperation::Read,
			AuditEventType::CredentialAccess,
		)
		.await?;

		self.record_read(acting, &version.name, json!({ "version": version.id }));
		self.reveal(&version)
	}

	/// Delete the credential, its versions, and the permission entries attached
	/// to its exact name. Requires DELETE.
	#[tracing::instrument(skip(self), fields(acting = %acting))]
	pub async fn delete(&self, acting: &Actor, name: &str) -> CredentialResult<()> {
		let name = path::normalize_and_validate(name)?;
		self.authorize(
			acting,
			&name,
			PermissionOperation::Delete,
			AuditEventType::CredentialDelete,
		)
		.await?;

		if !self.store.delete_credential(&name).await? {
			return Err(CredentialError::Forbidden);
		}

		self.record(
			AuditEventType::CredentialDelete,
			acting,
			&name,
			PermissionOperation::Delete,
			AuditOutcome::Success,
			serde_json::Value::Null,
		);
		Ok(())
	}

	/// Authorizes READ and resolves the current version once, so the version
	/// returned is the one that was authorized.
	async fn current_version(&self, acting: &Actor, name: &str) -> CredentialResult<CredentialVersion> {
		let name = path::normalize_and_validate(name)?;
		self.authorize(
			acting,
			&name,
			PermissionOperation::Read,
			AuditEventType::CredentialAccess,
		)
		.await?;

		let version = self
			.store
			.find_most_recent(&name)
			.await?
			.ok_or(CredentialError::Forbidden)?;

		self.record_read(acting, &name, json!({ "version": version.id }));
		Ok(version)
	}

	fn reveal(&self, version: &CredentialVersion) -> CredentialResult<CredentialValueView> {
		let plaintext = self.encryption.decrypt(&version.encrypted_value)?;
		let value: CredentialValue = serde_json::from_slice(&plaintext)?;
		Ok(CredentialValueView {
			credential: CredentialView::from(version),
			value,
		})
	}

	async fn authorize(
		&self,
		acting: &Actor,
		name: &str,
		operation: PermissionOperation,
		event_type: AuditEventType,
	) -> CredentialResult<()> {
		if self.checking.has_permission(acting, name, operation).await? {
			return Ok(());
		}
		self.record(
			event_type,
			acting,
			name,
			operation,
			AuditOutcome::Denied,
			json!({ "reason": "missing_permission" }),
		);
		Err(CredentialError::Forbidden)
	}

	fn record_read(&self, acting: &Actor, name: &str, details: serde_json::Value) {
		self.record(
			AuditEventType::CredentialAccess,
			acting,
			name,
			PermissionOperation::Read,
			AuditOutcome::Success,
			details,
		);
	}

	fn record(
		&self,
		event_type: AuditEventType,
		acting: &Actor,
		name: &str,
		operation: PermissionOperation,
		outcome: AuditOutcome,
		details: serde_json::Value,
	) {
		self.audit.record(
			AuditLogEntry::builder(event_type)
				.outcome(outcome)
				.actor(acting)
				.credential(name)
				.operation(operation)
				.details(details)
				.build(),
		);
	}
}
