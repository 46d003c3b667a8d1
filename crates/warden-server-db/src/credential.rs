// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential and credential version repository.
//!
//! Values arrive here already encrypted; this layer only stores the sealed
//! blobs.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;
use warden_core::{
	Clock, Credential, CredentialId, CredentialType, CredentialVersion, CredentialVersionId,
	EncryptedValue, SystemClock,
};

use crate::error::DbError;
use crate::{format_timestamp, parse_timestamp};

#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn find_most_recent(&self, name: &str) -> Result<Option<CredentialVersion>, DbError>;
	async fn find_all_versions(&self, name: &str) -> Result<Vec<CredentialVersion>, DbError>;
	async fn find_version(
		&self,
		id: &CredentialVersionId,
	) -> Result<Option<CredentialVersion>, DbError>;
	async fn set_version(
		&self,
		name: &str,
		credential_type: CredentialType,
		encrypted_value: EncryptedValue,
		overwrite: bool,
	) -> Result<(CredentialVersion, bool), DbError>;
	async fn delete_credential(&self, name: &str) -> Result<bool, DbError>;
}

#[async_trait]
impl CredentialStore for CredentialRepository {
	async fn find_most_recent(&self, name: &str) -> Result<Option<CredentialVersion>, DbError> {
		self.find_most_recent(name).await
	}

	async fn find_all_versions(&self, name: &str) -> Result<Vec<CredentialVersion>, DbError> {
		self.find_all_versions(name).await
	}

	async fn find_version(
		&self,
		id: &CredentialVersionId,
	) -> Result<Option<CredentialVersion>, DbError> {
		self.find_version(id).await
	}

	async fn set_version(
		&self,
		name: &str,
		credential_type: CredentialType,
		encrypted_value: EncryptedValue,
		overwrite: bool,
	) -> Result<(CredentialVersion, bool), DbError> {
		self
			.set_version(name, credential_type, encrypted_value, overwrite)
			.await
	}

	async fn delete_credential(&self, name: &str) -> Result<bool, DbError> {
		self.delete_credential(name).await
	}
}

#[derive(Clone)]
pub struct CredentialRepository {
	pool: SqlitePool,
	clock: Arc<dyn Clock>,
	write_lock: Arc<Mutex<()>>,
}

impl CredentialRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self::with_clock(pool, Arc::new(SystemClock))
	}

	pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
		Self {
			pool,
			clock,
			write_lock: Arc::new(Mutex::new(())),
		}
	}

	#[cfg(test)]
	async fn find_credential(&self, name: &str) -> Result<Option<Credential>, DbError> {
		let mut conn = self.pool.acquire().await?;
		select_credential(&mut conn, name).await
	}

	/// The current version of `name`.
	#[tracing::instrument(skip(self))]
	pub async fn find_most_recent(&self, name: &str) -> Result<Option<CredentialVersion>, DbError> {
		let mut conn = self.pool.acquire().await?;
		select_most_recent(&mut conn, name).await
	}

	/// Every version of `name`, newest first.
	#[tracing::instrument(skip(self))]
	pub async fn find_all_versions(&self, name: &str) -> Result<Vec<CredentialVersion>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT v.id, v.credential_id, c.name, v.credential_type,
			       v.ciphertext, v.nonce, v.encrypted_key, v.key_nonce, v.created_at
			FROM credential_versions v
			JOIN credentials c ON c.id = v.credential_id
			WHERE c.name = ?
			ORDER BY v.created_at DESC, v.rowid DESC
			"#,
		)
		.bind(name)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_version_row).collect()
	}

	#[tracing::instrument(skip(self), fields(version_id = %id))]
	pub async fn find_version(
		&self,
		id: &CredentialVersionId,
	) -> Result<Option<CredentialVersion>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT v.id, v.credential_id, c.name, v.credential_type,
			       v.ciphertext, v.nonce, v.encrypted_key, v.key_nonce, v.created_at
			FROM credential_versions v
			JOIN credentials c ON c.id = v.credential_id
			WHERE v.id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_version_row).transpose()
	}

	/// Append a version to `name`, creating the credential if needed.
	///
	/// When `overwrite` is false and the credential already has a version,
	/// nothing is written and the current version is returned.
	///
	/// # Returns
	/// The resulting current version and whether a new version was written.
	#[tracing::instrument(skip(self, encrypted_value), fields(credential_type = %credential_type))]
	pub async fn set_version(
		&self,
		name: &str,
		credential_type: CredentialType,
		encrypted_value: EncryptedValue,
		overwrite: bool,
	) -> Result<(CredentialVersion, bool), DbError> {
		let _guard = self.write_lock.lock().await;
		let now = self.clock.now();
		let mut tx = self.pool.begin().await?;

		let credential = match select_credential(&mut tx, name).await? {
			Some(credential) => credential,
			None => {
				let credential = Credential {
					id: CredentialId::generate(),
					name: name.to_string(),
					created_at: now,
				};
				sqlx::query(
					r#"
					INSERT INTO credentials (id, name, created_at)
					VALUES (?, ?, ?)
					"#,
				)
				.bind(credential.id.to_string())
				.bind(&credential.name)
				.bind(format_timestamp(&credential.created_at))
				.execute(&mut *tx)
				.await
				.map_err(|e| DbError::from_insert(e, || format!("credential {name} already exists")))?;
				credential
			}
		};

		if !overwrite {
			if let Some(current) = select_most_recent(&mut tx, name).await? {
				tx.commit().await?;
				tracing::debug!(version_id = %current.id, "credential exists, not overwriting");
				return Ok((current, false));
			}
		}

		let version = CredentialVersion {
			id: CredentialVersionId::generate(),
			credential_id: credential.id,
			name: credential.name,
			credential_type,
			encrypted_value,
			created_at: now,
		};

		sqlx::query(
			r#"
			INSERT INTO credential_versions (
				id, credential_id, credential_type,
				ciphertext, nonce, encrypted_key, key_nonce, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(version.id.to_string())
		.bind(version.credential_id.to_string())
		.bind(version.credential_type.as_str())
		.bind(&version.encrypted_value.ciphertext)
		.bind(&version.encrypted_value.nonce)
		.bind(&version.encrypted_value.encrypted_key)
		.bind(&version.encrypted_value.key_nonce)
		.bind(format_timestamp(&version.created_at))
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		tracing::info!(version_id = %version.id, credential_id = %version.credential_id, "credential version created");
		Ok((version, true))
	}

	/// Delete `name`, all of its versions, and every permission entry whose
	/// path is exactly `name`. Wildcard entries are left alone.
	///
	/// # Returns
	/// `false` if no such credential existed.
	#[tracing::instrument(skip(self))]
	pub async fn delete_credential(&self, name: &str) -> Result<bool, DbError> {
		let _guard = self.write_lock.lock().await;
		let mut tx = self.pool.begin().await?;

		let Some(credential) = select_credential(&mut tx, name).await? else {
			return Ok(false);
		};

		sqlx::query("DELETE FROM credential_versions WHERE credential_id = ?")
			.bind(credential.id.to_string())
			.execute(&mut *tx)
			.await?;

		sqlx::query("DELETE FROM credentials WHERE id = ?")
			.bind(credential.id.to_string())
			.execute(&mut *tx)
			.await?;

		let permissions = sqlx::query("DELETE FROM permissions WHERE path = ?")
			.bind(name)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::info!(
			credential_id = %credential.id,
			permissions_removed = permissions.rows_affected(),
			"credential deleted"
		);
		Ok(true)
	}
}

async fn select_credential(
	conn: &mut SqliteConnection,
	name: &str,
) -> Result<Option<Credential>, DbError> {
	let row = sqlx::query(
		r#"
		SELECT id, name, created_at
		FROM credentials
		WHERE name = ?
		"#,
	)
	.bind(name)
	.fetch_optional(&mut *conn)
	.await?;

	let Some(row) = row else {
		return Ok(None);
	};

	let id_str: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(Some(Credential {
		id: CredentialId::parse(&id_str)
			.ok_or_else(|| DbError::Internal(format!("Invalid credential id UUID: {id_str}")))?,
		name: row.get("name"),
		created_at: parse_timestamp(&created_at, "created_at")?,
	}))
}

async fn select_most_recent(
	conn: &mut SqliteConnection,
	name: &str,
) -> Result<Option<CredentialVersion>, DbError> {
	let row = sqlx::query(
		r#"
		SELECT v.id, v.credential_id, c.name, v.credential_type,
		       v.ciphertext, v.nonce, v.encrypted_key, v.key_nonce, v.created_at
		FROM credential_versions v
		JOIN credentials c ON c.id = v.credential_id
		WHERE c.name = ?
		ORDER BY v.created_at DESC, v.rowid DESC
		LIMIT 1
		"#,
	)
	.bind(name)
	.fetch_optional(&mut *conn)
	.await?;

	row.as_ref().map(parse_version_row).transpose()
}

fn parse_version_row(row: &SqliteRow) -> Result<CredentialVersion, DbError> {
	let id_str: String = row.get("id");
	let credential_id_str: String = row.get("credential_id");
	let type_str: String = row.get("credential_type");
	let created_at: String = row.get("created_at");

	Ok(CredentialVersion {
		id: CredentialVersionId::parse(&id_str)
			.ok_or_else(|| DbError::Internal(format!("Invalid version id UUID: {id_str}")))?,
		credential_id: CredentialId::parse(&credential_id_str).ok_or_else(|| {
			DbError::Internal(format!("Invalid credential id UUID: {credential_id_str}"))
		})?,
		name: row.get("name"),
		credential_type: type_str
			.parse()
			.map_err(|e| DbError::Internal(format!("Invalid credential_type: {e}")))?,
		encrypted_value: EncryptedValue {
			ciphertext: row.get("ciphertext"),
			nonce: row.get("nonce"),
			encrypted_key: row.get("encrypted_key"),
			key_nonce: row.get("key_nonce"),
		},
		created_at: parse_timestamp(&created_at, "created_at")?,
	})
}
