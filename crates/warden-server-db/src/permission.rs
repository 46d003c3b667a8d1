// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission entry repository.
//!
//! Entries map `(actor, path)` to a set of operations. The `(actor, path)`
//! pair is unique: saves check for an existing entry inside the same
//! transaction as the insert, and a unique-constraint violation that slips
//! through is still reported as [`DbError::Conflict`].

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;
use warden_core::{
	Actor, Clock, PermissionData, PermissionGrant, PermissionId, PermissionOperation, SaveMode,
	SystemClock,
};

use crate::error::DbError;
use crate::{format_timestamp, parse_timestamp};

/// Result of a conditional update by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionUpdate {
	Updated(PermissionData),
	/// No entry has this identifier.
	Missing,
	/// The entry exists but its actor or path differs from what the caller
	/// supplied. Carries the stored entry.
	IdentityMismatch(PermissionData),
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
	async fn find_by_id(&self, id: &PermissionId) -> Result<Option<PermissionData>, DbError>;
	async fn find_by_actor(&self, actor: &Actor) -> Result<Vec<PermissionData>, DbError>;
	async fn find_by_path(&self, path: &str) -> Result<Vec<PermissionData>, DbError>;
	async fn find_by_actor_and_path(
		&self,
		actor: &Actor,
		path: &str,
	) -> Result<Option<PermissionData>, DbError>;
	async fn save(
		&self,
		grants: &[PermissionGrant],
		mode: SaveMode,
	) -> Result<Vec<PermissionData>, DbError>;
	async fn update_operations(
		&self,
		id: &PermissionId,
		expected_actor: Option<&Actor>,
		expected_path: Option<&str>,
		operations: &[PermissionOperation],
	) -> Result<PermissionUpdate, DbError>;
	async fn delete_by_id(&self, id: &PermissionId) -> Result<Option<PermissionData>, DbError>;
	async fn delete_by_actor_and_path(
		&self,
		actor: &Actor,
		path: &str,
	) -> Result<Option<PermissionData>, DbError>;
}

#[async_trait]
impl PermissionStore for PermissionRepository {
	async fn find_by_id(&self, id: &PermissionId) -> Result<Option<PermissionData>, DbError> {
		self.find_by_id(id).await
	}

	async fn find_by_actor(&self, actor: &Actor) -> Result<Vec<PermissionData>, DbError> {
		self.find_by_actor(actor).await
	}

	async fn find_by_path(&self, path: &str) -> Result<Vec<PermissionData>, DbError> {
		self.find_by_path(path).await
	}

	async fn find_by_actor_and_path(
		&self,
		actor: &Actor,
		path: &str,
	) -> Result<Option<PermissionData>, DbError> {
		self.find_by_actor_and_path(actor, path).await
	}

	async fn save(
		&self,
		grants: &[PermissionGrant],
		mode: SaveMode,
	) -> Result<Vec<PermissionData>, DbError> {
		self.save(grants, mode).await
	}

	async fn update_operations(
		&self,
		id: &PermissionId,
		expected_actor: Option<&Actor>,
		expected_path: Option<&str>,
		operations: &[PermissionOperation],
	) -> Result<PermissionUpdate, DbError> {
		self
			.update_operations(id, expected_actor, expected_path, operations)
			.await
	}

	async fn delete_by_id(&self, id: &PermissionId) -> Result<Option<PermissionData>, DbError> {
		self.delete_by_id(id).await
	}

	async fn delete_by_actor_and_path(
		&self,
		actor: &Actor,
		path: &str,
	) -> Result<Option<PermissionData>, DbError> {
		self.delete_by_actor_and_path(actor, path).await
	}
}

/// Repository for permission entries.
///
/// Saves are serialized through a write gate so that the existence check and
/// the insert observe the same state.
#[derive(Clone)]
pub struct PermissionRepository {
	pool: SqlitePool,
	clock: Arc<dyn Clock>,
	write_lock: Arc<Mutex<()>>,
}

impl PermissionRepository {
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

	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn find_by_id(&self, id: &PermissionId) -> Result<Option<PermissionData>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, actor, path, operations, created_at, updated_at
			FROM permissions
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_permission_row).transpose()
	}

	/// Every entry granted to `actor`, regardless of path.
	#[tracing::instrument(skip(self), fields(actor = %actor))]
	pub async fn find_by_actor(&self, actor: &Actor) -> Result<Vec<PermissionData>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, actor, path, operations, created_at, updated_at
			FROM permissions
			WHERE actor = ?
			ORDER BY rowid
			"#,
		)
		.bind(actor.as_str())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_permission_row).collect()
	}

	/// Entries whose path is literally `path`, in creation order. No wildcard
	/// expansion.
	#[tracing::instrument(skip(self))]
	pub async fn find_by_path(&self, path: &str) -> Result<Vec<PermissionData>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, actor, path, operations, created_at, updated_at
			FROM permissions
			WHERE path = ?
			ORDER BY rowid
			"#,
		)
		.bind(path)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_permission_row).collect()
	}

	#[tracing::instrument(skip(self), fields(actor = %actor))]
	pub async fn find_by_actor_and_path(
		&self,
		actor: &Actor,
		path: &str,
	) -> Result<Option<PermissionData>, DbError> {
		let mut conn = self.pool.acquire().await?;
		select_by_actor_and_path(&mut conn, actor, path).await
	}

	/// Persist `grants` in one transaction.
	///
	/// With [`SaveMode::CreateOnly`] an existing `(actor, path)` entry fails the
	/// whole save with `Conflict`. With [`SaveMode::Merge`] the requested
	/// operations are added to the existing entry.
	///
	/// # Returns
	/// One stored entry per grant, in request order.
	#[tracing::instrument(skip(self, grants), fields(grants = grants.len(), mode = ?mode))]
	pub async fn save(
		&self,
		grants: &[PermissionGrant],
		mode: SaveMode,
	) -> Result<Vec<PermissionData>, DbError> {
		let _guard = self.write_lock.lock().await;
		let now = self.clock.now();
		let mut tx = self.pool.begin().await?;
		let mut saved = Vec::with_capacity(grants.len());

		for grant in grants {
			let existing = select_by_actor_and_path(&mut tx, &grant.actor, &grant.path).await?;

			let entry = match (existing, mode) {
				(None, _) => {
					let entry = PermissionData {
						id: PermissionId::generate(),
						actor: grant.actor.clone(),
						path: grant.path.clone(),
						operations: grant.operations.clone(),
						created_at: now,
						updated_at: now,
					};
					insert_permission(&mut tx, &entry).await?;
					entry
				}
				(Some(existing), SaveMode::CreateOnly) => {
					let overlapping = grant
						.operations
						.iter()
						.any(|op| existing.has_operation(*op));
					return Err(DbError::Conflict(if overlapping {
						format!(
							"actor {} is already granted requested operations on {}",
							grant.actor, grant.path
						)
					} else {
						format!(
							"a permission for actor {} on {} already exists",
							grant.actor, grant.path
						)
					}));
				}
				(Some(mut existing), SaveMode::Merge) => {
					let before = existing.operations.len();
					for op in &grant.operations {
						if !existing.has_operation(*op) {
							existing.operations.push(*op);
						}
					}
					if existing.operations.len() != before {
						existing.updated_at = now;
						sqlx::query(
							r#"
							UPDATE permissions
							SET operations = ?, updated_at = ?
							WHERE id = ?
							"#,
						)
						.bind(serde_json::to_string(&existing.operations)?)
						.bind(format_timestamp(&now))
						.bind(existing.id.to_string())
						.execute(&mut *tx)
						.await?;
					}
					existing
				}
			};

			saved.push(entry);
		}

		tx.commit().await?;

		tracing::info!(count = saved.len(), "permissions saved");
		Ok(saved)
	}

	/// Replace the operations of entry `id`.
	///
	/// The update only applies when the stored actor/path equal the expected
	/// values (when given); the check and the write are one statement.
	#[tracing::instrument(skip(self, expected_actor, expected_path, operations), fields(permission_id = %id))]
	pub async fn update_operations(
		&self,
		id: &PermissionId,
		expected_actor: Option<&Actor>,
		expected_path: Option<&str>,
		operations: &[PermissionOperation],
	) -> Result<PermissionUpdate, DbError> {
		let now = self.clock.now();

		let row = sqlx::query(
			r#"
			UPDATE permissions
			SET operations = ?1, updated_at = ?2
			WHERE id = ?3
			  AND actor = COALESCE(?4, actor)
			  AND path = COALESCE(?5, path)
			RETURNING id, actor, path, operations, created_at, updated_at
			"#,
		)
		.bind(serde_json::to_string(operations)?)
		.bind(format_timestamp(&now))
		.bind(id.to_string())
		.bind(expected_actor.map(|a| a.as_str().to_string()))
		.bind(expected_path)
		.fetch_optional(&self.pool)
		.await?;

		if let Some(row) = row {
			let updated = parse_permission_row(&row)?;
			tracing::info!(permission_id = %id, "permission updated");
			return Ok(PermissionUpdate::Updated(updated));
		}

		Ok(match self.find_by_id(id).await? {
			Some(stored) => PermissionUpdate::IdentityMismatch(stored),
			None => PermissionUpdate::Missing,
		})
	}

	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn delete_by_id(&self, id: &PermissionId) -> Result<Option<PermissionData>, DbError> {
		let row = sqlx::query(
			r#"
			DELETE FROM permissions
			WHERE id = ?
			RETURNING id, actor, path, operations, created_at, updated_at
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		let deleted = row.as_ref().map(parse_permission_row).transpose()?;
		if deleted.is_some() {
			tracing::info!(permission_id = %id, "permission deleted");
		}
		Ok(deleted)
	}

	#[tracing::instrument(skip(self), fields(actor = %actor))]
	pub async fn delete_by_actor_and_path(
		&self,
		actor: &Actor,
		path: &str,
	) -> Result<Option<PermissionData>, DbError> {
		let row = sqlx::query(
			r#"
			DELETE FROM permissions
			WHERE actor = ? AND path = ?
			RETURNING id, actor, path, operations, created_at, updated_at
			"#,
		)
		.bind(actor.as_str())
		.bind(path)
		.fetch_optional(&self.pool)
		.await?;

		let deleted = row.as_ref().map(parse_permission_row).transpose()?;
		if let Some(entry) = &deleted {
			tracing::info!(permission_id = %entry.id, actor = %actor, path, "permission deleted");
		}
		Ok(deleted)
	}
}

async fn select_by_actor_and_path(
	conn: &mut SqliteConnection,
	actor: &Actor,
	path: &str,
) -> Result<Option<PermissionData>, DbError> {
	let row = sqlx::query(
		r#"
		SELECT id, actor, path, operations, created_at, updated_at
		FROM permissions
		WHERE actor = ? AND path = ?
		"#,
	)
	.bind(actor.as_str())
	.bind(path)
	.fetch_optional(&mut *conn)
	.await?;

	row.as_ref().map(parse_permission_row).transpose()
}

async fn insert_permission(conn: &mut SqliteConnection, entry: &PermissionData) -> Result<(), DbError> {
	sqlx::query(
		r#"
		INSERT INTO permissions (id, actor, path, operations, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(entry.id.to_string())
	.bind(entry.actor.as_str())
	.bind(&entry.path)
	.bind(serde_json::to_string(&entry.operations)?)
	.bind(format_timestamp(&entry.created_at))
	.bind(format_timestamp(&entry.updated_at))
	.execute(&mut *conn)
	.await
	.map_err(|e| {
		DbError::from_insert(e, || {
			format!(
				"a permission for actor {} on {} already exists",
				entry.actor, entry.path
			)
		})
	})?;

	Ok(())
}

fn parse_permission_row(row: &SqliteRow) -> Result<PermissionData, DbError> {
	let id_str: String = row.get("id");
	let actor: String = row.get("actor");
	let path: String = row.get("path");
	let operations_json: String = row.get("operations");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	let id = PermissionId::parse(&id_str)
		.ok_or_else(|| DbError::Internal(format!("Invalid permission id UUID: {id_str}")))?;
	let operations: Vec<PermissionOperation> = serde_json::from_str(&operations_json)?;

	Ok(PermissionData {
		id,
		actor: Actor::new(actor),
		path,
		operations,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
