// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embedded schema migrations.

use chrono::Utc;
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_credentials",
		include_str!("../migrations/001_credentials.sql"),
	),
	(
		"002_permissions",
		include_str!("../migrations/002_permissions.sql"),
	),
	(
		"003_audit_logs",
		include_str!("../migrations/003_audit_logs.sql"),
	),
];

/// Apply every migration not yet recorded in `schema_migrations`, in order.
/// Each migration runs in its own transaction.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS schema_migrations (
			version TEXT PRIMARY KEY,
			applied_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await?;

	for (version, sql) in MIGRATIONS {
		let applied: Option<(String,)> =
			sqlx::query_as("SELECT version FROM schema_migrations WHERE version = ?")
				.bind(version)
				.fetch_optional(pool)
				.await?;

		if applied.is_some() {
			continue;
		}

		let mut tx = pool.begin().await?;

		sqlx::raw_sql(sql).execute(&mut *tx).await?;

		sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
			.bind(version)
			.bind(Utc::now().to_rfc3339())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::info!(version, "applied migration");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn test_migrations_are_idempotent() {
		let pool = create_test_pool().await;
		run_migrations(&pool).await.unwrap();

		let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(count.0, MIGRATIONS.len() as i64);
	}

	#[tokio::test]
	async fn test_permission_uniqueness_constraint() {
		let pool = create_test_pool().await;
		let insert = r#"
			INSERT INTO permissions (id, actor, path, operations, created_at, updated_at)
			VALUES (?, 'a', '/p', '["read"]', 'now', 'now')
		"#;

		sqlx::query(insert).bind("1").execute(&pool).await.unwrap();
		let err = sqlx::query(insert).bind("2").execute(&pool).await.unwrap_err();

		match err {
			sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
			other => panic!("expected unique violation, got {other:?}"),
		}
	}
}
