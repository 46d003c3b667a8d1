// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;
use warden_core::Actor;
use warden_server_audit::{AuditEventType, AuditLogEntry, AuditOutcome, AuditSeverity};

use crate::error::Result;
use crate::format_timestamp;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

/// Filters for [`AuditRepository::query_logs`]. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
	pub event_type: Option<AuditEventType>,
	pub actor: Option<Actor>,
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,
	pub from: Option<DateTime<Utc>>,
	pub to: Option<DateTime<Utc>>,
	pub limit: Option<i64>,
	pub offset: Option<i64>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
	async fn query_logs(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64)>;
	async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone)]
pub struct AuditRepository {
	pool: SqlitePool,
}

impl AuditRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Matching entries newest first, plus the total match count ignoring
	/// `limit`/`offset`.
	#[tracing::instrument(skip(self))]
	pub async fn query_logs(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64)> {
		let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
		let offset = query.offset.unwrap_or(0).max(0);

		let mut conditions = vec!["1=1"];
		let mut binds: Vec<String> = Vec::new();
		if let Some(v) = query.event_type {
			conditions.push("event_type = ?");
			binds.push(v.to_string());
		}
		if let Some(v) = &query.actor {
			conditions.push("actor = ?");
			binds.push(v.to_string());
		}
		if let Some(v) = &query.resource_type {
			conditions.push("resource_type = ?");
			binds.push(v.clone());
		}
		if let Some(v) = &query.resource_id {
			conditions.push("resource_id = ?");
			binds.push(v.clone());
		}
		if let Some(v) = query.from {
			conditions.push("timestamp >= ?");
			binds.push(format_timestamp(&v));
		}
		if let Some(v) = query.to {
			conditions.push("timestamp <= ?");
			binds.push(format_timestamp(&v));
		}

		let where_clause = conditions.join(" AND ");

		let count_sql = format!("SELECT COUNT(*) as cnt FROM audit_logs WHERE {where_clause}");
		let mut count_query = sqlx::query(&count_sql);
		for v in &binds {
			count_query = count_query.bind(v);
		}
		let total: i64 = count_query.fetch_one(&self.pool).await?.get("cnt");

		let data_sql = format!(
			"SELECT id, timestamp, event_type, outcome, severity, actor, \
			 resource_type, resource_id, action, details \
			 FROM audit_logs WHERE {where_clause} ORDER BY timestamp DESC, rowid DESC LIMIT ? OFFSET ?"
		);
		let mut data_query = sqlx::query(&data_sql);
		for v in &binds {
			data_query = data_query.bind(v);
		}
		data_query = data_query.bind(limit).bind(offset);

		let rows = data_query.fetch_all(&self.pool).await?;
		let logs: Vec<AuditLogEntry> = rows
			.into_iter()
			.filter_map(|row| {
				let id_str: String = row.get("id");
				let id = Uuid::parse_str(&id_str).ok()?;

				let ts_str: String = row.get("timestamp");
				let timestamp = DateTime::parse_from_rfc3339(&ts_str)
					.ok()?
					.with_timezone(&Utc);

				let event_type: AuditEventType = row.get::<String, _>("event_type").parse().ok()?;
				let outcome: AuditOutcome = row.get::<String, _>("outcome").parse().ok()?;
				let severity: AuditSeverity = row
					.get::<String, _>("severity")
					.parse()
					.unwrap_or_default();
				let actor: Option<String> = row.get("actor");
				let details_str: String = row.get("details");

				Some(AuditLogEntry {
					id,
					timestamp,
					event_type,
					outcome,
					severity,
					actor: actor.map(Actor::new),
					resource_type: row.get("resource_type"),
					resource_id: row.get("resource_id"),
					action: row.get("action"),
					details: serde_json::from_str(&details_str).unwrap_or(serde_json::Value::Null),
				})
			})
			.collect();

		Ok((logs, total))
	}

	/// Remove entries recorded strictly before `cutoff`.
	#[tracing::instrument(skip(self))]
	pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM audit_logs WHERE timestamp < ?")
			.bind(format_timestamp(&cutoff))
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected();
		tracing::info!(deleted, cutoff = %cutoff, "purged audit log entries");
		Ok(deleted)
	}
}

#[async_trait]
impl AuditStore for AuditRepository {
	async fn query_logs(&self, query: &AuditQuery) -> Result<(Vec<AuditLogEntry>, i64)> {
		self.query_logs(query).await
	}

	async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		self.delete_before(cutoff).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use chrono::Duration;
	use std::sync::Arc;
	use warden_core::PermissionOperation;
	use warden_server_audit::{AuditFilterConfig, AuditSink, SqliteAuditSink};

	async fn publish(sink: &SqliteAuditSink, entry: AuditLogEntry) {
		sink.publish(Arc::new(entry)).await.unwrap();
	}

	#[tokio::test]
	async fn test_sink_entries_are_queryable() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), AuditFilterConfig::allow_all());
		let repo = AuditRepository::new(pool);
		let alice = Actor::new("uaa-user:alice");

		publish(
			&sink,
			AuditLogEntry::builder(AuditEventType::AclUpdate)
				.actor(&alice)
				.credential("/team/db")
				.operation(PermissionOperation::WriteAcl)
				.build(),
		)
		.await;
		publish(
			&sink,
			AuditLogEntry::builder(AuditEventType::CredentialAccess)
				.outcome(AuditOutcome::Denied)
				.actor(&Actor::new("uaa-user:bob"))
				.credential("/team/db")
				.build(),
		)
		.await;

		let (all, total) = repo.query_logs(&AuditQuery::default()).await.unwrap();
		assert_eq!(total, 2);
		assert_eq!(all.len(), 2);

		let (alice_logs, total) = repo
			.query_logs(&AuditQuery {
				actor: Some(alice.clone()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 1);
		assert_eq!(alice_logs[0].event_type, AuditEventType::AclUpdate);
		assert_eq!(alice_logs[0].action, "write_acl");
		assert_eq!(alice_logs[0].actor, Some(alice));

		let (denied, _) = repo
			.query_logs(&AuditQuery {
				event_type: Some(AuditEventType::CredentialAccess),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(denied[0].outcome, AuditOutcome::Denied);
		assert_eq!(denied[0].severity, AuditSeverity::Warning);
	}

	#[tokio::test]
	async fn test_pagination_reports_total() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), AuditFilterConfig::allow_all());
		let repo = AuditRepository::new(pool);

		for _ in 0..5 {
			publish(&sink, AuditLogEntry::builder(AuditEventType::AclAccess).build()).await;
		}

		let (page, total) = repo
			.query_logs(&AuditQuery {
				limit: Some(2),
				offset: Some(4),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(total, 5);
		assert_eq!(page.len(), 1);
	}

	#[tokio::test]
	async fn test_delete_before_cutoff() {
		let pool = create_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone(), AuditFilterConfig::allow_all());
		let repo = AuditRepository::new(pool);
		let now = Utc::now();

		publish(
			&sink,
			AuditLogEntry::builder(AuditEventType::AuthFailure)
				.timestamp(now - Duration::days(100))
				.build(),
		)
		.await;
		publish(
			&sink,
			AuditLogEntry::builder(AuditEventType::AclAccess)
				.timestamp(now - Duration::days(1))
				.build(),
		)
		.await;

		let deleted = repo.delete_before(now - Duration::days(90)).await.unwrap();
		assert_eq!(deleted, 1);

		let (remaining, total) = repo.query_logs(&AuditQuery::default()).await.unwrap();
		assert_eq!(total, 1);
		assert_eq!(remaining[0].event_type, AuditEventType::AclAccess);
	}
}
