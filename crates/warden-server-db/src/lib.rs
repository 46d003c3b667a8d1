// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for Warden: credentials and their versions, permission
//! entries, and the audit log.
//!
//! Identifiers are stored as hyphenated UUID text and timestamps as RFC 3339
//! with microsecond precision, so lexical order on the text columns is
//! chronological order.

pub mod audit;
pub mod credential;
pub mod error;
pub mod migrations;
pub mod permission;
pub mod pool;
pub mod testing;

pub use audit::{AuditQuery, AuditRepository, AuditStore};
pub use credential::{CredentialRepository, CredentialStore};
pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use permission::{PermissionRepository, PermissionStore, PermissionUpdate};
pub use pool::create_pool;

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str, column: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}
