// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit events recorded for every permission and credential decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use warden_core::{Actor, PermissionOperation};

pub const DEFAULT_AUDIT_RETENTION_DAYS: i64 = 90;

/// Types of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Credential data plane
	CredentialAccess,
	CredentialUpdate,
	CredentialDelete,

	// Access control management
	AclAccess,
	AclUpdate,
	AclDelete,

	/// Written by the authentication layer; only purged here.
	AuthFailure,
}

impl AuditEventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventType::CredentialAccess => "credential_access",
			AuditEventType::CredentialUpdate => "credential_update",
			AuditEventType::CredentialDelete => "credential_delete",
			AuditEventType::AclAccess => "acl_access",
			AuditEventType::AclUpdate => "acl_update",
			AuditEventType::AclDelete => "acl_delete",
			AuditEventType::AuthFailure => "auth_failure",
		}
	}
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditEventType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"credential_access" => Ok(AuditEventType::CredentialAccess),
			"credential_update" => Ok(AuditEventType::CredentialUpdate),
			"credential_delete" => Ok(AuditEventType::CredentialDelete),
			"acl_access" => Ok(AuditEventType::AclAccess),
			"acl_update" => Ok(AuditEventType::AclUpdate),
			"acl_delete" => Ok(AuditEventType::AclDelete),
			"auth_failure" => Ok(AuditEventType::AuthFailure),
			other => Err(format!("unknown audit event type '{other}'")),
		}
	}
}

/// What came of the audited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
	Success,
	/// Refused by an authorization check.
	Denied,
	/// Authorized, but the operation itself failed.
	Failed,
}

impl AuditOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditOutcome::Success => "success",
			AuditOutcome::Denied => "denied",
			AuditOutcome::Failed => "failed",
		}
	}

	fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditOutcome::Success => AuditSeverity::Info,
			AuditOutcome::Denied => AuditSeverity::Warning,
			AuditOutcome::Failed => AuditSeverity::Error,
		}
	}
}

impl fmt::Display for AuditOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditOutcome {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"success" => Ok(AuditOutcome::Success),
			"denied" => Ok(AuditOutcome::Denied),
			"failed" => Ok(AuditOutcome::Failed),
			other => Err(format!("unknown audit outcome '{other}'")),
		}
	}
}

/// Syslog-style severity; lower discriminant is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		}
	}

	/// Whether this severity is at least as severe as `min`.
	pub fn at_least(&self, min: AuditSeverity) -> bool {
		(*self as u8) <= (min as u8)
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"debug" => Ok(AuditSeverity::Debug),
			"info" => Ok(AuditSeverity::Info),
			"notice" => Ok(AuditSeverity::Notice),
			"warning" | "warn" => Ok(AuditSeverity::Warning),
			"error" => Ok(AuditSeverity::Error),
			"critical" => Ok(AuditSeverity::Critical),
			other => Err(format!("unknown audit severity '{other}'")),
		}
	}
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub outcome: AuditOutcome,
	pub severity: AuditSeverity,
	/// The caller whose request was decided, if known.
	pub actor: Option<Actor>,
	/// `credential` or `permission`.
	pub resource_type: Option<String>,
	/// Credential path or permission UUID.
	pub resource_id: Option<String>,
	pub action: String,
	pub details: serde_json::Value,
}

impl AuditLogEntry {
	pub fn builder(event_type: AuditEventType) -> AuditLogBuilder {
		AuditLogBuilder::new(event_type)
	}
}

/// Builder for constructing audit log entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
	event_type: AuditEventType,
	outcome: AuditOutcome,
	severity: Option<AuditSeverity>,
	timestamp: Option<DateTime<Utc>>,
	actor: Option<Actor>,
	resource_type: Option<String>,
	resource_id: Option<String>,
	action: Option<String>,
	details: serde_json::Value,
}

impl AuditLogBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			outcome: AuditOutcome::Success,
			severity: None,
			timestamp: None,
			actor: None,
			resource_type: None,
			resource_id: None,
			action: None,
			details: serde_json::Value::Null,
		}
	}

	pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
		self.outcome = outcome;
		self
	}

	/// Defaults to the outcome's severity.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}

	pub fn actor(mut self, actor: &Actor) -> Self {
		self.actor = Some(actor.clone());
		self
	}

	pub fn resource(
		mut self,
		resource_type: impl Into<String>,
		resource_id: impl Into<String>,
	) -> Self {
		self.resource_type = Some(resource_type.into());
		self.resource_id = Some(resource_id.into());
		self
	}

	/// Shorthand for a credential-path resource.
	pub fn credential(self, path: &str) -> Self {
		self.resource("credential", path)
	}

	pub fn action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self
	}

	/// Records the operation that was checked as the action.
	pub fn operation(self, operation: PermissionOperation) -> Self {
		self.action(operation.as_str())
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn build(self) -> AuditLogEntry {
		AuditLogEntry {
			id: Uuid::new_v4(),
			timestamp: self.timestamp.unwrap_or_else(Utc::now),
			event_type: self.event_type,
			outcome: self.outcome,
			severity: self
				.severity
				.unwrap_or_else(|| self.outcome.default_severity()),
			actor: self.actor,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			action: self.action.unwrap_or_else(|| self.event_type.to_string()),
			details: self.details,
		}
	}
}
