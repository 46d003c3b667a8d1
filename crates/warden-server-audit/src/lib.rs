// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit logging for permission and credential decisions.
//!
//! Decision code depends only on [`AuditRecorder`]. The server wires in an
//! [`AuditService`], which queues entries and publishes them to sinks
//! (SQLite, `tracing`) on a background task.

pub mod error;
pub mod event;
pub mod filter;
pub mod pipeline;
pub mod recorder;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{
	AuditEventType, AuditLogBuilder, AuditLogEntry, AuditOutcome, AuditSeverity,
	DEFAULT_AUDIT_RETENTION_DAYS,
};
pub use filter::AuditFilterConfig;
pub use pipeline::AuditService;
pub use recorder::{AuditRecorder, MemoryAuditRecorder, NoopAuditRecorder};
pub use sink::AuditSink;

pub use warden_server_config::{AuditConfig, QueueOverflowPolicy};

#[cfg(feature = "sink-sqlite")]
pub use sink::sqlite::SqliteAuditSink;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingAuditSink;
