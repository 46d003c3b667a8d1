// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The interface decision-making code uses to emit audit records.

use std::sync::Mutex;

use crate::event::{AuditEventType, AuditLogEntry};

/// Accepts the outcome of every authorization decision, including denials.
///
/// Recording is fire-and-forget: it never fails or blocks the request that
/// produced the entry.
pub trait AuditRecorder: Send + Sync {
	fn record(&self, entry: AuditLogEntry);
}

/// Discards every entry. Used when auditing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditRecorder;

impl AuditRecorder for NoopAuditRecorder {
	fn record(&self, _entry: AuditLogEntry) {}
}

/// Keeps entries in memory, in the order they were recorded.
#[derive(Debug, Default)]
pub struct MemoryAuditRecorder {
	entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryAuditRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn entries(&self) -> Vec<AuditLogEntry> {
		self.entries
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	pub fn entries_of(&self, event_type: AuditEventType) -> Vec<AuditLogEntry> {
		self.entries()
			.into_iter()
			.filter(|e| e.event_type == event_type)
			.collect()
	}

	pub fn clear(&self) {
		self.entries
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clear();
	}
}

impl AuditRecorder for MemoryAuditRecorder {
	fn record(&self, entry: AuditLogEntry) {
		self.entries
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(entry);
	}
}
