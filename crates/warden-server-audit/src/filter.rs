// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::event::{AuditEventType, AuditLogEntry, AuditSeverity};

#[derive(Debug, Clone, Default)]
pub struct AuditFilterConfig {
	pub min_severity: AuditSeverity,
	pub include_events: Option<Vec<AuditEventType>>,
	pub exclude_events: Option<Vec<AuditEventType>>,
}

impl AuditFilterConfig {
	/// Accepts everything regardless of severity.
	pub fn allow_all() -> Self {
		Self {
			min_severity: AuditSeverity::Debug,
			include_events: None,
			exclude_events: None,
		}
	}

	pub fn allows(&self, entry: &AuditLogEntry) -> bool {
		if !entry.severity.at_least(self.min_severity) {
			return false;
		}

		if let Some(include) = &self.include_events {
			if !include.contains(&entry.event_type) {
				return false;
			}
		}

		if let Some(exclude) = &self.exclude_events {
			if exclude.contains(&entry.event_type) {
				return false;
			}
		}

		true
	}
}
