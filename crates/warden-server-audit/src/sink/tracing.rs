// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::{AuditLogEntry, AuditOutcome};
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

/// Emits audit entries as structured `tracing` events on the `audit` target.
pub struct TracingAuditSink {
	filter: AuditFilterConfig,
}

impl TracingAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self { filter }
	}
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, event: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		let actor = event.actor.as_ref().map(|a| a.as_str()).unwrap_or("-");
		let resource = event.resource_id.as_deref().unwrap_or("-");

		match event.outcome {
			AuditOutcome::Success => tracing::info!(
				target: "audit",
				event_id = %event.id,
				event_type = %event.event_type,
				outcome = %event.outcome,
				actor,
				resource,
				action = %event.action,
				"audit event"
			),
			AuditOutcome::Denied | AuditOutcome::Failed => tracing::warn!(
				target: "audit",
				event_id = %event.id,
				event_type = %event.event_type,
				outcome = %event.outcome,
				actor,
				resource,
				action = %event.action,
				"audit event"
			),
		}

		Ok(())
	}
}
