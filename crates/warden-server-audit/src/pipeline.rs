// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::SendError};
use tracing::{instrument, warn};
use warden_server_config::{AuditConfig, QueueOverflowPolicy};

use crate::error::AuditError;
use crate::event::{AuditLogEntry, AuditSeverity};
use crate::filter::AuditFilterConfig;
use crate::recorder::AuditRecorder;
use crate::sink::AuditSink;

/// Queues audit entries and fans them out to sinks on a background task.
pub struct AuditService {
	tx: mpsc::Sender<AuditLogEntry>,
	overflow_policy: QueueOverflowPolicy,
}

impl AuditService {
	/// Must be called from within a tokio runtime.
	pub fn new(
		global_filter: AuditFilterConfig,
		queue_capacity: usize,
		overflow_policy: QueueOverflowPolicy,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity);

		tokio::spawn(Self::background_task(rx, global_filter, sinks));

		Self {
			tx,
			overflow_policy,
		}
	}

	pub fn from_config(
		config: &AuditConfig,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> Result<Self, AuditError> {
		let min_severity: AuditSeverity = config
			.min_severity
			.parse()
			.map_err(AuditError::ConfigError)?;

		let filter = AuditFilterConfig {
			min_severity,
			..Default::default()
		};

		Ok(Self::new(
			filter,
			config.queue_capacity,
			config.queue_overflow_policy,
			sinks,
		))
	}

	async fn background_task(
		mut rx: mpsc::Receiver<AuditLogEntry>,
		global_filter: AuditFilterConfig,
		sinks: Vec<Arc<dyn AuditSink>>,
	) {
		while let Some(entry) = rx.recv().await {
			if !global_filter.allows(&entry) {
				continue;
			}

			let event = Arc::new(entry);

			for sink in &sinks {
				if !sink.filter().allows(&event) {
					continue;
				}

				let sink = Arc::clone(sink);
				let event = Arc::clone(&event);

				tokio::spawn(async move {
					if let Err(e) = sink.publish(event).await {
						warn!(sink = sink.name(), error = %e, "audit sink publish failed");
					}
				});
			}
		}
	}

	/// Queue an entry for processing.
	///
	/// Returns `true` if the entry was queued, `false` if dropped.
	///
	/// - `Block`: spawns a task that waits for queue space.
	/// - `DropNewest`: `try_send`; the new entry is dropped when the queue is
	///   full.
	#[instrument(skip(self, entry), fields(event_type = %entry.event_type, outcome = %entry.outcome))]
	pub fn log(&self, entry: AuditLogEntry) -> bool {
		match self.overflow_policy {
			QueueOverflowPolicy::Block => {
				let tx = self.tx.clone();
				tokio::spawn(async move {
					let _ = tx.send(entry).await;
				});
				true
			}
			QueueOverflowPolicy::DropNewest => self.tx.try_send(entry).is_ok(),
		}
	}

	pub async fn log_blocking(&self, entry: AuditLogEntry) -> Result<(), SendError<AuditLogEntry>> {
		self.tx.send(entry).await
	}
}

impl AuditRecorder for AuditService {
	fn record(&self, entry: AuditLogEntry) {
		let event_type = entry.event_type;
		if !self.log(entry) {
			warn!(%event_type, "audit queue full, entry dropped");
		}
	}
}
