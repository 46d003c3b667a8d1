// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the Warden server: one place that turns a [`ServerConfig`] into
//! connected repositories, services and handlers.

pub mod bootstrap;
pub mod error;
pub mod logging;
pub mod version;

use std::sync::Arc;

use sqlx::SqlitePool;
use warden_core::{Clock, SystemClock};
use warden_server_acl::{PermissionCheckingService, PermissionService, PermissionsHandler};
use warden_server_audit::{
	AuditFilterConfig, AuditRecorder, AuditService, AuditSink, NoopAuditRecorder,
	SqliteAuditSink, TracingAuditSink,
};
use warden_server_credentials::{EnvelopeEncryptor, PermissionedCredentialService};
use warden_server_db::{
	create_pool, run_migrations, AuditRepository, CredentialRepository, CredentialStore,
	PermissionRepository, PermissionStore,
};

pub use bootstrap::apply_bootstrap_permissions;
pub use error::{Result, ServerError};
pub use logging::init_logging;
pub use warden_server_config::ServerConfig;

/// A connected server instance.
#[derive(Clone)]
pub struct Warden {
	pool: SqlitePool,
	config: ServerConfig,
	clock: Arc<dyn Clock>,
	permissions: PermissionRepository,
	credentials: CredentialRepository,
	audit: Arc<dyn AuditRecorder>,
	checking: PermissionCheckingService,
	handler: PermissionsHandler,
}

impl Warden {
	/// Open the database, apply migrations and start the audit pipeline.
	///
	/// Must be called from within a tokio runtime.
	#[tracing::instrument(skip(config), fields(database = %config.database.url))]
	pub async fn connect(config: &ServerConfig) -> Result<Self> {
		let pool = create_pool(&config.database.url, config.database.max_connections).await?;
		run_migrations(&pool).await?;

		let audit = audit_recorder(config, &pool)?;
		Ok(Self::from_parts(
			config.clone(),
			pool,
			Arc::new(SystemClock),
			audit,
		))
	}

	/// Wire services over an already migrated pool.
	pub fn from_parts(
		config: ServerConfig,
		pool: SqlitePool,
		clock: Arc<dyn Clock>,
		audit: Arc<dyn AuditRecorder>,
	) -> Self {
		let permissions = PermissionRepository::with_clock(pool.clone(), clock.clone());
		let credentials = CredentialRepository::with_clock(pool.clone(), clock.clone());

		let permission_store: Arc<dyn PermissionStore> = Arc::new(permissions.clone());
		let credential_store: Arc<dyn CredentialStore> = Arc::new(credentials.clone());

		let checking = PermissionCheckingService::new(
			permission_store.clone(),
			config.authorization.acls_enabled,
		);
		let handler = PermissionsHandler::new(
			checking.clone(),
			PermissionService::new(permission_store),
			credential_store,
			audit.clone(),
		);

		Self {
			pool,
			config,
			clock,
			permissions,
			credentials,
			audit,
			checking,
			handler,
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	pub fn checking(&self) -> &PermissionCheckingService {
		&self.checking
	}

	pub fn permissions(&self) -> &PermissionsHandler {
		&self.handler
	}

	pub fn audit_logs(&self) -> AuditRepository {
		AuditRepository::new(self.pool.clone())
	}

	/// Build the credential data plane. Fails when no master key is
	/// configured.
	pub fn credentials(&self) -> Result<PermissionedCredentialService> {
		let encryptor = EnvelopeEncryptor::from_config(&self.config.encryption)?;
		Ok(PermissionedCredentialService::new(
			Arc::new(self.credentials.clone()),
			self.checking.clone(),
			Arc::new(encryptor),
			self.audit.clone(),
		))
	}

	/// Apply `authorization.permissions` from the configuration.
	pub async fn bootstrap(&self) -> Result<usize> {
		apply_bootstrap_permissions(&self.permissions, &self.config.authorization.permissions).await
	}
}

fn audit_recorder(config: &ServerConfig, pool: &SqlitePool) -> Result<Arc<dyn AuditRecorder>> {
	if !config.audit.enabled {
		tracing::info!("audit logging disabled");
		return Ok(Arc::new(NoopAuditRecorder));
	}

	let sinks: Vec<Arc<dyn AuditSink>> = vec![
		Arc::new(SqliteAuditSink::new(
			pool.clone(),
			AuditFilterConfig::allow_all(),
		)),
		Arc::new(TracingAuditSink::new(AuditFilterConfig::default())),
	];
	Ok(Arc::new(AuditService::from_config(&config.audit, sinks)?))
}
