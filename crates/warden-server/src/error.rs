// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use warden_core::ValidationError;
use warden_server_acl::PermissionError;
use warden_server_audit::AuditError;
use warden_server_config::ConfigError;
use warden_server_credentials::CredentialError;
use warden_server_db::DbError;

/// Failures while wiring or bootstrapping the server.
#[derive(Debug, Error)]
pub enum ServerError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Database(#[from] DbError),

	#[error(transparent)]
	Audit(#[from] AuditError),

	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Permission(#[from] PermissionError),

	#[error("invalid bootstrap permission: {0}")]
	Bootstrap(#[from] ValidationError),

	#[error("failed to initialise logging: {0}")]
	Logging(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
