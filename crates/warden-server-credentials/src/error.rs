// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use warden_core::ValidationError;
use warden_server_acl::{ErrorKind, PermissionError};
use warden_server_db::DbError;

#[derive(Debug, Error)]
pub enum CredentialError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Missing credential and missing authorization look the same.
	#[error(
		"The request could not be completed because the credential does not exist or you do not have sufficient authorization."
	)]
	Forbidden,

	#[error("encryption failed: {0}")]
	Encryption(String),

	#[error("decryption failed: {0}")]
	Decryption(String),

	#[error("invalid key size: expected {expected}, got {actual}")]
	InvalidKeySize { expected: usize, actual: usize },

	#[error("no master key configured")]
	MissingMasterKey,

	#[error("configuration error: {0}")]
	Config(#[from] warden_server_config::ConfigError),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Permission(#[from] PermissionError),

	#[error("database error: {0}")]
	Database(#[from] DbError),
}

impl CredentialError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			CredentialError::Validation(_) => ErrorKind::BadRequest,
			CredentialError::Forbidden => ErrorKind::Forbidden,
			CredentialError::Permission(e) => e.kind(),
			_ => ErrorKind::Internal,
		}
	}
}

pub type CredentialResult<T> = std::result::Result<T, CredentialError>;
