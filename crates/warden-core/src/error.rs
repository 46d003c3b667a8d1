// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::credential::CredentialType;

/// Errors raised while validating inbound permission or credential requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("unknown operation: {0}")]
	UnknownOperation(String),

	#[error("unknown credential type: {0}")]
	UnknownCredentialType(String),

	#[error("invalid path '{path}': {reason}")]
	InvalidPath { path: String, reason: &'static str },

	#[error("at least one operation is required")]
	EmptyOperations,

	#[error("at least one permission entry is required")]
	EmptyPermissions,

	#[error("a value is required")]
	MissingValue,

	#[error("a public key or private key is required")]
	MissingRsaSshParameters,

	#[error("a password is required")]
	MissingPassword,

	#[error("a ca, certificate or private key is required")]
	MissingCertificateCredentials,

	#[error("a json object is required")]
	InvalidJsonValue,

	#[error("malformed value for credential type {0}")]
	MalformedValue(CredentialType),
}

impl ValidationError {
	/// Stable error code returned to API clients.
	pub fn code(&self) -> &'static str {
		match self {
			ValidationError::UnknownOperation(_) => "error.permission.invalid_operation",
			ValidationError::UnknownCredentialType(_) => "error.invalid_type_with_set_prefix",
			ValidationError::InvalidPath { .. } => "error.invalid_name_has_slash",
			ValidationError::EmptyOperations => "error.permission.missing_operations",
			ValidationError::EmptyPermissions => "error.permission.missing_permissions",
			ValidationError::MissingValue => "error.missing_value",
			ValidationError::MissingRsaSshParameters => "error.missing_rsa_ssh_parameters",
			ValidationError::MissingPassword => "error.missing_password",
			ValidationError::MissingCertificateCredentials => {
				"error.missing_certificate_credentials"
			}
			ValidationError::InvalidJsonValue => "error.invalid_json_key",
			ValidationError::MalformedValue(_) => "error.bad_request",
		}
	}
}

pub type Result<T> = std::result::Result<T, ValidationError>;
