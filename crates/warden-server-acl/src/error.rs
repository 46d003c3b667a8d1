// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use warden_core::ValidationError;
use warden_server_db::DbError;

/// Coarse classification transports map to a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	NotFound,
	Conflict,
	BadRequest,
	Forbidden,
	Internal,
}

impl ErrorKind {
	pub fn status_code(&self) -> u16 {
		match self {
			ErrorKind::NotFound => 404,
			ErrorKind::Conflict => 409,
			ErrorKind::BadRequest => 400,
			ErrorKind::Forbidden => 403,
			ErrorKind::Internal => 500,
		}
	}
}

#[derive(Debug, Error)]
pub enum PermissionError {
	#[error("The request includes a permission that does not exist.")]
	NotFound,

	/// Legacy delete found nothing to remove. Worded like [`Self::Forbidden`].
	#[error(
		"The request could not be completed because the credential does not exist or you do not have sufficient authorization."
	)]
	EntryNotFound,

	#[error("{0}")]
	Conflict(String),

	#[error("The permission guid does not match the provided actor and path.")]
	IdentityMismatch,

	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// ACL denial. Says nothing about whether the credential exists.
	#[error(
		"The request could not be completed because the credential does not exist or you do not have sufficient authorization."
	)]
	Forbidden,

	#[error(
		"Modification of access control for the authenticated user is not allowed. Please contact an administrator."
	)]
	SelfModification,

	/// A single-entry save stored some other number of entries.
	#[error("INVALID_NUMBER_OF_PERMISSIONS")]
	InvalidNumberOfPermissions { expected: usize, actual: usize },

	#[error("database error: {0}")]
	Database(DbError),
}

impl PermissionError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			PermissionError::NotFound | PermissionError::EntryNotFound => ErrorKind::NotFound,
			PermissionError::Conflict(_) => ErrorKind::Conflict,
			PermissionError::IdentityMismatch | PermissionError::Validation(_) => {
				ErrorKind::BadRequest
			}
			PermissionError::Forbidden | PermissionError::SelfModification => ErrorKind::Forbidden,
			PermissionError::InvalidNumberOfPermissions { .. } | PermissionError::Database(_) => {
				ErrorKind::Internal
			}
		}
	}
}

impl From<DbError> for PermissionError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(message) => PermissionError::Conflict(message),
			DbError::NotFound(_) => PermissionError::NotFound,
			other => PermissionError::Database(other),
		}
	}
}

pub type Result<T> = std::result::Result<T, PermissionError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_are_stable() {
		assert_eq!(
			PermissionError::NotFound.to_string(),
			"The request includes a permission that does not exist."
		);
		assert_eq!(
			PermissionError::EntryNotFound.to_string(),
			PermissionError::Forbidden.to_string()
		);
		assert_eq!(
			PermissionError::IdentityMismatch.to_string(),
			"The permission guid does not match the provided actor and path."
		);
		assert_eq!(
			PermissionError::InvalidNumberOfPermissions {
				expected: 1,
				actual: 2
			}
			.to_string(),
			"INVALID_NUMBER_OF_PERMISSIONS"
		);
	}

	#[test]
	fn db_conflict_maps_to_conflict_kind() {
		let err: PermissionError = DbError::Conflict("dup".to_string()).into();
		assert_eq!(err.kind(), ErrorKind::Conflict);
		assert_eq!(err.kind().status_code(), 409);

		let err: PermissionError = DbError::Internal("boom".to_string()).into();
		assert_eq!(err.kind(), ErrorKind::Internal);
	}

	#[test]
	fn authorization_failures_are_forbidden() {
		assert_eq!(PermissionError::Forbidden.kind().status_code(), 403);
		assert_eq!(PermissionError::EntryNotFound.kind().status_code(), 404);
		assert_eq!(PermissionError::SelfModification.kind(), ErrorKind::Forbidden);
		assert_eq!(
			PermissionError::Validation(ValidationError::EmptyOperations).kind(),
			ErrorKind::BadRequest
		);
	}
}
