// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operations a permission entry can grant.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// An operation an actor may perform against a credential path.
///
/// READ, WRITE and DELETE gate the credential data plane. READ_ACL and
/// WRITE_ACL gate management of the permission entries themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOperation {
	Read,
	Write,
	Delete,
	ReadAcl,
	WriteAcl,
}

impl PermissionOperation {
	pub const ALL: [PermissionOperation; 5] = [
		PermissionOperation::Read,
		PermissionOperation::Write,
		PermissionOperation::Delete,
		PermissionOperation::ReadAcl,
		PermissionOperation::WriteAcl,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionOperation::Read => "read",
			PermissionOperation::Write => "write",
			PermissionOperation::Delete => "delete",
			PermissionOperation::ReadAcl => "read_acl",
			PermissionOperation::WriteAcl => "write_acl",
		}
	}

	/// Whether this operation manages access control rather than credential data.
	pub fn is_acl(&self) -> bool {
		matches!(
			self,
			PermissionOperation::ReadAcl | PermissionOperation::WriteAcl
		)
	}
}

impl fmt::Display for PermissionOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PermissionOperation {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"read" => Ok(PermissionOperation::Read),
			"write" => Ok(PermissionOperation::Write),
			"delete" => Ok(PermissionOperation::Delete),
			"read_acl" => Ok(PermissionOperation::ReadAcl),
			"write_acl" => Ok(PermissionOperation::WriteAcl),
			_ => Err(ValidationError::UnknownOperation(s.to_string())),
		}
	}
}

impl<'de> Deserialize<'de> for PermissionOperation {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Validates a requested operation list: non-empty, duplicates removed, first
/// occurrence order preserved.
pub fn normalize_operations(
	operations: &[PermissionOperation],
) -> Result<Vec<PermissionOperation>, ValidationError> {
	if operations.is_empty() {
		return Err(ValidationError::EmptyOperations);
	}

	let mut normalized = Vec::with_capacity(operations.len());
	for op in operations {
		if !normalized.contains(op) {
			normalized.push(*op);
		}
	}
	Ok(normalized)
}

/// Parses operation names as they appear in requests and config files.
pub fn parse_operations<S: AsRef<str>>(
	names: &[S],
) -> Result<Vec<PermissionOperation>, ValidationError> {
	let parsed = names
		.iter()
		.map(|name| name.as_ref().parse())
		.collect::<Result<Vec<_>, _>>()?;
	normalize_operations(&parsed)
}
