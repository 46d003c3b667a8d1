// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission entries and the request/response shapes of the ACL surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::operation::{normalize_operations, PermissionOperation};
use crate::path;
use crate::types::{Actor, PermissionId};

/// A persisted grant: `(actor, path) -> operations`.
///
/// At most one entry exists per `(actor, path)`. Operations are kept in the
/// order they were first granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionData {
	pub id: PermissionId,
	pub actor: Actor,
	pub path: String,
	pub operations: Vec<PermissionOperation>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl PermissionData {
	pub fn has_operation(&self, operation: PermissionOperation) -> bool {
		self.operations.contains(&operation)
	}

	pub fn to_entry(&self) -> PermissionEntry {
		PermissionEntry {
			actor: self.actor.clone(),
			path: self.path.clone(),
			operations: self.operations.clone(),
		}
	}

	pub fn to_view(&self) -> PermissionsV2View {
		PermissionsV2View {
			uuid: self.id,
			actor: self.actor.clone(),
			path: self.path.clone(),
			operations: self.operations.clone(),
		}
	}
}

/// One grant as it appears in the legacy list form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
	pub actor: Actor,
	/// Ignored on input; the legacy form always grants on the request's
	/// credential name.
	#[serde(default)]
	pub path: String,
	pub operations: Vec<PermissionOperation>,
}

/// Legacy list-form request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsRequest {
	pub credential_name: String,
	pub permissions: Vec<PermissionEntry>,
}

/// Current single-entry request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsV2Request {
	pub actor: Actor,
	pub path: String,
	pub operations: Vec<PermissionOperation>,
}

/// Partial update by identifier. `actor`/`path`, when given, must equal the
/// stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPatchRequest {
	pub operations: Vec<PermissionOperation>,
	#[serde(default)]
	pub actor: Option<Actor>,
	#[serde(default)]
	pub path: Option<String>,
}

/// Either request shape accepted by the set-permissions surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SetPermissionsRequest {
	Legacy(PermissionsRequest),
	V2(PermissionsV2Request),
}

/// How grants are persisted when an `(actor, path)` entry already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
	/// Add the requested operations to the existing entry.
	Merge,
	/// Fail with a conflict.
	CreateOnly,
}

/// A validated `(actor, path, operations)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
	pub actor: Actor,
	pub path: String,
	pub operations: Vec<PermissionOperation>,
}

impl PermissionGrant {
	pub fn new(
		actor: Actor,
		path: &str,
		operations: &[PermissionOperation],
	) -> Result<Self, ValidationError> {
		Ok(Self {
			actor,
			path: path::normalize_and_validate(path)?,
			operations: normalize_operations(operations)?,
		})
	}
}

/// The shape-independent form both request kinds are reduced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPermissions {
	/// Path the caller must hold WRITE_ACL on.
	pub scope: String,
	pub grants: Vec<PermissionGrant>,
	pub mode: SaveMode,
	/// Exactly one stored entry must result from the save.
	pub expect_single: bool,
}

impl SetPermissionsRequest {
	pub fn normalize(&self) -> Result<NormalizedPermissions, ValidationError> {
		match self {
			SetPermissionsRequest::Legacy(request) => {
				if request.permissions.is_empty() {
					return Err(ValidationError::EmptyPermissions);
				}
				let scope = path::normalize_and_validate(&request.credential_name)?;
				let grants = request
					.permissions
					.iter()
					.map(|entry| PermissionGrant::new(entry.actor.clone(), &scope, &entry.operations))
					.collect::<Result<Vec<_>, _>>()?;
				Ok(NormalizedPermissions {
					scope,
					expect_single: grants.len() == 1,
					grants,
					mode: SaveMode::Merge,
				})
			}
			SetPermissionsRequest::V2(request) => {
				let grant =
					PermissionGrant::new(request.actor.clone(), &request.path, &request.operations)?;
				Ok(NormalizedPermissions {
					scope: grant.path.clone(),
					grants: vec![grant],
					mode: SaveMode::CreateOnly,
					expect_single: true,
				})
			}
		}
	}
}

/// Legacy read view: every entry attached to a credential name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsView {
	pub credential_name: String,
	pub permissions: Vec<PermissionEntry>,
}

/// Current single-entry view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsV2View {
	pub uuid: PermissionId,
	pub actor: Actor,
	pub path: String,
	pub operations: Vec<PermissionOperation>,
}
