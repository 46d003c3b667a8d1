// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization configuration: ACL enforcement and bootstrap grants.
//!
//! Bootstrap grants are applied at startup so that an initial operator can
//! manage permissions before any entry exists:
//!
//! ```toml
//! [authorization]
//! acls_enabled = true
//!
//! [[authorization.permissions]]
//! path = "/*"
//! actors = ["uaa-client:warden-admin"]
//! operations = ["read", "write", "delete", "read_acl", "write_acl"]
//! ```

use serde::Deserialize;
use warden_core::PermissionOperation;

/// One configured grant, applied to every listed actor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapPermission {
	pub path: String,
	pub actors: Vec<String>,
	pub operations: Vec<PermissionOperation>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
	/// When false every permission check passes.
	pub acls_enabled: bool,
	pub permissions: Vec<BootstrapPermission>,
}

impl Default for AuthorizationConfig {
	fn default() -> Self {
		Self {
			acls_enabled: true,
			permissions: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationConfigLayer {
	#[serde(default)]
	pub acls_enabled: Option<bool>,
	#[serde(default)]
	pub permissions: Option<Vec<BootstrapPermission>>,
}

impl AuthorizationConfigLayer {
	pub fn merge(&mut self, other: AuthorizationConfigLayer) {
		if other.acls_enabled.is_some() {
			self.acls_enabled = other.acls_enabled;
		}
		if other.permissions.is_some() {
			self.permissions = other.permissions;
		}
	}

	pub fn finalize(self) -> AuthorizationConfig {
		AuthorizationConfig {
			acls_enabled: self.acls_enabled.unwrap_or(true),
			permissions: self.permissions.unwrap_or_default(),
		}
	}
}
