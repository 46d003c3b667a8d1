// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Warden credential store.
//!
//! This crate holds everything that can be decided without I/O: permission
//! operations and entries, the path matcher, the authorization decision and
//! self-modification guard, credential types and set-request validation, and
//! the [`Clock`] abstraction. The server crates (`warden-server-db`,
//! `warden-server-acl`, `warden-server-credentials`) build on these types.
//!
//! # Example
//!
//! ```
//! use warden_core::{decision, Actor, PermissionOperation};
//!
//! let alice = Actor::new("uaa-user:alice");
//! assert!(!decision::has_permission(&[], &alice, "/team/db", PermissionOperation::Read));
//! assert!(!decision::user_allowed_to_operate_on_actor(&alice, &alice));
//! ```

pub mod clock;
pub mod credential;
pub mod decision;
pub mod error;
pub mod operation;
pub mod path;
pub mod permission;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{
	Credential, CredentialType, CredentialValue, CredentialValueView, CredentialVersion,
	CredentialView, EncryptedValue, NewCredential, SetCredentialRequest,
};
pub use error::{Result, ValidationError};
pub use operation::{normalize_operations, parse_operations, PermissionOperation};
pub use permission::{
	NormalizedPermissions, PermissionData, PermissionEntry, PermissionGrant,
	PermissionPatchRequest, PermissionsRequest, PermissionsV2Request, PermissionsV2View,
	PermissionsView, SaveMode, SetPermissionsRequest,
};
pub use types::{Actor, CredentialId, CredentialVersionId, PermissionId};
