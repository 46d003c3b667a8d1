// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access control for Warden credentials.
//!
//! - [`PermissionCheckingService`] answers "may this actor perform this
//!   operation on this path".
//! - [`PermissionService`] mutates permission entries and enforces their
//!   invariants.
//! - [`PermissionsHandler`] is what request handlers call: it authorizes,
//!   guards against self-modification, delegates, and audits.

pub mod checking;
pub mod error;
pub mod handler;
pub mod service;

pub use checking::PermissionCheckingService;
pub use error::{ErrorKind, PermissionError, Result};
pub use handler::PermissionsHandler;
pub use service::PermissionService;
