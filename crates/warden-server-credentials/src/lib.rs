// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential storage for Warden.
//!
//! Values are envelope-encrypted before they reach the database, and every
//! read, write and delete is authorized through
//! [`warden_server_acl::PermissionCheckingService`].

pub mod encryption;
pub mod error;
pub mod service;

pub use encryption::{EncryptionProvider, EnvelopeEncryptor, KEY_SIZE, NONCE_SIZE};
pub use error::{CredentialError, CredentialResult};
pub use service::PermissionedCredentialService;
