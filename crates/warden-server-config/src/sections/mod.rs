// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod audit;
mod authorization;
mod database;
mod encryption;
mod logging;

pub use audit::{AuditConfig, AuditConfigLayer, QueueOverflowPolicy};
pub use authorization::{AuthorizationConfig, AuthorizationConfigLayer, BootstrapPermission};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use encryption::{EncryptionConfig, EncryptionConfigLayer, MasterKey, MASTER_KEY_SIZE};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
