// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master key configuration for credential envelope encryption.

use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::ConfigError;

pub const MASTER_KEY_SIZE: usize = 32;

/// Hex-encoded 256-bit master key. Never printed.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<String>);

impl MasterKey {
	pub fn new(hex_key: impl Into<String>) -> Self {
		Self(Zeroizing::new(hex_key.into()))
	}

	/// Decodes the key, failing unless it is exactly 32 bytes of hex.
	pub fn decode(&self) -> Result<Zeroizing<[u8; MASTER_KEY_SIZE]>, ConfigError> {
		let bytes = Zeroizing::new(hex::decode(self.0.trim()).map_err(|e| {
			ConfigError::InvalidValue {
				key: "encryption.master_key".to_string(),
				message: format!("not valid hex: {e}"),
			}
		})?);

		if bytes.len() != MASTER_KEY_SIZE {
			return Err(ConfigError::InvalidValue {
				key: "encryption.master_key".to_string(),
				message: format!(
					"expected {MASTER_KEY_SIZE} bytes, got {}",
					bytes.len()
				),
			});
		}

		let mut key = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
		key.copy_from_slice(&bytes);
		Ok(key)
	}
}

impl fmt::Debug for MasterKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("MasterKey([REDACTED])")
	}
}

impl<'de> Deserialize<'de> for MasterKey {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(MasterKey::new)
	}
}

#[derive(Debug, Clone, Default)]
pub struct EncryptionConfig {
	pub master_key: Option<MasterKey>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionConfigLayer {
	#[serde(default)]
	pub master_key: Option<MasterKey>,
}

impl EncryptionConfigLayer {
	pub fn merge(&mut self, other: EncryptionConfigLayer) {
		if other.master_key.is_some() {
			self.master_key = other.master_key;
		}
	}

	pub fn finalize(self) -> EncryptionConfig {
		EncryptionConfig {
			master_key: self.master_key,
		}
	}
}
