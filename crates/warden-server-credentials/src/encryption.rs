// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope encryption for credential values.
//!
//! Every version gets a fresh AES-256-GCM data key. The value is sealed under
//! that key and the key is sealed under the master key; both sealed blobs and
//! their nonces are stored on the version.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use warden_core::EncryptedValue;
use warden_server_config::EncryptionConfig;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CredentialError, CredentialResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Opaque encrypt/decrypt capability for credential payloads.
pub trait EncryptionProvider: Send + Sync {
	fn encrypt(&self, plaintext: &[u8]) -> CredentialResult<EncryptedValue>;
	fn decrypt(&self, sealed: &EncryptedValue) -> CredentialResult<Zeroizing<Vec<u8>>>;
}

/// Envelope encryption under a single master key.
pub struct EnvelopeEncryptor {
	master_key: Zeroizing<[u8; KEY_SIZE]>,
}

impl EnvelopeEncryptor {
	pub fn new(master_key: Zeroizing<[u8; KEY_SIZE]>) -> Self {
		Self { master_key }
	}

	/// Fails with `MissingMasterKey` when no key is configured.
	pub fn from_config(config: &EncryptionConfig) -> CredentialResult<Self> {
		let key = config
			.master_key
			.as_ref()
			.ok_or(CredentialError::MissingMasterKey)?;
		Ok(Self::new(key.decode()?))
	}
}

impl std::fmt::Debug for EnvelopeEncryptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("EnvelopeEncryptor([REDACTED])")
	}
}

impl EncryptionProvider for EnvelopeEncryptor {
	fn encrypt(&self, plaintext: &[u8]) -> CredentialResult<EncryptedValue> {
		let dek = generate_key();
		let (ciphertext, nonce) = seal(&dek, plaintext, "value")?;
		let (encrypted_key, key_nonce) = seal(&self.master_key, dek.as_slice(), "data key")?;

		Ok(EncryptedValue {
			ciphertext,
			nonce: nonce.to_vec(),
			encrypted_key,
			key_nonce: key_nonce.to_vec(),
		})
	}

	fn decrypt(&self, sealed: &EncryptedValue) -> CredentialResult<Zeroizing<Vec<u8>>> {
		let mut dek_bytes = open(
			&self.master_key,
			&sealed.encrypted_key,
			&sealed.key_nonce,
			"data key",
		)?;

		if dek_bytes.len() != KEY_SIZE {
			return Err(CredentialError::InvalidKeySize {
				expected: KEY_SIZE,
				actual: dek_bytes.len(),
			});
		}

		let mut dek = Zeroizing::new([0u8; KEY_SIZE]);
		dek.copy_from_slice(&dek_bytes);
		dek_bytes.zeroize();

		open(&dek, &sealed.ciphertext, &sealed.nonce, "value")
	}
}

/// Generate a random 256-bit key.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}

/// Generate a random 96-bit nonce. A (key, nonce) pair is never reused since
/// every data key seals exactly one value.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

fn seal(
	key: &[u8; KEY_SIZE],
	plaintext: &[u8],
	what: &str,
) -> CredentialResult<(Vec<u8>, [u8; NONCE_SIZE])> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let nonce_bytes = generate_nonce();

	let ciphertext = cipher
		.encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
		.map_err(|e| CredentialError::Encryption(format!("{what} encryption failed: {e}")))?;

	Ok((ciphertext, nonce_bytes))
}

fn open(
	key: &[u8; KEY_SIZE],
	ciphertext: &[u8],
	nonce: &[u8],
	what: &str,
) -> CredentialResult<Zeroizing<Vec<u8>>> {
	if nonce.len() != NONCE_SIZE {
		return Err(CredentialError::Decryption(format!(
			"{what} nonce has {} bytes",
			nonce.len()
		)));
	}

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let plaintext = cipher
		.decrypt(Nonce::from_slice(nonce), ciphertext)
		.map_err(|e| CredentialError::Decryption(format!("{what} decryption failed: {e}")))?;

	Ok(Zeroizing::new(plaintext))
}
