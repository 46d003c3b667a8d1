// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credentials, their immutable versions, and typed set requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::path;
use crate::types::{CredentialId, CredentialVersionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
	Password,
	User,
	Ssh,
	Rsa,
	Certificate,
	Value,
	Json,
}

impl CredentialType {
	pub fn as_str(&self) -> &'static str {
		match self {
			CredentialType::Password => "password",
			CredentialType::User => "user",
			CredentialType::Ssh => "ssh",
			CredentialType::Rsa => "rsa",
			CredentialType::Certificate => "certificate",
			CredentialType::Value => "value",
			CredentialType::Json => "json",
		}
	}
}

impl fmt::Display for CredentialType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for CredentialType {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"password" => Ok(CredentialType::Password),
			"user" => Ok(CredentialType::User),
			"ssh" => Ok(CredentialType::Ssh),
			"rsa" => Ok(CredentialType::Rsa),
			"certificate" => Ok(CredentialType::Certificate),
			"value" => Ok(CredentialType::Value),
			"json" => Ok(CredentialType::Json),
			_ => Err(ValidationError::UnknownCredentialType(s.to_string())),
		}
	}
}

/// Plaintext credential value. Only ever held between decryption and the
/// response; `Debug` never prints secret material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CredentialValue {
	Password(String),
	Value(String),
	Json(Map<String, Value>),
	User {
		username: Option<String>,
		password: String,
	},
	Ssh {
		public_key: Option<String>,
		private_key: Option<String>,
	},
	Rsa {
		public_key: Option<String>,
		private_key: Option<String>,
	},
	Certificate {
		ca: Option<String>,
		certificate: Option<String>,
		private_key: Option<String>,
	},
}

impl CredentialValue {
	pub fn credential_type(&self) -> CredentialType {
		match self {
			CredentialValue::Password(_) => CredentialType::Password,
			CredentialValue::Value(_) => CredentialType::Value,
			CredentialValue::Json(_) => CredentialType::Json,
			CredentialValue::User { .. } => CredentialType::User,
			CredentialValue::Ssh { .. } => CredentialType::Ssh,
			CredentialValue::Rsa { .. } => CredentialType::Rsa,
			CredentialValue::Certificate { .. } => CredentialType::Certificate,
		}
	}
}

impl fmt::Debug for CredentialValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CredentialValue({}, [REDACTED])", self.credential_type())
	}
}

/// Inbound set request, before validation.
///
/// `type` is matched case-insensitively and `value` is interpreted according
/// to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCredentialRequest {
	pub name: String,
	#[serde(rename = "type")]
	pub credential_type: String,
	#[serde(default)]
	pub value: Option<Value>,
	#[serde(default)]
	pub overwrite: bool,
}

/// A validated set request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredential {
	pub name: String,
	pub value: CredentialValue,
	pub overwrite: bool,
}

impl SetCredentialRequest {
	pub fn validate(&self) -> Result<NewCredential, ValidationError> {
		let name = path::normalize_and_validate(&self.name)?;
		if path::is_wildcard(&name) {
			return Err(ValidationError::InvalidPath {
				path: name,
				reason: "credential names cannot be wildcards",
			});
		}

		let credential_type: CredentialType = self.credential_type.parse()?;
		let value = match &self.value {
			None | Some(Value::Null) => return Err(ValidationError::MissingValue),
			Some(value) => parse_value(credential_type, value)?,
		};

		Ok(NewCredential {
			name,
			value,
			overwrite: self.overwrite,
		})
	}
}

fn parse_value(credential_type: CredentialType, value: &Value) -> Result<CredentialValue, ValidationError> {
	match credential_type {
		CredentialType::Password => non_empty_string(value).map(CredentialValue::Password),
		CredentialType::Value => non_empty_string(value).map(CredentialValue::Value),
		CredentialType::Json => match value {
			Value::Object(map) => Ok(CredentialValue::Json(map.clone())),
			_ => Err(ValidationError::InvalidJsonValue),
		},
		CredentialType::User => {
			let fields = object(credential_type, value)?;
			let password =
				optional_field(fields, "password").ok_or(ValidationError::MissingPassword)?;
			Ok(CredentialValue::User {
				username: optional_field(fields, "username"),
				password,
			})
		}
		CredentialType::Ssh | CredentialType::Rsa => {
			let fields = object(credential_type, value)?;
			let public_key = optional_field(fields, "public_key");
			let private_key = optional_field(fields, "private_key");
			if public_key.is_none() && private_key.is_none() {
				return Err(ValidationError::MissingRsaSshParameters);
			}
			Ok(if credential_type == CredentialType::Ssh {
				CredentialValue::Ssh {
					public_key,
					private_key,
				}
			} else {
				CredentialValue::Rsa {
					public_key,
					private_key,
				}
			})
		}
		CredentialType::Certificate => {
			let fields = object(credential_type, value)?;
			let ca = optional_field(fields, "ca");
			let certificate = optional_field(fields, "certificate");
			let private_key = optional_field(fields, "private_key");
			if ca.is_none() && certificate.is_none() && private_key.is_none() {
				return Err(ValidationError::MissingCertificateCredentials);
			}
			Ok(CredentialValue::Certificate {
				ca,
				certificate,
				private_key,
			})
		}
	}
}

fn non_empty_string(value: &Value) -> Result<String, ValidationError> {
	match value {
		Value::String(s) if !s.is_empty() => Ok(s.clone()),
		_ => Err(ValidationError::MissingValue),
	}
}

fn object(
	credential_type: CredentialType,
	value: &Value,
) -> Result<&Map<String, Value>, ValidationError> {
	value
		.as_object()
		.ok_or(ValidationError::MalformedValue(credential_type))
}

/// Empty strings count as absent.
fn optional_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
	fields
		.get(key)
		.and_then(Value::as_str)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
}

/// A named credential. Its identity never changes once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	pub id: CredentialId,
	pub name: String,
	pub created_at: DateTime<Utc>,
}

/// Envelope-encrypted payload: the value sealed under a per-version data key,
/// and that data key sealed under the master key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
	pub ciphertext: Vec<u8>,
	pub nonce: Vec<u8>,
	pub encrypted_key: Vec<u8>,
	pub key_nonce: Vec<u8>,
}

/// One immutable version of a credential. The current version is the most
/// recently created one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialVersion {
	pub id: CredentialVersionId,
	pub credential_id: CredentialId,
	pub name: String,
	pub credential_type: CredentialType,
	pub encrypted_value: EncryptedValue,
	pub created_at: DateTime<Utc>,
}

/// Metadata returned for a version without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialView {
	pub id: CredentialVersionId,
	pub name: String,
	#[serde(rename = "type")]
	pub credential_type: CredentialType,
	pub version_created_at: DateTime<Utc>,
}

impl From<&CredentialVersion> for CredentialView {
	fn from(version: &CredentialVersion) -> Self {
		Self {
			id: version.id,
			name: version.name.clone(),
			credential_type: version.credential_type,
			version_created_at: version.created_at,
		}
	}
}

/// A version together with its decrypted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValueView {
	#[serde(flatten)]
	pub credential: CredentialView,
	pub value: CredentialValue,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn request(credential_type: &str, value: Option<Value>) -> SetCredentialRequest {
		SetCredentialRequest {
			name: "/example/cred".to_string(),
			credential_type: credential_type.to_string(),
			value,
			overwrite: false,
		}
	}

	#[test]
	fn type_is_case_insensitive() {
		let ssh = request("sSh", Some(json!({"public_key": "ssh-rsa AAAA"})));
		assert_eq!(
			ssh.validate().unwrap().value.credential_type(),
			CredentialType::Ssh
		);

		let user = request("UseR", Some(json!({"password": "pw"})));
		assert_eq!(
			user.validate().unwrap().value.credential_type(),
			CredentialType::User
		);
	}

	#[test]
	fn missing_value_is_rejected() {
		assert_eq!(
			request("ssh", None).validate().unwrap_err().code(),
			"error.missing_value"
		);
		assert_eq!(
			request("user", Some(Value::Null)).validate().unwrap_err().code(),
			"error.missing_value"
		);
	}

	#[test]
	fn ssh_requires_at_least_one_key() {
		for value in [
			json!({}),
			json!({"public_key": "", "private_key": ""}),
			json!({"public_key": null, "private_key": null}),
		] {
			let err = request("ssh", Some(value)).validate().unwrap_err();
			assert_eq!(err, ValidationError::MissingRsaSshParameters);
			assert_eq!(err.code(), "error.missing_rsa_ssh_parameters");
		}
	}

	#[test]
	fn ssh_coerces_empty_keys_to_none() {
		let validated = request("ssh", Some(json!({"public_key": "", "private_key": "key"})))
			.validate()
			.unwrap();
		assert_eq!(
			validated.value,
			CredentialValue::Ssh {
				public_key: None,
				private_key: Some("key".to_string()),
			}
		);
	}

	#[test]
	fn rsa_accepts_either_key_alone() {
		assert!(request("rsa", Some(json!({"public_key": "pub"})))
			.validate()
			.is_ok());
		assert!(request("rsa", Some(json!({"private_key": "priv"})))
			.validate()
			.is_ok());
	}

	#[test]
	fn user_requires_password() {
		let err = request("user", Some(json!({"username": "dan"})))
			.validate()
			.unwrap_err();
		assert_eq!(err.code(), "error.missing_password");

		let validated = request("user", Some(json!({"password": "pw"})))
			.validate()
			.unwrap();
		assert_eq!(
			validated.value,
			CredentialValue::User {
				username: None,
				password: "pw".to_string(),
			}
		);
	}

	#[test]
	fn certificate_requires_some_material() {
		assert_eq!(
			request("certificate", Some(json!({"ca": ""})))
				.validate()
				.unwrap_err(),
			ValidationError::MissingCertificateCredentials
		);
		assert!(request("certificate", Some(json!({"certificate": "PEM"})))
			.validate()
			.is_ok());
	}

	#[test]
	fn json_requires_object() {
		assert_eq!(
			request("json", Some(json!("text"))).validate().unwrap_err(),
			ValidationError::InvalidJsonValue
		);
		assert!(request("json", Some(json!({"k": 1}))).validate().is_ok());
	}

	#[test]
	fn password_must_be_non_empty_string() {
		assert_eq!(
			request("password", Some(json!(""))).validate().unwrap_err(),
			ValidationError::MissingValue
		);
	}

	#[test]
	fn unknown_type_is_rejected() {
		assert_eq!(
			request("blob", Some(json!("x"))).validate().unwrap_err(),
			ValidationError::UnknownCredentialType("blob".to_string())
		);
	}

	#[test]
	fn name_is_normalized() {
		let mut req = request("value", Some(json!("v")));
		req.name = "test".to_string();
		assert_eq!(req.validate().unwrap().name, "/test");
	}

	#[test]
	fn wildcard_name_is_rejected() {
		let mut req = request("value", Some(json!("v")));
		req.name = "/team/*".to_string();
		assert!(matches!(
			req.validate().unwrap_err(),
			ValidationError::InvalidPath { .. }
		));
	}

	#[test]
	fn overwrite_defaults_to_false() {
		let req: SetCredentialRequest =
			serde_json::from_str(r#"{"name":"/a","type":"value","value":"v"}"#).unwrap();
		assert!(!req.overwrite);
	}

	#[test]
	fn debug_redacts_value() {
		let value = CredentialValue::Password("hunter2".to_string());
		let printed = format!("{value:?}");
		assert!(!printed.contains("hunter2"));
		assert!(printed.contains("password"));
	}
}
