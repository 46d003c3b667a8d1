// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, AuthorizationConfigLayer, DatabaseConfigLayer, EncryptionConfigLayer,
	LoggingConfigLayer, MasterKey,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/warden/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WARDEN_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			logging: Some(load_logging_from_env()?),
			authorization: Some(load_authorization_from_env()),
			encryption: Some(load_encryption_from_env()?),
			audit: Some(load_audit_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}': {e}"),
		}),
		None => Ok(None),
	}
}

/// Reads a secret from `NAME`, or from the file named by `NAME_FILE`.
///
/// Setting both is an error.
pub fn load_secret_env(name: &str) -> Result<Option<String>, ConfigError> {
	let file_var = format!("{name}_FILE");
	match (env_var(name), env_var(&file_var)) {
		(Some(_), Some(_)) => Err(ConfigError::Secret(format!(
			"both {name} and {file_var} are set"
		))),
		(Some(value), None) => Ok(Some(value)),
		(None, Some(path)) => std::fs::read_to_string(&path)
			.map(|s| Some(s.trim().to_string()))
			.map_err(|e| ConfigError::Secret(format!("failed to read {file_var} ({path}): {e}"))),
		(None, None) => Ok(None),
	}
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("WARDEN_SERVER_DATABASE_URL"),
		max_connections: env_parse("WARDEN_SERVER_DATABASE_MAX_CONNECTIONS")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("WARDEN_SERVER_LOG_LEVEL"),
		format: env_parse("WARDEN_SERVER_LOG_FORMAT")?,
	})
}

fn load_authorization_from_env() -> AuthorizationConfigLayer {
	AuthorizationConfigLayer {
		acls_enabled: env_bool("WARDEN_SERVER_ACLS_ENABLED"),
		permissions: None,
	}
}

fn load_encryption_from_env() -> Result<EncryptionConfigLayer, ConfigError> {
	Ok(EncryptionConfigLayer {
		master_key: load_secret_env("WARDEN_SERVER_ENCRYPTION_KEY")?.map(MasterKey::new),
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	Ok(AuditConfigLayer {
		enabled: env_bool("WARDEN_SERVER_AUDIT_ENABLED"),
		retention_days: env_parse("WARDEN_SERVER_AUDIT_RETENTION_DAYS")?,
		queue_capacity: env_parse("WARDEN_SERVER_AUDIT_QUEUE_CAPACITY")?,
		queue_overflow_policy: env_parse("WARDEN_SERVER_AUDIT_QUEUE_OVERFLOW_POLICY")?,
		min_severity: env_var("WARDEN_SERVER_AUDIT_MIN_SEVERITY"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_order() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_missing_toml_file_is_empty_layer() {
		let layer = TomlSource::new("/nonexistent/warden.toml").load().unwrap();
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_file_is_parsed() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[database]
url = "sqlite::memory:"

[authorization]
acls_enabled = false
"#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.database.unwrap().url.as_deref(),
			Some("sqlite::memory:")
		);
		assert_eq!(layer.authorization.unwrap().acls_enabled, Some(false));
	}

	#[test]
	fn test_invalid_toml_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[database\nurl = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_secret_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "  s3cret  ").unwrap();

		std::env::set_var("WARDEN_TEST_SECRET_ONLY_FILE_FILE", file.path());
		let value = load_secret_env("WARDEN_TEST_SECRET_ONLY_FILE").unwrap();
		std::env::remove_var("WARDEN_TEST_SECRET_ONLY_FILE_FILE");

		assert_eq!(value.as_deref(), Some("s3cret"));
	}

	#[test]
	fn test_secret_conflict() {
		std::env::set_var("WARDEN_TEST_SECRET_BOTH", "a");
		std::env::set_var("WARDEN_TEST_SECRET_BOTH_FILE", "/tmp/nothing");
		let result = load_secret_env("WARDEN_TEST_SECRET_BOTH");
		std::env::remove_var("WARDEN_TEST_SECRET_BOTH");
		std::env::remove_var("WARDEN_TEST_SECRET_BOTH_FILE");

		assert!(matches!(result, Err(ConfigError::Secret(_))));
	}
}
