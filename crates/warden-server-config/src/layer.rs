// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	AuditConfigLayer, AuthorizationConfigLayer, DatabaseConfigLayer, EncryptionConfigLayer,
	LoggingConfigLayer,
};

/// Partial server configuration as produced by one source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub authorization: Option<AuthorizationConfigLayer>,
	#[serde(default)]
	pub encryption: Option<EncryptionConfigLayer>,
	#[serde(default)]
	pub audit: Option<AuditConfigLayer>,
}

fn merge_section<T>(target: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (target.as_mut(), other) {
		(Some(existing), Some(other)) => merge(existing, other),
		(None, Some(other)) => *target = Some(other),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, |a, b| a.merge(b));
		merge_section(&mut self.logging, other.logging, |a, b| a.merge(b));
		merge_section(&mut self.authorization, other.authorization, |a, b| {
			a.merge(b)
		});
		merge_section(&mut self.encryption, other.encryption, |a, b| a.merge(b));
		merge_section(&mut self.audit, other.audit, |a, b| a.merge(b));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_keeps_lower_values_not_overridden() {
		let mut base: ServerConfigLayer = toml::from_str(
			r#"
			[database]
			url = "sqlite:/data/warden.db"

			[logging]
			level = "debug"
			"#,
		)
		.unwrap();

		let overlay = ServerConfigLayer {
			logging: Some(LoggingConfigLayer {
				level: Some("warn".to_string()),
				format: None,
			}),
			..Default::default()
		};

		base.merge(overlay);

		assert_eq!(
			base.database.unwrap().url.as_deref(),
			Some("sqlite:/data/warden.db")
		);
		assert_eq!(base.logging.unwrap().level.as_deref(), Some("warn"));
	}
}
