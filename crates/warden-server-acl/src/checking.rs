// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decisions backed by the permission store.

use std::sync::Arc;

use warden_core::{decision, Actor, PermissionOperation};
use warden_server_db::PermissionStore;

use crate::error::Result;

/// Answers `has_permission` and the self-modification question.
///
/// When ACL enforcement is disabled every check passes.
#[derive(Clone)]
pub struct PermissionCheckingService {
	store: Arc<dyn PermissionStore>,
	acls_enabled: bool,
}

impl PermissionCheckingService {
	pub fn new(store: Arc<dyn PermissionStore>, acls_enabled: bool) -> Self {
		Self {
			store,
			acls_enabled,
		}
	}

	pub fn acls_enabled(&self) -> bool {
		self.acls_enabled
	}

	/// True iff one of `actor`'s entries matches `path` and grants
	/// `operation`. Absence of a grant is `Ok(false)`; only storage failures
	/// are errors.
	#[tracing::instrument(skip(self), fields(actor = %actor, operation = %operation))]
	pub async fn has_permission(
		&self,
		actor: &Actor,
		path: &str,
		operation: PermissionOperation,
	) -> Result<bool> {
		if !self.acls_enabled {
			return Ok(true);
		}

		let entries = self.store.find_by_actor(actor).await?;
		match decision::granting_entry(&entries, actor, path, operation) {
			Some(entry) => {
				tracing::debug!(
					actor = %actor,
					path,
					operation = %operation,
					granted_by = %entry.path,
					entry_id = %entry.id,
					"permission granted"
				);
				Ok(true)
			}
			None => {
				tracing::info!(actor = %actor, path, operation = %operation, "permission denied");
				Ok(false)
			}
		}
	}

	/// False when `acting` would be changing its own grant.
	pub fn user_allowed_to_operate_on_actor(&self, acting: &Actor, target: &Actor) -> bool {
		if !self.acls_enabled {
			return true;
		}
		decision::user_allowed_to_operate_on_actor(acting, target)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_core::{PermissionGrant, SaveMode};
	use warden_server_db::testing::create_test_pool;
	use warden_server_db::PermissionRepository;
	use PermissionOperation::*;

	async fn service_with(
		grants: &[(&str, &str, &[PermissionOperation])],
	) -> PermissionCheckingService {
		let repo = PermissionRepository::new(create_test_pool().await);
		let grants: Vec<PermissionGrant> = grants
			.iter()
			.map(|(actor, path, ops)| PermissionGrant::new(Actor::new(*actor), path, ops).unwrap())
			.collect();
		if !grants.is_empty() {
			repo.save(&grants, SaveMode::CreateOnly).await.unwrap();
		}
		PermissionCheckingService::new(Arc::new(repo), true)
	}

	#[tokio::test]
	async fn test_absent_grant_is_false_not_error() {
		let service = service_with(&[]).await;
		let allowed = service
			.has_permission(&Actor::new("x"), "/test", Read)
			.await
			.unwrap();
		assert!(!allowed);
	}

	#[tokio::test]
	async fn test_exact_grant() {
		let service = service_with(&[("x", "/test", &[Write])]).await;
		let x = Actor::new("x");

		assert!(service.has_permission(&x, "/test", Write).await.unwrap());
		assert!(!service.has_permission(&x, "/test", Read).await.unwrap());
		assert!(!service.has_permission(&x, "/test", ReadAcl).await.unwrap());
		assert!(!service
			.has_permission(&Actor::new("y"), "/test", Write)
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_wildcard_grant() {
		let service = service_with(&[("a", "/user-a/*", &[Read])]).await;
		let a = Actor::new("a");

		assert!(service.has_permission(&a, "/user-a/foo", Read).await.unwrap());
		assert!(service.has_permission(&a, "/user-a/foo/bar", Read).await.unwrap());
		assert!(!service.has_permission(&a, "/user-b/foo", Read).await.unwrap());
		assert!(!service.has_permission(&a, "/user-a", Read).await.unwrap());
	}

	#[tokio::test]
	async fn test_wildcard_root_needs_exact_entry() {
		let service = service_with(&[
			("a", "/user-a/*", &[Read]),
			("a", "/user-a", &[Read]),
		])
		.await;
		assert!(service
			.has_permission(&Actor::new("a"), "/user-a", Read)
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_disabled_acls_allow_everything() {
		let repo = PermissionRepository::new(create_test_pool().await);
		let service = PermissionCheckingService::new(Arc::new(repo), false);
		let x = Actor::new("x");

		assert!(service.has_permission(&x, "/anything", Delete).await.unwrap());
		assert!(service.user_allowed_to_operate_on_actor(&x, &x));
	}

	#[tokio::test]
	async fn test_self_modification() {
		let service = service_with(&[]).await;
		let x = Actor::new("x");
		assert!(!service.user_allowed_to_operate_on_actor(&x, &x));
		assert!(service.user_allowed_to_operate_on_actor(&x, &Actor::new("y")));
	}
}
