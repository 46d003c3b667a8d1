// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden server administration binary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use warden_core::{path, Actor, PermissionOperation};
use warden_server::{init_logging, version, Warden};
use warden_server_db::{create_pool, run_migrations};

/// Warden - permission engine for stored credentials.
#[derive(Parser, Debug)]
#[command(name = "warden-server", about = "Warden credential permission server", version)]
struct Args {
	/// Config file to use instead of /etc/warden/server.toml
	#[arg(long, global = true, env = "WARDEN_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply pending database migrations
	Migrate,
	/// Apply the configured bootstrap permissions
	Bootstrap,
	/// Check whether an actor may perform an operation on a path
	Check {
		actor: String,
		path: String,
		operation: PermissionOperation,
	},
	/// Delete audit records older than the retention window
	PurgeAudit {
		/// Overrides audit.retention_days
		#[arg(long)]
		older_than_days: Option<i64>,
	},
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(ExitCode::SUCCESS);
	}

	let config = match &args.config {
		Some(file) => warden_server_config::load_config_with_file(file),
		None => warden_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_logging(&config.logging)?;

	match args.command {
		Command::Migrate => {
			let pool = create_pool(&config.database.url, config.database.max_connections).await?;
			run_migrations(&pool).await?;
			tracing::info!("migrations applied");
		}
		Command::Bootstrap => {
			let warden = Warden::connect(&config).await?;
			let written = warden.bootstrap().await?;
			println!("applied {written} bootstrap permission(s)");
		}
		Command::Check {
			actor,
			path,
			operation,
		} => {
			let warden = Warden::connect(&config).await?;
			let path = path::normalize_and_validate(&path)?;
			let allowed = warden
				.checking()
				.has_permission(&Actor::new(actor), &path, operation)
				.await?;

			println!("{}", if allowed { "allowed" } else { "denied" });
			if !allowed {
				return Ok(ExitCode::FAILURE);
			}
		}
		Command::PurgeAudit { older_than_days } => {
			let days = older_than_days.unwrap_or(config.audit.retention_days);
			anyhow::ensure!(days > 0, "retention must be at least one day");

			let warden = Warden::connect(&config).await?;
			let cutoff = retention_cutoff(warden.clock().now(), days)?;
			let deleted = warden.audit_logs().delete_before(cutoff).await?;
			tracing::info!(deleted, %cutoff, "purged audit logs");
			println!("deleted {deleted} audit record(s)");
		}
		// Printed before configuration is loaded.
		Command::Version => {}
	}

	Ok(ExitCode::SUCCESS)
}

/// The instant `days` before `now`. Fails instead of overflowing.
fn retention_cutoff(now: DateTime<Utc>, days: i64) -> anyhow::Result<DateTime<Utc>> {
	chrono::Duration::try_days(days)
		.and_then(|window| now.checked_sub_signed(window))
		.with_context(|| format!("retention of {days} days is out of range"))
}
