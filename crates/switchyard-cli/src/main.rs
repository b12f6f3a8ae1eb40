// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Switchyard command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchyard_server_config::{LogFormat, LoggingConfig, ServerConfig};
use switchyard_server_flags::{create_pool, ensure_schema, FlagsService, SqliteFlagsRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{EvalArgs, FlagsCommand};

/// Switchyard - manage and evaluate feature flags.
#[derive(Parser, Debug)]
#[command(name = "switchyard", about = "Manage and evaluate feature flags", version)]
struct Args {
	/// Config file to load instead of /etc/switchyard/server.toml
	#[arg(long, global = true, env = "SWITCHYARD_CONFIG")]
	config: Option<PathBuf>,

	/// Database URL, overriding the configured one
	#[arg(long, global = true)]
	database_url: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create, inspect, change and delete flags
	#[command(subcommand)]
	Flags(FlagsCommand),
	/// Evaluate flags for a user context
	Eval(EvalArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => switchyard_server_config::load_config_with_file(path)?,
		None => switchyard_server_config::load_config()?,
	};
	let config = apply_overrides(config, &args)?;

	init_tracing(&config.logging);

	tracing::debug!(database = %config.database.url, "opening flag store");
	let pool = create_pool(&config.database.url).await?;
	ensure_schema(&pool).await?;
	let service = FlagsService::new(SqliteFlagsRepository::new(pool));

	let output = match args.command {
		Command::Flags(command) => commands::run_flags(&service, command).await?,
		Command::Eval(eval) => commands::run_eval(&service, eval).await?,
	};

	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

fn apply_overrides(config: ServerConfig, args: &Args) -> anyhow::Result<ServerConfig> {
	match &args.database_url {
		Some(url) => Ok(config.with_database_url(url.as_str())?),
		None => Ok(config),
	}
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init(),
		LogFormat::Text => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_cli_definition_is_valid() {
		Args::command().debug_assert();
	}

	#[test]
	fn test_parse_eval_with_attributes() {
		let args = Args::try_parse_from([
			"switchyard",
			"eval",
			"beta",
			"--user-id",
			"u1",
			"--attr",
			"plan=pro",
			"--attr",
			"seats=5",
		])
		.unwrap();

		let Command::Eval(eval) = args.command else {
			panic!("expected eval command");
		};
		assert_eq!(eval.key.as_deref(), Some("beta"));
		assert_eq!(eval.user_id.as_deref(), Some("u1"));
		assert_eq!(eval.attributes.len(), 2);
	}

	#[test]
	fn test_eval_requires_key_or_all() {
		assert!(Args::try_parse_from(["switchyard", "eval"]).is_err());
		assert!(Args::try_parse_from(["switchyard", "eval", "--all"]).is_ok());
		assert!(Args::try_parse_from(["switchyard", "eval", "beta", "--all"]).is_err());
	}

	#[test]
	fn test_global_config_flag() {
		let args = Args::try_parse_from([
			"switchyard",
			"flags",
			"list",
			"--config",
			"/tmp/switchyard.toml",
		])
		.unwrap();
		assert_eq!(args.config, Some(PathBuf::from("/tmp/switchyard.toml")));
	}

	#[test]
	fn test_database_url_override() {
		let args = Args::try_parse_from([
			"switchyard",
			"flags",
			"list",
			"--database-url",
			"sqlite:/tmp/override.db",
		])
		.unwrap();
		let config = apply_overrides(ServerConfig::default(), &args).unwrap();
		assert_eq!(config.database.url, "sqlite:/tmp/override.db");

		let args = Args::try_parse_from(["switchyard", "flags", "list"]).unwrap();
		let config = apply_overrides(ServerConfig::default(), &args).unwrap();
		assert_eq!(config, ServerConfig::default());
	}

	#[test]
	fn test_non_sqlite_database_url_override_rejected() {
		let args = Args::try_parse_from([
			"switchyard",
			"eval",
			"--all",
			"--database-url",
			"postgres://localhost/flags",
		])
		.unwrap();
		let err = apply_overrides(ServerConfig::default(), &args).unwrap_err();
		assert!(err.to_string().contains("sqlite:"));
	}
}
