// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde_json::{json, Value};
use switchyard_server_flags::{
	EvaluationContext, FlagId, FlagUpdate, FlagsRepository, FlagsService, NewFlag, RuleInput,
	UserId,
};

#[derive(Subcommand, Debug)]
pub enum FlagsCommand {
	/// Create a flag
	Create(CreateArgs),
	/// Replace some fields of an existing flag
	Update(UpdateArgs),
	/// Show one flag, looked up by id or key
	Get { flag: String },
	/// List all flags ordered by key
	List,
	/// Delete a flag by id
	Delete { id: FlagId },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
	#[arg(long)]
	pub key: String,

	#[arg(long)]
	pub name: String,

	#[arg(long, default_value = "")]
	pub description: String,

	#[arg(long)]
	pub enabled: bool,

	/// Value served when no rule matches
	#[arg(long)]
	pub default_value: bool,

	/// Rules as a JSON array, or @path to read them from a file
	#[arg(long)]
	pub rules: Option<String>,

	/// Id of the user creating the flag
	#[arg(long, env = "SWITCHYARD_USER_ID")]
	pub created_by: UserId,

	/// RFC 3339 timestamp after which the flag serves its default
	#[arg(long)]
	pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
	pub id: FlagId,

	#[arg(long)]
	pub key: Option<String>,

	#[arg(long)]
	pub name: Option<String>,

	#[arg(long)]
	pub description: Option<String>,

	#[arg(long)]
	pub enabled: Option<bool>,

	#[arg(long)]
	pub default_value: Option<bool>,

	/// Replacement rules as a JSON array, or @path to read them from a file
	#[arg(long)]
	pub rules: Option<String>,

	#[arg(long, conflicts_with = "clear_expiry")]
	pub expires_at: Option<DateTime<Utc>>,

	/// Remove the expiry
	#[arg(long)]
	pub clear_expiry: bool,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
	/// Flag key to evaluate
	#[arg(required_unless_present = "all", conflicts_with = "all")]
	pub key: Option<String>,

	/// Evaluate every flag
	#[arg(long)]
	pub all: bool,

	#[arg(long)]
	pub user_id: Option<String>,

	#[arg(long = "email")]
	pub user_email: Option<String>,

	#[arg(long)]
	pub role: Option<String>,

	/// Custom attribute as NAME=VALUE; VALUE is read as JSON when it parses
	#[arg(long = "attr", value_parser = parse_attribute)]
	pub attributes: Vec<(String, Value)>,
}

pub async fn run_flags<R: FlagsRepository>(
	service: &FlagsService<R>,
	command: FlagsCommand,
) -> Result<Value> {
	match command {
		FlagsCommand::Create(args) => {
			let mut input = NewFlag::new(args.key, args.name, args.created_by)
				.with_description(args.description)
				.with_enabled(args.enabled)
				.with_default_value(args.default_value);
			if let Some(rules) = args.rules.as_deref() {
				input.rules = parse_rules(rules)?;
			}
			if let Some(expires_at) = args.expires_at {
				input = input.with_expires_at(expires_at);
			}

			let flag = service.create_flag(input).await?;
			Ok(serde_json::to_value(&flag)?)
		}
		FlagsCommand::Update(args) => {
			let rules = args.rules.as_deref().map(parse_rules).transpose()?;
			let expires_at = if args.clear_expiry {
				Some(None)
			} else {
				args.expires_at.map(Some)
			};
			let update = FlagUpdate {
				key: args.key,
				name: args.name,
				description: args.description,
				enabled: args.enabled,
				default_value: args.default_value,
				rules,
				expires_at,
			};

			let flag = service.update_flag(args.id, update).await?;
			Ok(serde_json::to_value(&flag)?)
		}
		FlagsCommand::Get { flag } => {
			let found = match flag.parse::<FlagId>() {
				Ok(id) => service.get_flag(id).await?,
				Err(_) => service.get_flag_by_key(&flag).await?,
			};
			Ok(serde_json::to_value(&found)?)
		}
		FlagsCommand::List => {
			let flags = service.list_flags().await?;
			Ok(serde_json::to_value(&flags)?)
		}
		FlagsCommand::Delete { id } => {
			let deleted = service.delete_flag(id).await?;
			Ok(json!({ "id": id, "deleted": deleted }))
		}
	}
}

pub async fn run_eval<R: FlagsRepository>(
	service: &FlagsService<R>,
	args: EvalArgs,
) -> Result<Value> {
	let context = build_context(&args);

	match args.key {
		Some(key) => {
			let result = service.evaluate(&key, &context).await?;
			Ok(serde_json::to_value(&result)?)
		}
		None => {
			let results = service.evaluate_all(&context).await?;
			Ok(serde_json::to_value(&results)?)
		}
	}
}

fn build_context(args: &EvalArgs) -> EvaluationContext {
	let mut context = EvaluationContext::new();
	if let Some(user_id) = &args.user_id {
		context = context.with_user_id(user_id.as_str());
	}
	if let Some(email) = &args.user_email {
		context = context.with_user_email(email.as_str());
	}
	if let Some(role) = &args.role {
		context = context.with_user_role(role.as_str());
	}
	for (name, value) in &args.attributes {
		context = context.with_attribute(name.as_str(), value.clone());
	}
	context
}

fn parse_rules(raw: &str) -> Result<Vec<RuleInput>> {
	let json = match raw.strip_prefix('@') {
		Some(path) => std::fs::read_to_string(path)
			.with_context(|| format!("failed to read rules file {path}"))?,
		None => raw.to_string(),
	};
	serde_json::from_str(&json).context("rules must be a JSON array of rule objects")
}

fn parse_attribute(raw: &str) -> std::result::Result<(String, Value), String> {
	let (name, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
	let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
	Ok((name.to_string(), value))
}
