// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::rule::{Rule, RuleInput};
use crate::serde_helpers::present;
use crate::validation::{validate_key, validate_name, validate_rules};

/// Unique identifier for a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagId(pub Uuid);

impl FlagId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for FlagId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for FlagId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for FlagId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Reference to the user who created a flag. Not checked against any user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for UserId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for UserId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for UserId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// A validated, boolean-valued feature flag.
///
/// A `FlagDefinition` can only be obtained through [`FlagDefinition::new`],
/// [`FlagDefinition::apply_update`] or conversion from a [`FlagRecord`], all of
/// which validate the key, name and rules first. Values are immutable
/// snapshots; updates produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlagRecord", into = "FlagRecord")]
pub struct FlagDefinition {
	id: FlagId,
	key: String,
	name: String,
	description: String,
	enabled: bool,
	default_value: bool,
	rules: Vec<Rule>,
	created_by: UserId,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
	expires_at: Option<DateTime<Utc>>,
}

impl FlagDefinition {
	/// Creates a flag from caller input, failing on the first invalid field.
	pub fn new(input: NewFlag) -> Result<Self, ValidationError> {
		let key = validate_key(&input.key)?;
		let name = validate_name(&input.name)?;
		let rules = validate_rules(input.rules)?;
		let now = Utc::now();

		Ok(Self {
			id: FlagId::new(),
			key,
			name,
			description: input.description,
			enabled: input.enabled,
			default_value: input.default_value,
			rules,
			created_by: input.created_by,
			created_at: now,
			updated_at: now,
			expires_at: input.expires_at,
		})
	}

	/// Returns a copy of this flag with `update` applied.
	///
	/// Replaced fields are re-validated before anything is applied, so on
	/// error `self` is the only version that exists. `updated_at` is always
	/// refreshed, even for metadata-only changes or an empty update.
	pub fn apply_update(&self, update: FlagUpdate) -> Result<Self, ValidationError> {
		let key = update.key.as_deref().map(validate_key).transpose()?;
		let name = update.name.as_deref().map(validate_name).transpose()?;
		let rules = update.rules.map(validate_rules).transpose()?;

		let mut next = self.clone();
		if let Some(key) = key {
			next.key = key;
		}
		if let Some(name) = name {
			next.name = name;
		}
		if let Some(rules) = rules {
			next.rules = rules;
		}
		if let Some(description) = update.description {
			next.description = description;
		}
		if let Some(enabled) = update.enabled {
			next.enabled = enabled;
		}
		if let Some(default_value) = update.default_value {
			next.default_value = default_value;
		}
		if let Some(expires_at) = update.expires_at {
			next.expires_at = expires_at;
		}
		next.updated_at = Utc::now().max(self.updated_at);

		Ok(next)
	}

	pub fn id(&self) -> FlagId {
		self.id
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn enabled(&self) -> bool {
		self.enabled
	}

	pub fn default_value(&self) -> bool {
		self.default_value
	}

	/// Rules in their stored order. Precedence is decided by priority.
	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	pub fn created_by(&self) -> UserId {
		self.created_by
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	pub fn updated_at(&self) -> DateTime<Utc> {
		self.updated_at
	}

	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.expires_at
	}

	/// Whether the flag has an expiry strictly before `now`.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|expires_at| now > expires_at)
	}

	/// Whether rules should be consulted at `now`.
	pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
		self.enabled && !self.is_expired_at(now)
	}

	/// Converts the flag into its plain representation.
	pub fn into_record(self) -> FlagRecord {
		self.into()
	}
}

/// Caller input for creating a flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFlag {
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub default_value: bool,
	#[serde(default)]
	pub rules: Vec<RuleInput>,
	pub created_by: UserId,
	#[serde(default)]
	pub expires_at: Option<DateTime<Utc>>,
}

impl NewFlag {
	pub fn new(key: impl Into<String>, name: impl Into<String>, created_by: UserId) -> Self {
		Self {
			key: key.into(),
			name: name.into(),
			description: String::new(),
			enabled: false,
			default_value: false,
			rules: Vec::new(),
			created_by,
			expires_at: None,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn with_default_value(mut self, default_value: bool) -> Self {
		self.default_value = default_value;
		self
	}

	pub fn with_rule(mut self, rule: impl Into<RuleInput>) -> Self {
		self.rules.push(rule.into());
		self
	}

	pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
		self.expires_at = Some(expires_at);
		self
	}
}

/// Whole-field replacement of some of a flag's fields.
///
/// `None` leaves a field unchanged. For `expires_at`, `Some(None)` clears the
/// expiry; in JSON that is an explicit `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagUpdate {
	#[serde(default)]
	pub key: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub default_value: Option<bool>,
	#[serde(default)]
	pub rules: Option<Vec<RuleInput>>,
	#[serde(default, deserialize_with = "present")]
	pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Plain representation of a [`FlagDefinition`], used for storage and transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
	pub id: FlagId,
	pub key: String,
	pub name: String,
	#[serde(default)]
	pub description: String,
	pub enabled: bool,
	pub default_value: bool,
	#[serde(default)]
	pub rules: Vec<Rule>,
	pub created_by: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	#[serde(default)]
	pub expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<FlagRecord> for FlagDefinition {
	type Error = ValidationError;

	fn try_from(record: FlagRecord) -> Result<Self, Self::Error> {
		let key = validate_key(&record.key)?;
		let name = validate_name(&record.name)?;
		let rules = validate_rules(record.rules.into_iter().map(RuleInput::from).collect())?;

		Ok(Self {
			id: record.id,
			key,
			name,
			description: record.description,
			enabled: record.enabled,
			default_value: record.default_value,
			rules,
			created_by: record.created_by,
			created_at: record.created_at,
			updated_at: record.updated_at,
			expires_at: record.expires_at,
		})
	}
}

impl From<FlagDefinition> for FlagRecord {
	fn from(flag: FlagDefinition) -> Self {
		Self {
			id: flag.id,
			key: flag.key,
			name: flag.name,
			description: flag.description,
			enabled: flag.enabled,
			default_value: flag.default_value,
			rules: flag.rules,
			created_by: flag.created_by,
			created_at: flag.created_at,
			updated_at: flag.updated_at,
			expires_at: flag.expires_at,
		}
	}
}
