// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlagsError, Result};

/// Condition field resolved from [`EvaluationContext::user_id`].
pub const FIELD_USER_ID: &str = "userId";
/// Condition field resolved from [`EvaluationContext::user_email`].
pub const FIELD_USER_EMAIL: &str = "userEmail";
/// Condition field resolved from [`EvaluationContext::user_role`].
pub const FIELD_ROLE: &str = "role";

/// Request-time identity and attributes a flag is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub user_email: Option<String>,
	#[serde(default)]
	pub user_role: Option<String>,
	#[serde(default)]
	pub attributes: HashMap<String, Value>,
}

impl EvaluationContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
		self.user_email = Some(email.into());
		self
	}

	pub fn with_user_role(mut self, role: impl Into<String>) -> Self {
		self.user_role = Some(role.into());
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	/// Looks up the value a condition `field` refers to.
	///
	/// `userId`, `userEmail` and `role` map to the identity fields; any other
	/// name is looked up in `attributes`. Returns `None` when absent.
	pub fn resolve(&self, field: &str) -> Option<Cow<'_, Value>> {
		let identity = match field {
			FIELD_USER_ID => &self.user_id,
			FIELD_USER_EMAIL => &self.user_email,
			FIELD_ROLE => &self.user_role,
			_ => return self.attributes.get(field).map(Cow::Borrowed),
		};

		identity
			.as_ref()
			.map(|s| Cow::Owned(Value::String(s.clone())))
	}

	/// Basic shape check for contexts arriving from outside the process.
	///
	/// Attribute names must be non-empty and attribute values must be scalars
	/// (string, number, boolean or null). No identity field is required.
	pub fn validate(&self) -> Result<()> {
		for (key, value) in &self.attributes {
			if key.trim().is_empty() {
				return Err(FlagsError::InvalidRequest(
					"attribute names must not be empty".to_string(),
				));
			}
			if matches!(value, Value::Array(_) | Value::Object(_)) {
				return Err(FlagsError::InvalidRequest(format!(
					"attribute {:?} must be a string, number, boolean or null",
					key
				)));
			}
		}
		Ok(())
	}
}

/// Why an evaluation produced its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
	/// Flag disabled, expired, or no rule matched
	Default,
	/// A rule matched and supplied the value
	RuleMatch,
}

impl EvaluationReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Default => "default",
			Self::RuleMatch => "rule_match",
		}
	}
}

impl fmt::Display for EvaluationReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Outcome of evaluating one flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
	pub flag_key: String,
	pub value: bool,
	pub reason: EvaluationReason,
}

impl EvaluationResult {
	pub fn new(flag_key: impl Into<String>, value: bool, reason: EvaluationReason) -> Self {
		Self {
			flag_key: flag_key.into(),
			value,
			reason,
		}
	}
}
