// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag validator.
//!
//! Each validator returns the normalized value on success. Callers that check
//! several fields run them in the order key, name, rules and stop at the first
//! failure.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::rule::{Condition, ConditionInput, ConditionOperator, Rule, RuleInput, RuleType};

/// Maximum flag name length in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Validates a flag key, returning it trimmed.
///
/// Valid keys are non-empty and contain only `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<String, ValidationError> {
	let key = key.trim();
	if key.is_empty() {
		return Err(ValidationError::EmptyKey);
	}

	if !key
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
	{
		return Err(ValidationError::InvalidKey(key.to_string()));
	}

	Ok(key.to_string())
}

/// Validates a flag name, returning it trimmed.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
	let name = name.trim();
	if name.is_empty() {
		return Err(ValidationError::EmptyName);
	}

	let len = name.chars().count();
	if len > MAX_NAME_LEN {
		return Err(ValidationError::NameTooLong {
			len,
			max: MAX_NAME_LEN,
		});
	}

	Ok(name.to_string())
}

/// Validates a rule set, converting it into typed rules.
///
/// Fails on the first rule that lacks an id, a known type, a boolean value,
/// an integer priority or a non-empty condition list, on the first condition
/// lacking a field, a known operator or a value, and on repeated rule ids.
pub fn validate_rules(rules: Vec<RuleInput>) -> Result<Vec<Rule>, ValidationError> {
	let mut seen = HashSet::with_capacity(rules.len());
	let mut validated = Vec::with_capacity(rules.len());

	for (index, input) in rules.into_iter().enumerate() {
		let rule = validate_rule(index, input)?;
		if !seen.insert(rule.id.clone()) {
			return Err(ValidationError::DuplicateRuleId(rule.id));
		}
		validated.push(rule);
	}

	Ok(validated)
}

fn validate_rule(index: usize, input: RuleInput) -> Result<Rule, ValidationError> {
	let id = string_field(input.id, "id")
		.and_then(|id| id.ok_or_else(|| "missing id".to_string()))
		.map_err(|e| ValidationError::rule(index, e))?;

	let rule_type: RuleType = string_field(input.rule_type, "type")
		.and_then(|t| t.ok_or_else(|| "missing type".to_string()))
		.and_then(|t| t.parse::<RuleType>())
		.map_err(|e| ValidationError::rule(index, e))?;

	let value = input
		.value
		.as_ref()
		.and_then(|v| v.as_bool())
		.ok_or_else(|| ValidationError::rule(index, "value must be a boolean"))?;

	let priority = input
		.priority
		.as_ref()
		.and_then(|p| p.as_i64())
		.ok_or_else(|| ValidationError::rule(index, "priority must be an integer"))?;

	let conditions = match input.conditions {
		Some(Value::Array(conditions)) if !conditions.is_empty() => conditions,
		_ => {
			return Err(ValidationError::rule(
				index,
				"conditions must be a non-empty list",
			))
		}
	};

	let conditions = conditions
		.into_iter()
		.enumerate()
		.map(|(i, c)| {
			validate_condition(c)
				.map_err(|e| ValidationError::rule(index, format!("condition {}: {}", i, e)))
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(Rule {
		id,
		rule_type,
		conditions,
		value,
		priority,
	})
}

fn validate_condition(raw: Value) -> Result<Condition, String> {
	if !raw.is_object() {
		return Err("must be an object".to_string());
	}
	let input = ConditionInput::deserialize(raw).map_err(|e| e.to_string())?;

	let field = string_field(input.field, "field")?.ok_or_else(|| "missing field".to_string())?;

	let operator: ConditionOperator = string_field(input.operator, "operator")?
		.ok_or_else(|| "missing operator".to_string())?
		.parse()?;

	let value = input.value.ok_or_else(|| "missing value".to_string())?;

	Ok(Condition {
		field,
		operator,
		value,
	})
}

/// Reads an optional string field. Absent, `null` and empty strings count as missing.
fn string_field(value: Option<Value>, name: &str) -> Result<Option<String>, String> {
	match value {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(s)) if s.is_empty() => Ok(None),
		Some(Value::String(s)) => Ok(Some(s)),
		Some(_) => Err(format!("{} must be a string", name)),
	}
}
