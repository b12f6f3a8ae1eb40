// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Targeting rules and their conditions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serde_helpers::present;

/// Classification tag for a rule.
///
/// The tag describes intent only. Matching is driven entirely by the rule's
/// conditions, so a `Percentage` rule is matched like any other condition set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
	UserId,
	Email,
	Role,
	Percentage,
	CustomAttribute,
}

impl fmt::Display for RuleType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::UserId => write!(f, "user_id"),
			Self::Email => write!(f, "email"),
			Self::Role => write!(f, "role"),
			Self::Percentage => write!(f, "percentage"),
			Self::CustomAttribute => write!(f, "custom_attribute"),
		}
	}
}

impl FromStr for RuleType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user_id" => Ok(Self::UserId),
			"email" => Ok(Self::Email),
			"role" => Ok(Self::Role),
			"percentage" => Ok(Self::Percentage),
			"custom_attribute" => Ok(Self::CustomAttribute),
			_ => Err(format!("unknown rule type: {}", s)),
		}
	}
}

/// Comparison operator for a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
	Equals,
	NotEquals,
	Contains,
	NotContains,
	GreaterThan,
	LessThan,
	In,
	NotIn,
}

impl ConditionOperator {
	/// Applies the operator to a resolved context value and the condition operand.
	///
	/// `actual` is `None` when the context has no value for the field. Type
	/// mismatches never fail, they simply do not match. Note that `NotEquals`
	/// and `NotIn` match an absent value.
	pub fn evaluate(&self, actual: Option<&Value>, expected: &Value) -> bool {
		match self {
			Self::Equals => actual.is_some_and(|a| strict_equals(a, expected)),
			Self::NotEquals => !actual.is_some_and(|a| strict_equals(a, expected)),
			Self::Contains => match (actual, expected) {
				(Some(Value::String(a)), Value::String(e)) => a.contains(e.as_str()),
				_ => false,
			},
			Self::NotContains => match (actual, expected) {
				(Some(Value::String(a)), Value::String(e)) => !a.contains(e.as_str()),
				_ => false,
			},
			Self::GreaterThan => compare_numbers(actual, expected).is_some_and(|(a, e)| a > e),
			Self::LessThan => compare_numbers(actual, expected).is_some_and(|(a, e)| a < e),
			Self::In => match expected {
				Value::Array(items) => actual.is_some_and(|a| contains_value(items, a)),
				_ => false,
			},
			Self::NotIn => match expected {
				Value::Array(items) => !actual.is_some_and(|a| contains_value(items, a)),
				_ => false,
			},
		}
	}
}

impl fmt::Display for ConditionOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Equals => write!(f, "equals"),
			Self::NotEquals => write!(f, "not_equals"),
			Self::Contains => write!(f, "contains"),
			Self::NotContains => write!(f, "not_contains"),
			Self::GreaterThan => write!(f, "greater_than"),
			Self::LessThan => write!(f, "less_than"),
			Self::In => write!(f, "in"),
			Self::NotIn => write!(f, "not_in"),
		}
	}
}

impl FromStr for ConditionOperator {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"equals" => Ok(Self::Equals),
			"not_equals" => Ok(Self::NotEquals),
			"contains" => Ok(Self::Contains),
			"not_contains" => Ok(Self::NotContains),
			"greater_than" => Ok(Self::GreaterThan),
			"less_than" => Ok(Self::LessThan),
			"in" => Ok(Self::In),
			"not_in" => Ok(Self::NotIn),
			_ => Err(format!("unknown operator: {}", s)),
		}
	}
}

/// Strict equality over scalar JSON values.
///
/// Numbers compare by numeric value, so `1` equals `1.0`. Arrays and objects
/// never compare equal.
fn strict_equals(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
		(Value::String(a), Value::String(b)) => a == b,
		(Value::Bool(a), Value::Bool(b)) => a == b,
		(Value::Null, Value::Null) => true,
		_ => false,
	}
}

fn contains_value(items: &[Value], needle: &Value) -> bool {
	items.iter().any(|item| strict_equals(item, needle))
}

fn compare_numbers(actual: Option<&Value>, expected: &Value) -> Option<(f64, f64)> {
	match (actual?, expected) {
		(Value::Number(a), Value::Number(e)) => Some((a.as_f64()?, e.as_f64()?)),
		_ => None,
	}
}

/// A single field/operator/value predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
	/// `userId`, `userEmail`, `role`, or an attribute name
	pub field: String,
	pub operator: ConditionOperator,
	pub value: Value,
}

/// A prioritised group of AND-combined conditions mapping to a boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
	/// Unique within the owning flag
	pub id: String,
	#[serde(rename = "type")]
	pub rule_type: RuleType,
	pub conditions: Vec<Condition>,
	pub value: bool,
	/// Higher values are evaluated first
	pub priority: i64,
}

/// Unvalidated rule as supplied by a caller.
///
/// Fields are kept as raw JSON so that a missing or mistyped field surfaces as
/// a validation error naming the rule, rather than as a decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleInput {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub rule_type: Option<Value>,
	/// Expected to be an array of condition objects
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub conditions: Option<Value>,
	#[serde(
		default,
		deserialize_with = "present",
		skip_serializing_if = "Option::is_none"
	)]
	pub value: Option<Value>,
	#[serde(
		default,
		deserialize_with = "present",
		skip_serializing_if = "Option::is_none"
	)]
	pub priority: Option<Value>,
}

/// Unvalidated condition as supplied by a caller.
///
/// `value` distinguishes an absent operand (`None`) from an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionInput {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub field: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub operator: Option<Value>,
	#[serde(
		default,
		deserialize_with = "present",
		skip_serializing_if = "Option::is_none"
	)]
	pub value: Option<Value>,
}

impl From<Condition> for ConditionInput {
	fn from(condition: Condition) -> Self {
		Self {
			field: Some(Value::String(condition.field)),
			operator: Some(Value::String(condition.operator.to_string())),
			value: Some(condition.value),
		}
	}
}

impl From<ConditionInput> for Value {
	fn from(input: ConditionInput) -> Self {
		let mut map = serde_json::Map::new();
		if let Some(field) = input.field {
			map.insert("field".to_string(), field);
		}
		if let Some(operator) = input.operator {
			map.insert("operator".to_string(), operator);
		}
		if let Some(value) = input.value {
			map.insert("value".to_string(), value);
		}
		Value::Object(map)
	}
}

impl From<Rule> for RuleInput {
	fn from(rule: Rule) -> Self {
		let conditions = rule
			.conditions
			.into_iter()
			.map(|c| Value::from(ConditionInput::from(c)))
			.collect();

		Self {
			id: Some(Value::String(rule.id)),
			rule_type: Some(Value::String(rule.rule_type.to_string())),
			conditions: Some(Value::Array(conditions)),
			value: Some(Value::Bool(rule.value)),
			priority: Some(Value::from(rule.priority)),
		}
	}
}
