// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use switchyard_flags_core::{
	Condition, EvaluationContext, EvaluationReason, EvaluationResult, FlagDefinition, Rule,
};
use tracing::debug;

use crate::error::{FlagsServerError, Result};

/// Evaluates a flag for a given context at the current time.
pub fn evaluate_flag(flag: &FlagDefinition, context: &EvaluationContext) -> EvaluationResult {
	evaluate_flag_at(flag, context, Utc::now())
}

/// Evaluates a flag for a given context as of `now`.
///
/// The evaluation order is:
/// 1. Disabled or expired flags return the default value without consulting rules
/// 2. Rules are ordered by descending priority; equal priorities keep their stored order
/// 3. The first rule whose conditions all hold supplies the value
/// 4. Otherwise the default value is returned
///
/// This never fails: conditions that cannot be compared simply do not match.
pub fn evaluate_flag_at(
	flag: &FlagDefinition,
	context: &EvaluationContext,
	now: DateTime<Utc>,
) -> EvaluationResult {
	let result = if !flag.is_active_at(now) {
		default_result(flag)
	} else {
		rules_by_priority(flag.rules())
			.into_iter()
			.find(|rule| rule_matches(rule, context))
			.map(|rule| EvaluationResult::new(flag.key(), rule.value, EvaluationReason::RuleMatch))
			.unwrap_or_else(|| default_result(flag))
	};

	debug!(
		flag_key = %result.flag_key,
		value = result.value,
		reason = %result.reason,
		"flag evaluated"
	);
	result
}

/// Evaluates a flag that may not have been found.
///
/// Absent flags are an error, never silently defaulted.
pub fn evaluate_resolved(
	flag_key: &str,
	flag: Option<&FlagDefinition>,
	context: &EvaluationContext,
) -> Result<EvaluationResult> {
	match flag {
		Some(flag) => Ok(evaluate_flag(flag, context)),
		None => Err(FlagsServerError::FlagNotFound(flag_key.to_string())),
	}
}

/// Rules in evaluation order. `sort_by_key` is stable, so ties keep stored order.
fn rules_by_priority(rules: &[Rule]) -> Vec<&Rule> {
	let mut ordered: Vec<&Rule> = rules.iter().collect();
	ordered.sort_by_key(|rule| Reverse(rule.priority));
	ordered
}

/// Evaluates all conditions (AND logic).
fn rule_matches(rule: &Rule, context: &EvaluationContext) -> bool {
	rule
		.conditions
		.iter()
		.all(|cond| condition_matches(cond, context))
}

fn condition_matches(condition: &Condition, context: &EvaluationContext) -> bool {
	let actual = context.resolve(&condition.field);
	condition
		.operator
		.evaluate(actual.as_deref(), &condition.value)
}

fn default_result(flag: &FlagDefinition) -> EvaluationResult {
	EvaluationResult::new(flag.key(), flag.default_value(), EvaluationReason::Default)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use serde_json::json;
	use switchyard_flags_core::{NewFlag, RuleInput, UserId};

	fn rule(
		id: &str,
		field: &str,
		operator: &str,
		operand: serde_json::Value,
		value: bool,
		priority: i64,
	) -> RuleInput {
		serde_json::from_value(json!({
			"id": id,
			"type": "custom_attribute",
			"conditions": [{"field": field, "operator": operator, "value": operand}],
			"value": value,
			"priority": priority
		}))
		.unwrap()
	}

	fn flag(enabled: bool, default_value: bool, rules: Vec<RuleInput>) -> FlagDefinition {
		let mut input = NewFlag::new("test-feature", "Test Feature", UserId::new())
			.with_enabled(enabled)
			.with_default_value(default_value);
		input.rules = rules;
		FlagDefinition::new(input).unwrap()
	}

	#[test]
	fn test_user_id_rule_matches() {
		let flag = flag(true, false, vec![rule("r1", "userId", "equals", json!("u1"), true, 1)]);

		let result = evaluate_flag(&flag, &EvaluationContext::new().with_user_id("u1"));
		assert_eq!(result, EvaluationResult::new("test-feature", true, EvaluationReason::RuleMatch));

		let result = evaluate_flag(&flag, &EvaluationContext::new().with_user_id("u2"));
		assert_eq!(result, EvaluationResult::new("test-feature", false, EvaluationReason::Default));
	}

	#[test]
	fn test_disabled_flag_short_circuits() {
		let flag = flag(false, true, vec![rule("r1", "userId", "equals", json!("u1"), false, 1)]);

		let result = evaluate_flag(&flag, &EvaluationContext::new().with_user_id("u1"));
		assert!(result.value);
		assert_eq!(result.reason, EvaluationReason::Default);
	}

	#[test]
	fn test_expired_flag_returns_default() {
		let now = Utc::now();
		let mut input = NewFlag::new("expiring", "Expiring", UserId::new())
			.with_enabled(true)
			.with_expires_at(now - Duration::hours(1));
		input.rules = vec![rule("r1", "userId", "equals", json!("u1"), true, 1)];
		let flag = FlagDefinition::new(input).unwrap();

		let ctx = EvaluationContext::new().with_user_id("u1");
		let result = evaluate_flag_at(&flag, &ctx, now);
		assert_eq!(result, EvaluationResult::new("expiring", false, EvaluationReason::Default));

		// Before the expiry the rule still applies.
		let result = evaluate_flag_at(&flag, &ctx, now - Duration::hours(2));
		assert_eq!(result.reason, EvaluationReason::RuleMatch);
	}

	#[test]
	fn test_role_in_list() {
		let flag = flag(
			true,
			false,
			vec![rule("staff", "role", "in", json!(["admin", "owner"]), true, 1)],
		);

		let admin = evaluate_flag(&flag, &EvaluationContext::new().with_user_role("admin"));
		assert_eq!(admin.reason, EvaluationReason::RuleMatch);
		assert!(admin.value);

		let user = evaluate_flag(&flag, &EvaluationContext::new().with_user_role("user"));
		assert_eq!(user.reason, EvaluationReason::Default);
		assert!(!user.value);
	}

	#[test]
	fn test_higher_priority_wins_regardless_of_order() {
		let low = rule("low", "plan", "equals", json!("pro"), false, 1);
		let high = rule("high", "plan", "equals", json!("pro"), true, 2);
		let ctx = EvaluationContext::new().with_attribute("plan", json!("pro"));

		for rules in [vec![low.clone(), high.clone()], vec![high, low]] {
			let result = evaluate_flag(&flag(true, false, rules), &ctx);
			assert_eq!(result, EvaluationResult::new("test-feature", true, EvaluationReason::RuleMatch));
		}
	}

	#[test]
	fn test_equal_priority_keeps_stored_order() {
		let ctx = EvaluationContext::new().with_attribute("plan", json!("pro"));

		let first_true = flag(
			true,
			false,
			vec![
				rule("a", "plan", "equals", json!("pro"), true, 5),
				rule("b", "plan", "equals", json!("pro"), false, 5),
			],
		);
		assert!(evaluate_flag(&first_true, &ctx).value);

		let first_false = flag(
			true,
			true,
			vec![
				rule("b", "plan", "equals", json!("pro"), false, 5),
				rule("a", "plan", "equals", json!("pro"), true, 5),
			],
		);
		let result = evaluate_flag(&first_false, &ctx);
		assert!(!result.value);
		assert_eq!(result.reason, EvaluationReason::RuleMatch);
	}

	#[test]
	fn test_non_matching_higher_priority_falls_through() {
		let flag = flag(
			true,
			false,
			vec![
				rule("beta", "beta", "equals", json!(true), false, 10),
				rule("pro", "plan", "equals", json!("pro"), true, 1),
			],
		);
		let ctx = EvaluationContext::new().with_attribute("plan", json!("pro"));

		let result = evaluate_flag(&flag, &ctx);
		assert_eq!(result, EvaluationResult::new("test-feature", true, EvaluationReason::RuleMatch));
	}

	#[test]
	fn test_all_conditions_must_hold() {
		let input: RuleInput = serde_json::from_value(json!({
			"id": "enterprise-us",
			"type": "custom_attribute",
			"conditions": [
				{"field": "plan", "operator": "equals", "value": "enterprise"},
				{"field": "seats", "operator": "greater_than", "value": 50}
			],
			"value": true,
			"priority": 1
		}))
		.unwrap();
		let flag = flag(true, false, vec![input]);

		let both = EvaluationContext::new()
			.with_attribute("plan", json!("enterprise"))
			.with_attribute("seats", json!(100));
		assert_eq!(evaluate_flag(&flag, &both).reason, EvaluationReason::RuleMatch);

		let one = EvaluationContext::new()
			.with_attribute("plan", json!("enterprise"))
			.with_attribute("seats", json!(10));
		assert_eq!(evaluate_flag(&flag, &one).reason, EvaluationReason::Default);
	}

	#[test]
	fn test_type_mismatch_does_not_match() {
		let flag = flag(
			true,
			false,
			vec![
				rule("contains", "seats", "contains", json!("1"), true, 2),
				rule("gt", "plan", "greater_than", json!(1), true, 1),
			],
		);
		let ctx = EvaluationContext::new()
			.with_attribute("seats", json!(100))
			.with_attribute("plan", json!("pro"));

		assert_eq!(
			evaluate_flag(&flag, &ctx),
			EvaluationResult::new("test-feature", false, EvaluationReason::Default)
		);
	}

	#[test]
	fn test_percentage_rule_matches_literally() {
		let input: RuleInput = serde_json::from_value(json!({
			"id": "half",
			"type": "percentage",
			"conditions": [{"field": "percentage", "operator": "less_than", "value": 50}],
			"value": true,
			"priority": 1
		}))
		.unwrap();
		let flag = flag(true, false, vec![input]);

		let in_bucket = EvaluationContext::new().with_attribute("percentage", json!(20));
		assert!(evaluate_flag(&flag, &in_bucket).value);

		// No hashing of the user id takes place.
		let no_attr = EvaluationContext::new().with_user_id("u1");
		assert!(!evaluate_flag(&flag, &no_attr).value);
	}

	#[test]
	fn test_empty_context_against_negative_operators() {
		let flag = flag(
			true,
			false,
			vec![rule("not-blocked", "userId", "not_in", json!(["blocked"]), true, 1)],
		);

		let result = evaluate_flag(&flag, &EvaluationContext::new());
		assert_eq!(result.reason, EvaluationReason::RuleMatch);
	}

	#[test]
	fn test_evaluate_resolved_missing_flag() {
		let err = evaluate_resolved("missing", None, &EvaluationContext::new()).unwrap_err();
		assert!(matches!(err, FlagsServerError::FlagNotFound(key) if key == "missing"));

		let flag = flag(true, true, vec![]);
		let result = evaluate_resolved("test-feature", Some(&flag), &EvaluationContext::new()).unwrap();
		assert_eq!(result.reason, EvaluationReason::Default);
		assert!(result.value);
	}

	#[test]
	fn test_evaluation_shares_flag_across_threads() {
		let flag = std::sync::Arc::new(flag(
			true,
			false,
			vec![rule("r1", "userId", "equals", json!("u1"), true, 1)],
		));

		let handles: Vec<_> = (0..8)
			.map(|i| {
				let flag = std::sync::Arc::clone(&flag);
				std::thread::spawn(move || {
					let user = if i % 2 == 0 { "u1" } else { "u2" };
					evaluate_flag(&flag, &EvaluationContext::new().with_user_id(user)).value
				})
			})
			.collect();

		for (i, handle) in handles.into_iter().enumerate() {
			assert_eq!(handle.join().unwrap(), i % 2 == 0);
		}
	}
}
