// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Switchyard feature flags system.
//!
//! This crate provides the flag model, the validator that guards it and the
//! evaluation context. It performs no I/O; the evaluation engine and storage
//! live in `switchyard-server-flags`.
//!
//! # Overview
//!
//! - A [`FlagDefinition`] is a boolean flag with a default value, an optional
//!   expiry and a set of prioritised [`Rule`]s
//! - A rule matches when all of its [`Condition`]s hold against the
//!   [`EvaluationContext`]
//! - Flags are only constructible from input that passes validation
//!
//! # Example
//!
//! ```
//! use switchyard_flags_core::{
//!     EvaluationContext, FlagDefinition, NewFlag, RuleInput, UserId,
//! };
//!
//! let rule: RuleInput = serde_json::from_value(serde_json::json!({
//!     "id": "staff",
//!     "type": "email",
//!     "conditions": [{"field": "userEmail", "operator": "contains", "value": "@example.com"}],
//!     "value": true,
//!     "priority": 10
//! }))
//! .unwrap();
//!
//! let flag = FlagDefinition::new(
//!     NewFlag::new("new-checkout", "New checkout", UserId::new())
//!         .with_enabled(true)
//!         .with_rule(rule),
//! )
//! .unwrap();
//! assert_eq!(flag.rules().len(), 1);
//!
//! let ctx = EvaluationContext::new().with_user_email("dev@example.com");
//! assert!(ctx.resolve("userEmail").is_some());
//! ```

pub mod error;
pub mod evaluation;
pub mod flag;
pub mod rule;
mod serde_helpers;
pub mod validation;

pub use error::{FlagsError, Result, ValidationError};
pub use evaluation::{EvaluationContext, EvaluationReason, EvaluationResult};
pub use flag::{FlagDefinition, FlagId, FlagRecord, FlagUpdate, NewFlag, UserId};
pub use rule::{Condition, ConditionInput, ConditionOperator, Rule, RuleInput, RuleType};
pub use validation::{validate_key, validate_name, validate_rules, MAX_NAME_LEN};
