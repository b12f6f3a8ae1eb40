// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the flag model.

use thiserror::Error;

/// Result type for flag operations.
pub type Result<T> = std::result::Result<T, FlagsError>;

/// A flag definition failed validation.
///
/// Validation short-circuits: the first offending field in the order
/// key, name, rules is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("flag key must not be empty")]
	EmptyKey,

	#[error("invalid flag key {0:?}: only letters, digits, '-' and '_' are allowed")]
	InvalidKey(String),

	#[error("flag name must not be empty")]
	EmptyName,

	#[error("flag name is {len} characters, maximum is {max}")]
	NameTooLong { len: usize, max: usize },

	#[error("invalid rule at index {index}: {reason}")]
	InvalidRule { index: usize, reason: String },

	#[error("duplicate rule id {0:?}")]
	DuplicateRuleId(String),
}

impl ValidationError {
	/// Name of the flag field this error refers to.
	pub fn field(&self) -> &'static str {
		match self {
			Self::EmptyKey | Self::InvalidKey(_) => "key",
			Self::EmptyName | Self::NameTooLong { .. } => "name",
			Self::InvalidRule { .. } | Self::DuplicateRuleId(_) => "rules",
		}
	}

	pub(crate) fn rule(index: usize, reason: impl Into<String>) -> Self {
		Self::InvalidRule {
			index,
			reason: reason.into(),
		}
	}
}

/// Errors that can occur in flag operations.
#[derive(Debug, Error)]
pub enum FlagsError {
	#[error("validation failed: {0}")]
	Validation(#[from] ValidationError),

	#[error("invalid request: {0}")]
	InvalidRequest(String),
}
