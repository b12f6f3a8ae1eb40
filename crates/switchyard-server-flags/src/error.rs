// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for flags server operations.

use switchyard_flags_core::{FlagsError, ValidationError};
use thiserror::Error;

/// Result type for flags server operations.
pub type Result<T> = std::result::Result<T, FlagsServerError>;

/// Errors that can occur in flags server operations.
#[derive(Debug, Error)]
pub enum FlagsServerError {
	#[error("validation failed: {0}")]
	Validation(#[from] ValidationError),

	#[error("flag not found: {0}")]
	FlagNotFound(String),

	#[error("flag key already exists: {0}")]
	DuplicateKey(String),

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

/// Coarse classification callers use to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Bad flag input; fix and retry
	Validation,
	/// Referenced flag does not exist
	NotFound,
	/// Flag key already taken
	Conflict,
	/// Storage or other failure outside the caller's control
	Infrastructure,
}

impl FlagsServerError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation(_) | Self::InvalidRequest(_) => ErrorKind::Validation,
			Self::FlagNotFound(_) => ErrorKind::NotFound,
			Self::DuplicateKey(_) => ErrorKind::Conflict,
			Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => {
				ErrorKind::Infrastructure
			}
		}
	}
}

impl From<FlagsError> for FlagsServerError {
	fn from(err: FlagsError) -> Self {
		match err {
			FlagsError::Validation(e) => Self::Validation(e),
			FlagsError::InvalidRequest(msg) => Self::InvalidRequest(msg),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kinds() {
		assert_eq!(
			FlagsServerError::from(ValidationError::EmptyKey).kind(),
			ErrorKind::Validation
		);
		assert_eq!(
			FlagsServerError::InvalidRequest("bad".into()).kind(),
			ErrorKind::Validation
		);
		assert_eq!(
			FlagsServerError::FlagNotFound("x".into()).kind(),
			ErrorKind::NotFound
		);
		assert_eq!(
			FlagsServerError::DuplicateKey("x".into()).kind(),
			ErrorKind::Conflict
		);
		assert_eq!(
			FlagsServerError::Database(sqlx::Error::PoolTimedOut).kind(),
			ErrorKind::Infrastructure
		);
	}

	#[test]
	fn test_from_core_error() {
		let err = FlagsServerError::from(FlagsError::InvalidRequest("no".into()));
		assert!(matches!(err, FlagsServerError::InvalidRequest(msg) if msg == "no"));

		let err = FlagsServerError::from(FlagsError::Validation(ValidationError::EmptyName));
		assert!(matches!(err, FlagsServerError::Validation(ValidationError::EmptyName)));
	}
}
