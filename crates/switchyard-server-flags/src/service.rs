// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag CRUD and evaluation on top of a [`FlagsRepository`].

use switchyard_flags_core::{
	EvaluationContext, EvaluationResult, FlagDefinition, FlagId, FlagUpdate, NewFlag,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorKind, FlagsServerError, Result};
use crate::evaluation::{evaluate_flag, evaluate_resolved};
use crate::repository::FlagsRepository;

/// Entry point for callers such as an HTTP layer or the CLI.
///
/// The repository is passed in explicitly; the service holds no other state.
#[derive(Clone)]
pub struct FlagsService<R> {
	repo: R,
}

impl<R: FlagsRepository> FlagsService<R> {
	pub fn new(repo: R) -> Self {
		Self { repo }
	}

	/// Validates and stores a new flag.
	#[instrument(skip(self, input), fields(flag_key = %input.key))]
	pub async fn create_flag(&self, input: NewFlag) -> Result<FlagDefinition> {
		let flag = FlagDefinition::new(input).inspect_err(|e| {
			debug!(field = e.field(), error = %e, "flag rejected");
		})?;

		if self.repo.find_by_key(flag.key()).await.inspect_err(log_failure)?.is_some() {
			return Err(FlagsServerError::DuplicateKey(flag.key().to_string()));
		}

		self.repo.create_flag(&flag).await.inspect_err(log_failure)?;
		info!(flag_id = %flag.id(), flag_key = %flag.key(), "flag created");
		Ok(flag)
	}

	/// Applies a whole-field update. Nothing is stored unless every replaced
	/// field is valid and the resulting key is free.
	#[instrument(skip(self, update), fields(flag_id = %id))]
	pub async fn update_flag(&self, id: FlagId, update: FlagUpdate) -> Result<FlagDefinition> {
		let current = self.get_flag(id).await?;
		let next = current.apply_update(update).inspect_err(|e| {
			debug!(field = e.field(), error = %e, "flag update rejected");
		})?;

		if next.key() != current.key() {
			let existing = self.repo.find_by_key(next.key()).await.inspect_err(log_failure)?;
			if existing.is_some_and(|other| other.id() != id) {
				return Err(FlagsServerError::DuplicateKey(next.key().to_string()));
			}
		}

		if !self.repo.update_flag(&next).await.inspect_err(log_failure)? {
			return Err(FlagsServerError::FlagNotFound(id.to_string()));
		}

		info!(flag_key = %next.key(), "flag updated");
		Ok(next)
	}

	/// Deletes a flag by id. Returns false if there was nothing to delete.
	#[instrument(skip(self), fields(flag_id = %id))]
	pub async fn delete_flag(&self, id: FlagId) -> Result<bool> {
		let deleted = self.repo.delete_flag(id).await.inspect_err(log_failure)?;
		if deleted {
			info!("flag deleted");
		}
		Ok(deleted)
	}

	#[instrument(skip(self), fields(flag_id = %id))]
	pub async fn get_flag(&self, id: FlagId) -> Result<FlagDefinition> {
		self
			.repo
			.find_by_id(id)
			.await
			.inspect_err(log_failure)?
			.ok_or_else(|| FlagsServerError::FlagNotFound(id.to_string()))
	}

	#[instrument(skip(self), fields(flag_key = %key))]
	pub async fn get_flag_by_key(&self, key: &str) -> Result<FlagDefinition> {
		self
			.repo
			.find_by_key(key.trim())
			.await
			.inspect_err(log_failure)?
			.ok_or_else(|| FlagsServerError::FlagNotFound(key.to_string()))
	}

	#[instrument(skip(self))]
	pub async fn list_flags(&self) -> Result<Vec<FlagDefinition>> {
		self.repo.find_all().await.inspect_err(log_failure)
	}

	/// Evaluates the flag with `flag_key` for `context`.
	///
	/// Fails with `InvalidRequest` if the context is malformed and with
	/// `FlagNotFound` if no such flag exists.
	#[instrument(skip(self, context), fields(flag_key = %flag_key))]
	pub async fn evaluate(
		&self,
		flag_key: &str,
		context: &EvaluationContext,
	) -> Result<EvaluationResult> {
		context.validate()?;

		let flag = self
			.repo
			.find_by_key(flag_key.trim())
			.await
			.inspect_err(log_failure)?;
		evaluate_resolved(flag_key, flag.as_ref(), context)
	}

	/// Evaluates every stored flag for one context, ordered by key.
	#[instrument(skip(self, context))]
	pub async fn evaluate_all(&self, context: &EvaluationContext) -> Result<Vec<EvaluationResult>> {
		context.validate()?;

		let flags = self.repo.find_all().await.inspect_err(log_failure)?;
		Ok(flags.iter().map(|flag| evaluate_flag(flag, context)).collect())
	}
}

fn log_failure(err: &FlagsServerError) {
	if err.kind() == ErrorKind::Infrastructure {
		warn!(error = %err, "flag repository failure");
	}
}
