// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::instrument;

use switchyard_flags_core::{FlagDefinition, FlagId, FlagRecord, Rule};

use crate::error::{FlagsServerError, Result};

/// Repository trait for feature flag storage.
///
/// Implementations persist already-validated definitions and hand back
/// fully-materialized ones. Storage failures are reported as errors distinct
/// from "not found" (`Ok(None)` / `Ok(false)`).
#[async_trait]
pub trait FlagsRepository: Send + Sync {
	async fn find_by_key(&self, key: &str) -> Result<Option<FlagDefinition>>;
	async fn find_by_id(&self, id: FlagId) -> Result<Option<FlagDefinition>>;
	async fn find_all(&self) -> Result<Vec<FlagDefinition>>;

	/// Inserts a new flag. Fails with `DuplicateKey` if the key is taken.
	async fn create_flag(&self, flag: &FlagDefinition) -> Result<()>;

	/// Replaces the stored flag with the same id. Returns false if it does not exist.
	async fn update_flag(&self, flag: &FlagDefinition) -> Result<bool>;

	async fn delete_flag(&self, id: FlagId) -> Result<bool>;
}

/// SQLite implementation of the flags repository.
#[derive(Clone)]
pub struct SqliteFlagsRepository {
	pool: SqlitePool,
}

impl SqliteFlagsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl FlagsRepository for SqliteFlagsRepository {
	#[instrument(skip(self), fields(flag_key = %key))]
	async fn find_by_key(&self, key: &str) -> Result<Option<FlagDefinition>> {
		let row = sqlx::query_as::<_, FlagRow>(
			r#"
			SELECT id, key, name, description, enabled, default_value, rules,
				   created_by, created_at, updated_at, expires_at
			FROM feature_flags
			WHERE key = ?
			"#,
		)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(flag_id = %id))]
	async fn find_by_id(&self, id: FlagId) -> Result<Option<FlagDefinition>> {
		let row = sqlx::query_as::<_, FlagRow>(
			r#"
			SELECT id, key, name, description, enabled, default_value, rules,
				   created_by, created_at, updated_at, expires_at
			FROM feature_flags
			WHERE id = ?
			"#,
		)
		.bind(id.0.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self))]
	async fn find_all(&self) -> Result<Vec<FlagDefinition>> {
		let rows = sqlx::query_as::<_, FlagRow>(
			r#"
			SELECT id, key, name, description, enabled, default_value, rules,
				   created_by, created_at, updated_at, expires_at
			FROM feature_flags
			ORDER BY key ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self, flag), fields(flag_id = %flag.id(), flag_key = %flag.key()))]
	async fn create_flag(&self, flag: &FlagDefinition) -> Result<()> {
		let rules_json = serde_json::to_string(flag.rules())?;

		sqlx::query(
			r#"
			INSERT INTO feature_flags (id, key, name, description, enabled, default_value, rules,
									   created_by, created_at, updated_at, expires_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(flag.id().0.to_string())
		.bind(flag.key())
		.bind(flag.name())
		.bind(flag.description())
		.bind(flag.enabled())
		.bind(flag.default_value())
		.bind(rules_json)
		.bind(flag.created_by().0.to_string())
		.bind(flag.created_at().to_rfc3339())
		.bind(flag.updated_at().to_rfc3339())
		.bind(flag.expires_at().map(|dt| dt.to_rfc3339()))
		.execute(&self.pool)
		.await
		.map_err(|e| map_unique_violation(e, flag.key()))?;

		Ok(())
	}

	#[instrument(skip(self, flag), fields(flag_id = %flag.id(), flag_key = %flag.key()))]
	async fn update_flag(&self, flag: &FlagDefinition) -> Result<bool> {
		let rules_json = serde_json::to_string(flag.rules())?;

		let result = sqlx::query(
			r#"
			UPDATE feature_flags
			SET key = ?, name = ?, description = ?, enabled = ?, default_value = ?,
				rules = ?, updated_at = ?, expires_at = ?
			WHERE id = ?
			"#,
		)
		.bind(flag.key())
		.bind(flag.name())
		.bind(flag.description())
		.bind(flag.enabled())
		.bind(flag.default_value())
		.bind(rules_json)
		.bind(flag.updated_at().to_rfc3339())
		.bind(flag.expires_at().map(|dt| dt.to_rfc3339()))
		.bind(flag.id().0.to_string())
		.execute(&self.pool)
		.await
		.map_err(|e| map_unique_violation(e, flag.key()))?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(flag_id = %id))]
	async fn delete_flag(&self, id: FlagId) -> Result<bool> {
		let result = sqlx::query(
			r#"
			DELETE FROM feature_flags WHERE id = ?
			"#,
		)
		.bind(id.0.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}
}

fn map_unique_violation(err: sqlx::Error, key: &str) -> FlagsServerError {
	match &err {
		sqlx::Error::Database(db) if db.is_unique_violation() => {
			FlagsServerError::DuplicateKey(key.to_string())
		}
		_ => FlagsServerError::Database(err),
	}
}

// Database row types for sqlx

#[derive(sqlx::FromRow)]
struct FlagRow {
	id: String,
	key: String,
	name: String,
	description: String,
	enabled: bool,
	default_value: bool,
	rules: String,
	created_by: String,
	created_at: String,
	updated_at: String,
	expires_at: Option<String>,
}

impl TryFrom<FlagRow> for FlagDefinition {
	type Error = FlagsServerError;

	fn try_from(row: FlagRow) -> Result<Self> {
		let rules: Vec<Rule> = serde_json::from_str(&row.rules)?;

		let record = FlagRecord {
			id: row
				.id
				.parse()
				.map_err(|_| FlagsServerError::Internal("Invalid flag ID".to_string()))?,
			key: row.key,
			name: row.name,
			description: row.description,
			enabled: row.enabled,
			default_value: row.default_value,
			rules,
			created_by: row
				.created_by
				.parse()
				.map_err(|_| FlagsServerError::Internal("Invalid user ID".to_string()))?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
			updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
			expires_at: row
				.expires_at
				.map(|s| parse_timestamp(&s, "expires_at"))
				.transpose()?,
		};

		FlagDefinition::try_from(record)
			.map_err(|e| FlagsServerError::Internal(format!("Stored flag is invalid: {e}")))
	}
}

fn parse_timestamp(value: &str, column: &str) -> Result<chrono::DateTime<chrono::Utc>> {
	chrono::DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&chrono::Utc))
		.map_err(|_| FlagsServerError::Internal(format!("Invalid {column}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::create_test_pool;
	use chrono::{Duration, Utc};
	use serde_json::json;
	use switchyard_flags_core::{FlagUpdate, NewFlag, RuleInput, UserId};

	async fn make_repo() -> SqliteFlagsRepository {
		SqliteFlagsRepository::new(create_test_pool().await)
	}

	fn make_flag(key: &str) -> FlagDefinition {
		let rule: RuleInput = serde_json::from_value(json!({
			"id": "admins",
			"type": "role",
			"conditions": [{"field": "role", "operator": "in", "value": ["admin", "owner"]}],
			"value": true,
			"priority": 10
		}))
		.unwrap();

		FlagDefinition::new(
			NewFlag::new(key, "Test Flag", UserId::new())
				.with_description("for tests")
				.with_enabled(true)
				.with_rule(rule)
				.with_expires_at(Utc::now() + Duration::days(30)),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_create_and_find_flag() {
		let repo = make_repo().await;
		let flag = make_flag("new-checkout");

		repo.create_flag(&flag).await.unwrap();

		let by_key = repo.find_by_key("new-checkout").await.unwrap().unwrap();
		assert_eq!(by_key, flag);

		let by_id = repo.find_by_id(flag.id()).await.unwrap().unwrap();
		assert_eq!(by_id, flag);
	}

	#[tokio::test]
	async fn test_find_missing_flag() {
		let repo = make_repo().await;
		assert!(repo.find_by_key("nope").await.unwrap().is_none());
		assert!(repo.find_by_id(FlagId::new()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_duplicate_key_rejected() {
		let repo = make_repo().await;
		repo.create_flag(&make_flag("dup")).await.unwrap();

		let err = repo.create_flag(&make_flag("dup")).await.unwrap_err();
		assert!(matches!(err, FlagsServerError::DuplicateKey(key) if key == "dup"));
	}

	#[tokio::test]
	async fn test_find_all_ordered_by_key() {
		let repo = make_repo().await;
		for key in ["charlie", "alpha", "bravo"] {
			repo.create_flag(&make_flag(key)).await.unwrap();
		}

		let keys: Vec<String> = repo
			.find_all()
			.await
			.unwrap()
			.iter()
			.map(|f| f.key().to_string())
			.collect();
		assert_eq!(keys, vec!["alpha", "bravo", "charlie"]);
	}

	#[tokio::test]
	async fn test_update_flag() {
		let repo = make_repo().await;
		let flag = make_flag("updatable");
		repo.create_flag(&flag).await.unwrap();

		let updated = flag
			.apply_update(FlagUpdate {
				key: Some("renamed".to_string()),
				enabled: Some(false),
				expires_at: Some(None),
				..Default::default()
			})
			.unwrap();
		assert!(repo.update_flag(&updated).await.unwrap());

		assert!(repo.find_by_key("updatable").await.unwrap().is_none());
		let stored = repo.find_by_key("renamed").await.unwrap().unwrap();
		assert_eq!(stored, updated);
		assert!(stored.expires_at().is_none());
	}

	#[tokio::test]
	async fn test_update_missing_flag_returns_false() {
		let repo = make_repo().await;
		assert!(!repo.update_flag(&make_flag("ghost")).await.unwrap());
	}

	#[tokio::test]
	async fn test_update_into_taken_key_rejected() {
		let repo = make_repo().await;
		repo.create_flag(&make_flag("taken")).await.unwrap();
		let other = make_flag("other");
		repo.create_flag(&other).await.unwrap();

		let clash = other
			.apply_update(FlagUpdate {
				key: Some("taken".to_string()),
				..Default::default()
			})
			.unwrap();
		let err = repo.update_flag(&clash).await.unwrap_err();
		assert!(matches!(err, FlagsServerError::DuplicateKey(_)));
	}

	#[tokio::test]
	async fn test_delete_flag() {
		let repo = make_repo().await;
		let flag = make_flag("doomed");
		repo.create_flag(&flag).await.unwrap();

		assert!(repo.delete_flag(flag.id()).await.unwrap());
		assert!(!repo.delete_flag(flag.id()).await.unwrap());
		assert!(repo.find_by_id(flag.id()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_corrupt_row_is_internal_error() {
		let pool = create_test_pool().await;
		sqlx::query(
			r#"
			INSERT INTO feature_flags (id, key, name, description, enabled, default_value, rules,
									   created_by, created_at, updated_at, expires_at)
			VALUES (?, 'bad key', 'Bad', '', 1, 0, '[]', ?, ?, ?, NULL)
			"#,
		)
		.bind(FlagId::new().0.to_string())
		.bind(UserId::new().0.to_string())
		.bind(Utc::now().to_rfc3339())
		.bind(Utc::now().to_rfc3339())
		.execute(&pool)
		.await
		.unwrap();

		let repo = SqliteFlagsRepository::new(pool);
		let err = repo.find_by_key("bad key").await.unwrap_err();
		assert!(matches!(err, FlagsServerError::Internal(_)));
	}
}
