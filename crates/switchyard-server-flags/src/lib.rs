// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flags server implementation for Switchyard.
//!
//! This crate provides storage, evaluation and the service facade for the
//! feature flags system.
//!
//! # Architecture
//!
//! - `db` - SQLite pool creation and schema setup
//! - `repository` - Database operations for flag definitions
//! - `evaluation` - Rule-based flag evaluation engine
//! - `service` - CRUD and evaluation entry points used by callers
//!
//! # Example
//!
//! ```ignore
//! use switchyard_server_flags::{create_pool, ensure_schema, FlagsService, SqliteFlagsRepository};
//! use switchyard_flags_core::EvaluationContext;
//!
//! let pool = create_pool("sqlite:./switchyard.db").await?;
//! ensure_schema(&pool).await?;
//!
//! let service = FlagsService::new(SqliteFlagsRepository::new(pool));
//! let context = EvaluationContext::new().with_user_id("user123");
//! let result = service.evaluate("new-checkout", &context).await?;
//! ```

pub mod db;
pub mod error;
pub mod evaluation;
pub mod repository;
pub mod service;

pub use db::{create_pool, ensure_schema};
pub use error::{ErrorKind, FlagsServerError, Result};
pub use evaluation::{evaluate_flag, evaluate_flag_at};
pub use repository::{FlagsRepository, SqliteFlagsRepository};
pub use service::FlagsService;

// Re-export core types for convenience
pub use switchyard_flags_core::*;
