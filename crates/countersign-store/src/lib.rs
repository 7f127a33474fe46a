//! Countersign Store
//!
//! This crate provides the storage trait and implementations for approval
//! workflows. A workflow is saved whole and replaced whole on every
//! transition; the history is additionally kept as append-only rows.
//!
//! The [`Store`] trait defines operations for:
//! - Creating workflows and loading them by id
//! - Replacing a workflow guarded by an optimistic version check
//! - Listing workflows by status or requester
//! - Reading a workflow's history

mod memory;
mod sqlite;
mod types;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use types::{HistoryRow, WorkflowRow};

use async_trait::async_trait;
use countersign_workflow::{AggregateStatus, HistoryRecord, Workflow};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested workflow was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A workflow with this id already exists.
  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// The stored workflow moved past the version the caller started from.
  #[error("workflow {workflow_id} changed concurrently (expected version {expected})")]
  Conflict { workflow_id: String, expected: u64 },

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// A database migration failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for approval workflows.
#[async_trait]
pub trait Store: Send + Sync {
  /// Save a new workflow.
  async fn create_workflow(&self, workflow: &Workflow) -> Result<(), Error>;

  /// Get a workflow by ID.
  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error>;

  /// Replace a stored workflow, provided its stored version is still
  /// `expected_version`. Fails with [`Error::Conflict`] otherwise.
  async fn update_workflow(&self, workflow: &Workflow, expected_version: u64) -> Result<(), Error>;

  /// List workflows, optionally filtered by aggregate status, newest first.
  async fn list_workflows(&self, status: Option<AggregateStatus>) -> Result<Vec<Workflow>, Error>;

  /// List workflows opened by `email`, newest first.
  async fn list_requested_by(&self, email: &str) -> Result<Vec<Workflow>, Error>;

  /// A workflow's history in sequence order.
  async fn history(&self, workflow_id: &str) -> Result<Vec<HistoryRecord>, Error>;
}
