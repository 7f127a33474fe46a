use std::path::Path;

use async_trait::async_trait;
use countersign_workflow::{AggregateStatus, HistoryRecord, Workflow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::types::{HistoryRow, WorkflowRow, version_column};
use crate::{Error, Store};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if missing) the database file at `path` and run
  /// migrations.
  pub async fn connect(path: &Path) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true)
      .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    debug!(path = %path.display(), "opened workflow database");
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }

  async fn exists(&self, workflow_id: &str) -> Result<bool, Error> {
    let found: Option<(String,)> =
      sqlx::query_as("SELECT workflow_id FROM workflows WHERE workflow_id = ?")
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;
    Ok(found.is_some())
  }
}

/// Append the history records written since the last stored sequence.
async fn append_history(
  tx: &mut Transaction<'_, Sqlite>,
  workflow: &Workflow,
) -> Result<(), Error> {
  let (stored,): (i64,) =
    sqlx::query_as("SELECT COALESCE(MAX(sequence), 0) FROM workflow_history WHERE workflow_id = ?")
      .bind(workflow.id())
      .fetch_one(&mut **tx)
      .await?;

  let pending = workflow.history().since(u64::try_from(stored).unwrap_or(0));
  for record in pending {
    let row = HistoryRow::from_record(workflow.id(), record);
    sqlx::query(
      r#"
            INSERT INTO workflow_history (workflow_id, sequence, epoch, actor_email, record, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&row.workflow_id)
    .bind(row.sequence)
    .bind(row.epoch)
    .bind(&row.actor_email)
    .bind(&row.record)
    .bind(row.recorded_at)
    .execute(&mut **tx)
    .await?;
  }
  debug!(workflow_id = %workflow.id(), appended = pending.len(), "history appended");
  Ok(())
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_workflow(&self, workflow: &Workflow) -> Result<(), Error> {
    let row = WorkflowRow::from_workflow(workflow);
    let mut tx = self.pool.begin().await?;

    let inserted = sqlx::query(
            r#"
            INSERT INTO workflows (workflow_id, title, requester_email, status, epoch, version, body, requested_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.workflow_id)
        .bind(&row.title)
        .bind(&row.requester_email)
        .bind(&row.status)
        .bind(row.epoch)
        .bind(row.version)
        .bind(&row.body)
        .bind(row.requested_at)
        .bind(row.completed_at)
        .execute(&mut *tx)
        .await;

    match inserted {
      Ok(_) => {}
      Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
        return Err(Error::AlreadyExists(row.workflow_id));
      }
      Err(e) => return Err(e.into()),
    }

    append_history(&mut tx, workflow).await?;
    tx.commit().await?;
    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error> {
    let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT workflow_id, title, requester_email, status, epoch, version, body, requested_at, completed_at
            FROM workflows
            WHERE workflow_id = ?
            "#,
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;

    row
      .map(WorkflowRow::into_workflow)
      .ok_or_else(|| Error::NotFound(workflow_id.to_string()))
  }

  async fn update_workflow(&self, workflow: &Workflow, expected_version: u64) -> Result<(), Error> {
    let row = WorkflowRow::from_workflow(workflow);
    let mut tx = self.pool.begin().await?;

    let updated = sqlx::query(
      r#"
            UPDATE workflows
            SET title = ?, status = ?, epoch = ?, version = ?, body = ?, completed_at = ?
            WHERE workflow_id = ? AND version = ?
            "#,
    )
    .bind(&row.title)
    .bind(&row.status)
    .bind(row.epoch)
    .bind(row.version)
    .bind(&row.body)
    .bind(row.completed_at)
    .bind(&row.workflow_id)
    .bind(version_column(expected_version))
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
      tx.rollback().await?;
      return if self.exists(&row.workflow_id).await? {
        Err(Error::Conflict {
          workflow_id: row.workflow_id,
          expected: expected_version,
        })
      } else {
        Err(Error::NotFound(row.workflow_id))
      };
    }

    append_history(&mut tx, workflow).await?;
    tx.commit().await?;
    Ok(())
  }

  async fn list_workflows(&self, status: Option<AggregateStatus>) -> Result<Vec<Workflow>, Error> {
    let rows: Vec<WorkflowRow> = match status {
      Some(status) => {
        sqlx::query_as(
                r#"
                SELECT workflow_id, title, requester_email, status, epoch, version, body, requested_at, completed_at
                FROM workflows
                WHERE status = ?
                ORDER BY requested_at DESC, workflow_id ASC
                "#,
            )
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
      }
      None => {
        sqlx::query_as(
                r#"
                SELECT workflow_id, title, requester_email, status, epoch, version, body, requested_at, completed_at
                FROM workflows
                ORDER BY requested_at DESC, workflow_id ASC
                "#,
            )
            .fetch_all(&self.pool)
            .await?
      }
    };

    Ok(rows.into_iter().map(WorkflowRow::into_workflow).collect())
  }

  async fn list_requested_by(&self, email: &str) -> Result<Vec<Workflow>, Error> {
    let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT workflow_id, title, requester_email, status, epoch, version, body, requested_at, completed_at
            FROM workflows
            WHERE requester_email = ?
            ORDER BY requested_at DESC, workflow_id ASC
            "#,
        )
        .bind(email.trim().to_lowercase())
        .fetch_all(&self.pool)
        .await?;

    Ok(rows.into_iter().map(WorkflowRow::into_workflow).collect())
  }

  async fn history(&self, workflow_id: &str) -> Result<Vec<HistoryRecord>, Error> {
    if !self.exists(workflow_id).await? {
      return Err(Error::NotFound(workflow_id.to_string()));
    }

    let rows: Vec<HistoryRow> = sqlx::query_as(
      r#"
            SELECT workflow_id, sequence, epoch, actor_email, record, recorded_at
            FROM workflow_history
            WHERE workflow_id = ?
            ORDER BY sequence ASC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(HistoryRow::into_record).collect())
  }
}
