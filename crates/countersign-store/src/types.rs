use chrono::{DateTime, Utc};
use countersign_workflow::{HistoryRecord, Workflow};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// A workflow as stored in the database.
///
/// `body` holds the whole workflow; the other columns are copies used for
/// filtering and for the version check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
  pub workflow_id: String,
  pub title: String,
  pub requester_email: String,
  pub status: String,
  pub epoch: i64,
  pub version: i64,
  pub body: Json<Workflow>,
  pub requested_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowRow {
  pub fn from_workflow(workflow: &Workflow) -> Self {
    Self {
      workflow_id: workflow.id().to_string(),
      title: workflow.title().to_string(),
      requester_email: workflow.requester().email_key(),
      status: workflow.status().as_str().to_string(),
      epoch: i64::from(workflow.epoch()),
      version: version_column(workflow.version()),
      body: Json(workflow.clone()),
      requested_at: workflow.requested_at(),
      completed_at: workflow.completed_at(),
    }
  }

  pub fn into_workflow(self) -> Workflow {
    self.body.0
  }
}

/// One history record as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HistoryRow {
  pub workflow_id: String,
  pub sequence: i64,
  pub epoch: i64,
  pub actor_email: String,
  pub record: Json<HistoryRecord>,
  pub recorded_at: DateTime<Utc>,
}

impl HistoryRow {
  pub fn from_record(workflow_id: &str, record: &HistoryRecord) -> Self {
    Self {
      workflow_id: workflow_id.to_string(),
      sequence: version_column(record.sequence),
      epoch: i64::from(record.epoch),
      actor_email: record.actor.email_key(),
      record: Json(record.clone()),
      recorded_at: record.recorded_at,
    }
  }

  pub fn into_record(self) -> HistoryRecord {
    self.record.0
  }
}

/// SQLite integers are signed; counters never get near the limit.
pub(crate) fn version_column(value: u64) -> i64 {
  i64::try_from(value).unwrap_or(i64::MAX)
}
