use std::collections::HashMap;

use async_trait::async_trait;
use countersign_workflow::{AggregateStatus, HistoryRecord, Workflow};
use tokio::sync::RwLock;

use crate::{Error, Store};

/// In-memory store implementation.
///
/// Suitable for tests and single-process use; nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
  workflows: RwLock<HashMap<String, Workflow>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn newest_first(mut workflows: Vec<Workflow>) -> Vec<Workflow> {
  workflows.sort_by(|a, b| {
    b.requested_at()
      .cmp(&a.requested_at())
      .then_with(|| a.id().cmp(b.id()))
  });
  workflows
}

#[async_trait]
impl Store for InMemoryStore {
  async fn create_workflow(&self, workflow: &Workflow) -> Result<(), Error> {
    let mut workflows = self.workflows.write().await;
    if workflows.contains_key(workflow.id()) {
      return Err(Error::AlreadyExists(workflow.id().to_string()));
    }
    workflows.insert(workflow.id().to_string(), workflow.clone());
    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error> {
    self
      .workflows
      .read()
      .await
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(workflow_id.to_string()))
  }

  async fn update_workflow(&self, workflow: &Workflow, expected_version: u64) -> Result<(), Error> {
    let mut workflows = self.workflows.write().await;
    let stored = workflows
      .get_mut(workflow.id())
      .ok_or_else(|| Error::NotFound(workflow.id().to_string()))?;
    if stored.version() != expected_version {
      return Err(Error::Conflict {
        workflow_id: workflow.id().to_string(),
        expected: expected_version,
      });
    }
    *stored = workflow.clone();
    Ok(())
  }

  async fn list_workflows(&self, status: Option<AggregateStatus>) -> Result<Vec<Workflow>, Error> {
    let workflows = self
      .workflows
      .read()
      .await
      .values()
      .filter(|w| status.is_none_or(|s| w.status() == s))
      .cloned()
      .collect();
    Ok(newest_first(workflows))
  }

  async fn list_requested_by(&self, email: &str) -> Result<Vec<Workflow>, Error> {
    let workflows = self
      .workflows
      .read()
      .await
      .values()
      .filter(|w| w.requester().has_email(email))
      .cloned()
      .collect();
    Ok(newest_first(workflows))
  }

  async fn history(&self, workflow_id: &str) -> Result<Vec<HistoryRecord>, Error> {
    let workflows = self.workflows.read().await;
    let workflow = workflows
      .get(workflow_id)
      .ok_or_else(|| Error::NotFound(workflow_id.to_string()))?;
    Ok(workflow.history().records().to_vec())
  }
}
