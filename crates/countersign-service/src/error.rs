use countersign_workflow::{AggregateStatus, EngineError, WorkflowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error("invalid workflow: {0}")]
  Workflow(#[from] WorkflowError),

  #[error("storage error: {0}")]
  Store(#[from] countersign_store::Error),

  #[error("workflow {workflow_id} is {status}, not complete")]
  NotComplete {
    workflow_id: String,
    status: AggregateStatus,
  },
}

impl ServiceError {
  /// Whether this error came from the engine refusing a command.
  pub fn is_refusal(&self) -> bool {
    matches!(self, Self::Engine(_))
  }
}
