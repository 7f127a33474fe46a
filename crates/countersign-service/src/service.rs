use chrono::Utc;
use countersign_config::{GrantRole, RequestDef, Templates};
use countersign_store::{Error as StoreError, Store};
use countersign_workflow::{
  AggregateStatus, Command, Completion, HistoryRecord, Identity, Transition, Workflow,
  WorkflowRequest, apply,
};
use tracing::{debug, error, info, warn};

use crate::error::ServiceError;
use crate::events::{EventNotifier, WorkflowEvent};
use crate::grant::{GrantError, PermissionGrant, PermissionGranter};
use crate::locks::WorkflowLocks;

/// Saves tried per command before a version conflict is returned.
const MAX_SAVE_ATTEMPTS: u32 = 5;

/// Runs engine commands against stored workflows.
///
/// Every command on a workflow id is applied under that id's lock and
/// persisted with an optimistic version check, so two racing commands on
/// the same step cannot both succeed, even across processes sharing one
/// database. Commands on different workflows run in parallel.
pub struct WorkflowService<S, G, N> {
  store: S,
  granter: G,
  notifier: N,
  grant_role: GrantRole,
  locks: WorkflowLocks,
}

impl<S, G, N> WorkflowService<S, G, N>
where
  S: Store,
  G: PermissionGranter,
  N: EventNotifier,
{
  pub fn new(store: S, granter: G, notifier: N, grant_role: GrantRole) -> Self {
    Self {
      store,
      granter,
      notifier,
      grant_role,
      locks: WorkflowLocks::default(),
    }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Open a new workflow with a generated id.
  pub async fn create(&self, request: WorkflowRequest) -> Result<Workflow, ServiceError> {
    let workflow_id = uuid::Uuid::new_v4().to_string();
    let workflow = Workflow::new(workflow_id, request, Utc::now())?;
    self.store.create_workflow(&workflow).await?;

    info!(
      workflow_id = %workflow.id(),
      requester = %workflow.requester().email,
      status = %workflow.status(),
      "workflow created"
    );
    self.notifier.notify(WorkflowEvent::Created {
      workflow_id: workflow.id().to_string(),
      requester: workflow.requester().email_key(),
      status: workflow.status(),
    });

    Ok(workflow)
  }

  /// Resolve a request definition against `templates`, then open it.
  pub async fn create_from_def(
    &self,
    def: &RequestDef,
    templates: &Templates,
  ) -> Result<Workflow, ServiceError> {
    let request = WorkflowRequest::from_def(def, templates)?;
    self.create(request).await
  }

  pub async fn get(&self, workflow_id: &str) -> Result<Workflow, ServiceError> {
    Ok(self.store.get_workflow(workflow_id).await?)
  }

  pub async fn history(&self, workflow_id: &str) -> Result<Vec<HistoryRecord>, ServiceError> {
    Ok(self.store.history(workflow_id).await?)
  }

  pub async fn list(&self, status: Option<AggregateStatus>) -> Result<Vec<Workflow>, ServiceError> {
    Ok(self.store.list_workflows(status).await?)
  }

  pub async fn requested_by(&self, email: &str) -> Result<Vec<Workflow>, ServiceError> {
    Ok(self.store.list_requested_by(email).await?)
  }

  /// Workflows whose current step is waiting on `email`.
  pub async fn pending_for(&self, email: &str) -> Result<Vec<Workflow>, ServiceError> {
    let workflows = self.store.list_workflows(None).await?;
    Ok(
      workflows
        .into_iter()
        .filter(|w| w.is_awaiting(email))
        .collect(),
    )
  }

  /// Apply `command` to the stored workflow on behalf of `actor`.
  ///
  /// A refused command changes nothing and is reported as an event. When the
  /// save loses a version race to another writer, the command is applied
  /// again to the fresh workflow, so the loser of a double submit is refused
  /// by the engine. When the command completes the workflow, document grants
  /// are sent afterwards; their failures are logged and reported, never
  /// returned.
  pub async fn execute(
    &self,
    workflow_id: &str,
    actor: &Identity,
    command: Command,
  ) -> Result<Transition, ServiceError> {
    let _guard = self.locks.lock(workflow_id).await;

    let mut attempt = 1;
    let transition = loop {
      let workflow = self.store.get_workflow(workflow_id).await?;
      let transition = self.apply_or_refuse(&workflow, actor, command.clone())?;

      match self
        .store
        .update_workflow(&transition.workflow, workflow.version())
        .await
      {
        Ok(()) => break transition,
        Err(StoreError::Conflict { expected, .. }) if attempt < MAX_SAVE_ATTEMPTS => {
          debug!(
            workflow_id = %workflow_id,
            expected_version = expected,
            attempt,
            "workflow changed during save, reapplying"
          );
          attempt += 1;
        }
        Err(e) => return Err(e.into()),
      }
    };

    info!(
      workflow_id = %workflow_id,
      actor = %actor.email,
      from_status = %transition.from_status(),
      to_status = %transition.to_status(),
      version = transition.workflow.version(),
      "transition applied"
    );
    self.notifier.notify(WorkflowEvent::TransitionApplied {
      workflow_id: workflow_id.to_string(),
      record: transition.record.clone(),
    });

    if let Some(completion) = &transition.completion {
      self.complete(completion).await;
    }

    Ok(transition)
  }

  fn apply_or_refuse(
    &self,
    workflow: &Workflow,
    actor: &Identity,
    command: Command,
  ) -> Result<Transition, ServiceError> {
    apply(workflow, actor, command, Utc::now()).map_err(|e| {
      warn!(
        workflow_id = %workflow.id(),
        actor = %actor.email,
        status = %workflow.status(),
        error = %e,
        "command refused"
      );
      self.notifier.notify(WorkflowEvent::TransitionRefused {
        workflow_id: workflow.id().to_string(),
        actor: actor.email_key(),
        error: e.to_string(),
      });
      e.into()
    })
  }

  /// Send the completion grants of a finished workflow again.
  ///
  /// Returns the grants that failed this time.
  pub async fn retry_grants(&self, workflow_id: &str) -> Result<Vec<GrantError>, ServiceError> {
    let workflow = self.store.get_workflow(workflow_id).await?;
    let Some(completed_at) = workflow.completed_at() else {
      return Err(ServiceError::NotComplete {
        workflow_id: workflow_id.to_string(),
        status: workflow.status(),
      });
    };

    let completion = Completion {
      workflow_id: workflow_id.to_string(),
      completed_at,
      grants: countersign_workflow::completion_grants(&workflow),
    };
    Ok(self.send_grants(&completion).await)
  }

  async fn complete(&self, completion: &Completion) {
    info!(
      workflow_id = %completion.workflow_id,
      documents = completion.grants.len(),
      "workflow completed"
    );
    self.notifier.notify(WorkflowEvent::Completed {
      workflow_id: completion.workflow_id.clone(),
      completed_at: completion.completed_at,
      documents: completion.grants.len(),
    });
    self.send_grants(completion).await;
  }

  async fn send_grants(&self, completion: &Completion) -> Vec<GrantError> {
    let mut failures = Vec::new();
    for grant in &completion.grants {
      let request = PermissionGrant::new(&completion.workflow_id, grant, self.grant_role);
      if let Err(e) = self.granter.grant(request).await {
        error!(
          workflow_id = %completion.workflow_id,
          document_id = %grant.document_id,
          role = %self.grant_role,
          error = %e,
          "document grant failed"
        );
        self.notifier.notify(WorkflowEvent::GrantFailed {
          workflow_id: completion.workflow_id.clone(),
          document_id: grant.document_id.clone(),
          error: e.to_string(),
        });
        failures.push(e);
      }
    }
    failures
  }
}
