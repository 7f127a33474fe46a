//! Service tests against the in-memory and SQLite stores.

use std::sync::Arc;

use async_trait::async_trait;
use countersign_config::{DocumentsDef, GrantRole, RequestDef, StepDef, Templates};
use countersign_service::{
  ChannelGranter, ChannelNotifier, GrantError, NoopGranter, NoopNotifier, PermissionGrant,
  PermissionGranter, ServiceError, WorkflowEvent, WorkflowService,
};
use countersign_store::{InMemoryStore, SqliteStore, Store};
use countersign_workflow::{
  AggregateStatus, Command, EngineError, Identity, Resubmission, StepTarget,
};
use tokio::sync::mpsc;

fn person(name: &str) -> Identity {
  Identity::new(format!("{}@example.com", name), name)
}

fn request() -> RequestDef {
  RequestDef {
    requester_email: "req@example.com".to_string(),
    requester_name: "Req".to_string(),
    title: "Team offsite".to_string(),
    documents: DocumentsDef {
      subject: Some("doc-1".to_string()),
      attachments: vec!["quote-1".to_string()],
      ..DocumentsDef::default()
    },
    template: None,
    review_line: vec![
      StepDef::new(1, "a@example.com", "A"),
      StepDef::new(2, "b@example.com", "B"),
    ],
    payment_line: vec![StepDef::new(1, "c@example.com", "C")],
  }
}

/// A granter that refuses every document.
struct FailingGranter;

#[async_trait]
impl PermissionGranter for FailingGranter {
  async fn grant(&self, grant: PermissionGrant) -> Result<(), GrantError> {
    Err(GrantError::Failed {
      document_id: grant.document_id,
      message: "drive unavailable".to_string(),
    })
  }
}

#[tokio::test]
async fn test_full_approval_sends_grants() {
  let (grant_tx, mut grant_rx) = mpsc::unbounded_channel();
  let (event_tx, mut event_rx) = mpsc::unbounded_channel();
  let service = WorkflowService::new(
    InMemoryStore::new(),
    ChannelGranter::new(grant_tx),
    ChannelNotifier::new(event_tx),
    GrantRole::Writer,
  );

  let wf = service
    .create_from_def(&request(), &Templates::default())
    .await
    .unwrap();
  assert_eq!(wf.status(), AggregateStatus::Waiting);

  let id = wf.id();
  service.execute(id, &person("a"), Command::approve(StepTarget::review(1))).await.unwrap();
  service.execute(id, &person("b"), Command::approve(StepTarget::review(2))).await.unwrap();
  let t = service
    .execute(id, &person("c"), Command::approve(StepTarget::payment(1)))
    .await
    .unwrap();
  assert_eq!(t.to_status(), AggregateStatus::PaymentComplete);

  let first = grant_rx.recv().await.unwrap();
  assert_eq!(first.document_id, "doc-1");
  assert_eq!(first.role, GrantRole::Writer);
  assert_eq!(
    first.user_emails,
    vec!["req@example.com", "a@example.com", "b@example.com", "c@example.com"]
  );
  assert_eq!(grant_rx.recv().await.unwrap().document_id, "quote-1");

  let mut events = Vec::new();
  while let Ok(event) = event_rx.try_recv() {
    events.push(event);
  }
  assert!(matches!(events.first(), Some(WorkflowEvent::Created { .. })));
  assert!(matches!(
    events.last(),
    Some(WorkflowEvent::Completed { documents: 2, .. })
  ));
  assert_eq!(service.history(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_grant_failure_keeps_completion() {
  let (event_tx, mut event_rx) = mpsc::unbounded_channel();
  let service = WorkflowService::new(
    InMemoryStore::new(),
    FailingGranter,
    ChannelNotifier::new(event_tx),
    GrantRole::Reader,
  );

  let mut def = request();
  def.review_line.truncate(1);
  let wf = service.create_from_def(&def, &Templates::default()).await.unwrap();
  service
    .execute(wf.id(), &person("a"), Command::approve(StepTarget::review(1)))
    .await
    .unwrap();
  let t = service
    .execute(wf.id(), &person("c"), Command::approve(StepTarget::payment(1)))
    .await
    .unwrap();
  assert_eq!(t.to_status(), AggregateStatus::PaymentComplete);

  let stored = service.get(wf.id()).await.unwrap();
  assert_eq!(stored.status(), AggregateStatus::PaymentComplete);

  let mut failed = 0;
  while let Ok(event) = event_rx.try_recv() {
    if matches!(event, WorkflowEvent::GrantFailed { .. }) {
      failed += 1;
    }
  }
  assert_eq!(failed, 2);

  let retried = service.retry_grants(wf.id()).await.unwrap();
  assert_eq!(retried.len(), 2);
  assert_eq!(retried[0].document_id(), "doc-1");
}

#[tokio::test]
async fn test_retry_grants_requires_completion() {
  let service = WorkflowService::new(InMemoryStore::new(), NoopGranter, NoopNotifier, GrantRole::Reader);
  let wf = service.create_from_def(&request(), &Templates::default()).await.unwrap();
  assert!(matches!(
    service.retry_grants(wf.id()).await,
    Err(ServiceError::NotComplete {
      status: AggregateStatus::Waiting,
      ..
    })
  ));
}

#[tokio::test]
async fn test_refusal_is_reported() {
  let (event_tx, mut event_rx) = mpsc::unbounded_channel();
  let service = WorkflowService::new(
    InMemoryStore::new(),
    NoopGranter,
    ChannelNotifier::new(event_tx),
    GrantRole::Reader,
  );
  let wf = service.create_from_def(&request(), &Templates::default()).await.unwrap();

  let err = service
    .execute(wf.id(), &person("b"), Command::approve(StepTarget::review(1)))
    .await
    .unwrap_err();
  assert!(err.is_refusal());
  assert_eq!(service.get(wf.id()).await.unwrap(), wf);

  let refused = std::iter::from_fn(|| event_rx.try_recv().ok())
    .find(|e| matches!(e, WorkflowEvent::TransitionRefused { .. }));
  assert!(refused.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_only_one_wins() {
  let service = Arc::new(WorkflowService::new(
    InMemoryStore::new(),
    NoopGranter,
    NoopNotifier,
    GrantRole::Reader,
  ));
  let wf = service.create_from_def(&request(), &Templates::default()).await.unwrap();

  let attempts = (0..8).map(|_| {
    let service = Arc::clone(&service);
    let id = wf.id().to_string();
    tokio::spawn(async move {
      service
        .execute(&id, &person("a"), Command::approve(StepTarget::review(1)))
        .await
    })
  });
  let results = futures::future::join_all(attempts).await;

  let mut accepted = 0;
  for result in results {
    match result.unwrap() {
      Ok(_) => accepted += 1,
      Err(ServiceError::Engine(EngineError::InvalidTransition(_))) => {}
      Err(other) => panic!("unexpected error: {}", other),
    }
  }
  assert_eq!(accepted, 1);
  assert_eq!(service.history(wf.id()).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_services_sharing_a_database_refuse_the_loser() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("countersign.db");
  let first = Arc::new(WorkflowService::new(
    SqliteStore::connect(&path).await.unwrap(),
    NoopGranter,
    NoopNotifier,
    GrantRole::Reader,
  ));
  let second = Arc::new(WorkflowService::new(
    SqliteStore::connect(&path).await.unwrap(),
    NoopGranter,
    NoopNotifier,
    GrantRole::Reader,
  ));

  for _ in 0..10 {
    let wf = first.create_from_def(&request(), &Templates::default()).await.unwrap();

    let attempts = [Arc::clone(&first), Arc::clone(&second)].map(|service| {
      let id = wf.id().to_string();
      tokio::spawn(async move {
        service
          .execute(&id, &person("a"), Command::approve(StepTarget::review(1)))
          .await
      })
    });
    let results = futures::future::join_all(attempts).await;

    let mut accepted = 0;
    for result in results {
      match result.unwrap() {
        Ok(_) => accepted += 1,
        Err(ServiceError::Engine(EngineError::InvalidTransition(_))) => {}
        Err(other) => panic!("unexpected error: {}", other),
      }
    }
    assert_eq!(accepted, 1);

    let stored = second.get(wf.id()).await.unwrap();
    assert_eq!(stored.version(), 1);
    assert_eq!(second.history(wf.id()).await.unwrap().len(), 1);
  }
}

#[tokio::test]
async fn test_pending_for_and_resubmission_with_sqlite() {
  let dir = tempfile::tempdir().unwrap();
  let store = SqliteStore::connect(&dir.path().join("countersign.db")).await.unwrap();
  let service = WorkflowService::new(store, NoopGranter, NoopNotifier, GrantRole::Reader);

  let wf = service.create_from_def(&request(), &Templates::default()).await.unwrap();
  let id = wf.id();
  assert_eq!(service.pending_for("A@example.com").await.unwrap().len(), 1);
  assert!(service.pending_for("b@example.com").await.unwrap().is_empty());

  let reject = Command::reject(StepTarget::review(1), "wrong cost centre").unwrap();
  service.execute(id, &person("a"), reject).await.unwrap();
  assert!(service.pending_for("a@example.com").await.unwrap().is_empty());
  assert_eq!(
    service.list(Some(AggregateStatus::ReviewRejected)).await.unwrap().len(),
    1
  );

  let denied = service
    .execute(id, &person("a"), Command::Resubmit(Resubmission::default()))
    .await
    .unwrap_err();
  assert!(matches!(
    denied,
    ServiceError::Engine(EngineError::NotAuthorized { .. })
  ));

  let resubmission = Resubmission {
    review_line: Some(vec![person("d")]),
    ..Resubmission::default()
  };
  service
    .execute(id, &person("req"), Command::Resubmit(resubmission))
    .await
    .unwrap();

  assert_eq!(service.pending_for("d@example.com").await.unwrap().len(), 1);
  assert_eq!(service.requested_by("req@example.com").await.unwrap().len(), 1);

  let history = service.history(id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history[1].is_resubmission());
  assert_eq!(service.store().get_workflow(id).await.unwrap().epoch(), 1);
}
