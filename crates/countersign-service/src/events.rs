//! Workflow events and notifiers for observability.
//!
//! Events are emitted by the service after each accepted or refused
//! operation so that consumers can audit, notify approvers, stream to UIs,
//! etc.

use chrono::{DateTime, Utc};
use countersign_workflow::{AggregateStatus, HistoryRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the workflow service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
  /// A new workflow has been opened.
  Created {
    workflow_id: String,
    requester: String,
    status: AggregateStatus,
  },

  /// A command was accepted and persisted.
  TransitionApplied {
    workflow_id: String,
    record: HistoryRecord,
  },

  /// A command was refused; nothing changed.
  TransitionRefused {
    workflow_id: String,
    actor: String,
    error: String,
  },

  /// The payment line finished and document grants were sent.
  Completed {
    workflow_id: String,
    completed_at: DateTime<Utc>,
    documents: usize,
  },

  /// A document grant could not be delivered. The workflow stays complete.
  GrantFailed {
    workflow_id: String,
    document_id: String,
    error: String,
  },
}

impl WorkflowEvent {
  pub fn workflow_id(&self) -> &str {
    match self {
      Self::Created { workflow_id, .. }
      | Self::TransitionApplied { workflow_id, .. }
      | Self::TransitionRefused { workflow_id, .. }
      | Self::Completed { workflow_id, .. }
      | Self::GrantFailed { workflow_id, .. } => workflow_id,
    }
  }
}

/// Trait for receiving workflow events.
///
/// The service calls `notify` for each event; implementations decide what
/// to do with them (persist, broadcast, log, ignore, etc.).
pub trait EventNotifier: Send + Sync {
  /// Called when a workflow event occurs.
  fn notify(&self, event: WorkflowEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: WorkflowEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Event volume is one or two per user action, so the channel is unbounded
/// and the service never waits on a slow consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: WorkflowEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_notifier() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);

    notifier.notify(WorkflowEvent::TransitionRefused {
      workflow_id: "wf-1".to_string(),
      actor: "a@example.com".to_string(),
      error: "not the current step".to_string(),
    });

    let event = rx.try_recv().unwrap();
    assert_eq!(event.workflow_id(), "wf-1");
  }

  #[test]
  fn test_send_after_receiver_dropped() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    ChannelNotifier::new(tx).notify(WorkflowEvent::Created {
      workflow_id: "wf-1".to_string(),
      requester: "req@example.com".to_string(),
      status: AggregateStatus::Waiting,
    });
  }
}
