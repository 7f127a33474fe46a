//! Document-permission collaborator.
//!
//! When a workflow completes, every linked document is shared with every
//! stakeholder. Delivery is the host's concern; a failed grant is reported
//! and never undoes the completion.

use async_trait::async_trait;
use countersign_config::GrantRole;
use countersign_workflow::DocumentGrant;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A grant as handed to the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
  pub workflow_id: String,
  pub document_id: String,
  pub user_emails: Vec<String>,
  pub role: GrantRole,
}

impl PermissionGrant {
  pub fn new(workflow_id: &str, grant: &DocumentGrant, role: GrantRole) -> Self {
    Self {
      workflow_id: workflow_id.to_string(),
      document_id: grant.document_id.clone(),
      user_emails: grant.user_emails.clone(),
      role,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
  #[error("failed to grant access to {document_id}: {message}")]
  Failed {
    document_id: String,
    message: String,
  },

  #[error("grant receiver closed; {document_id} not shared")]
  ChannelClosed { document_id: String },
}

impl GrantError {
  pub fn document_id(&self) -> &str {
    match self {
      Self::Failed { document_id, .. } | Self::ChannelClosed { document_id } => document_id,
    }
  }
}

/// Trait for granting document access on completion.
#[async_trait]
pub trait PermissionGranter: Send + Sync {
  async fn grant(&self, grant: PermissionGrant) -> Result<(), GrantError>;
}

/// A granter that accepts and discards every grant.
#[derive(Debug, Clone, Default)]
pub struct NoopGranter;

#[async_trait]
impl PermissionGranter for NoopGranter {
  async fn grant(&self, _grant: PermissionGrant) -> Result<(), GrantError> {
    Ok(())
  }
}

/// A granter that forwards grants to an unbounded channel for delivery by
/// another task.
#[derive(Debug, Clone)]
pub struct ChannelGranter {
  sender: mpsc::UnboundedSender<PermissionGrant>,
}

impl ChannelGranter {
  pub fn new(sender: mpsc::UnboundedSender<PermissionGrant>) -> Self {
    Self { sender }
  }
}

#[async_trait]
impl PermissionGranter for ChannelGranter {
  async fn grant(&self, grant: PermissionGrant) -> Result<(), GrantError> {
    self.sender.send(grant).map_err(|e| GrantError::ChannelClosed {
      document_id: e.0.document_id,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grant() -> PermissionGrant {
    PermissionGrant {
      workflow_id: "wf-1".to_string(),
      document_id: "doc-1".to_string(),
      user_emails: vec!["req@example.com".to_string()],
      role: GrantRole::Reader,
    }
  }

  #[tokio::test]
  async fn test_channel_granter() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    ChannelGranter::new(tx).grant(grant()).await.unwrap();
    assert_eq!(rx.recv().await, Some(grant()));
  }

  #[tokio::test]
  async fn test_channel_granter_closed() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let err = ChannelGranter::new(tx).grant(grant()).await.unwrap_err();
    assert_eq!(
      err,
      GrantError::ChannelClosed {
        document_id: "doc-1".to_string()
      }
    );
  }
}
