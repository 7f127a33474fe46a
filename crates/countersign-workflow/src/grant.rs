use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::normalize_email;
use crate::workflow::Workflow;

/// Access to hand out on one document once a workflow completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGrant {
  pub document_id: String,
  pub user_emails: Vec<String>,
}

/// Emitted when a workflow reaches `PaymentComplete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
  pub workflow_id: String,
  pub completed_at: DateTime<Utc>,
  pub grants: Vec<DocumentGrant>,
}

/// One grant per linked document, covering every stakeholder.
///
/// Emails are normalized to lowercase and deduplicated; blank emails are
/// dropped.
pub fn completion_grants(workflow: &Workflow) -> Vec<DocumentGrant> {
  let mut emails: Vec<String> = Vec::new();
  for person in workflow.stakeholders() {
    let email = normalize_email(&person.email);
    if !email.is_empty() && !emails.contains(&email) {
      emails.push(email);
    }
  }

  workflow
    .documents()
    .document_ids()
    .into_iter()
    .map(|document_id| DocumentGrant {
      document_id: document_id.to_string(),
      user_emails: emails.clone(),
    })
    .collect()
}
