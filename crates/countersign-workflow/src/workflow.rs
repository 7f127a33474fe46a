use chrono::{DateTime, Utc};
use countersign_config::DocumentsDef;
use serde::{Deserialize, Serialize};

use crate::error::{LineError, WorkflowError};
use crate::history::History;
use crate::identity::Identity;
use crate::line::{Line, LineKind};
use crate::status::{AggregateStatus, derive_status};
use crate::step::Step;

/// Documents associated with a workflow.
///
/// A workflow may be a document itself (`content`), approve another one
/// (`subject`), or both, and may carry attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLinks {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attachments: Vec<String>,
}

impl DocumentLinks {
  pub fn is_empty(&self) -> bool {
    self.document_ids().is_empty()
  }

  /// Distinct, non-blank document ids: subject, content, then attachments.
  pub fn document_ids(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    let candidates = self
      .subject
      .iter()
      .chain(self.content.iter())
      .chain(self.attachments.iter());
    for id in candidates {
      let id = id.trim();
      if !id.is_empty() && !ids.contains(&id) {
        ids.push(id);
      }
    }
    ids
  }
}

impl From<DocumentsDef> for DocumentLinks {
  fn from(def: DocumentsDef) -> Self {
    Self {
      subject: def.subject,
      content: def.content,
      attachments: def.attachments,
    }
  }
}

/// Everything needed to open a new workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRequest {
  pub requester: Identity,
  pub title: String,
  pub documents: DocumentLinks,
  pub review_line: Line,
  pub payment_line: Line,
}

/// An approval workflow: a review line followed by a payment line.
///
/// A workflow is a value. The engine never edits one in place; every
/// accepted transition produces a new value with `version` one higher.
/// `status` is always derived from the lines and is recomputed when a
/// stored workflow is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWorkflow")]
pub struct Workflow {
  id: String,
  title: String,
  requester: Identity,
  documents: DocumentLinks,
  review_line: Line,
  payment_line: Line,
  status: AggregateStatus,
  epoch: u32,
  version: u64,
  requested_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  history: History,
}

#[derive(Deserialize)]
struct RawWorkflow {
  id: String,
  #[serde(default)]
  title: String,
  requester: Identity,
  documents: DocumentLinks,
  review_line: Line,
  payment_line: Line,
  #[serde(default)]
  epoch: u32,
  #[serde(default)]
  version: u64,
  requested_at: DateTime<Utc>,
  #[serde(default)]
  completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  history: History,
}

impl TryFrom<RawWorkflow> for Workflow {
  type Error = WorkflowError;

  fn try_from(raw: RawWorkflow) -> Result<Self, Self::Error> {
    check_kind(&raw.review_line, LineKind::Review)?;
    check_kind(&raw.payment_line, LineKind::Payment)?;
    if raw.documents.is_empty() {
      return Err(WorkflowError::NoDocument);
    }

    let status = derive_status(&raw.review_line, &raw.payment_line, raw.epoch);
    let completed_at = if status == AggregateStatus::PaymentComplete {
      raw.completed_at
    } else {
      None
    };

    Ok(Self {
      id: raw.id,
      title: raw.title,
      requester: raw.requester,
      documents: raw.documents,
      review_line: raw.review_line,
      payment_line: raw.payment_line,
      status,
      epoch: raw.epoch,
      version: raw.version,
      requested_at: raw.requested_at,
      completed_at,
      history: raw.history,
    })
  }
}

impl Workflow {
  /// Open a new workflow. Both lines start fully pending, whatever state
  /// the request's lines were in.
  pub fn new(
    id: impl Into<String>,
    request: WorkflowRequest,
    now: DateTime<Utc>,
  ) -> Result<Self, WorkflowError> {
    check_kind(&request.review_line, LineKind::Review)?;
    check_kind(&request.payment_line, LineKind::Payment)?;
    if request.documents.is_empty() {
      return Err(WorkflowError::NoDocument);
    }

    let review_line = request.review_line.reset();
    let payment_line = request.payment_line.reset();
    let status = derive_status(&review_line, &payment_line, 0);

    Ok(Self {
      id: id.into(),
      title: request.title,
      requester: request.requester,
      documents: request.documents,
      review_line,
      payment_line,
      status,
      epoch: 0,
      version: 0,
      requested_at: now,
      completed_at: None,
      history: History::default(),
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn requester(&self) -> &Identity {
    &self.requester
  }

  pub fn documents(&self) -> &DocumentLinks {
    &self.documents
  }

  pub fn review_line(&self) -> &Line {
    &self.review_line
  }

  pub fn payment_line(&self) -> &Line {
    &self.payment_line
  }

  pub fn line(&self, kind: LineKind) -> &Line {
    match kind {
      LineKind::Review => &self.review_line,
      LineKind::Payment => &self.payment_line,
    }
  }

  pub fn status(&self) -> AggregateStatus {
    self.status
  }

  /// Resubmission round, starting at 0.
  pub fn epoch(&self) -> u32 {
    self.epoch
  }

  /// Optimistic concurrency version; bumped by every accepted change.
  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn requested_at(&self) -> DateTime<Utc> {
    self.requested_at
  }

  pub fn completed_at(&self) -> Option<DateTime<Utc>> {
    self.completed_at
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  /// The line whose current step may act next, if any.
  ///
  /// Payment only opens once every review step is approved; a rejected or
  /// completed workflow has no active line.
  pub fn active_line(&self) -> Option<&Line> {
    if self.status.is_terminal() {
      None
    } else if !self.review_line.is_complete() {
      Some(&self.review_line)
    } else {
      Some(&self.payment_line)
    }
  }

  /// The step awaiting a decision, across both lines.
  pub fn current_step(&self) -> Option<(LineKind, &Step)> {
    let line = self.active_line()?;
    line.current().map(|step| (line.kind(), step))
  }

  /// Whether the workflow is waiting on `email` to act.
  pub fn is_awaiting(&self, email: &str) -> bool {
    self
      .current_step()
      .is_some_and(|(_, step)| step.assignee.has_email(email))
  }

  /// The requester followed by every assignee, without duplicates.
  pub fn stakeholders(&self) -> Vec<&Identity> {
    let mut people: Vec<&Identity> = vec![&self.requester];
    for assignee in self.review_line.assignees().chain(self.payment_line.assignees()) {
      if !people.iter().any(|p| p.is(assignee)) {
        people.push(assignee);
      }
    }
    people
  }

  pub(crate) fn line_mut(&mut self, kind: LineKind) -> &mut Line {
    match kind {
      LineKind::Review => &mut self.review_line,
      LineKind::Payment => &mut self.payment_line,
    }
  }

  pub(crate) fn history_mut(&mut self) -> &mut History {
    &mut self.history
  }

  /// Start a new resubmission round with fresh lines.
  pub(crate) fn restart(&mut self, review_line: Line, payment_line: Line) {
    self.review_line = review_line;
    self.payment_line = payment_line;
    self.epoch += 1;
    self.completed_at = None;
  }

  pub(crate) fn set_title(&mut self, title: String) {
    self.title = title;
  }

  pub(crate) fn set_content(&mut self, content: String) {
    self.documents.content = Some(content);
  }

  /// Recompute the aggregate status from the lines and bump the version.
  pub(crate) fn settle(&mut self, now: DateTime<Utc>) {
    self.status = derive_status(&self.review_line, &self.payment_line, self.epoch);
    if self.status == AggregateStatus::PaymentComplete {
      self.completed_at.get_or_insert(now);
    }
    self.version += 1;
  }
}

fn check_kind(line: &Line, expected: LineKind) -> Result<(), LineError> {
  if line.kind() == expected {
    Ok(())
  } else {
    Err(LineError::WrongKind {
      expected,
      found: line.kind(),
    })
  }
}
