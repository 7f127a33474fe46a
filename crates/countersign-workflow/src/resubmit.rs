use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::Transition;
use crate::error::EngineError;
use crate::history::{HistoryEntry, HistoryRecord};
use crate::identity::Identity;
use crate::line::{Line, LineKind};
use crate::workflow::Workflow;

/// Revisions submitted with a rejected workflow.
///
/// A line left as `None` keeps its assignees; every step of both lines
/// starts over at `Pending` either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resubmission {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub review_line: Option<Vec<Identity>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payment_line: Option<Vec<Identity>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  /// Replacement for the workflow's own document.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  /// Note to approvers, stored as the marker's opinion.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}

pub(crate) fn resubmit(
  workflow: &Workflow,
  actor: &Identity,
  resubmission: Resubmission,
  now: DateTime<Utc>,
) -> Result<Transition, EngineError> {
  if !workflow.requester().is(actor) {
    return Err(EngineError::NotAuthorized {
      actor: actor.email.clone(),
    });
  }
  if !workflow.status().is_rejected() {
    return Err(EngineError::InvalidState {
      status: workflow.status(),
    });
  }

  let review_line = fresh_line(workflow, LineKind::Review, resubmission.review_line)?;
  let payment_line = fresh_line(workflow, LineKind::Payment, resubmission.payment_line)?;

  let mut next = workflow.clone();
  next.restart(review_line, payment_line);
  if let Some(title) = resubmission.title {
    next.set_title(title);
  }
  if let Some(content) = resubmission.content {
    next.set_content(content);
  }
  next.settle(now);

  let (epoch, to_status) = (next.epoch(), next.status());
  let record = next
    .history_mut()
    .append(HistoryRecord {
      sequence: 0,
      epoch,
      actor: actor.clone(),
      entry: HistoryEntry::Resubmitted {
        previous_epoch: workflow.epoch(),
      },
      from_status: workflow.status(),
      to_status,
      recorded_at: now,
      opinion: resubmission.note,
      reason: None,
    })
    .clone();

  debug!(
    workflow_id = %next.id(),
    epoch = next.epoch(),
    from_status = %workflow.status(),
    to_status = %next.status(),
    "workflow resubmitted"
  );

  Ok(Transition {
    workflow: next,
    record,
    completion: None,
  })
}

fn fresh_line(
  workflow: &Workflow,
  kind: LineKind,
  assignees: Option<Vec<Identity>>,
) -> Result<Line, EngineError> {
  match assignees {
    Some(assignees) => Ok(Line::from_assignees(kind, assignees)?),
    None => Ok(workflow.line(kind).reset()),
  }
}
