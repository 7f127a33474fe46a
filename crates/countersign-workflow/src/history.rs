//! Append-only transition log.
//!
//! Records never point at each other. Resubmission rounds are told apart by
//! the `epoch` counter, and a resubmission marker names the epoch it closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::line::LineKind;
use crate::status::AggregateStatus;
use crate::step::StepStatus;

/// The action an actor took on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
  Approve,
  Reject,
  Hold,
  Resume,
}

impl StepAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Approve => "approve",
      Self::Reject => "reject",
      Self::Hold => "hold",
      Self::Resume => "resume",
    }
  }
}

impl std::fmt::Display for StepAction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What a history record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
  Step {
    line: LineKind,
    step: u32,
    action: StepAction,
    from: StepStatus,
    to: StepStatus,
  },
  Resubmitted {
    previous_epoch: u32,
  },
}

/// One immutable transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
  /// 1-based position in the workflow's history.
  pub sequence: u64,
  pub epoch: u32,
  pub actor: Identity,
  #[serde(flatten)]
  pub entry: HistoryEntry,
  pub from_status: AggregateStatus,
  pub to_status: AggregateStatus,
  pub recorded_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub opinion: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

impl HistoryRecord {
  pub fn line(&self) -> Option<LineKind> {
    match self.entry {
      HistoryEntry::Step { line, .. } => Some(line),
      HistoryEntry::Resubmitted { .. } => None,
    }
  }

  pub fn action(&self) -> Option<StepAction> {
    match self.entry {
      HistoryEntry::Step { action, .. } => Some(action),
      HistoryEntry::Resubmitted { .. } => None,
    }
  }

  pub fn is_resubmission(&self) -> bool {
    matches!(self.entry, HistoryEntry::Resubmitted { .. })
  }
}

/// The workflow's history. Only the engine appends; nothing removes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryRecord>);

impl History {
  pub fn records(&self) -> &[HistoryRecord] {
    &self.0
  }

  pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn last(&self) -> Option<&HistoryRecord> {
    self.0.last()
  }

  /// Records belonging to one resubmission round.
  pub fn epoch(&self, epoch: u32) -> impl Iterator<Item = &HistoryRecord> {
    self.0.iter().filter(move |r| r.epoch == epoch)
  }

  /// Records after position `sequence`.
  pub fn since(&self, sequence: u64) -> &[HistoryRecord] {
    let start = usize::try_from(sequence).unwrap_or(usize::MAX).min(self.0.len());
    &self.0[start..]
  }

  /// Append `record`, assigning it the next sequence number.
  pub(crate) fn append(&mut self, mut record: HistoryRecord) -> &HistoryRecord {
    record.sequence = self.0.len() as u64 + 1;
    self.0.push(record);
    &self.0[self.0.len() - 1]
  }
}
