use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Pending,
  Approved,
  Rejected,
  Held,
}

impl StepStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
      Self::Held => "held",
    }
  }

  /// Pending or held: the step still awaits a decision.
  pub fn is_open(&self) -> bool {
    matches!(self, Self::Pending | Self::Held)
  }
}

impl std::fmt::Display for StepStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One approver's slot within a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub order: u32,
  pub assignee: Identity,
  pub status: StepStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub opinion: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reject_reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hold_reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub acted_at: Option<DateTime<Utc>>,
}

impl Step {
  /// A fresh step awaiting its turn.
  pub fn pending(order: u32, assignee: Identity) -> Self {
    Self {
      order,
      assignee,
      status: StepStatus::Pending,
      opinion: None,
      reject_reason: None,
      hold_reason: None,
      acted_at: None,
    }
  }

  pub(crate) fn approve(&mut self, now: DateTime<Utc>, opinion: Option<String>) {
    self.settle(StepStatus::Approved, now, opinion);
  }

  pub(crate) fn reject(&mut self, now: DateTime<Utc>, reason: String, opinion: Option<String>) {
    self.settle(StepStatus::Rejected, now, opinion);
    self.reject_reason = Some(reason);
  }

  pub(crate) fn hold(&mut self, now: DateTime<Utc>, reason: Option<String>, opinion: Option<String>) {
    self.settle(StepStatus::Held, now, opinion);
    self.hold_reason = reason;
  }

  /// A pending copy of this slot with everything but the assignee cleared.
  pub(crate) fn reset(&self) -> Self {
    Self::pending(self.order, self.assignee.clone())
  }

  fn settle(&mut self, status: StepStatus, now: DateTime<Utc>, opinion: Option<String>) {
    self.status = status;
    self.acted_at = Some(now);
    // An opinion given while holding survives a later opinion-less approval.
    if opinion.is_some() {
      self.opinion = opinion;
    }
  }
}
