use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::line::Line;
use crate::step::StepStatus;

/// Workflow-level status, derived from the steps of both lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
  Waiting,
  UnderReview,
  ReviewComplete,
  ReviewRejected,
  ReviewHeld,
  UnderPayment,
  PaymentComplete,
  PaymentHeld,
  FullyRejected,
}

impl AggregateStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Waiting => "waiting",
      Self::UnderReview => "under_review",
      Self::ReviewComplete => "review_complete",
      Self::ReviewRejected => "review_rejected",
      Self::ReviewHeld => "review_held",
      Self::UnderPayment => "under_payment",
      Self::PaymentComplete => "payment_complete",
      Self::PaymentHeld => "payment_held",
      Self::FullyRejected => "fully_rejected",
    }
  }

  pub fn is_rejected(&self) -> bool {
    matches!(self, Self::ReviewRejected | Self::FullyRejected)
  }

  /// No step transition is accepted in a terminal status; a rejected
  /// workflow can still be resubmitted.
  pub fn is_terminal(&self) -> bool {
    self.is_rejected() || *self == Self::PaymentComplete
  }
}

impl std::fmt::Display for AggregateStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for AggregateStatus {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "waiting" => Ok(Self::Waiting),
      "under_review" => Ok(Self::UnderReview),
      "review_complete" => Ok(Self::ReviewComplete),
      "review_rejected" => Ok(Self::ReviewRejected),
      "review_held" => Ok(Self::ReviewHeld),
      "under_payment" => Ok(Self::UnderPayment),
      "payment_complete" => Ok(Self::PaymentComplete),
      "payment_held" => Ok(Self::PaymentHeld),
      "fully_rejected" => Ok(Self::FullyRejected),
      other => Err(WorkflowError::UnknownStatus(other.to_string())),
    }
  }
}

/// Derive the aggregate status from both lines.
///
/// Rules are evaluated top to bottom and the first match wins, so rejection
/// dominates hold, hold dominates progress, and progress dominates waiting.
/// `Waiting` only applies to a workflow that has never been resubmitted
/// (`epoch == 0`) and whose review line has seen no action.
pub fn derive_status(review: &Line, payment: &Line, epoch: u32) -> AggregateStatus {
  let held = |line: &Line| line.current().is_some_and(|s| s.status == StepStatus::Held);

  if review.is_rejected() {
    AggregateStatus::ReviewRejected
  } else if payment.is_rejected() {
    AggregateStatus::FullyRejected
  } else if held(review) {
    AggregateStatus::ReviewHeld
  } else if held(payment) {
    AggregateStatus::PaymentHeld
  } else if !review.is_complete() {
    if epoch == 0 && !review.has_activity() {
      AggregateStatus::Waiting
    } else {
      AggregateStatus::UnderReview
    }
  } else if !payment.is_complete() {
    AggregateStatus::UnderPayment
  } else {
    AggregateStatus::PaymentComplete
  }
}
