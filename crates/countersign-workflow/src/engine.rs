//! The transition engine.
//!
//! [`apply`] is a pure function from `(workflow, actor, command, now)` to a
//! new workflow value. A refused command returns an error and produces
//! nothing, so the caller's workflow is never partially changed.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::command::{Command, StepTarget};
use crate::error::{EngineError, GuardViolation};
use crate::grant::{Completion, completion_grants};
use crate::history::{HistoryEntry, HistoryRecord, StepAction};
use crate::identity::Identity;
use crate::line::LineKind;
use crate::resubmit::resubmit;
use crate::status::AggregateStatus;
use crate::step::StepStatus;
use crate::workflow::Workflow;

/// The outcome of an accepted command.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
  /// The replacement workflow value.
  pub workflow: Workflow,
  /// The history record appended by this transition.
  pub record: HistoryRecord,
  /// Set when this transition completed the payment line.
  pub completion: Option<Completion>,
}

impl Transition {
  pub fn from_status(&self) -> AggregateStatus {
    self.record.from_status
  }

  pub fn to_status(&self) -> AggregateStatus {
    self.record.to_status
  }
}

/// Apply `command` on behalf of `actor`.
pub fn apply(
  workflow: &Workflow,
  actor: &Identity,
  command: Command,
  now: DateTime<Utc>,
) -> Result<Transition, EngineError> {
  match command {
    Command::Approve { target, opinion } => {
      apply_step(workflow, actor, target, Outcome::Approve, opinion, now)
    }
    Command::Reject {
      target,
      reason,
      opinion,
    } => apply_step(
      workflow,
      actor,
      target,
      Outcome::Reject(reason.into()),
      opinion,
      now,
    ),
    Command::Hold {
      target,
      reason,
      opinion,
    } => apply_step(workflow, actor, target, Outcome::Hold(reason), opinion, now),
    Command::Resume { target, opinion } => {
      apply_step(workflow, actor, target, Outcome::Resume, opinion, now)
    }
    Command::Resubmit(resubmission) => resubmit(workflow, actor, resubmission, now),
  }
}

/// Check whether `actor` could act on `target` right now, without applying
/// anything.
pub fn can_act(workflow: &Workflow, target: StepTarget, actor: &Identity) -> Result<(), GuardViolation> {
  check_phase(workflow, target)?;
  workflow.line(target.line).can_act(target.step, actor)?;
  Ok(())
}

enum Outcome {
  Approve,
  Reject(String),
  Hold(Option<String>),
  Resume,
}

impl Outcome {
  fn action(&self) -> StepAction {
    match self {
      Self::Approve => StepAction::Approve,
      Self::Reject(_) => StepAction::Reject,
      Self::Hold(_) => StepAction::Hold,
      Self::Resume => StepAction::Resume,
    }
  }
}

fn apply_step(
  workflow: &Workflow,
  actor: &Identity,
  target: StepTarget,
  outcome: Outcome,
  opinion: Option<String>,
  now: DateTime<Utc>,
) -> Result<Transition, EngineError> {
  check_phase(workflow, target)?;
  let from = workflow.line(target.line).can_act(target.step, actor)?.status;

  match (&outcome, from) {
    (Outcome::Hold(_), StepStatus::Held) => {
      return Err(
        GuardViolation::AlreadyHeld {
          line: target.line,
          order: target.step,
        }
        .into(),
      );
    }
    (Outcome::Resume, StepStatus::Pending) => {
      return Err(
        GuardViolation::NotHeld {
          line: target.line,
          order: target.step,
        }
        .into(),
      );
    }
    _ => {}
  }

  let action = outcome.action();
  let mut next = workflow.clone();
  let Some(step) = next.line_mut(target.line).step_mut(target.step) else {
    return Err(
      GuardViolation::NotCurrentStep {
        line: target.line,
        requested: target.step,
      }
      .into(),
    );
  };

  let reason = match outcome {
    Outcome::Approve | Outcome::Resume => {
      step.approve(now, opinion.clone());
      None
    }
    Outcome::Reject(reason) => {
      step.reject(now, reason.clone(), opinion.clone());
      Some(reason)
    }
    Outcome::Hold(reason) => {
      step.hold(now, reason.clone(), opinion.clone());
      reason
    }
  };
  let to = step.status;

  next.settle(now);

  let to_status = next.status();
  let record = next
    .history_mut()
    .append(HistoryRecord {
      sequence: 0,
      epoch: workflow.epoch(),
      actor: actor.clone(),
      entry: HistoryEntry::Step {
        line: target.line,
        step: target.step,
        action,
        from,
        to,
      },
      from_status: workflow.status(),
      to_status,
      recorded_at: now,
      opinion,
      reason,
    })
    .clone();

  let completion = (next.status() == AggregateStatus::PaymentComplete
    && workflow.status() != AggregateStatus::PaymentComplete)
    .then(|| Completion {
      workflow_id: next.id().to_string(),
      completed_at: next.completed_at().unwrap_or(now),
      grants: completion_grants(&next),
    });

  debug!(
    workflow_id = %next.id(),
    line = %target.line,
    step = target.step,
    action = %action,
    from_status = %workflow.status(),
    to_status = %next.status(),
    "step transition applied"
  );

  Ok(Transition {
    workflow: next,
    record,
    completion,
  })
}

/// Workflow-level gating on top of the per-line guard: nothing moves while
/// the workflow is rejected, and payment waits for review to finish.
fn check_phase(workflow: &Workflow, target: StepTarget) -> Result<(), GuardViolation> {
  if workflow.status().is_rejected() {
    return Err(GuardViolation::LineAlreadyTerminal { line: target.line });
  }
  if target.line == LineKind::Payment && !workflow.review_line().is_complete() {
    return Err(GuardViolation::NotCurrentStep {
      line: target.line,
      requested: target.step,
    });
  }
  Ok(())
}
