use thiserror::Error;

use crate::line::LineKind;
use crate::status::AggregateStatus;
use crate::step::StepStatus;

/// Construction-time violations of a line's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
  #[error("{kind} line has no steps")]
  Empty { kind: LineKind },

  #[error("{kind} line order is not contiguous: expected step {expected}, found {found}")]
  NonContiguousOrder {
    kind: LineKind,
    expected: u32,
    found: u32,
  },

  #[error("{kind} line step {order} has no assignee email")]
  MissingAssignee { kind: LineKind, order: u32 },

  #[error("{kind} line assigns {email} more than once")]
  DuplicateAssignee { kind: LineKind, email: String },

  #[error("{kind} line step {order} cannot be {status} behind an unsettled step")]
  InconsistentStatus {
    kind: LineKind,
    order: u32,
    status: StepStatus,
  },

  #[error("expected a {expected} line, got a {found} line")]
  WrongKind { expected: LineKind, found: LineKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("malformed line: {0}")]
  MalformedLine(#[from] LineError),

  #[error("workflow must reference at least one document")]
  NoDocument,

  #[error("template not found: {0}")]
  TemplateNotFound(String),

  #[error("unknown aggregate status: {0}")]
  UnknownStatus(String),
}

/// Why a step action was refused before any state changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
  #[error("{line} step {requested} is not the current step")]
  NotCurrentStep { line: LineKind, requested: u32 },

  #[error("{actor} is not the assignee of {line} step {order}")]
  NotAssignee {
    line: LineKind,
    order: u32,
    actor: String,
  },

  #[error("the {line} line no longer accepts transitions")]
  LineAlreadyTerminal { line: LineKind },

  #[error("{line} step {order} is already on hold")]
  AlreadyHeld { line: LineKind, order: u32 },

  #[error("{line} step {order} is not on hold")]
  NotHeld { line: LineKind, order: u32 },
}

/// Errors returned by the transition engine and the resubmission handler.
///
/// Every variant is recoverable and leaves the workflow untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
  #[error("invalid transition: {0}")]
  InvalidTransition(#[from] GuardViolation),

  #[error("a rejection requires a non-empty reason")]
  MissingReason,

  #[error("{actor} is not the requester of this workflow")]
  NotAuthorized { actor: String },

  #[error("workflow is {status}; only rejected workflows can be resubmitted")]
  InvalidState { status: AggregateStatus },

  #[error("malformed line: {0}")]
  MalformedLine(#[from] LineError),
}
