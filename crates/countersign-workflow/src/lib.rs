//! Countersign Workflow
//!
//! This crate provides the live approval workflow for countersign: a review
//! line followed by a payment line, each an ordered list of assignee steps.
//!
//! Key differences from `countersign-config`:
//! - Lines are validated (contiguous orders, unique assignees, consistent
//!   step statuses)
//! - Aggregate status is derived from step states, never stored as input
//! - Every change goes through [`apply`], which returns a new value and a
//!   history record, or an error and no change at all

mod command;
mod engine;
mod error;
mod grant;
mod history;
mod identity;
mod line;
mod resubmit;
mod status;
mod step;
mod template;
mod workflow;

pub use command::{Command, Reason, StepTarget};
pub use engine::{Transition, apply, can_act};
pub use error::{EngineError, GuardViolation, LineError, WorkflowError};
pub use grant::{Completion, DocumentGrant, completion_grants};
pub use history::{History, HistoryEntry, HistoryRecord, StepAction};
pub use identity::Identity;
pub use line::{Line, LineKind};
pub use resubmit::Resubmission;
pub use status::{AggregateStatus, derive_status};
pub use step::{Step, StepStatus};
pub use template::{LinePair, apply_template, lines_from_defs};
pub use workflow::{DocumentLinks, Workflow, WorkflowRequest};
