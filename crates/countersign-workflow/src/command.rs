//! Typed commands accepted by the engine.
//!
//! Each command carries exactly the fields its action needs. A rejection
//! holds a [`Reason`], which can only be built from non-blank text.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::line::LineKind;
use crate::resubmit::Resubmission;

/// The step a command is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTarget {
  pub line: LineKind,
  pub step: u32,
}

impl StepTarget {
  pub fn new(line: LineKind, step: u32) -> Self {
    Self { line, step }
  }

  pub fn review(step: u32) -> Self {
    Self::new(LineKind::Review, step)
  }

  pub fn payment(step: u32) -> Self {
    Self::new(LineKind::Payment, step)
  }
}

/// Non-blank rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reason(String);

impl Reason {
  pub fn new(text: impl Into<String>) -> Result<Self, EngineError> {
    let text = text.into();
    if text.trim().is_empty() {
      return Err(EngineError::MissingReason);
    }
    Ok(Self(text))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for Reason {
  type Error = EngineError;

  fn try_from(text: String) -> Result<Self, Self::Error> {
    Self::new(text)
  }
}

impl From<Reason> for String {
  fn from(reason: Reason) -> Self {
    reason.0
  }
}

/// A request to change a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
  Approve {
    #[serde(flatten)]
    target: StepTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opinion: Option<String>,
  },
  Reject {
    #[serde(flatten)]
    target: StepTarget,
    reason: Reason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opinion: Option<String>,
  },
  Hold {
    #[serde(flatten)]
    target: StepTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opinion: Option<String>,
  },
  /// Approve a held step, recorded as a resumption.
  Resume {
    #[serde(flatten)]
    target: StepTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opinion: Option<String>,
  },
  Resubmit(Resubmission),
}

impl Command {
  pub fn approve(target: StepTarget) -> Self {
    Self::Approve {
      target,
      opinion: None,
    }
  }

  pub fn reject(target: StepTarget, reason: impl Into<String>) -> Result<Self, EngineError> {
    Ok(Self::Reject {
      target,
      reason: Reason::new(reason)?,
      opinion: None,
    })
  }

  pub fn hold(target: StepTarget, reason: Option<String>) -> Self {
    Self::Hold {
      target,
      reason,
      opinion: None,
    }
  }

  pub fn resume(target: StepTarget) -> Self {
    Self::Resume {
      target,
      opinion: None,
    }
  }

  /// Attach an opinion to a step command; resubmissions are returned as is.
  pub fn with_opinion(mut self, text: impl Into<String>) -> Self {
    match &mut self {
      Self::Approve { opinion, .. }
      | Self::Reject { opinion, .. }
      | Self::Hold { opinion, .. }
      | Self::Resume { opinion, .. } => *opinion = Some(text.into()),
      Self::Resubmit(_) => {}
    }
    self
  }

  pub fn target(&self) -> Option<StepTarget> {
    match self {
      Self::Approve { target, .. }
      | Self::Reject { target, .. }
      | Self::Hold { target, .. }
      | Self::Resume { target, .. } => Some(*target),
      Self::Resubmit(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_blank_reason_rejected() {
    assert_eq!(Reason::new("  ").unwrap_err(), EngineError::MissingReason);
    assert_eq!(
      Command::reject(StepTarget::review(1), "").unwrap_err(),
      EngineError::MissingReason
    );
  }

  #[test]
  fn test_parse_reject_requires_reason() {
    let ok: Command = serde_json::from_str(
      r#"{ "action": "reject", "line": "payment", "step": 1, "reason": "missing receipt" }"#,
    )
    .unwrap();
    assert!(matches!(
      ok,
      Command::Reject { target, ref reason, .. }
        if target == StepTarget::payment(1) && reason.as_str() == "missing receipt"
    ));

    let blank = serde_json::from_str::<Command>(
      r#"{ "action": "reject", "line": "payment", "step": 1, "reason": "" }"#,
    );
    assert!(blank.is_err());

    let missing =
      serde_json::from_str::<Command>(r#"{ "action": "reject", "line": "payment", "step": 1 }"#);
    assert!(missing.is_err());
  }

  #[test]
  fn test_parse_hold_without_reason() {
    let command: Command =
      serde_json::from_str(r#"{ "action": "hold", "line": "review", "step": 2 }"#).unwrap();
    assert_eq!(command, Command::hold(StepTarget::review(2), None));
  }

  #[test]
  fn test_with_opinion() {
    let command = Command::approve(StepTarget::review(1)).with_opinion("looks fine");
    assert!(matches!(command, Command::Approve { opinion: Some(ref o), .. } if o == "looks fine"));
  }
}
