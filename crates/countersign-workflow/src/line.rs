use serde::{Deserialize, Serialize};

use crate::error::{GuardViolation, LineError};
use crate::identity::Identity;
use crate::step::{Step, StepStatus};

/// Which phase of a workflow a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
  Review,
  Payment,
}

impl LineKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Review => "review",
      Self::Payment => "payment",
    }
  }
}

impl std::fmt::Display for LineKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for LineKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "review" => Ok(Self::Review),
      "payment" => Ok(Self::Payment),
      other => Err(format!("unknown line kind: {}", other)),
    }
  }
}

/// An ordered sequence of steps for one phase.
///
/// Invariants, checked on construction and on deserialization:
/// - at least one step
/// - orders are exactly `1..=n`
/// - no assignee appears twice (by email, case-insensitive)
/// - every step before the first unsettled one is approved, and every step
///   after it is still pending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLine")]
pub struct Line {
  kind: LineKind,
  steps: Vec<Step>,
}

#[derive(Deserialize)]
struct RawLine {
  kind: LineKind,
  steps: Vec<Step>,
}

impl TryFrom<RawLine> for Line {
  type Error = LineError;

  fn try_from(raw: RawLine) -> Result<Self, Self::Error> {
    Line::new(raw.kind, raw.steps)
  }
}

impl Line {
  /// Build a line from steps in any order.
  pub fn new(kind: LineKind, mut steps: Vec<Step>) -> Result<Self, LineError> {
    if steps.is_empty() {
      return Err(LineError::Empty { kind });
    }
    steps.sort_by_key(|s| s.order);

    for (expected, step) in (1..).zip(&steps) {
      if step.order != expected {
        return Err(LineError::NonContiguousOrder {
          kind,
          expected,
          found: step.order,
        });
      }
      if step.assignee.email.trim().is_empty() {
        return Err(LineError::MissingAssignee {
          kind,
          order: step.order,
        });
      }
    }

    for (i, step) in steps.iter().enumerate() {
      if steps[..i].iter().any(|s| s.assignee.is(&step.assignee)) {
        return Err(LineError::DuplicateAssignee {
          kind,
          email: step.assignee.email.clone(),
        });
      }
    }

    check_statuses(kind, &steps)?;

    Ok(Self { kind, steps })
  }

  /// Build a fresh line, numbering assignees from 1 in the given order.
  pub fn from_assignees(
    kind: LineKind,
    assignees: impl IntoIterator<Item = Identity>,
  ) -> Result<Self, LineError> {
    let steps = (1..)
      .zip(assignees)
      .map(|(order, assignee)| Step::pending(order, assignee))
      .collect();
    Self::new(kind, steps)
  }

  pub fn kind(&self) -> LineKind {
    self.kind
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn step(&self, order: u32) -> Option<&Step> {
    self.steps.iter().find(|s| s.order == order)
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  /// Always false for a constructed line; present for API symmetry.
  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// The only step eligible for action: the lowest-order step that is
  /// pending or held, provided every step before it is approved.
  pub fn current(&self) -> Option<&Step> {
    self
      .steps
      .iter()
      .find(|s| s.status != StepStatus::Approved)
      .filter(|s| s.status.is_open())
  }

  pub fn is_complete(&self) -> bool {
    self.steps.iter().all(|s| s.status == StepStatus::Approved)
  }

  pub fn is_rejected(&self) -> bool {
    self.steps.iter().any(|s| s.status == StepStatus::Rejected)
  }

  /// Complete or rejected: no further transitions are possible.
  pub fn is_terminal(&self) -> bool {
    self.is_complete() || self.is_rejected()
  }

  /// Whether any step has left `Pending`.
  pub fn has_activity(&self) -> bool {
    self.steps.iter().any(|s| s.status != StepStatus::Pending)
  }

  pub fn assignees(&self) -> impl Iterator<Item = &Identity> {
    self.steps.iter().map(|s| &s.assignee)
  }

  /// Check that `actor` may act on step `order` right now.
  pub fn can_act(&self, order: u32, actor: &Identity) -> Result<&Step, GuardViolation> {
    let line = self.kind;
    let Some(current) = self.current() else {
      return Err(GuardViolation::LineAlreadyTerminal { line });
    };
    if current.order != order {
      return Err(GuardViolation::NotCurrentStep {
        line,
        requested: order,
      });
    }
    if !current.assignee.is(actor) {
      return Err(GuardViolation::NotAssignee {
        line,
        order,
        actor: actor.email.clone(),
      });
    }
    Ok(current)
  }

  /// A copy of this line with every step back at `Pending`.
  pub fn reset(&self) -> Self {
    Self {
      kind: self.kind,
      steps: self.steps.iter().map(Step::reset).collect(),
    }
  }

  pub(crate) fn step_mut(&mut self, order: u32) -> Option<&mut Step> {
    self.steps.iter_mut().find(|s| s.order == order)
  }
}

fn check_statuses(kind: LineKind, steps: &[Step]) -> Result<(), LineError> {
  let mut unsettled = false;
  for step in steps {
    if unsettled {
      if step.status != StepStatus::Pending {
        return Err(LineError::InconsistentStatus {
          kind,
          order: step.order,
          status: step.status,
        });
      }
    } else if step.status != StepStatus::Approved {
      unsettled = true;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(email: &str) -> Identity {
    Identity::new(email, email.split('@').next().unwrap_or_default())
  }

  fn line(emails: &[&str]) -> Line {
    Line::from_assignees(LineKind::Review, emails.iter().map(|e| id(e))).unwrap()
  }

  #[test]
  fn test_empty_line_rejected() {
    let err = Line::new(LineKind::Payment, vec![]).unwrap_err();
    assert_eq!(
      err,
      LineError::Empty {
        kind: LineKind::Payment
      }
    );
  }

  #[test]
  fn test_orders_sorted_and_checked() {
    let steps = vec![
      Step::pending(2, id("b@example.com")),
      Step::pending(1, id("a@example.com")),
    ];
    let line = Line::new(LineKind::Review, steps).unwrap();
    assert_eq!(line.steps()[0].assignee.email, "a@example.com");

    let gap = vec![
      Step::pending(1, id("a@example.com")),
      Step::pending(3, id("b@example.com")),
    ];
    assert_eq!(
      Line::new(LineKind::Review, gap).unwrap_err(),
      LineError::NonContiguousOrder {
        kind: LineKind::Review,
        expected: 2,
        found: 3
      }
    );

    let zero = vec![Step::pending(0, id("a@example.com"))];
    assert!(matches!(
      Line::new(LineKind::Review, zero),
      Err(LineError::NonContiguousOrder { expected: 1, found: 0, .. })
    ));
  }

  #[test]
  fn test_duplicate_assignee_rejected() {
    let err = Line::from_assignees(
      LineKind::Review,
      [id("a@example.com"), id("A@Example.com")],
    )
    .unwrap_err();
    assert!(matches!(err, LineError::DuplicateAssignee { .. }));
  }

  #[test]
  fn test_blank_assignee_rejected() {
    let err = Line::from_assignees(LineKind::Review, [Identity::new("  ", "Nobody")]).unwrap_err();
    assert_eq!(
      err,
      LineError::MissingAssignee {
        kind: LineKind::Review,
        order: 1
      }
    );
  }

  #[test]
  fn test_inconsistent_statuses_rejected() {
    let mut first = Step::pending(1, id("a@example.com"));
    let mut second = Step::pending(2, id("b@example.com"));
    second.status = StepStatus::Approved;
    assert!(matches!(
      Line::new(LineKind::Review, vec![first.clone(), second.clone()]),
      Err(LineError::InconsistentStatus { order: 2, .. })
    ));

    first.status = StepStatus::Approved;
    second.status = StepStatus::Held;
    assert!(Line::new(LineKind::Review, vec![first, second]).is_ok());
  }

  #[test]
  fn test_current_step() {
    let mut line = line(&["a@example.com", "b@example.com"]);
    assert_eq!(line.current().map(|s| s.order), Some(1));

    line.steps[0].status = StepStatus::Approved;
    assert_eq!(line.current().map(|s| s.order), Some(2));

    line.steps[1].status = StepStatus::Held;
    assert_eq!(line.current().map(|s| s.order), Some(2));

    line.steps[1].status = StepStatus::Rejected;
    assert!(line.current().is_none());
    assert!(line.is_terminal());
  }

  #[test]
  fn test_can_act() {
    let line = line(&["a@example.com", "b@example.com"]);

    assert!(line.can_act(1, &id("A@EXAMPLE.COM")).is_ok());
    assert_eq!(
      line.can_act(2, &id("b@example.com")).unwrap_err(),
      GuardViolation::NotCurrentStep {
        line: LineKind::Review,
        requested: 2
      }
    );
    assert!(matches!(
      line.can_act(1, &id("b@example.com")),
      Err(GuardViolation::NotAssignee { order: 1, .. })
    ));
  }

  #[test]
  fn test_can_act_on_complete_line() {
    let mut line = line(&["a@example.com"]);
    line.steps[0].status = StepStatus::Approved;
    assert_eq!(
      line.can_act(1, &id("a@example.com")).unwrap_err(),
      GuardViolation::LineAlreadyTerminal {
        line: LineKind::Review
      }
    );
  }

  #[test]
  fn test_deserialize_validates() {
    let json = r#"{
      "kind": "payment",
      "steps": [
        { "order": 1, "assignee": { "email": "a@example.com", "display_name": "A" }, "status": "pending" },
        { "order": 1, "assignee": { "email": "b@example.com", "display_name": "B" }, "status": "pending" }
      ]
    }"#;
    let err = serde_json::from_str::<Line>(json).unwrap_err();
    assert!(err.to_string().contains("not contiguous"));
  }
}
