use serde::{Deserialize, Serialize};

/// One assignee slot in a line definition.
///
/// `step` is the 1-based position within the line; contiguity is checked
/// when the definition is stamped into a live line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDef {
  pub step: u32,
  pub email: String,
  pub name: String,
}

impl StepDef {
  pub fn new(step: u32, email: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      step,
      email: email.into(),
      name: name.into(),
    }
  }
}
