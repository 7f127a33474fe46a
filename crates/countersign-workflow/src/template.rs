//! Stamping line definitions into fresh lines.

use countersign_config::{RequestDef, StepDef, TemplateDef, Templates};

use crate::error::{LineError, WorkflowError};
use crate::identity::Identity;
use crate::line::{Line, LineKind};
use crate::step::Step;
use crate::workflow::{DocumentLinks, WorkflowRequest};

/// A validated review and payment line, ready for a new request.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePair {
  pub review: Line,
  pub payment: Line,
}

/// Stamp a template's lines as fresh, all-pending lines.
pub fn apply_template(template: &TemplateDef) -> Result<LinePair, LineError> {
  lines_from_defs(&template.review_line, &template.payment_line)
}

/// Build both lines from step definitions, keeping their declared orders.
pub fn lines_from_defs(review: &[StepDef], payment: &[StepDef]) -> Result<LinePair, LineError> {
  Ok(LinePair {
    review: line_from_defs(LineKind::Review, review)?,
    payment: line_from_defs(LineKind::Payment, payment)?,
  })
}

fn line_from_defs(kind: LineKind, defs: &[StepDef]) -> Result<Line, LineError> {
  let steps = defs
    .iter()
    .map(|def| Step::pending(def.step, Identity::new(def.email.trim(), def.name.as_str())))
    .collect();
  Line::new(kind, steps)
}

impl WorkflowRequest {
  /// Resolve a request definition against the template catalog.
  ///
  /// A named template takes precedence over explicit lines.
  pub fn from_def(def: &RequestDef, templates: &Templates) -> Result<Self, WorkflowError> {
    let lines = match def.template.as_deref() {
      Some(name) => {
        let template = templates
          .get(name)
          .ok_or_else(|| WorkflowError::TemplateNotFound(name.to_string()))?;
        apply_template(template)?
      }
      None => lines_from_defs(&def.review_line, &def.payment_line)?,
    };

    let documents = DocumentLinks::from(def.documents.clone());
    if documents.is_empty() {
      return Err(WorkflowError::NoDocument);
    }

    Ok(Self {
      requester: Identity::new(def.requester_email.trim(), def.requester_name.as_str()),
      title: def.title.clone(),
      documents,
      review_line: lines.review,
      payment_line: lines.payment,
    })
  }
}
