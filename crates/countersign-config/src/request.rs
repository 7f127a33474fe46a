use serde::{Deserialize, Serialize};

use crate::step::StepDef;

/// Document links carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentsDef {
  /// The document under approval.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject: Option<String>,

  /// The workflow's own document (the request body).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attachments: Vec<String>,
}

/// A new approval request as submitted by a requester.
///
/// Lines come either from a named template or from the explicit
/// `review_line` / `payment_line` lists; a template takes precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDef {
  pub requester_email: String,
  pub requester_name: String,

  #[serde(default)]
  pub title: String,

  #[serde(default)]
  pub documents: DocumentsDef,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template: Option<String>,

  #[serde(default)]
  pub review_line: Vec<StepDef>,

  #[serde(default)]
  pub payment_line: Vec<StepDef>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_request_with_template() {
    let json = r#"{
      "requester_email": "kim@example.com",
      "requester_name": "Kim",
      "title": "Lab equipment",
      "documents": { "subject": "doc-1", "attachments": ["receipt-1"] },
      "template": "expense-basic"
    }"#;

    let request: RequestDef = serde_json::from_str(json).unwrap();
    assert_eq!(request.template.as_deref(), Some("expense-basic"));
    assert_eq!(request.documents.subject.as_deref(), Some("doc-1"));
    assert_eq!(request.documents.content, None);
    assert!(request.review_line.is_empty());
  }

  #[test]
  fn test_parse_request_with_lines() {
    let json = r#"{
      "requester_email": "kim@example.com",
      "requester_name": "Kim",
      "documents": { "content": "wf-doc" },
      "review_line": [{ "step": 1, "email": "a@example.com", "name": "A" }],
      "payment_line": [{ "step": 1, "email": "c@example.com", "name": "C" }]
    }"#;

    let request: RequestDef = serde_json::from_str(json).unwrap();
    assert_eq!(request.title, "");
    assert_eq!(request.review_line[0], StepDef::new(1, "a@example.com", "A"));
  }
}
