use serde::{Deserialize, Serialize};

/// A verified actor or assignee.
///
/// Only `email` takes part in comparisons; `display_name` is carried for
/// history and presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub email: String,
  #[serde(alias = "name")]
  pub display_name: String,
}

impl Identity {
  pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
    Self {
      email: email.into(),
      display_name: display_name.into(),
    }
  }

  /// Normalized email used for matching and deduplication.
  pub fn email_key(&self) -> String {
    normalize_email(&self.email)
  }

  /// Whether `email` names this identity, ignoring case and surrounding
  /// whitespace.
  pub fn has_email(&self, email: &str) -> bool {
    self.email_key() == normalize_email(email)
  }

  pub fn is(&self, other: &Identity) -> bool {
    self.has_email(&other.email)
  }
}

impl std::fmt::Display for Identity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.display_name.is_empty() {
      f.write_str(&self.email)
    } else {
      write!(f, "{} <{}>", self.display_name, self.email)
    }
  }
}

pub(crate) fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}
