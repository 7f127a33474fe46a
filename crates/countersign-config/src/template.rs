use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::step::StepDef;

/// A named, reusable pair of review and payment lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
  pub name: String,

  /// Document category this template is offered for, e.g. "expense".
  #[serde(default)]
  pub document_tag: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  /// Whether this is the template picked by default for its tag.
  #[serde(default)]
  pub is_default: bool,

  pub review_line: Vec<StepDef>,
  pub payment_line: Vec<StepDef>,
}

impl TemplateDef {
  fn validate(&self) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidTemplate {
      name: self.name.clone(),
      message: message.to_string(),
    };
    if self.name.trim().is_empty() {
      return Err(invalid("name is blank"));
    }
    if self.review_line.is_empty() || self.payment_line.is_empty() {
      return Err(invalid("review and payment lines need at least one step"));
    }
    Ok(())
  }
}

/// An in-memory catalog of templates.
///
/// Names are unique, and each document tag has at most one default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Templates {
  templates: Vec<TemplateDef>,
}

impl Templates {
  pub fn new(templates: Vec<TemplateDef>) -> Result<Self, ConfigError> {
    for (i, template) in templates.iter().enumerate() {
      template.validate()?;
      let earlier = &templates[..i];
      if earlier.iter().any(|t| t.name == template.name) {
        return Err(ConfigError::DuplicateTemplate(template.name.clone()));
      }
      if template.is_default
        && earlier
          .iter()
          .any(|t| t.is_default && t.document_tag == template.document_tag)
      {
        return Err(ConfigError::DuplicateDefault(template.document_tag.clone()));
      }
    }
    Ok(Self { templates })
  }

  /// Parse a JSON array of templates.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let templates: Vec<TemplateDef> =
      serde_json::from_str(json).map_err(|source| ConfigError::Parse {
        what: "templates".to_string(),
        source,
      })?;
    Self::new(templates)
  }

  /// Load a JSON array of templates from disk.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&json)
  }

  /// Like [`Templates::load`], but a missing file is an empty catalog.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    if path.exists() {
      Self::load(path)
    } else {
      Ok(Self::default())
    }
  }

  /// Write the catalog to `path` as a JSON array, creating parent
  /// directories as needed.
  pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
      what: "templates".to_string(),
      source,
    })?;
    let write = |source| ConfigError::Write {
      path: path.to_path_buf(),
      source,
    };
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(write)?;
    }
    std::fs::write(path, json).map_err(write)
  }

  /// Add a new template.
  ///
  /// A template added as default takes the default over from any other
  /// template with the same tag.
  pub fn add(&mut self, template: TemplateDef) -> Result<(), ConfigError> {
    template.validate()?;
    if self.get(&template.name).is_some() {
      return Err(ConfigError::DuplicateTemplate(template.name));
    }
    self.demote_defaults(&template, None);
    self.templates.push(template);
    Ok(())
  }

  /// Replace the template called `name`. The replacement may carry a new
  /// name, provided no other template uses it.
  pub fn replace(&mut self, name: &str, template: TemplateDef) -> Result<(), ConfigError> {
    template.validate()?;
    let index = self
      .position(name)
      .ok_or_else(|| ConfigError::TemplateNotFound(name.to_string()))?;
    if template.name != name && self.get(&template.name).is_some() {
      return Err(ConfigError::DuplicateTemplate(template.name));
    }
    self.demote_defaults(&template, Some(index));
    self.templates[index] = template;
    Ok(())
  }

  /// Remove and return the template called `name`.
  pub fn remove(&mut self, name: &str) -> Result<TemplateDef, ConfigError> {
    let index = self
      .position(name)
      .ok_or_else(|| ConfigError::TemplateNotFound(name.to_string()))?;
    Ok(self.templates.remove(index))
  }

  fn position(&self, name: &str) -> Option<usize> {
    self.templates.iter().position(|t| t.name == name)
  }

  fn demote_defaults(&mut self, template: &TemplateDef, skip: Option<usize>) {
    if !template.is_default {
      return;
    }
    for (i, other) in self.templates.iter_mut().enumerate() {
      if Some(i) != skip && other.document_tag == template.document_tag {
        other.is_default = false;
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&TemplateDef> {
    self.templates.iter().find(|t| t.name == name)
  }

  /// The default template for a document tag.
  pub fn default_for(&self, document_tag: &str) -> Option<&TemplateDef> {
    self
      .templates
      .iter()
      .find(|t| t.is_default && t.document_tag == document_tag)
  }

  /// All templates offered for a document tag.
  pub fn for_tag<'a>(&'a self, document_tag: &'a str) -> impl Iterator<Item = &'a TemplateDef> {
    self
      .templates
      .iter()
      .filter(move |t| t.document_tag == document_tag)
  }

  pub fn iter(&self) -> impl Iterator<Item = &TemplateDef> {
    self.templates.iter()
  }

  pub fn len(&self) -> usize {
    self.templates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.templates.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TEMPLATES: &str = r#"[
    {
      "name": "expense-basic",
      "document_tag": "expense",
      "is_default": true,
      "review_line": [{ "step": 1, "email": "lead@example.com", "name": "Lead" }],
      "payment_line": [{ "step": 1, "email": "cfo@example.com", "name": "CFO" }]
    },
    {
      "name": "expense-large",
      "document_tag": "expense",
      "description": "Purchases over budget",
      "review_line": [
        { "step": 1, "email": "lead@example.com", "name": "Lead" },
        { "step": 2, "email": "head@example.com", "name": "Head" }
      ],
      "payment_line": [{ "step": 1, "email": "cfo@example.com", "name": "CFO" }]
    }
  ]"#;

  #[test]
  fn test_parse_templates() {
    let templates = Templates::from_json(TEMPLATES).unwrap();
    assert_eq!(templates.len(), 2);

    let large = templates.get("expense-large").unwrap();
    assert!(!large.is_default);
    assert_eq!(large.review_line.len(), 2);
    assert_eq!(large.description.as_deref(), Some("Purchases over budget"));
  }

  #[test]
  fn test_default_for_tag() {
    let templates = Templates::from_json(TEMPLATES).unwrap();
    assert_eq!(templates.default_for("expense").unwrap().name, "expense-basic");
    assert!(templates.default_for("travel").is_none());
    assert_eq!(templates.for_tag("expense").count(), 2);
  }

  fn template(name: &str, tag: &str, is_default: bool) -> TemplateDef {
    TemplateDef {
      name: name.to_string(),
      document_tag: tag.to_string(),
      description: None,
      is_default,
      review_line: vec![StepDef::new(1, "a@example.com", "A")],
      payment_line: vec![StepDef::new(1, "b@example.com", "B")],
    }
  }

  #[test]
  fn test_duplicate_names_rejected() {
    let dup = template("dup", "", false);
    let err = Templates::new(vec![dup.clone(), dup]).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateTemplate(name) if name == "dup"));
  }

  #[test]
  fn test_two_defaults_for_a_tag_rejected() {
    let err = Templates::new(vec![
      template("one", "expense", true),
      template("two", "travel", true),
      template("three", "expense", true),
    ])
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateDefault(tag) if tag == "expense"));
  }

  #[test]
  fn test_add_template() {
    let mut templates = Templates::from_json(TEMPLATES).unwrap();
    templates.add(template("travel", "travel", true)).unwrap();
    assert_eq!(templates.default_for("travel").unwrap().name, "travel");

    let err = templates.add(template("expense-basic", "expense", false)).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateTemplate(_)));

    let mut empty = template("empty", "expense", false);
    empty.payment_line.clear();
    assert!(matches!(
      templates.add(empty),
      Err(ConfigError::InvalidTemplate { .. })
    ));
    assert!(matches!(
      templates.add(template("  ", "expense", false)),
      Err(ConfigError::InvalidTemplate { .. })
    ));
    assert_eq!(templates.len(), 3);
  }

  #[test]
  fn test_new_default_takes_over_tag() {
    let mut templates = Templates::from_json(TEMPLATES).unwrap();
    templates.add(template("expense-new", "expense", true)).unwrap();

    assert_eq!(templates.default_for("expense").unwrap().name, "expense-new");
    assert_eq!(templates.iter().filter(|t| t.is_default).count(), 1);

    let mut large = templates.get("expense-large").unwrap().clone();
    large.is_default = true;
    templates.replace("expense-large", large).unwrap();
    assert_eq!(templates.default_for("expense").unwrap().name, "expense-large");
    assert!(!templates.get("expense-new").unwrap().is_default);
  }

  #[test]
  fn test_replace_and_remove() {
    let mut templates = Templates::from_json(TEMPLATES).unwrap();

    let renamed = template("expense-small", "expense", true);
    templates.replace("expense-basic", renamed).unwrap();
    assert!(templates.get("expense-basic").is_none());
    assert_eq!(templates.default_for("expense").unwrap().name, "expense-small");

    let clash = template("expense-large", "expense", false);
    assert!(matches!(
      templates.replace("expense-small", clash),
      Err(ConfigError::DuplicateTemplate(_))
    ));
    assert!(matches!(
      templates.replace("missing", template("missing", "", false)),
      Err(ConfigError::TemplateNotFound(_))
    ));

    let removed = templates.remove("expense-large").unwrap();
    assert_eq!(removed.review_line.len(), 2);
    assert_eq!(templates.len(), 1);
    assert!(matches!(
      templates.remove("expense-large"),
      Err(ConfigError::TemplateNotFound(_))
    ));
  }

  #[test]
  fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog").join("templates.json");
    assert!(Templates::load_or_default(&path).unwrap().is_empty());

    let mut templates = Templates::from_json(TEMPLATES).unwrap();
    templates.add(template("travel", "travel", false)).unwrap();
    templates.save(&path).unwrap();

    assert_eq!(Templates::load_or_default(&path).unwrap(), templates);
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.json");
    std::fs::write(&path, TEMPLATES).unwrap();

    let templates = Templates::load(&path).unwrap();
    assert!(templates.get("expense-basic").is_some());

    let missing = Templates::load(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Read { .. }));
  }
}
