use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {what}: {source}")]
  Parse {
    what: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("duplicate template name: {0}")]
  DuplicateTemplate(String),

  #[error("template not found: {0}")]
  TemplateNotFound(String),

  #[error("more than one default template for tag {0:?}")]
  DuplicateDefault(String),

  #[error("invalid template {name:?}: {message}")]
  InvalidTemplate { name: String, message: String },
}
