use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Access level granted on linked documents once a workflow completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantRole {
  #[default]
  Reader,
  Writer,
}

impl GrantRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Reader => "reader",
      Self::Writer => "writer",
    }
  }
}

impl std::fmt::Display for GrantRole {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Host application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
  /// SQLite database file, relative to the data directory.
  pub database: PathBuf,

  pub grant_role: GrantRole,

  /// Tracing filter used when `RUST_LOG` is not set.
  pub log_filter: String,

  /// Templates file, relative to the data directory.
  pub templates: PathBuf,
}

impl Default for HostConfig {
  fn default() -> Self {
    Self {
      database: PathBuf::from("countersign.db"),
      grant_role: GrantRole::Reader,
      log_filter: "info".to_string(),
      templates: PathBuf::from("templates.json"),
    }
  }
}

impl HostConfig {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    serde_json::from_str(json).map_err(|source| ConfigError::Parse {
      what: "host config".to_string(),
      source,
    })
  }

  /// Load the config at `path`, falling back to defaults when the file
  /// does not exist.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    match std::fs::read_to_string(path) {
      Ok(json) => Self::from_json(&json),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
      Err(source) => Err(ConfigError::Read {
        path: path.to_path_buf(),
        source,
      }),
    }
  }

  pub fn database_path(&self, data_dir: &Path) -> PathBuf {
    data_dir.join(&self.database)
  }

  pub fn templates_path(&self, data_dir: &Path) -> PathBuf {
    data_dir.join(&self.templates)
  }
}
