//! Countersign Config
//!
//! This crate contains the serializable definitions for countersign. These
//! types describe approval lines, templates and requests before they are
//! validated and stamped into a live workflow by `countersign-workflow`.
//!
//! Definitions can be loaded from:
//! - JSON files (via the CLI, e.g. `countersign request request.json`)
//! - Database storage (as JSON blobs)

mod error;
mod host;
mod request;
mod step;
mod template;

pub use error::ConfigError;
pub use host::{GrantRole, HostConfig};
pub use request::{DocumentsDef, RequestDef};
pub use step::StepDef;
pub use template::{TemplateDef, Templates};
