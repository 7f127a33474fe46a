//! Countersign Service
//!
//! The host side of the approval engine. The engine itself is pure; this
//! crate wraps it with everything a running application needs:
//!
//! - per-workflow serialization of commands, with parallelism across
//!   workflows
//! - loading and saving through a [`countersign_store::Store`]
//! - handing completion grants to a [`PermissionGranter`]
//! - reporting what happened to an [`EventNotifier`]

mod error;
mod events;
mod grant;
mod locks;
mod service;

pub use error::ServiceError;
pub use events::{ChannelNotifier, EventNotifier, NoopNotifier, WorkflowEvent};
pub use grant::{ChannelGranter, GrantError, NoopGranter, PermissionGrant, PermissionGranter};
pub use service::WorkflowService;
