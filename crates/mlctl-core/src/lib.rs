//! Schemas, reference resolution and resource operations of the mlctl client.
//!
//! A YAML document is loaded into an entity through [`schema::load_file`],
//! its embedded references are resolved by [`orchestrator`] and the result
//! is sent through one of the façades reachable from [`MlClient`].

pub mod arm_id;
pub mod config;
pub mod entities;
mod error;
pub mod fields;
pub mod operations;
pub mod orchestrator;
pub mod reference;
pub mod schema;

pub use config::{ConfigError, MlClientConfig, WorkspaceScope};
pub use error::{Error, ReferenceError, Result, ValidationError, ValidationErrors};
pub use operations::lro::CancellationToken;
pub use operations::{MlClient, ServiceContext};
pub use reference::Reference;

pub use mlctl_client::AccessToken;
