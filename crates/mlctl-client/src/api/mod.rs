mod client;
mod error;
mod transport;

pub use client::*;
pub use error::*;
pub use transport::*;

/// API version used by asset, job, datastore and workspace calls.
pub const API_VERSION_2020_09_01_PREVIEW: &str = "2020-09-01-preview";
/// API version used by online endpoint and deployment calls.
pub const API_VERSION_2020_12_01_PREVIEW: &str = "2020-12-01-preview";
