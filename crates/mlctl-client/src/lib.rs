//! Wire layer of the mlctl control-plane client.
//!
//! This crate owns everything that touches the network: the blocking REST
//! [`api::Client`] behind the [`api::Transport`] seam, the versioned resource
//! envelopes in [`schemas`], and the blob upload collaborator in [`storage`].

pub mod api;
pub mod credentials;
pub mod schemas;
pub mod storage;

pub use api::{Client, ClientError, Transport};
pub use credentials::AccessToken;
