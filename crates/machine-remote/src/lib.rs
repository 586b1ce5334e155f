//! Remote Client: long-lived connection to one sub-machine, with backoff
//! reconnect, periodic resource-list refresh, and fail-fast proxy lookups.

mod client;
mod config;
mod error;
mod transport;

pub use client::{ConnectionState, RemoteClient};
pub use config::RemoteConfig;
pub use error::RemoteError;
pub use transport::RemoteTransport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
