//! SSH module - handles SSH connections
//!
//! This module provides the transport under every SFTP session using the
//! russh library.
//!
//! # Features
//! - Public-key authentication with keys named by ~/.ssh/config
//! - Host key verification via ~/.ssh/known_hosts
//! - Registry of live sessions keyed by user, host and port
//!   (see `connection_registry`)

mod client;
mod config;
pub mod connection_registry;
mod error;
pub mod identity;

pub use client::{default_known_hosts_path, ClientHandler, SshClient, SshHandle};
pub use config::SshConfig;
pub use connection_registry::{ConnectionRegistry, Connector, SshConnector};
pub use error::SshError;
pub use identity::{RemoteIdentity, DEFAULT_SSH_PORT};
