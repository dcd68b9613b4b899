//! Remote endpoint identity
//!
//! A `(username, hostname, port)` triple. Two equal identities share one
//! SFTP session in the [`ConnectionRegistry`](super::ConnectionRegistry).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Port used when neither the address nor the host configuration names one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Identity of one remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteIdentity {
    username: String,
    hostname: String,
    port: u16,
}

impl RemoteIdentity {
    pub fn new(
        username: impl Into<String>,
        hostname: impl Into<String>,
        port: Option<u16>,
    ) -> Self {
        Self {
            username: username.into(),
            hostname: hostname.into(),
            port: port.unwrap_or(DEFAULT_SSH_PORT),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn has_default_port(&self) -> bool {
        self.port == DEFAULT_SSH_PORT
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.hostname, self.port)
    }
}
