//! SSH Configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::identity::DEFAULT_SSH_PORT;

/// Per-connection SSH configuration, resolved from an identity plus the
/// host entry of `~/.ssh/config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Address actually dialed (HostName directive or the identity hostname)
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Private key used for public-key authentication
    pub key_path: PathBuf,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Strict host key checking (default: false)
    /// - true: reject unknown hosts
    /// - false: learn unknown hosts, still reject changed keys
    #[serde(default)]
    pub strict_host_key_checking: bool,

    /// known_hosts file; `None` uses ~/.ssh/known_hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_path: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_timeout() -> u64 {
    30
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            key_path: PathBuf::new(),
            timeout_secs: 30,
            strict_host_key_checking: false,
            known_hosts_path: None,
        }
    }
}
