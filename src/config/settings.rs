//! Remote filesystem settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current settings file version
pub const CONFIG_VERSION: u32 = 1;

/// Settings persisted at ~/.oxideterm/remote_fs.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFsConfig {
    /// Config file version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Key used when the SSH config names no IdentityFile for a host
    #[serde(default = "default_key_path")]
    pub default_key_path: String,

    /// SSH config file; `None` uses ~/.ssh/config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_config_path: Option<String>,

    /// known_hosts file; `None` uses ~/.ssh/known_hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_path: Option<String>,

    /// TCP connect and handshake timeout in seconds
    #[serde(default = "default_timeout")]
    pub connect_timeout_secs: u64,

    /// Reject hosts missing from known_hosts instead of learning them
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_key_path() -> String {
    "~/.ssh/id_rsa".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for RemoteFsConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            default_key_path: default_key_path(),
            ssh_config_path: None,
            known_hosts_path: None,
            connect_timeout_secs: default_timeout(),
            strict_host_key_checking: false,
        }
    }
}

impl RemoteFsConfig {
    pub fn default_key(&self) -> Option<PathBuf> {
        expand_home(&self.default_key_path)
    }

    pub fn ssh_config(&self) -> Option<PathBuf> {
        self.ssh_config_path.as_deref().and_then(expand_home)
    }

    pub fn known_hosts(&self) -> Option<PathBuf> {
        self.known_hosts_path.as_deref().and_then(expand_home)
    }
}

/// Expand a leading `~` against the home directory
pub fn expand_home(path: &str) -> Option<PathBuf> {
    if path.is_empty() {
        return None;
    }
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RemoteFsConfig =
            serde_json::from_str(r#"{ "strict_host_key_checking": true }"#).unwrap();
        assert!(config.strict_host_key_checking);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.default_key_path, "~/.ssh/id_rsa");
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/etc/key"), Some(PathBuf::from("/etc/key")));
        assert_eq!(expand_home(""), None);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.ssh/id_rsa"), Some(home.join(".ssh/id_rsa")));
        }
    }
}
