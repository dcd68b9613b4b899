//! SSH Config Parser
//!
//! Parses ~/.ssh/config for per-host connection settings.
//! Supports:
//! - Host, HostName, User, Port, IdentityFile
//! - Host patterns with `*`, `?` and `!negation`
//! - Directives before the first `Host` line (apply to every host)
//!
//! Lookup follows OpenSSH: blocks are scanned in file order and the first
//! value obtained for each directive wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

use super::settings::expand_home;

/// A parsed SSH config host block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshConfigHost {
    /// Patterns after "Host" (empty for the leading global block)
    pub patterns: Vec<String>,
    /// Actual hostname (HostName directive)
    pub hostname: Option<String>,
    /// Username (User directive)
    pub user: Option<String>,
    /// Port number (Port directive)
    pub port: Option<u16>,
    /// Identity file path (IdentityFile directive, `~` expanded)
    pub identity_file: Option<String>,
    /// Other directives we don't directly use
    #[serde(default)]
    pub other: HashMap<String, String>,
}

impl SshConfigHost {
    /// Check whether this block applies to `host`
    pub fn matches(&self, host: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if pattern_matches(negated, host) {
                    return false;
                }
            } else if pattern_matches(pattern, host) {
                matched = true;
            }
        }
        matched
    }

    /// Check if this block only carries wildcard patterns
    pub fn is_wildcard(&self) -> bool {
        self.patterns.iter().all(|p| p.contains('*') || p.contains('?'))
    }
}

fn pattern_matches(pattern: &str, host: &str) -> bool {
    match glob::Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(host),
        Err(e) => {
            debug!("Ignoring bad host pattern {:?}: {}", pattern, e);
            false
        }
    }
}

/// Effective settings for one host, merged across matching blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostParams {
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
}

/// All blocks of one SSH config file, in file order
#[derive(Debug, Clone, Default)]
pub struct SshConfigHosts {
    hosts: Vec<SshConfigHost>,
}

impl SshConfigHosts {
    pub fn new(hosts: Vec<SshConfigHost>) -> Self {
        Self { hosts }
    }

    pub fn hosts(&self) -> &[SshConfigHost] {
        &self.hosts
    }

    /// Merge every block matching `host`; the first value for each
    /// directive wins
    pub fn lookup(&self, host: &str) -> HostParams {
        let mut params = HostParams::default();
        for block in self.hosts.iter().filter(|h| h.matches(host)) {
            if params.hostname.is_none() {
                params.hostname = block.hostname.clone();
            }
            if params.user.is_none() {
                params.user = block.user.clone();
            }
            if params.port.is_none() {
                params.port = block.port;
            }
            if params.identity_file.is_none() {
                params.identity_file = block.identity_file.clone();
            }
        }
        params
    }
}

/// SSH config parser errors
#[derive(Debug, thiserror::Error)]
pub enum SshConfigError {
    #[error("Failed to determine home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Get default SSH config path
pub fn default_ssh_config_path() -> Result<PathBuf, SshConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("config"))
        .ok_or(SshConfigError::NoHomeDir)
}

/// Parse SSH config file; a missing file yields no hosts
pub async fn parse_ssh_config(path: Option<PathBuf>) -> Result<SshConfigHosts, SshConfigError> {
    let path = match path {
        Some(p) => p,
        None => default_ssh_config_path()?,
    };

    let content = match fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No SSH config at {}", path.display());
            return Ok(SshConfigHosts::default());
        }
        Err(e) => return Err(SshConfigError::Io(e)),
    };

    Ok(parse_ssh_config_content(&content))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parse SSH config content string
pub fn parse_ssh_config_content(content: &str) -> SshConfigHosts {
    let mut hosts = Vec::new();
    let mut current = SshConfigHost::default();
    // Inside a `Match` block: directives are skipped until the next `Host`
    let mut skipping = false;

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Parse "Key Value" or "Key=Value"
        let (key, value) = if let Some(eq_pos) = line.find('=') {
            (line[..eq_pos].trim(), line[eq_pos + 1..].trim())
        } else {
            match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => continue,
            }
        };

        match key.to_lowercase().as_str() {
            "host" => {
                hosts.push(std::mem::take(&mut current));
                current.patterns = value.split_whitespace().map(str::to_string).collect();
                skipping = false;
            }
            "match" => {
                hosts.push(std::mem::take(&mut current));
                warn!("Match blocks are not supported, ignoring: {}", value);
                skipping = true;
            }
            _ if skipping => {}
            "hostname" => {
                current.hostname.get_or_insert_with(|| value.to_string());
            }
            "user" => {
                current.user.get_or_insert_with(|| value.to_string());
            }
            "port" => {
                if current.port.is_none() {
                    current.port = value.parse().ok();
                }
            }
            "identityfile" => {
                current.identity_file.get_or_insert_with(|| {
                    let value = unquote(value);
                    expand_home(value)
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_else(|| value.to_string())
                });
            }
            other => {
                current
                    .other
                    .entry(other.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }

    hosts.push(current);

    // Drop empty leading/global blocks that carry nothing
    hosts.retain(|h| {
        !h.patterns.is_empty()
            || h.hostname.is_some()
            || h.user.is_some()
            || h.port.is_some()
            || h.identity_file.is_some()
            || !h.other.is_empty()
    });

    SshConfigHosts::new(hosts)
}
