//! SSH Client implementation using russh

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::known_hosts::{known_host_keys_path, learn_known_hosts_path};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg, PublicKey};
use tracing::{debug, info, warn};

use super::config::SshConfig;
use super::error::SshError;

/// Connected and authenticated SSH transport
pub type SshHandle = client::Handle<ClientHandler>;

/// SSH Client for one connection attempt
pub struct SshClient {
    config: SshConfig,
}

impl SshClient {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Connect to the SSH server and authenticate with the configured key
    pub async fn connect(self) -> Result<SshHandle, SshError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!("Connecting to SSH server at {}", addr);

        // Load the key first so a bad key never costs a round trip
        let key = load_secret_key(&self.config.key_path, None).map_err(|e| {
            SshError::AuthenticationFailed(format!(
                "Failed to load key {}: {}",
                self.config.key_path.display(),
                e
            ))
        })?;

        let timeout = Duration::from_secs(self.config.timeout_secs);

        let socket_addr = tokio::time::timeout(timeout, tokio::net::lookup_host(addr.as_str()))
            .await
            .map_err(|_| SshError::Timeout(format!("Resolving {} timed out", addr)))?
            .map_err(|e| SshError::ConnectionFailed(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| SshError::ConnectionFailed("No address found".to_string()))?;

        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(
            self.config.host.clone(),
            self.config.port,
            self.config.strict_host_key_checking,
            self.config
                .known_hosts_path
                .clone()
                .unwrap_or_else(default_known_hosts_path),
        );

        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(Arc::new(ssh_config), socket_addr, handler),
        )
        .await
        .map_err(|_| SshError::Timeout("Connection timed out".to_string()))??;

        debug!("SSH handshake completed");

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(|e| SshError::ProtocolError(format!("Failed to negotiate hash: {}", e)))?
            .flatten();

        let authenticated = handle
            .authenticate_publickey(
                &self.config.username,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?;

        if !authenticated.success() {
            return Err(SshError::AuthenticationFailed(format!(
                "Server rejected key {} for {}",
                self.config.key_path.display(),
                self.config.username
            )));
        }

        info!("SSH authentication successful for {}@{}", self.config.username, addr);

        Ok(handle)
    }
}

/// Default known_hosts location (~/.ssh/known_hosts)
pub fn default_known_hosts_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ssh").join("known_hosts"))
        .unwrap_or_else(|| PathBuf::from(".ssh/known_hosts"))
}

/// Client handler for russh callbacks
///
/// Verifies the server host key against a known_hosts file:
/// - matching key: accepted
/// - unknown host: learned, or rejected in strict mode
/// - changed key: always rejected
pub struct ClientHandler {
    host: String,
    port: u16,
    strict: bool,
    known_hosts_path: PathBuf,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, strict: bool, known_hosts_path: PathBuf) -> Self {
        Self {
            host,
            port,
            strict,
            known_hosts_path,
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let known = read_known_keys(&self.host, self.port, &self.known_hosts_path)?;

        if known.iter().any(|(_, key)| key == server_public_key) {
            info!("Host key verified for {}:{}", self.host, self.port);
            return Ok(true);
        }

        if let Some((line, _)) = known.first() {
            warn!(
                "HOST KEY CHANGED for {}:{} (known_hosts line {})",
                self.host, self.port, line
            );
            return Err(SshError::ConnectionFailed(format!(
                "Host key verification failed: key for {}:{} has changed (see {} line {})",
                self.host,
                self.port,
                self.known_hosts_path.display(),
                line
            )));
        }

        if self.strict {
            warn!(
                "Unknown host key for {}:{}. Strict mode enabled, rejecting.",
                self.host, self.port
            );
            return Err(SshError::ConnectionFailed(format!(
                "Host key verification failed: unknown host {}:{}",
                self.host, self.port
            )));
        }

        info!("New host {}:{}, adding to known_hosts", self.host, self.port);
        if let Err(e) = learn_key(&self.host, self.port, server_public_key, &self.known_hosts_path)
        {
            warn!("Failed to save host key: {}", e);
        }
        Ok(true)
    }
}

fn read_known_keys(
    host: &str,
    port: u16,
    path: &Path,
) -> Result<Vec<(usize, PublicKey)>, SshError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    known_host_keys_path(host, port, path)
        .map_err(|e| SshError::ConfigError(format!("Failed to read {}: {}", path.display(), e)))
}

fn learn_key(host: &str, port: u16, key: &PublicKey, path: &Path) -> Result<(), SshError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    learn_known_hosts_path(host, port, key, path)
        .map_err(|e| SshError::ConfigError(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = SshConfig {
            host: "127.0.0.1".to_string(),
            username: "alice".to_string(),
            key_path: dir.path().join("does_not_exist"),
            timeout_secs: 1,
            ..Default::default()
        };

        match SshClient::new(config).connect().await {
            Err(SshError::AuthenticationFailed(message)) => {
                assert!(message.contains("does_not_exist"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connected without a key"),
        }
    }

    #[test]
    fn test_absent_known_hosts_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let keys = read_known_keys("example.com", 22, &dir.path().join("known_hosts")).unwrap();
        assert!(keys.is_empty());
    }
}
