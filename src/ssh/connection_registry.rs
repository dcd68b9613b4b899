//! SSH Connection Registry
//!
//! Keyed pool of live SFTP sessions, one per remote identity.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  ConnectionRegistry                                  │
//! │  ├── sessions: RemoteIdentity → Arc<SftpSession>     │
//! │  ├── connector: Arc<dyn Connector>                   │
//! │  └── connect_lock (serializes session creation)      │
//! └──────────────────────────────────────────────────────┘
//!          │ resolve(identity)
//!    ┌─────┴──────┬──────────────┐
//!    ▼            ▼              ▼
//! cached &     closed →       missing →
//! alive:       reconnect      connect
//! reuse
//! ```
//!
//! Resolving one identity never closes sessions of other identities; paths
//! handed out earlier stay usable until [`ConnectionRegistry::disconnect`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::client::SshClient;
use super::config::SshConfig;
use super::error::SshError;
use super::identity::{RemoteIdentity, DEFAULT_SSH_PORT};
use crate::config::{parse_ssh_config, RemoteFsConfig, SshConfigHosts};
use crate::sftp::address::AddressIdentity;
use crate::sftp::SftpSession;

/// Opens new sessions for the registry
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, identity: &RemoteIdentity) -> Result<Arc<SftpSession>, SshError>;

    /// Port for a host whose address names none
    async fn default_port(&self, _hostname: &str) -> u16 {
        DEFAULT_SSH_PORT
    }
}

/// Production connector: SSH config lookup, key auth, SFTP subsystem
pub struct SshConnector {
    settings: RemoteFsConfig,
    hosts: OnceCell<SshConfigHosts>,
}

impl SshConnector {
    pub fn new(settings: RemoteFsConfig) -> Self {
        Self {
            settings,
            hosts: OnceCell::new(),
        }
    }

    /// Use an already parsed SSH config instead of reading one from disk
    pub fn with_hosts(settings: RemoteFsConfig, hosts: SshConfigHosts) -> Self {
        Self {
            settings,
            hosts: OnceCell::new_with(Some(hosts)),
        }
    }

    async fn hosts(&self) -> &SshConfigHosts {
        self.hosts
            .get_or_init(|| async {
                match parse_ssh_config(self.settings.ssh_config()).await {
                    Ok(hosts) => hosts,
                    Err(e) => {
                        warn!("Failed to read SSH config, continuing without it: {}", e);
                        SshConfigHosts::default()
                    }
                }
            })
            .await
    }

    /// Build the per-connection config for `identity`
    pub async fn ssh_config_for(&self, identity: &RemoteIdentity) -> Result<SshConfig, SshError> {
        let params = self.hosts().await.lookup(identity.hostname());

        let key_path = match &params.identity_file {
            Some(file) => Some(PathBuf::from(file)),
            None => self.settings.default_key(),
        }
        .ok_or_else(|| {
            SshError::ConfigError(format!("No identity file configured for {}", identity))
        })?;

        if !key_path.is_file() {
            return Err(SshError::ConfigError(format!(
                "Identity file {} for {} does not exist",
                key_path.display(),
                identity
            )));
        }

        Ok(SshConfig {
            host: params
                .hostname
                .unwrap_or_else(|| identity.hostname().to_string()),
            port: identity.port(),
            username: identity.username().to_string(),
            key_path,
            timeout_secs: self.settings.connect_timeout_secs,
            strict_host_key_checking: self.settings.strict_host_key_checking,
            known_hosts_path: self.settings.known_hosts(),
        })
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, identity: &RemoteIdentity) -> Result<Arc<SftpSession>, SshError> {
        let config = self.ssh_config_for(identity).await?;
        debug!(
            "Connecting {} via {}:{} with key {}",
            identity,
            config.host,
            config.port,
            config.key_path.display()
        );

        let handle = SshClient::new(config).connect().await?;
        let session = SftpSession::open(identity.clone(), handle)
            .await
            .map_err(|e| SshError::SessionError(e.to_string()))?;
        Ok(Arc::new(session))
    }

    async fn default_port(&self, hostname: &str) -> u16 {
        self.hosts()
            .await
            .lookup(hostname)
            .port
            .unwrap_or(DEFAULT_SSH_PORT)
    }
}

/// Live sessions by identity
pub struct ConnectionRegistry {
    sessions: DashMap<RemoteIdentity, Arc<SftpSession>>,
    connector: Arc<dyn Connector>,
    connect_lock: Mutex<()>,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            sessions: DashMap::new(),
            connector,
            connect_lock: Mutex::new(()),
        }
    }

    /// Registry backed by [`SshConnector`]
    pub fn with_settings(settings: RemoteFsConfig) -> Self {
        Self::new(Arc::new(SshConnector::new(settings)))
    }

    /// Fill in the port of an address identity
    pub async fn identity_for(&self, fragment: &AddressIdentity) -> RemoteIdentity {
        let port = match fragment.port {
            Some(port) => port,
            None => self.connector.default_port(&fragment.hostname).await,
        };
        RemoteIdentity::new(
            fragment.username.clone(),
            fragment.hostname.clone(),
            Some(port),
        )
    }

    /// Cached live session for `identity`, or a new one
    pub async fn resolve(&self, identity: &RemoteIdentity) -> Result<Arc<SftpSession>, SshError> {
        if let Some(session) = self.live(identity) {
            debug!("Reusing SFTP session {} for {}", session.id(), identity);
            return Ok(session);
        }

        let _guard = self.connect_lock.lock().await;

        // Another caller may have connected while we waited
        if let Some(session) = self.live(identity) {
            return Ok(session);
        }

        info!("Opening SFTP session for {}", identity);
        let session = self.connector.connect(identity).await.map_err(|e| {
            warn!("Connection to {} failed: {}", identity, e);
            e
        })?;

        info!("SFTP session {} ready for {}", session.id(), identity);
        self.sessions.insert(identity.clone(), session.clone());
        Ok(session)
    }

    fn live(&self, identity: &RemoteIdentity) -> Option<Arc<SftpSession>> {
        let session = self.sessions.get(identity)?.value().clone();
        if session.is_closed() {
            info!("Discarding closed SFTP session for {}", identity);
            self.sessions
                .remove_if(identity, |_, cached| Arc::ptr_eq(cached, &session));
            return None;
        }
        Some(session)
    }

    pub fn get(&self, identity: &RemoteIdentity) -> Option<Arc<SftpSession>> {
        self.sessions.get(identity).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn identities(&self) -> Vec<RemoteIdentity> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop and close the session for `identity`; false if none was cached
    pub async fn disconnect(&self, identity: &RemoteIdentity) -> bool {
        match self.sessions.remove(identity) {
            Some((_, session)) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn disconnect_all(&self) {
        let identities = self.identities();
        info!("Closing {} SFTP sessions", identities.len());
        for identity in identities {
            self.disconnect(&identity).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::parse_ssh_config_content;
    use crate::sftp::memory::MemoryFs;

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, identity: &RemoteIdentity) -> Result<Arc<SftpSession>, SshError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if identity.hostname() == "unreachable" {
                return Err(SshError::ConnectionFailed("refused".to_string()));
            }
            Ok(Arc::new(MemoryFs::new()).into_session(identity.clone()))
        }

        async fn default_port(&self, hostname: &str) -> u16 {
            if hostname == "custom" {
                2222
            } else {
                DEFAULT_SSH_PORT
            }
        }
    }

    fn registry() -> (Arc<CountingConnector>, ConnectionRegistry) {
        let connector = Arc::new(CountingConnector::default());
        (connector.clone(), ConnectionRegistry::new(connector))
    }

    fn alice(host: &str) -> RemoteIdentity {
        RemoteIdentity::new("alice", host, None)
    }

    #[tokio::test]
    async fn test_same_identity_reuses_session() {
        let (connector, registry) = registry();

        let first = registry.resolve(&alice("one")).await.unwrap();
        let second = registry.resolve(&alice("one")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_identity_keeps_old_session() {
        let (connector, registry) = registry();

        let one = registry.resolve(&alice("one")).await.unwrap();
        let two = registry.resolve(&alice("two")).await.unwrap();

        assert!(!Arc::ptr_eq(&one, &two));
        assert!(!one.is_closed());
        assert_eq!(registry.len(), 2);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert!(one.canonicalize(".").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_session_is_replaced() {
        let (connector, registry) = registry();

        let first = registry.resolve(&alice("one")).await.unwrap();
        first.close().await;

        let second = registry.resolve(&alice("one")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_closed());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_connects_once() {
        let (connector, registry) = registry();
        let registry = Arc::new(registry);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.resolve(&alice("one")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates_without_caching() {
        let (connector, registry) = registry();

        let err = registry.resolve(&alice("unreachable")).await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(registry.is_empty());

        // No retry inside resolve; a second call tries again
        assert!(registry.resolve(&alice("unreachable")).await.is_err());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let (_connector, registry) = registry();

        let session = registry.resolve(&alice("one")).await.unwrap();
        registry.resolve(&alice("two")).await.unwrap();

        assert!(registry.disconnect(&alice("one")).await);
        assert!(session.is_closed());
        assert!(!registry.disconnect(&alice("one")).await);
        assert_eq!(registry.identities(), vec![alice("two")]);

        registry.disconnect_all().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_identity_for_fills_port() {
        let (_connector, registry) = registry();

        let fragment = AddressIdentity {
            username: "alice".to_string(),
            hostname: "custom".to_string(),
            port: None,
        };
        assert_eq!(registry.identity_for(&fragment).await.port(), 2222);

        let explicit = AddressIdentity {
            port: Some(2200),
            ..fragment.clone()
        };
        assert_eq!(registry.identity_for(&explicit).await.port(), 2200);

        let plain = AddressIdentity {
            hostname: "plain".to_string(),
            ..fragment
        };
        assert_eq!(registry.identity_for(&plain).await.port(), 22);
    }

    #[tokio::test]
    async fn test_connector_default_port() {
        struct Plain;

        #[async_trait]
        impl Connector for Plain {
            async fn connect(
                &self,
                identity: &RemoteIdentity,
            ) -> Result<Arc<SftpSession>, SshError> {
                Ok(Arc::new(MemoryFs::new()).into_session(identity.clone()))
            }
        }

        assert_eq!(Plain.default_port("anything").await, DEFAULT_SSH_PORT);

        let registry = ConnectionRegistry::new(Arc::new(Plain));
        let fragment = AddressIdentity {
            username: "alice".to_string(),
            hostname: "anything".to_string(),
            port: None,
        };
        assert_eq!(registry.identity_for(&fragment).await.port(), DEFAULT_SSH_PORT);
    }

    #[tokio::test]
    async fn test_ssh_connector_uses_host_config() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_ed25519");
        std::fs::write(&key, "not really a key").unwrap();

        let hosts = parse_ssh_config_content(&format!(
            "Host box\n  HostName 10.0.0.5\n  Port 2022\n  IdentityFile {}\n",
            key.display()
        ));
        let connector = SshConnector::with_hosts(RemoteFsConfig::default(), hosts);

        assert_eq!(connector.default_port("box").await, 2022);
        assert_eq!(connector.default_port("other").await, 22);

        let config = connector
            .ssh_config_for(&RemoteIdentity::new("alice", "box", Some(2022)))
            .await
            .unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 2022);
        assert_eq!(config.key_path, key);
    }

    #[tokio::test]
    async fn test_ssh_connector_missing_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RemoteFsConfig {
            default_key_path: dir.path().join("missing").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let connector = SshConnector::with_hosts(settings, SshConfigHosts::default());

        let err = connector.connect(&alice("box")).await.unwrap_err();
        assert!(matches!(err, SshError::ConfigError(_)));
    }
}
