//! SFTP Session management
//!
//! One live SFTP channel plus the SSH transport it runs on. Round trips are
//! serialized through an async mutex so that concurrent callers sharing a
//! session never interleave requests.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use russh::Disconnect;
use russh_sftp::client::SftpSession as RusshSftpSession;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use super::backend::RemoteFs;
use super::error::SftpError;
use super::types::Metadata;
use crate::ssh::{RemoteIdentity, SshError, SshHandle};

/// SFTP Session wrapper
pub struct SftpSession {
    /// Unique id, for logs
    id: String,
    identity: RemoteIdentity,
    fs: Arc<dyn RemoteFs>,
    /// SSH transport; `None` for sessions over a local backend
    transport: Mutex<Option<SshHandle>>,
    io_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl SftpSession {
    /// Open the SFTP subsystem on an authenticated SSH connection
    pub async fn open(identity: RemoteIdentity, handle: SshHandle) -> Result<Self, SftpError> {
        info!("Opening SFTP subsystem for {}", identity);

        let channel = handle.channel_open_session().await.map_err(|e| {
            SftpError::Ssh(SshError::SessionError(format!("Failed to open channel: {}", e)))
        })?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            SftpError::Ssh(SshError::SessionError(format!(
                "Failed to request SFTP subsystem: {}",
                e
            )))
        })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SftpError::Ssh(SshError::SessionError(e.to_string())))?;

        info!("SFTP subsystem opened for {}", identity);

        let mut session = Self::from_backend(identity, Arc::new(sftp));
        session.transport = Mutex::new(Some(handle));
        Ok(session)
    }

    /// Session over an arbitrary backend, without an SSH transport
    pub fn from_backend(identity: RemoteIdentity, fs: Arc<dyn RemoteFs>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity,
            fs,
            transport: Mutex::new(None),
            io_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &RemoteIdentity {
        &self.identity
    }

    /// True once closed locally or once the transport has dropped
    pub fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return true;
        }
        self.transport
            .lock()
            .as_ref()
            .map(|handle| handle.is_closed())
            .unwrap_or(false)
    }

    /// Close the SFTP channel and disconnect the transport
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Closing SFTP session {} ({})", self.id, self.identity);

        {
            let _guard = self.io_lock.lock().await;
            if let Err(e) = self.fs.close().await {
                debug!("SFTP close for {} failed: {}", self.identity, e);
            }
        }

        let handle = self.transport.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
            {
                warn!("Disconnect from {} failed: {}", self.identity, e);
            }
        }
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, ()>, SftpError> {
        if self.is_closed() {
            return Err(SftpError::SessionClosed);
        }
        Ok(self.io_lock.lock().await)
    }

    pub async fn canonicalize(&self, path: &str) -> Result<String, SftpError> {
        let _guard = self.acquire().await?;
        self.fs.canonicalize(path).await
    }

    pub async fn lstat(&self, path: &str) -> Result<Metadata, SftpError> {
        let _guard = self.acquire().await?;
        self.fs.lstat(path).await
    }

    pub async fn stat(&self, path: &str) -> Result<Metadata, SftpError> {
        let _guard = self.acquire().await?;
        self.fs.stat(path).await
    }

    pub async fn read_dir(&self, path: &str) -> Result<Vec<Metadata>, SftpError> {
        debug!("Listing directory: {}", path);
        let _guard = self.acquire().await?;
        self.fs.read_dir(path).await
    }

    pub async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        debug!("Creating directory: {}", path);
        let _guard = self.acquire().await?;
        self.fs.create_dir(path).await
    }

    pub async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        debug!("Removing file: {}", path);
        let _guard = self.acquire().await?;
        self.fs.remove_file(path).await
    }

    pub async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        debug!("Removing directory: {}", path);
        let _guard = self.acquire().await?;
        self.fs.remove_dir(path).await
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), SftpError> {
        debug!("Renaming {} -> {}", from, to);
        let _guard = self.acquire().await?;
        self.fs.rename(from, to).await
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, SftpError> {
        let _guard = self.acquire().await?;
        self.fs.read(path).await
    }

    pub async fn write(&self, path: &str, data: &[u8]) -> Result<(), SftpError> {
        debug!("Writing {} bytes to {}", data.len(), path);
        let _guard = self.acquire().await?;
        self.fs.write(path, data).await
    }

    pub async fn symlink(&self, target: &str, link: &str) -> Result<(), SftpError> {
        debug!("Linking {} -> {}", link, target);
        let _guard = self.acquire().await?;
        self.fs.symlink(target, link).await
    }

    pub async fn read_link(&self, path: &str) -> Result<String, SftpError> {
        let _guard = self.acquire().await?;
        self.fs.read_link(path).await
    }
}

impl fmt::Debug for SftpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpSession")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
