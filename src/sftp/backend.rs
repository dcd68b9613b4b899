//! Filesystem backend behind an [`SftpSession`](super::SftpSession)
//!
//! One method per SFTP round trip. The russh-sftp client implements it for
//! live servers; `MemoryFs` (behind the `memory-fs` feature) implements it
//! in memory for tests.

use async_trait::async_trait;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;

use super::error::SftpError;
use super::path_utils::remote_file_name;
use super::types::Metadata;

#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Server-side realpath; relative paths resolve against the login directory
    async fn canonicalize(&self, path: &str) -> Result<String, SftpError>;

    /// Attributes of the entry itself (symlinks not followed)
    async fn lstat(&self, path: &str) -> Result<Metadata, SftpError>;

    /// Attributes of the symlink target
    async fn stat(&self, path: &str) -> Result<Metadata, SftpError>;

    /// Directory entries, `.` and `..` excluded
    async fn read_dir(&self, path: &str) -> Result<Vec<Metadata>, SftpError>;

    async fn create_dir(&self, path: &str) -> Result<(), SftpError>;

    async fn remove_file(&self, path: &str) -> Result<(), SftpError>;

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError>;

    async fn rename(&self, from: &str, to: &str) -> Result<(), SftpError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, SftpError>;

    /// Create or truncate `path` and write `data`
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), SftpError>;

    /// Create a symlink at `link` pointing to `target`
    async fn symlink(&self, target: &str, link: &str) -> Result<(), SftpError>;

    async fn read_link(&self, path: &str) -> Result<String, SftpError>;

    async fn close(&self) -> Result<(), SftpError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteFs for RusshSftpSession {
    async fn canonicalize(&self, path: &str) -> Result<String, SftpError> {
        RusshSftpSession::canonicalize(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))
    }

    async fn lstat(&self, path: &str) -> Result<Metadata, SftpError> {
        let attrs = self
            .symlink_metadata(path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))?;
        Ok(Metadata::from_attrs(remote_file_name(path), &attrs))
    }

    async fn stat(&self, path: &str) -> Result<Metadata, SftpError> {
        let attrs = self
            .metadata(path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))?;
        Ok(Metadata::from_attrs(remote_file_name(path), &attrs))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<Metadata>, SftpError> {
        let read_dir = RusshSftpSession::read_dir(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();

            // Skip . and ..
            if name == "." || name == ".." {
                continue;
            }

            entries.push(Metadata::from_attrs(name, &entry.metadata()));
        }
        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        RusshSftpSession::create_dir(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))
    }

    async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        RusshSftpSession::remove_file(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        RusshSftpSession::remove_dir(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), SftpError> {
        RusshSftpSession::rename(self, from, to)
            .await
            .map_err(|e| SftpError::from_sftp(e, from))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, SftpError> {
        RusshSftpSession::read(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<(), SftpError> {
        let mut file = self
            .open_with_flags(path, OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))?;

        file.write_all(data).await.map_err(SftpError::IoError)?;
        file.flush().await.map_err(SftpError::IoError)?;
        file.shutdown().await.map_err(SftpError::IoError)?;
        Ok(())
    }

    async fn symlink(&self, target: &str, link: &str) -> Result<(), SftpError> {
        RusshSftpSession::symlink(self, link, target)
            .await
            .map_err(|e| SftpError::from_sftp(e, link))
    }

    async fn read_link(&self, path: &str) -> Result<String, SftpError> {
        RusshSftpSession::read_link(self, path)
            .await
            .map_err(|e| SftpError::from_sftp(e, path))
    }

    async fn close(&self) -> Result<(), SftpError> {
        RusshSftpSession::close(self)
            .await
            .map_err(|e| SftpError::ProtocolError(e.to_string()))
    }
}
