//! Per-file transfer strategies
//!
//! [`FileTransfer`] copies one non-directory entry between two endpoints.
//! The recursive walks in [`tree`](super::tree) call it once per file.
//! Symlinks are recreated on the destination with the same target text
//! and are never followed.

use async_trait::async_trait;
use tracing::debug;

use super::error::SftpError;
use super::local::LocalPath;
use super::path::RemotePath;
use super::tree::TreeNode;

#[async_trait]
pub trait FileTransfer<S, D>: Send + Sync
where
    S: TreeNode,
    D: TreeNode,
{
    /// Copy one non-directory entry; returns the bytes written
    async fn transfer(&self, src: &S, dest: &D) -> Result<u64, SftpError>;

    /// Move without copying when both ends allow it. `Ok(false)` means
    /// the caller must fall back to copy and delete
    async fn relocate(&self, _src: &S, _dest: &D) -> Result<bool, SftpError> {
        Ok(false)
    }

    /// Create `dest` as a link to `src`
    async fn link(&self, src: &S, dest: &D) -> Result<(), SftpError> {
        Err(SftpError::Unsupported(format!("cannot link {} to {}", dest, src)))
    }
}

/// Remote to remote, on the same host or across hosts
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteCopy;

#[async_trait]
impl FileTransfer<RemotePath, RemotePath> for RemoteCopy {
    async fn transfer(&self, src: &RemotePath, dest: &RemotePath) -> Result<u64, SftpError> {
        if src.is_symlink().await? {
            let target = src.read_link().await?;
            debug!("Recreating link {} -> {}", dest, target);
            dest.symlink_to(&target).await?;
            return Ok(0);
        }

        let data = src.read_bytes().await?;
        dest.write_bytes(&data).await?;
        Ok(data.len() as u64)
    }

    async fn relocate(&self, src: &RemotePath, dest: &RemotePath) -> Result<bool, SftpError> {
        if !src.same_session(dest) {
            return Ok(false);
        }
        src.rename(dest).await?;
        Ok(true)
    }

    async fn link(&self, src: &RemotePath, dest: &RemotePath) -> Result<(), SftpError> {
        if !src.same_session(dest) {
            return Err(SftpError::CrossSession {
                from: src.to_string(),
                to: dest.to_string(),
            });
        }
        dest.symlink_to(src.as_str()).await
    }
}

/// Remote to local
#[derive(Debug, Clone, Copy, Default)]
pub struct Download;

#[async_trait]
impl FileTransfer<RemotePath, LocalPath> for Download {
    async fn transfer(&self, src: &RemotePath, dest: &LocalPath) -> Result<u64, SftpError> {
        if src.is_symlink().await? {
            let target = src.read_link().await?;
            debug!("Recreating link {} -> {}", dest, target);
            dest.symlink_to(&target).await?;
            return Ok(0);
        }

        let data = src.read_bytes().await?;
        dest.write_bytes(&data).await?;
        debug!("Downloaded {} ({} bytes) to {}", src, data.len(), dest);
        Ok(data.len() as u64)
    }
}

/// Local to remote
#[derive(Debug, Clone, Copy, Default)]
pub struct Upload;

#[async_trait]
impl FileTransfer<LocalPath, RemotePath> for Upload {
    async fn transfer(&self, src: &LocalPath, dest: &RemotePath) -> Result<u64, SftpError> {
        if src.is_symlink().await? {
            let target = src.read_link().await?;
            let target = target.to_string_lossy();
            debug!("Recreating link {} -> {}", dest, target);
            dest.symlink_to(&target).await?;
            return Ok(0);
        }

        let data = src.read_bytes().await?;
        dest.write_bytes(&data).await?;
        debug!("Uploaded {} ({} bytes) to {}", src, data.len(), dest);
        Ok(data.len() as u64)
    }
}
