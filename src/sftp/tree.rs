//! Recursive tree operations
//!
//! Copy, remove and move work over any [`TreeNode`], so the same walks
//! serve remote→remote, remote→local and local→remote transfers. Each
//! per-file copy is delegated to a [`FileTransfer`].

use std::fmt;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::SftpError;
use super::path::RemotePath;
use super::transfer::FileTransfer;
use super::types::{FileType, Metadata};
use super::address;

/// One entry of a walkable filesystem
#[async_trait]
pub trait TreeNode: Clone + Send + Sync + fmt::Display + 'static {
    /// Final path component
    fn file_name(&self) -> String;

    /// Child path (no I/O)
    fn join(&self, name: &str) -> Self;

    /// Sibling path (no I/O)
    fn sibling(&self, name: &str) -> Self;

    /// Same location with any cached state dropped
    fn fresh(&self) -> Self;

    /// Globally unique location, used to detect copying onto itself
    fn location(&self) -> String;

    /// Attributes of the entry itself (symlinks not followed)
    async fn metadata(&self) -> Result<Metadata, SftpError>;

    async fn exists(&self) -> Result<bool, SftpError> {
        match self.metadata().await {
            Ok(_) => Ok(true),
            Err(SftpError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn children(&self) -> Result<Vec<Self>, SftpError>;

    /// Create this directory; the parent must exist
    async fn create_dir(&self) -> Result<(), SftpError>;

    async fn create_dir_all(&self) -> Result<(), SftpError>;

    async fn remove_file(&self) -> Result<(), SftpError>;

    async fn remove_dir(&self) -> Result<(), SftpError>;
}

#[async_trait]
impl TreeNode for RemotePath {
    fn file_name(&self) -> String {
        self.name().to_string()
    }

    fn join(&self, name: &str) -> Self {
        self.joinpath(name)
    }

    fn sibling(&self, name: &str) -> Self {
        self.with_name(name)
    }

    fn fresh(&self) -> Self {
        RemotePath::fresh(self)
    }

    fn location(&self) -> String {
        address::format(self.session().identity(), self.as_str())
    }

    async fn metadata(&self) -> Result<Metadata, SftpError> {
        self.stat().await.cloned()
    }

    async fn children(&self) -> Result<Vec<Self>, SftpError> {
        Ok(self.iterdir().await?.collect())
    }

    async fn create_dir(&self) -> Result<(), SftpError> {
        self.mkdir(false).await
    }

    async fn create_dir_all(&self) -> Result<(), SftpError> {
        self.mkdir(true).await
    }

    async fn remove_file(&self) -> Result<(), SftpError> {
        self.unlink().await
    }

    async fn remove_dir(&self) -> Result<(), SftpError> {
        self.rmdir().await
    }
}

/// Totals for one recursive copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Emitted after each entry of a recursive copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeProgress {
    /// Destination path just written
    pub path: String,
    pub kind: FileType,
    /// Bytes written for this entry
    pub bytes: u64,
    /// Totals so far, this entry included
    pub completed: TreeStats,
}

/// Recursively copy `src` to `dest`.
///
/// Directories are created before descent; symlinks are never descended
/// into but handed to the transfer as single entries. The first failure
/// aborts the walk, leaving a partial copy.
pub async fn copy_recursive<S, D, T>(src: &S, dest: &D, transfer: &T) -> Result<TreeStats, SftpError>
where
    S: TreeNode,
    D: TreeNode,
    T: FileTransfer<S, D> + ?Sized,
{
    copy_recursive_with_progress(src, dest, transfer, None).await
}

/// [`copy_recursive`], reporting each entry on `progress`
pub async fn copy_recursive_with_progress<S, D, T>(
    src: &S,
    dest: &D,
    transfer: &T,
    progress: Option<&mpsc::Sender<TreeProgress>>,
) -> Result<TreeStats, SftpError>
where
    S: TreeNode,
    D: TreeNode,
    T: FileTransfer<S, D> + ?Sized,
{
    info!("Copying {} -> {}", src, dest);
    let mut stats = TreeStats::default();
    copy_entry(src, dest, transfer, progress, &mut stats).await?;
    info!(
        "Copied {} files, {} directories ({} bytes) to {}",
        stats.files, stats.directories, stats.bytes, dest
    );
    Ok(stats)
}

fn copy_entry<'a, S, D, T>(
    src: &'a S,
    dest: &'a D,
    transfer: &'a T,
    progress: Option<&'a mpsc::Sender<TreeProgress>>,
    stats: &'a mut TreeStats,
) -> BoxFuture<'a, Result<(), SftpError>>
where
    S: TreeNode,
    D: TreeNode,
    T: FileTransfer<S, D> + ?Sized,
{
    Box::pin(async move {
        let meta = src.metadata().await?;

        let (kind, bytes) = if meta.is_dir() {
            dest.create_dir().await?;
            stats.directories += 1;
            (FileType::Directory, 0)
        } else {
            let bytes = transfer.transfer(src, dest).await?;
            stats.files += 1;
            stats.bytes += bytes;
            (meta.file_type(), bytes)
        };

        debug!("Copied {} -> {}", src, dest);
        if let Some(tx) = progress {
            let event = TreeProgress {
                path: dest.to_string(),
                kind,
                bytes,
                completed: *stats,
            };
            if tx.send(event).await.is_err() {
                debug!("Progress receiver dropped");
            }
        }

        if meta.is_dir() {
            for child in src.children().await? {
                let target = dest.join(&child.file_name());
                copy_entry(&child, &target, transfer, progress, stats).await?;
            }
        }
        Ok(())
    })
}

/// Delete `path` and everything under it, children before parents.
///
/// Returns the number of entries removed. Stops at the first failure;
/// entries already removed stay removed.
pub async fn remove_recursive<N: TreeNode>(path: &N) -> Result<u64, SftpError> {
    info!("Removing {}", path);
    let removed = remove_entry(path).await?;
    debug!("Removed {} entries under {}", removed, path);
    Ok(removed)
}

fn remove_entry<N: TreeNode>(path: &N) -> BoxFuture<'_, Result<u64, SftpError>> {
    Box::pin(async move {
        let meta = path.metadata().await?;
        if !meta.is_dir() {
            path.remove_file().await?;
            return Ok(1);
        }

        let mut removed = 0;
        for child in path.children().await? {
            removed += remove_entry(&child).await?;
        }
        path.remove_dir().await?;
        Ok(removed + 1)
    })
}

/// Move `src` to `dest`: a server-side rename when the transfer supports
/// it, otherwise copy then delete. The source is only deleted after the
/// copy fully succeeded; if deleting it fails, both copies remain.
pub async fn move_entry<S, D, T>(src: &S, dest: &D, transfer: &T) -> Result<(), SftpError>
where
    S: TreeNode,
    D: TreeNode,
    T: FileTransfer<S, D> + ?Sized,
{
    if transfer.relocate(src, dest).await? {
        info!("Renamed {} -> {}", src, dest);
        return Ok(());
    }

    copy_recursive(src, dest, transfer).await?;
    if let Err(e) = remove_recursive(src).await {
        warn!("Copied {} to {} but could not delete the source: {}", src, dest, e);
        return Err(e);
    }
    Ok(())
}
