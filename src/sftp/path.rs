//! Remote path objects
//!
//! A [`RemotePath`] pairs an absolute path with the session it lives on and
//! a lazily filled metadata cache. The cache is filled by the first `stat`,
//! or up front by directory listings, and is never invalidated: handles
//! obtained before a mutation should be re-created (see [`RemotePath::fresh`]).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use super::error::SftpError;
use super::path_utils::{join_remote_path, parent_remote_path, remote_ancestors, remote_file_name};
use super::session::SftpSession;
use super::types::{FileType, Metadata};

/// Path on a remote host, bound to one SFTP session
#[derive(Clone)]
pub struct RemotePath {
    session: Arc<SftpSession>,
    path: String,
    metadata: OnceCell<Metadata>,
}

impl RemotePath {
    /// Canonicalize `raw` on the server (relative paths resolve against the
    /// login directory, `""` and `"."` yield it)
    pub async fn normalize(session: Arc<SftpSession>, raw: &str) -> Result<Self, SftpError> {
        let raw = if raw.is_empty() { "." } else { raw };
        let path = session.canonicalize(raw).await?;
        debug!("Normalized {} -> {}", raw, path);
        Ok(Self::from_normalized(session, path))
    }

    /// Wrap an already-absolute path without a round trip
    pub fn from_normalized(session: Arc<SftpSession>, path: impl Into<String>) -> Self {
        Self {
            session,
            path: path.into(),
            metadata: OnceCell::new(),
        }
    }

    fn with_metadata(session: Arc<SftpSession>, path: String, metadata: Metadata) -> Self {
        Self {
            session,
            path,
            metadata: OnceCell::new_with(Some(metadata)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn session(&self) -> &Arc<SftpSession> {
        &self.session
    }

    /// True when both paths are served by the same session
    pub fn same_session(&self, other: &RemotePath) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Same path, empty metadata cache
    pub fn fresh(&self) -> Self {
        Self::from_normalized(self.session.clone(), self.path.clone())
    }

    pub fn cached_metadata(&self) -> Option<&Metadata> {
        self.metadata.get()
    }

    /// Final component (`""` for the root)
    pub fn name(&self) -> &str {
        remote_file_name(&self.path)
    }

    pub fn parent(&self) -> Option<RemotePath> {
        parent_remote_path(&self.path).map(|p| Self::from_normalized(self.session.clone(), p))
    }

    /// Sibling with the final component replaced
    pub fn with_name(&self, name: &str) -> RemotePath {
        let parent = parent_remote_path(&self.path).unwrap_or_else(|| "/".to_string());
        self.joinpath_from(&parent, name)
    }

    /// Append `name` with `/`. Purely textual; `..` is kept as-is
    pub fn joinpath(&self, name: &str) -> RemotePath {
        self.joinpath_from(&self.path, name)
    }

    fn joinpath_from(&self, base: &str, name: &str) -> RemotePath {
        Self::from_normalized(self.session.clone(), join_remote_path(base, name))
    }

    /// Attributes of the path itself (symlinks not followed), cached
    pub async fn stat(&self) -> Result<&Metadata, SftpError> {
        self.metadata
            .get_or_try_init(|| self.session.lstat(&self.path))
            .await
    }

    pub async fn exists(&self) -> Result<bool, SftpError> {
        match self.stat().await {
            Ok(_) => Ok(true),
            Err(SftpError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Directory check on the entry itself; a symlink to a directory is not
    /// a directory here
    pub async fn is_dir(&self) -> Result<bool, SftpError> {
        Ok(self.stat().await?.is_dir())
    }

    pub async fn is_symlink(&self) -> Result<bool, SftpError> {
        Ok(self.stat().await?.is_symlink())
    }

    pub async fn file_type(&self) -> Result<FileType, SftpError> {
        Ok(self.stat().await?.file_type())
    }

    /// Attributes of whatever a symlink points at (uncached)
    pub async fn resolve_target(&self) -> Result<Metadata, SftpError> {
        self.session.stat(&self.path).await
    }

    /// List the directory in one round trip; children carry their metadata
    pub async fn iterdir(&self) -> Result<RemoteReadDir, SftpError> {
        if let Some(meta) = self.cached_metadata() {
            if !meta.is_dir() && !meta.is_symlink() {
                return Err(SftpError::NotADirectory(self.path.clone()));
            }
        }

        let entries = match self.session.read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(SftpError::ProtocolError(message)) => {
                // SFTPv3 reports a listed file as a bare failure
                let meta = self.session.stat(&self.path).await?;
                if !meta.is_dir() {
                    return Err(SftpError::NotADirectory(self.path.clone()));
                }
                return Err(SftpError::ProtocolError(message));
            }
            Err(e) => return Err(e),
        };

        Ok(RemoteReadDir {
            parent: self.clone(),
            entries: entries.into_iter(),
        })
    }

    /// Create this directory. With `parents`, missing ancestors are created
    /// first; an ancestor that exists but is not a directory is an error
    pub async fn mkdir(&self, parents: bool) -> Result<(), SftpError> {
        if parents {
            for ancestor in remote_ancestors(&self.path) {
                match self.session.stat(&ancestor).await {
                    Ok(meta) if meta.is_dir() => {}
                    Ok(_) => return Err(SftpError::NotADirectory(ancestor)),
                    Err(SftpError::NotFound(_)) => self.session.create_dir(&ancestor).await?,
                    Err(e) => return Err(e),
                }
            }
        }

        match self.session.lstat(&self.path).await {
            Ok(_) => return Err(SftpError::AlreadyExists(self.path.clone())),
            Err(SftpError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.session.create_dir(&self.path).await
    }

    /// Remove a file or symlink
    pub async fn unlink(&self) -> Result<(), SftpError> {
        let meta = self.session.lstat(&self.path).await?;
        if meta.is_dir() {
            return Err(SftpError::IsADirectory(self.path.clone()));
        }
        self.session.remove_file(&self.path).await
    }

    /// Remove an empty directory
    pub async fn rmdir(&self) -> Result<(), SftpError> {
        let meta = self.session.lstat(&self.path).await?;
        if !meta.is_dir() {
            return Err(SftpError::NotADirectory(self.path.clone()));
        }
        self.session.remove_dir(&self.path).await
    }

    /// Server-side rename; both paths must share a session
    pub async fn rename(&self, dest: &RemotePath) -> Result<(), SftpError> {
        if !self.same_session(dest) {
            return Err(SftpError::CrossSession {
                from: self.path.clone(),
                to: dest.path.clone(),
            });
        }
        self.session.rename(&self.path, &dest.path).await
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, SftpError> {
        self.session.read(&self.path).await
    }

    pub async fn write_bytes(&self, data: &[u8]) -> Result<(), SftpError> {
        self.session.write(&self.path, data).await
    }

    /// Create an empty file if nothing exists at this path
    pub async fn touch(&self) -> Result<(), SftpError> {
        match self.session.lstat(&self.path).await {
            Ok(_) => Ok(()),
            Err(SftpError::NotFound(_)) => self.session.write(&self.path, &[]).await,
            Err(e) => Err(e),
        }
    }

    /// Make this path a symlink pointing to `target`
    pub async fn symlink_to(&self, target: &str) -> Result<(), SftpError> {
        self.session.symlink(target, &self.path).await
    }

    pub async fn read_link(&self) -> Result<String, SftpError> {
        self.session.read_link(&self.path).await
    }
}

impl PartialEq for RemotePath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for RemotePath {}

impl Hash for RemotePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePath")
            .field("identity", self.session.identity())
            .field("path", &self.path)
            .finish()
    }
}

/// Entries of one directory listing
pub struct RemoteReadDir {
    parent: RemotePath,
    entries: std::vec::IntoIter<Metadata>,
}

impl Iterator for RemoteReadDir {
    type Item = RemotePath;

    fn next(&mut self) -> Option<RemotePath> {
        let meta = self.entries.next()?;
        let path = join_remote_path(&self.parent.path, &meta.filename);
        Some(RemotePath::with_metadata(
            self.parent.session.clone(),
            path,
            meta,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
