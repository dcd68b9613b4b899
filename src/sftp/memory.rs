//! In-memory SFTP backend.
//!
//! Behaves like an SFTPv3 server: errors carry only the status codes the
//! protocol can express (`NoSuchFile`, `PermissionDenied`, `Failure`), so
//! callers exercise the same classification paths as against a real host.
//! All data is lost when dropped.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::backend::RemoteFs;
use super::error::SftpError;
use super::path_utils::{parent_remote_path, remote_ancestors, remote_file_name};
use super::session::SftpSession;
use super::types::{Metadata, S_IFDIR, S_IFLNK, S_IFREG};
use crate::ssh::RemoteIdentity;

const MAX_SYMLINK_HOPS: usize = 40;
const EPOCH: i64 = 1_700_000_000;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mode: u32, mtime: i64 },
    Directory { mode: u32, mtime: i64 },
    Symlink { target: String, mtime: i64 },
}

impl Node {
    fn metadata(&self, filename: &str) -> Metadata {
        match self {
            Node::File { data, mode, mtime } => {
                Metadata::new(filename, S_IFREG | mode, data.len() as u64, *mtime)
            }
            Node::Directory { mode, mtime } => Metadata::new(filename, S_IFDIR | mode, 0, *mtime),
            Node::Symlink { target, mtime } => {
                Metadata::new(filename, S_IFLNK | 0o777, target.len() as u64, *mtime)
            }
        }
    }
}

type Nodes = BTreeMap<String, Node>;

/// In-memory remote filesystem.
///
/// Keys are absolute, normalized paths. Relative paths resolve against
/// the home directory, like an SFTP login directory.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: RwLock<Nodes>,
    denied: RwLock<HashSet<String>>,
    home: String,
    clock: AtomicI64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Empty filesystem with `/home/user` as login directory.
    pub fn new() -> Self {
        Self::with_home("/home/user")
    }

    pub fn with_home(home: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node::Directory {
                mode: 0o755,
                mtime: EPOCH,
            },
        );
        let fs = Self {
            nodes: RwLock::new(nodes),
            denied: RwLock::new(HashSet::new()),
            home: lexical_normalize("/", home),
            clock: AtomicI64::new(EPOCH),
        };
        let home = fs.home.clone();
        fs.add_dir(&home);
        fs
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    /// Wrap this backend in a session owned by `identity`.
    pub fn into_session(self: Arc<Self>, identity: RemoteIdentity) -> Arc<SftpSession> {
        Arc::new(SftpSession::from_backend(identity, self))
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: &str) {
        let path = self.absolute(path);
        let mtime = self.tick();
        let mut nodes = self.nodes.write();
        for dir in remote_ancestors(&path).into_iter().chain([path]) {
            nodes
                .entry(dir)
                .or_insert(Node::Directory { mode: 0o755, mtime });
        }
    }

    /// Create or replace a regular file, creating missing ancestors.
    pub fn add_file(&self, path: &str, data: impl Into<Vec<u8>>) {
        let path = self.absolute(path);
        if let Some(parent) = parent_remote_path(&path) {
            self.add_dir(&parent);
        }
        let mtime = self.tick();
        self.nodes.write().insert(
            path,
            Node::File {
                data: data.into(),
                mode: 0o644,
                mtime,
            },
        );
    }

    /// Create a symlink at `link` pointing to `target` (not validated).
    pub fn add_symlink(&self, link: &str, target: &str) {
        let link = self.absolute(link);
        if let Some(parent) = parent_remote_path(&link) {
            self.add_dir(&parent);
        }
        let mtime = self.tick();
        self.nodes.write().insert(
            link,
            Node::Symlink {
                target: target.to_string(),
                mtime,
            },
        );
    }

    pub fn set_mtime(&self, path: &str, value: i64) {
        let path = self.absolute(path);
        if let Some(node) = self.nodes.write().get_mut(&path) {
            match node {
                Node::File { mtime, .. } | Node::Directory { mtime, .. } | Node::Symlink { mtime, .. } => {
                    *mtime = value
                }
            }
        }
    }

    /// Reject reads of `path` and mutations of `path` or its children.
    pub fn deny(&self, path: &str) {
        let path = self.absolute(path);
        self.denied.write().insert(path);
    }

    /// Raw content of a regular file (symlinks not followed).
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.read().get(&self.absolute(path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.read().contains_key(&self.absolute(path))
    }

    /// Every path currently present, root included, in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn absolute(&self, path: &str) -> String {
        lexical_normalize(&self.home, path)
    }

    fn check_read(&self, path: &str) -> Result<(), SftpError> {
        if self.denied.read().contains(path) {
            return Err(SftpError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }

    fn check_write(&self, path: &str) -> Result<(), SftpError> {
        self.check_read(path)?;
        match parent_remote_path(path) {
            Some(parent) => self.check_read(&parent),
            None => Ok(()),
        }
    }
}

fn failure(path: &str) -> SftpError {
    SftpError::ProtocolError(format!("{}: Failure", path))
}

fn lexical_normalize(base: &str, path: &str) -> String {
    let mut segments: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty()).collect()
    };
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn join_segments(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

/// Resolve symlinks along `path`. Intermediate components must exist;
/// the final one may be missing.
fn resolve(nodes: &Nodes, path: &str, follow_last: bool) -> Result<String, SftpError> {
    let mut pending: VecDeque<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let mut resolved: Vec<String> = Vec::new();
    let mut hops = 0;

    while let Some(component) = pending.pop_front() {
        match component.as_str() {
            "." => continue,
            ".." => {
                resolved.pop();
                continue;
            }
            _ => {}
        }

        let mut candidate = resolved.clone();
        candidate.push(component);
        let key = join_segments(&candidate);
        let is_last = pending.is_empty();

        match nodes.get(&key) {
            Some(Node::Symlink { target, .. }) if follow_last || !is_last => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(failure(path));
                }
                if target.starts_with('/') {
                    resolved.clear();
                }
                let mut expanded: VecDeque<String> = target
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                expanded.extend(pending.drain(..));
                pending = expanded;
            }
            Some(Node::File { .. }) if !is_last => return Err(failure(path)),
            Some(_) => resolved = candidate,
            None if is_last => resolved = candidate,
            None => return Err(SftpError::NotFound(path.to_string())),
        }
    }

    Ok(join_segments(&resolved))
}

fn require_parent_dir(nodes: &Nodes, path: &str) -> Result<(), SftpError> {
    let Some(parent) = parent_remote_path(path) else {
        return Err(failure(path));
    };
    match nodes.get(&parent) {
        Some(Node::Directory { .. }) => Ok(()),
        Some(_) => Err(failure(path)),
        None => Err(SftpError::NotFound(path.to_string())),
    }
}

fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        dir.to_string()
    } else {
        format!("{}/", dir)
    }
}

fn has_children(nodes: &Nodes, dir: &str) -> bool {
    let prefix = child_prefix(dir);
    nodes
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .any(|(key, _)| key.len() > prefix.len())
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn canonicalize(&self, path: &str) -> Result<String, SftpError> {
        let path = self.absolute(path);
        let nodes = self.nodes.read();
        resolve(&nodes, &path, true)
    }

    async fn lstat(&self, path: &str) -> Result<Metadata, SftpError> {
        let abs = self.absolute(path);
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, &abs, false)?;
        nodes
            .get(&resolved)
            .map(|node| node.metadata(remote_file_name(&resolved)))
            .ok_or_else(|| SftpError::NotFound(path.to_string()))
    }

    async fn stat(&self, path: &str) -> Result<Metadata, SftpError> {
        let abs = self.absolute(path);
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, &abs, true)?;
        nodes
            .get(&resolved)
            .map(|node| node.metadata(remote_file_name(&abs)))
            .ok_or_else(|| SftpError::NotFound(path.to_string()))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<Metadata>, SftpError> {
        let abs = self.absolute(path);
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, &abs, true)?;
        self.check_read(&resolved)?;

        match nodes.get(&resolved) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(failure(path)),
            None => return Err(SftpError::NotFound(path.to_string())),
        }

        let prefix = child_prefix(&resolved);
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, node)| {
                let name = &key[prefix.len()..];
                (!name.is_empty() && !name.contains('/')).then(|| node.metadata(name))
            })
            .collect())
    }

    async fn create_dir(&self, path: &str) -> Result<(), SftpError> {
        let abs = self.absolute(path);
        let mtime = self.tick();
        let mut nodes = self.nodes.write();
        let resolved = resolve(&nodes, &abs, false)?;
        self.check_write(&resolved)?;

        if nodes.contains_key(&resolved) {
            return Err(failure(path));
        }
        require_parent_dir(&nodes, &resolved)?;
        nodes.insert(resolved, Node::Directory { mode: 0o755, mtime });
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), SftpError> {
        let abs = self.absolute(path);
        let mut nodes = self.nodes.write();
        let resolved = resolve(&nodes, &abs, false)?;
        self.check_write(&resolved)?;

        match nodes.get(&resolved) {
            None => Err(SftpError::NotFound(path.to_string())),
            Some(Node::Directory { .. }) => Err(failure(path)),
            Some(_) => {
                nodes.remove(&resolved);
                Ok(())
            }
        }
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SftpError> {
        let abs = self.absolute(path);
        let mut nodes = self.nodes.write();
        let resolved = resolve(&nodes, &abs, false)?;
        self.check_write(&resolved)?;

        match nodes.get(&resolved) {
            None => Err(SftpError::NotFound(path.to_string())),
            Some(Node::Directory { .. }) if resolved != "/" && !has_children(&nodes, &resolved) => {
                nodes.remove(&resolved);
                Ok(())
            }
            Some(_) => Err(failure(path)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), SftpError> {
        let from_abs = self.absolute(from);
        let to_abs = self.absolute(to);
        let mut nodes = self.nodes.write();
        let source = resolve(&nodes, &from_abs, false)?;
        let target = resolve(&nodes, &to_abs, false)?;
        self.check_write(&source)?;
        self.check_write(&target)?;

        if !nodes.contains_key(&source) {
            return Err(SftpError::NotFound(from.to_string()));
        }
        if nodes.contains_key(&target) || target.starts_with(&child_prefix(&source)) {
            return Err(failure(to));
        }
        require_parent_dir(&nodes, &target)?;

        let prefix = child_prefix(&source);
        let moved: Vec<String> = nodes
            .keys()
            .filter(|key| **key == source || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = nodes.remove(&key) {
                let renamed = format!("{}{}", target, &key[source.len()..]);
                nodes.insert(renamed, node);
            }
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, SftpError> {
        let abs = self.absolute(path);
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, &abs, true)?;
        self.check_read(&resolved)?;

        match nodes.get(&resolved) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(_) => Err(failure(path)),
            None => Err(SftpError::NotFound(path.to_string())),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<(), SftpError> {
        let abs = self.absolute(path);
        let mtime = self.tick();
        let mut nodes = self.nodes.write();
        let resolved = resolve(&nodes, &abs, true)?;
        self.check_write(&resolved)?;
        require_parent_dir(&nodes, &resolved)?;

        let mode = match nodes.get(&resolved) {
            Some(Node::File { mode, .. }) => *mode,
            Some(_) => return Err(failure(path)),
            None => 0o644,
        };
        nodes.insert(
            resolved,
            Node::File {
                data: data.to_vec(),
                mode,
                mtime,
            },
        );
        Ok(())
    }

    async fn symlink(&self, target: &str, link: &str) -> Result<(), SftpError> {
        let abs = self.absolute(link);
        let mtime = self.tick();
        let mut nodes = self.nodes.write();
        let resolved = resolve(&nodes, &abs, false)?;
        self.check_write(&resolved)?;

        if nodes.contains_key(&resolved) {
            return Err(failure(link));
        }
        require_parent_dir(&nodes, &resolved)?;
        nodes.insert(
            resolved,
            Node::Symlink {
                target: target.to_string(),
                mtime,
            },
        );
        Ok(())
    }

    async fn read_link(&self, path: &str) -> Result<String, SftpError> {
        let abs = self.absolute(path);
        let nodes = self.nodes.read();
        let resolved = resolve(&nodes, &abs, false)?;

        match nodes.get(&resolved) {
            Some(Node::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(failure(path)),
            None => Err(SftpError::NotFound(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canonicalize_relative_and_links() {
        let fs = MemoryFs::new();
        fs.add_dir("/srv/data");
        fs.add_symlink("/home/user/data", "/srv/data");

        assert_eq!(fs.canonicalize(".").await.unwrap(), "/home/user");
        assert_eq!(fs.canonicalize("..").await.unwrap(), "/home");
        assert_eq!(fs.canonicalize("data").await.unwrap(), "/srv/data");
        assert_eq!(fs.canonicalize("data/new.txt").await.unwrap(), "/srv/data/new.txt");
        assert!(fs.canonicalize("missing/child").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_lstat_and_stat_differ_on_links() {
        let fs = MemoryFs::new();
        fs.add_file("/srv/a.txt", "hello");
        fs.add_symlink("/srv/link", "a.txt");

        assert!(fs.lstat("/srv/link").await.unwrap().is_symlink());
        let followed = fs.stat("/srv/link").await.unwrap();
        assert!(followed.is_file());
        assert_eq!(followed.size, 5);
        assert_eq!(followed.filename, "link");
    }

    #[tokio::test]
    async fn test_failures_look_like_sftp_v3() {
        let fs = MemoryFs::new();
        fs.add_file("/srv/a.txt", "x");

        // Existing entry: generic failure, no dedicated status
        let err = fs.create_dir("/srv/a.txt").await.unwrap_err();
        assert!(matches!(err, SftpError::ProtocolError(_)));

        let err = fs.read_dir("/srv/a.txt").await.unwrap_err();
        assert!(matches!(err, SftpError::ProtocolError(_)));

        let err = fs.create_dir("/nowhere/child").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_dir_lists_direct_children() {
        let fs = MemoryFs::new();
        fs.add_file("/srv/a.txt", "x");
        fs.add_file("/srv/sub/b.txt", "y");
        fs.add_file("/srv2/c.txt", "z");

        let mut names: Vec<String> = fs
            .read_dir("/srv")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.filename)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let fs = MemoryFs::new();
        fs.add_file("/srv/dir/a.txt", "x");
        fs.add_file("/srv/dir/sub/b.txt", "y");
        fs.add_dir("/dest");

        fs.rename("/srv/dir", "/dest/moved").await.unwrap();

        assert!(!fs.contains("/srv/dir"));
        assert_eq!(fs.contents("/dest/moved/a.txt").unwrap(), b"x");
        assert_eq!(fs.contents("/dest/moved/sub/b.txt").unwrap(), b"y");

        // Existing target is not replaced
        fs.add_file("/dest/other", "o");
        assert!(fs.rename("/dest/moved", "/dest/other").await.is_err());
    }

    #[tokio::test]
    async fn test_denied_paths() {
        let fs = MemoryFs::new();
        fs.add_file("/locked/a.txt", "x");
        fs.deny("/locked");

        assert!(matches!(
            fs.read_dir("/locked").await.unwrap_err(),
            SftpError::PermissionDenied(_)
        ));
        assert!(matches!(
            fs.remove_file("/locked/a.txt").await.unwrap_err(),
            SftpError::PermissionDenied(_)
        ));
        // Metadata is still visible
        assert!(fs.lstat("/locked/a.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_dir_requires_empty() {
        let fs = MemoryFs::new();
        fs.add_file("/srv/dir/a.txt", "x");

        assert!(fs.remove_dir("/srv/dir").await.is_err());
        fs.remove_file("/srv/dir/a.txt").await.unwrap();
        fs.remove_dir("/srv/dir").await.unwrap();
        assert!(!fs.contains("/srv/dir"));
    }
}
