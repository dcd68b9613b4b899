//! Local filesystem endpoint for upload and download walks

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use super::error::SftpError;
use super::tree::TreeNode;
use super::types::Metadata;
#[cfg(not(unix))]
use super::types::{S_IFDIR, S_IFLNK, S_IFREG};

/// Path on the local machine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalPath {
    path: PathBuf,
}

impl LocalPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, SftpError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }

    pub async fn write_bytes(&self, data: &[u8]) -> Result<(), SftpError> {
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }

    pub async fn is_symlink(&self) -> Result<bool, SftpError> {
        let meta = tokio::fs::symlink_metadata(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))?;
        Ok(meta.file_type().is_symlink())
    }

    pub async fn read_link(&self) -> Result<PathBuf, SftpError> {
        tokio::fs::read_link(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }

    /// Create this path as a symlink to `target`. The target is not checked.
    pub async fn symlink_to(&self, target: impl AsRef<Path>) -> Result<(), SftpError> {
        #[cfg(unix)]
        let result = tokio::fs::symlink(target.as_ref(), &self.path).await;
        #[cfg(windows)]
        let result = tokio::fs::symlink_file(target.as_ref(), &self.path).await;
        #[cfg(not(any(unix, windows)))]
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("symlinks are not supported here: {}", target.as_ref().display()),
        ));

        result.map_err(|e| SftpError::from_io(e, &self.path))
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn local_metadata(name: String, meta: &std::fs::Metadata) -> Metadata {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::MetadataExt;
        meta.mode()
    };
    #[cfg(not(unix))]
    let mode = {
        let file_type = meta.file_type();
        if file_type.is_dir() {
            S_IFDIR | 0o755
        } else if file_type.is_symlink() {
            S_IFLNK | 0o777
        } else {
            S_IFREG | 0o644
        }
    };

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Metadata::new(name, mode, meta.len(), mtime)
}

#[async_trait]
impl TreeNode for LocalPath {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn join(&self, name: &str) -> Self {
        Self::new(self.path.join(name))
    }

    fn sibling(&self, name: &str) -> Self {
        Self::new(self.path.with_file_name(name))
    }

    fn fresh(&self) -> Self {
        self.clone()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn metadata(&self) -> Result<Metadata, SftpError> {
        let meta = tokio::fs::symlink_metadata(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))?;
        Ok(local_metadata(self.file_name(), &meta))
    }

    async fn children(&self) -> Result<Vec<Self>, SftpError> {
        let mut read_dir = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))?;

        let mut children = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))?
        {
            children.push(Self::new(entry.path()));
        }
        Ok(children)
    }

    async fn create_dir(&self) -> Result<(), SftpError> {
        tokio::fs::create_dir(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }

    async fn create_dir_all(&self) -> Result<(), SftpError> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }

    async fn remove_file(&self) -> Result<(), SftpError> {
        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }

    async fn remove_dir(&self) -> Result<(), SftpError> {
        tokio::fs::remove_dir(&self.path)
            .await
            .map_err(|e| SftpError::from_io(e, &self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metadata_and_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let root = LocalPath::new(dir.path());
        assert!(root.metadata().await.unwrap().is_dir());

        let file = root.join("a.txt");
        let meta = file.metadata().await.unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, 5);
        assert_eq!(meta.filename, "a.txt");

        let mut names: Vec<String> = root
            .children()
            .await
            .unwrap()
            .iter()
            .map(|c| c.file_name())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = LocalPath::new(dir.path().join("nope"));
        assert!(!missing.exists().await.unwrap());
        assert!(missing.metadata().await.unwrap_err().is_not_found());
    }
}
