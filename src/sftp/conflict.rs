//! Overwrite conflict resolution for paste operations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::SftpError;
use super::tree::TreeNode;
use super::types::Metadata;

/// What to do when the destination of a paste already exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverwritePolicy {
    /// Replace the existing entry
    Force,
    /// Leave the existing entry and skip the item
    Skip,
    /// Write to a sibling with this name instead (empty name skips)
    Rename(String),
    /// Replace only if the incoming entry is strictly newer
    PreferNewer,
    /// Write to a sibling named after the destination plus `_`
    Suffix,
}

/// Outcome of applying a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<D> {
    Overwrite,
    Skip,
    Redirect(D),
}

/// Both sides of a conflict, for prompting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub source: String,
    pub source_metadata: Metadata,
    pub destination: String,
    pub destination_metadata: Metadata,
}

impl Conflict {
    pub async fn describe<S: TreeNode, D: TreeNode>(
        existing_dest: &D,
        incoming_src: &S,
    ) -> Result<Self, SftpError> {
        Ok(Self {
            source: incoming_src.to_string(),
            source_metadata: incoming_src.metadata().await?,
            destination: existing_dest.to_string(),
            destination_metadata: existing_dest.metadata().await?,
        })
    }

    /// Human-readable comparison of the two entries
    pub fn summary(&self) -> String {
        format!(
            "{} already exists\n  existing: {} bytes, modified {}\n  incoming: {} ({} bytes, modified {})",
            self.destination,
            self.destination_metadata.size,
            self.destination_metadata.modified_display(),
            self.source,
            self.source_metadata.size,
            self.source_metadata.modified_display(),
        )
    }
}

/// Chooses a policy for each conflict (usually by asking the user)
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn decide(&self, conflict: &Conflict) -> OverwritePolicy;
}

/// Applies one policy to every conflict
#[derive(Debug, Clone)]
pub struct FixedPolicy(pub OverwritePolicy);

#[async_trait]
impl ConflictResolver for FixedPolicy {
    async fn decide(&self, _conflict: &Conflict) -> OverwritePolicy {
        self.0.clone()
    }
}

/// Apply `policy` to an existing destination
pub async fn resolve_overwrite_conflict<S: TreeNode, D: TreeNode>(
    existing_dest: &D,
    incoming_src: &S,
    policy: &OverwritePolicy,
) -> Result<Resolution<D>, SftpError> {
    let resolution = match policy {
        OverwritePolicy::Force => Resolution::Overwrite,
        OverwritePolicy::Skip => Resolution::Skip,
        OverwritePolicy::Rename(name) if name.is_empty() => Resolution::Skip,
        OverwritePolicy::Rename(name) => Resolution::Redirect(existing_dest.sibling(name)),
        OverwritePolicy::Suffix => {
            let name = format!("{}_", existing_dest.file_name());
            Resolution::Redirect(existing_dest.sibling(&name))
        }
        OverwritePolicy::PreferNewer => {
            let incoming = incoming_src.metadata().await?.mtime;
            let existing = existing_dest.metadata().await?.mtime;
            if existing < incoming {
                Resolution::Overwrite
            } else {
                Resolution::Skip
            }
        }
    };
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sftp::memory::MemoryFs;
    use crate::sftp::path::RemotePath;
    use crate::sftp::session::SftpSession;
    use crate::ssh::RemoteIdentity;

    fn setup() -> (Arc<MemoryFs>, Arc<SftpSession>) {
        let fs = Arc::new(MemoryFs::new());
        fs.add_file("/src/report.txt", "new");
        fs.add_file("/dst/report.txt", "old");
        let session = fs
            .clone()
            .into_session(RemoteIdentity::new("alice", "example.com", None));
        (fs, session)
    }

    fn pair(session: &Arc<SftpSession>) -> (RemotePath, RemotePath) {
        (
            RemotePath::from_normalized(session.clone(), "/src/report.txt"),
            RemotePath::from_normalized(session.clone(), "/dst/report.txt"),
        )
    }

    #[tokio::test]
    async fn test_prefer_newer() {
        let (fs, session) = setup();

        fs.set_mtime("/src/report.txt", 2_000);
        fs.set_mtime("/dst/report.txt", 1_000);
        let (src, dest) = pair(&session);
        assert_eq!(
            resolve_overwrite_conflict(&dest, &src, &OverwritePolicy::PreferNewer)
                .await
                .unwrap(),
            Resolution::Overwrite
        );

        // Equal timestamps keep the existing entry
        fs.set_mtime("/dst/report.txt", 2_000);
        let (src, dest) = pair(&session);
        assert_eq!(
            resolve_overwrite_conflict(&dest, &src, &OverwritePolicy::PreferNewer)
                .await
                .unwrap(),
            Resolution::Skip
        );
    }

    #[tokio::test]
    async fn test_redirects() {
        let (_fs, session) = setup();
        let (src, dest) = pair(&session);

        match resolve_overwrite_conflict(&dest, &src, &OverwritePolicy::Suffix)
            .await
            .unwrap()
        {
            Resolution::Redirect(p) => assert_eq!(p.as_str(), "/dst/report.txt_"),
            other => panic!("unexpected {:?}", other),
        }

        match resolve_overwrite_conflict(&dest, &src, &OverwritePolicy::Rename("copy.txt".into()))
            .await
            .unwrap()
        {
            Resolution::Redirect(p) => assert_eq!(p.as_str(), "/dst/copy.txt"),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            resolve_overwrite_conflict(&dest, &src, &OverwritePolicy::Rename(String::new()))
                .await
                .unwrap(),
            Resolution::Skip
        );
    }

    #[tokio::test]
    async fn test_conflict_summary() {
        let (_fs, session) = setup();
        let (src, dest) = pair(&session);

        let conflict = Conflict::describe(&dest, &src).await.unwrap();
        assert_eq!(conflict.destination_metadata.size, 3);
        assert!(conflict.summary().starts_with("/dst/report.txt already exists"));
        assert_eq!(
            FixedPolicy(OverwritePolicy::Force).decide(&conflict).await,
            OverwritePolicy::Force
        );
    }
}
