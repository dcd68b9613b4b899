//! File actions for an explorer UI
//!
//! Batch operations (paste, remove, create) report one [`ItemOutcome`] per
//! input and keep going after a failed item.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::conflict::{resolve_overwrite_conflict, Conflict, ConflictResolver, Resolution};
use super::error::SftpError;
use super::path::RemotePath;
use super::transfer::FileTransfer;
use super::tree::{copy_recursive, move_entry, remove_recursive, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipboardAction {
    Copy,
    Move,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Finished; `path` is the entry written, created or removed
    Done { path: String },
    Skipped,
}

#[derive(Debug)]
pub struct ItemOutcome {
    pub source: String,
    pub result: Result<ItemStatus, SftpError>,
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn is_within(inner: &str, outer: &str) -> bool {
    let prefix = format!("{}/", outer.trim_end_matches('/'));
    inner.starts_with(&prefix)
}

/// Delete whatever is at `path`, descending only into real directories
async fn remove_existing<N: TreeNode>(path: &N) -> Result<(), SftpError> {
    let meta = path.fresh().metadata().await?;
    if meta.is_dir() {
        remove_recursive(path).await?;
    } else {
        path.remove_file().await?;
    }
    Ok(())
}

/// Paste `items` into `dest_dir`
pub async fn paste<S, D, T>(
    items: &[S],
    dest_dir: &D,
    action: ClipboardAction,
    transfer: &T,
    resolver: &dyn ConflictResolver,
) -> Vec<ItemOutcome>
where
    S: TreeNode,
    D: TreeNode,
    T: FileTransfer<S, D> + ?Sized,
{
    info!("{:?} {} items into {}", action, items.len(), dest_dir);
    let mut outcomes = Vec::with_capacity(items.len());
    for src in items {
        let result = paste_item(src, dest_dir, action, transfer, resolver).await;
        if let Err(e) = &result {
            warn!("{:?} of {} failed: {}", action, src, e);
        }
        outcomes.push(ItemOutcome {
            source: src.to_string(),
            result,
        });
    }
    outcomes
}

async fn paste_item<S, D, T>(
    src: &S,
    dest_dir: &D,
    action: ClipboardAction,
    transfer: &T,
    resolver: &dyn ConflictResolver,
) -> Result<ItemStatus, SftpError>
where
    S: TreeNode,
    D: TreeNode,
    T: FileTransfer<S, D> + ?Sized,
{
    if !src.exists().await? {
        debug!("Source {} vanished, skipping", src);
        return Ok(ItemStatus::Skipped);
    }

    let mut dest = dest_dir.join(&src.file_name());
    loop {
        if src.location() == dest.location() {
            return Ok(ItemStatus::Skipped);
        }
        if !dest.exists().await? {
            break;
        }

        let conflict = Conflict::describe(&dest, src).await?;
        let policy = resolver.decide(&conflict).await;
        match resolve_overwrite_conflict(&dest, src, &policy).await? {
            Resolution::Skip => return Ok(ItemStatus::Skipped),
            Resolution::Overwrite => {
                if is_within(&src.location(), &dest.location()) {
                    return Err(SftpError::Unsupported(format!(
                        "{} lies inside {}, which would be replaced",
                        src, dest
                    )));
                }
                debug!("Replacing {}", dest);
                remove_existing(&dest).await?;
                break;
            }
            Resolution::Redirect(other) => {
                if other.location() == dest.location() {
                    return Err(SftpError::AlreadyExists(dest.to_string()));
                }
                dest = other;
            }
        }
    }
    let dest = dest.fresh();

    if is_within(&dest.location(), &src.location()) {
        return Err(SftpError::Unsupported(format!(
            "cannot paste {} into itself",
            src
        )));
    }

    match action {
        ClipboardAction::Copy => {
            copy_recursive(src, &dest, transfer).await?;
        }
        ClipboardAction::Move => move_entry(src, &dest, transfer).await?,
        ClipboardAction::Link => transfer.link(src, &dest).await?,
    }
    Ok(ItemStatus::Done {
        path: dest.location(),
    })
}

/// Delete each target; directories recursively, symlinks as entries
pub async fn remove<N: TreeNode>(targets: &[N]) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        let result = remove_existing(target).await.map(|_| ItemStatus::Done {
            path: target.location(),
        });
        if let Err(e) = &result {
            warn!("Failed to remove {}: {}", target, e);
        }
        outcomes.push(ItemOutcome {
            source: target.to_string(),
            result,
        });
    }
    outcomes
}

/// Rename `old` to `new`, creating missing parents of `new`.
///
/// A destination that differs from `old` only by letter case is not a
/// conflict, so case-only renames work on case-insensitive servers.
pub async fn rename(old: &RemotePath, new: &RemotePath) -> Result<(), SftpError> {
    if old.same_session(new) && old.as_str() == new.as_str() {
        return Ok(());
    }

    let new = new.fresh();
    if new.exists().await? && old.as_str().to_lowercase() != new.as_str().to_lowercase() {
        return Err(SftpError::AlreadyExists(new.to_string()));
    }

    if let Some(parent) = new.parent() {
        if !parent.exists().await? {
            parent.mkdir(true).await?;
        }
    }

    old.rename(&new).await?;
    info!("Renamed {} -> {}", old, new);
    Ok(())
}

/// Create `cwd/name` as a directory, with missing parents
pub async fn new_directory(cwd: &RemotePath, name: &str) -> Result<RemotePath, SftpError> {
    let dir = cwd.joinpath(name.trim_end_matches('/'));
    dir.mkdir(true).await?;
    Ok(dir.fresh())
}

/// Create an empty file `cwd/name`; a trailing `/` makes a directory
pub async fn new_file(cwd: &RemotePath, name: &str) -> Result<RemotePath, SftpError> {
    if name.ends_with('/') {
        return new_directory(cwd, name).await;
    }

    let file = cwd.joinpath(name);
    if file.exists().await? {
        return Err(SftpError::AlreadyExists(file.to_string()));
    }
    if let Some(parent) = file.parent() {
        if !parent.exists().await? {
            parent.mkdir(true).await?;
        }
    }
    file.touch().await?;
    Ok(file.fresh())
}

pub async fn new_multiple_files(cwd: &RemotePath, names: &[&str]) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::with_capacity(names.len());
    for name in names {
        let result = new_file(cwd, name).await.map(|created| ItemStatus::Done {
            path: created.location(),
        });
        if let Err(e) = &result {
            warn!("Failed to create {} in {}: {}", name, cwd, e);
        }
        outcomes.push(ItemOutcome {
            source: name.to_string(),
            result,
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::sftp::conflict::{FixedPolicy, OverwritePolicy};
    use crate::sftp::memory::MemoryFs;
    use crate::sftp::session::SftpSession;
    use crate::sftp::transfer::RemoteCopy;
    use crate::ssh::RemoteIdentity;

    fn host(name: &str) -> (Arc<MemoryFs>, Arc<SftpSession>) {
        let fs = Arc::new(MemoryFs::new());
        let session = fs
            .clone()
            .into_session(RemoteIdentity::new("alice", name, None));
        (fs, session)
    }

    fn at(session: &Arc<SftpSession>, p: &str) -> RemotePath {
        RemotePath::from_normalized(session.clone(), p)
    }

    async fn paste_with(
        items: &[RemotePath],
        dest_dir: &RemotePath,
        action: ClipboardAction,
        policy: OverwritePolicy,
    ) -> Vec<ItemOutcome> {
        paste(items, dest_dir, action, &RemoteCopy, &FixedPolicy(policy)).await
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Conflict>>,
    }

    #[async_trait]
    impl ConflictResolver for Recording {
        async fn decide(&self, conflict: &Conflict) -> OverwritePolicy {
            self.seen.lock().push(conflict.clone());
            OverwritePolicy::Skip
        }
    }

    #[tokio::test]
    async fn test_copy_into_directory() {
        let (fs, s) = host("one");
        fs.add_file("/src/a.txt", "a");
        fs.add_file("/src/tree/b.txt", "b");
        fs.add_dir("/dst");

        let items = [at(&s, "/src/a.txt"), at(&s, "/src/tree")];
        let outcomes = paste_with(
            &items,
            &at(&s, "/dst"),
            ClipboardAction::Copy,
            OverwritePolicy::Force,
        )
        .await;

        assert!(outcomes.iter().all(ItemOutcome::is_ok));
        assert_eq!(fs.contents("/dst/a.txt").unwrap(), b"a");
        assert_eq!(fs.contents("/dst/tree/b.txt").unwrap(), b"b");
        assert!(fs.contains("/src/tree/b.txt"));
    }

    #[tokio::test]
    async fn test_conflict_skip_and_resolver_sees_both_sides() {
        let (fs, s) = host("one");
        fs.add_file("/src/a.txt", "incoming!");
        fs.add_file("/dst/a.txt", "old");

        let resolver = Recording::default();
        let outcomes = paste(
            &[at(&s, "/src/a.txt")],
            &at(&s, "/dst"),
            ClipboardAction::Copy,
            &RemoteCopy,
            &resolver,
        )
        .await;

        assert_eq!(outcomes[0].result.as_ref().unwrap(), &ItemStatus::Skipped);
        assert_eq!(fs.contents("/dst/a.txt").unwrap(), b"old");

        let seen = resolver.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].source_metadata.size, 9);
        assert_eq!(seen[0].destination_metadata.size, 3);
    }

    #[tokio::test]
    async fn test_force_replaces_directory_wholesale() {
        let (fs, s) = host("one");
        fs.add_file("/src/tree/new.txt", "new");
        fs.add_file("/dst/tree/stale.txt", "stale");

        let outcomes = paste_with(
            &[at(&s, "/src/tree")],
            &at(&s, "/dst"),
            ClipboardAction::Copy,
            OverwritePolicy::Force,
        )
        .await;

        assert!(outcomes[0].is_ok());
        assert!(fs.contains("/dst/tree/new.txt"));
        assert!(!fs.contains("/dst/tree/stale.txt"));
    }

    #[tokio::test]
    async fn test_suffix_keeps_both() {
        let (fs, s) = host("one");
        fs.add_file("/src/a.txt", "new");
        fs.add_file("/dst/a.txt", "old");
        fs.add_file("/dst/a.txt_", "older");

        let outcomes = paste_with(
            &[at(&s, "/src/a.txt")],
            &at(&s, "/dst"),
            ClipboardAction::Copy,
            OverwritePolicy::Suffix,
        )
        .await;

        assert_eq!(
            outcomes[0].result.as_ref().unwrap(),
            &ItemStatus::Done {
                path: "//alice@one/dst/a.txt__".to_string()
            }
        );
        assert_eq!(fs.contents("/dst/a.txt").unwrap(), b"old");
        assert_eq!(fs.contents("/dst/a.txt_").unwrap(), b"older");
        assert_eq!(fs.contents("/dst/a.txt__").unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_fixed_rename_onto_existing_fails() {
        let (fs, s) = host("one");
        fs.add_file("/src/a.txt", "new");
        fs.add_file("/dst/a.txt", "old");
        fs.add_file("/dst/b.txt", "taken");

        let policy = OverwritePolicy::Rename("b.txt".to_string());
        let outcomes =
            paste_with(
                &[at(&s, "/src/a.txt")],
                &at(&s, "/dst"),
                ClipboardAction::Copy,
                policy,
            )
            .await;

        assert!(matches!(outcomes[0].result, Err(SftpError::AlreadyExists(_))));
        assert_eq!(fs.contents("/dst/b.txt").unwrap(), b"taken");
    }

    #[tokio::test]
    async fn test_missing_source_and_same_place_skipped() {
        let (fs, s) = host("one");
        fs.add_file("/dst/a.txt", "a");

        let items = [at(&s, "/gone"), at(&s, "/dst/a.txt")];
        let outcomes = paste_with(
            &items,
            &at(&s, "/dst"),
            ClipboardAction::Move,
            OverwritePolicy::Force,
        )
        .await;

        assert!(outcomes
            .iter()
            .all(|o| o.result.as_ref().unwrap() == &ItemStatus::Skipped));
        assert_eq!(fs.contents("/dst/a.txt").unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_move_same_host_and_across_hosts() {
        let (fs1, s1) = host("one");
        let (fs2, s2) = host("two");
        fs1.add_file("/src/local.txt", "1");
        fs1.add_file("/src/far/x.txt", "x");
        fs1.add_dir("/dst");
        fs2.add_dir("/dst");

        let outcomes = paste_with(
            &[at(&s1, "/src/local.txt")],
            &at(&s1, "/dst"),
            ClipboardAction::Move,
            OverwritePolicy::Force,
        )
        .await;
        assert!(outcomes[0].is_ok());
        assert!(fs1.contains("/dst/local.txt"));
        assert!(!fs1.contains("/src/local.txt"));

        let outcomes = paste_with(
            &[at(&s1, "/src/far")],
            &at(&s2, "/dst"),
            ClipboardAction::Move,
            OverwritePolicy::Force,
        )
        .await;
        assert!(outcomes[0].is_ok());
        assert_eq!(fs2.contents("/dst/far/x.txt").unwrap(), b"x");
        assert!(!fs1.contains("/src/far"));
    }

    #[tokio::test]
    async fn test_link_and_cross_host_link() {
        let (fs1, s1) = host("one");
        let (_fs2, s2) = host("two");
        fs1.add_file("/src/a.txt", "a");
        fs1.add_dir("/dst");

        let outcomes = paste_with(
            &[at(&s1, "/src/a.txt")],
            &at(&s1, "/dst"),
            ClipboardAction::Link,
            OverwritePolicy::Force,
        )
        .await;
        assert!(outcomes[0].is_ok());
        assert_eq!(at(&s1, "/dst/a.txt").read_link().await.unwrap(), "/src/a.txt");

        let outcomes = paste_with(
            &[at(&s1, "/src/a.txt")],
            &at(&s2, "/"),
            ClipboardAction::Link,
            OverwritePolicy::Force,
        )
        .await;
        assert!(matches!(outcomes[0].result, Err(SftpError::CrossSession { .. })));
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let (fs, s) = host("one");
        fs.add_file("/src/secret", "s");
        fs.add_file("/src/open", "o");
        fs.add_dir("/dst");
        fs.deny("/src/secret");

        let items = [at(&s, "/src/secret"), at(&s, "/src/open")];
        let outcomes = paste_with(
            &items,
            &at(&s, "/dst"),
            ClipboardAction::Copy,
            OverwritePolicy::Force,
        )
        .await;

        assert!(matches!(outcomes[0].result, Err(SftpError::PermissionDenied(_))));
        assert!(outcomes[1].is_ok());
        assert_eq!(fs.contents("/dst/open").unwrap(), b"o");
    }

    #[tokio::test]
    async fn test_paste_into_itself_rejected() {
        let (fs, s) = host("one");
        fs.add_file("/a/f", "f");

        let outcomes = paste_with(
            &[at(&s, "/a")],
            &at(&s, "/a"),
            ClipboardAction::Copy,
            OverwritePolicy::Force,
        )
        .await;
        assert!(matches!(outcomes[0].result, Err(SftpError::Unsupported(_))));
        assert!(!fs.contains("/a/a"));
    }

    #[tokio::test]
    async fn test_remove_mixed_targets() {
        let (fs, s) = host("one");
        fs.add_file("/d/tree/f", "f");
        fs.add_file("/d/file", "x");
        fs.add_dir("/keep/inner");
        fs.add_symlink("/d/link", "/keep");

        let targets = [at(&s, "/d/tree"), at(&s, "/d/file"), at(&s, "/d/link"), at(&s, "/d/none")];
        let outcomes = remove(&targets).await;

        assert!(outcomes[..3].iter().all(ItemOutcome::is_ok));
        assert!(matches!(outcomes[3].result, Err(SftpError::NotFound(_))));
        assert!(!fs.contains("/d/tree"));
        assert!(!fs.contains("/d/file"));
        assert!(!fs.contains("/d/link"));
        assert!(fs.contains("/keep/inner"));
    }

    #[tokio::test]
    async fn test_rename_rules() {
        let (fs, s) = host("one");
        fs.add_file("/w/a.txt", "a");
        fs.add_file("/w/b.txt", "b");

        rename(&at(&s, "/w/a.txt"), &at(&s, "/w/a.txt")).await.unwrap();

        let err = rename(&at(&s, "/w/a.txt"), &at(&s, "/w/b.txt")).await.unwrap_err();
        assert!(matches!(err, SftpError::AlreadyExists(_)));

        rename(&at(&s, "/w/a.txt"), &at(&s, "/w/A.txt")).await.unwrap();
        assert!(fs.contains("/w/A.txt"));

        rename(&at(&s, "/w/A.txt"), &at(&s, "/w/sub/dir/a.txt")).await.unwrap();
        assert_eq!(fs.contents("/w/sub/dir/a.txt").unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_new_files_and_directories() {
        let (fs, s) = host("one");
        fs.add_dir("/w");
        let cwd = at(&s, "/w");

        let dir = new_directory(&cwd, "x/y").await.unwrap();
        assert!(dir.is_dir().await.unwrap());

        new_file(&cwd, "nested/deep/file.txt").await.unwrap();
        assert_eq!(fs.contents("/w/nested/deep/file.txt").unwrap(), b"");

        let outcomes = new_multiple_files(&cwd, &["one.txt", "two/", "one.txt"]).await;
        assert!(outcomes[0].is_ok());
        assert!(at(&s, "/w/two").is_dir().await.unwrap());
        assert!(matches!(outcomes[2].result, Err(SftpError::AlreadyExists(_))));
    }
}
