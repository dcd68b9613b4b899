//! SFTP file management module
//!
//! Remote paths bound to live sessions, recursive tree operations, and the
//! browse/action surface an explorer UI drives.

pub mod actions;
pub mod address;
pub mod backend;
pub mod browse;
pub mod conflict;
pub mod error;
pub mod local;
#[cfg(any(test, feature = "memory-fs"))]
pub mod memory;
pub mod path;
pub mod path_utils;
pub mod session;
pub mod transfer;
pub mod tree;
pub mod types;

pub use actions::{ClipboardAction, ItemOutcome, ItemStatus};
pub use address::{AddressIdentity, ParsedAddress};
pub use backend::RemoteFs;
pub use browse::{BrowseSource, Candidate, RootCandidate, RootFormatter};
pub use conflict::{
    resolve_overwrite_conflict, Conflict, ConflictResolver, FixedPolicy, OverwritePolicy,
    Resolution,
};
pub use error::SftpError;
pub use local::LocalPath;
#[cfg(any(test, feature = "memory-fs"))]
pub use memory::MemoryFs;
pub use path::{RemotePath, RemoteReadDir};
pub use session::SftpSession;
pub use transfer::{Download, FileTransfer, RemoteCopy, Upload};
pub use tree::{
    copy_recursive, copy_recursive_with_progress, move_entry, remove_recursive, TreeNode,
    TreeProgress, TreeStats,
};
pub use types::*;
