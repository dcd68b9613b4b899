//! SFTP data types

use russh_sftp::protocol::FileAttributes;
use serde::{Deserialize, Serialize};

/// POSIX file type bits carried in the mode word
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

/// File type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Unknown,
}

impl FileType {
    /// Classify from the `S_IFMT` bits of a mode word
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFREG => FileType::File,
            S_IFLNK => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }
}

/// Attributes of one entry, as reported by a single stat call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Final path component
    pub filename: String,
    /// Mode word, type bits included
    pub mode: u32,
    /// Size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp)
    pub mtime: i64,
}

impl Metadata {
    pub fn new(filename: impl Into<String>, mode: u32, size: u64, mtime: i64) -> Self {
        Self {
            filename: filename.into(),
            mode,
            size,
            mtime,
        }
    }

    pub(crate) fn from_attrs(filename: impl Into<String>, attrs: &FileAttributes) -> Self {
        Self {
            filename: filename.into(),
            mode: attrs.permissions.unwrap_or(0),
            size: attrs.size.unwrap_or(0),
            mtime: attrs.mtime.map(|t| t as i64).unwrap_or(0),
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type() == FileType::File
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type() == FileType::Symlink
    }

    /// Permission bits only (e.g. 0o755)
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Modification time in the local timezone, for prompts and logs
    pub fn modified_display(&self) -> String {
        match chrono::DateTime::from_timestamp(self.mtime, 0) {
            Some(utc) => utc
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => self.mtime.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_mode() {
        assert_eq!(FileType::from_mode(0o040755), FileType::Directory);
        assert_eq!(FileType::from_mode(0o100644), FileType::File);
        assert_eq!(FileType::from_mode(0o120777), FileType::Symlink);
        assert_eq!(FileType::from_mode(0o020666), FileType::Unknown);
        assert_eq!(FileType::from_mode(0), FileType::Unknown);
    }

    #[test]
    fn test_metadata_from_attrs() {
        let attrs = FileAttributes {
            size: Some(42),
            permissions: Some(0o100640),
            mtime: Some(1_700_000_000),
            ..Default::default()
        };
        let meta = Metadata::from_attrs("notes.txt", &attrs);
        assert!(meta.is_file());
        assert_eq!(meta.size, 42);
        assert_eq!(meta.permissions(), 0o640);
        assert_eq!(meta.mtime, 1_700_000_000);
    }
}
