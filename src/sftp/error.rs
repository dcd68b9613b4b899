//! SFTP Error types

use std::io;
use std::path::Path;

use russh_sftp::client::error::Error as SftpErrorInner;
use russh_sftp::protocol::StatusCode;
use thiserror::Error;

use crate::ssh::SshError;

#[derive(Error, Debug)]
pub enum SftpError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("File exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Cannot rename across sessions: {from} -> {to}")]
    CrossSession { from: String, to: String },

    #[error("No active remote session for {0}")]
    NoActiveSession(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("SFTP session closed")]
    SessionClosed,

    #[error("SFTP protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error(transparent)]
    Ssh(#[from] SshError),
}

impl SftpError {
    /// Map a wire-level status onto the error taxonomy
    pub fn from_sftp(err: SftpErrorInner, path: &str) -> Self {
        match &err {
            SftpErrorInner::Status(status) => match status.status_code {
                StatusCode::NoSuchFile => SftpError::NotFound(path.to_string()),
                StatusCode::PermissionDenied => SftpError::PermissionDenied(path.to_string()),
                StatusCode::NoConnection | StatusCode::ConnectionLost => SftpError::SessionClosed,
                StatusCode::OpUnsupported => SftpError::Unsupported(path.to_string()),
                _ => SftpError::ProtocolError(format!("{}: {}", path, err)),
            },
            _ => SftpError::ProtocolError(format!("{}: {}", path, err)),
        }
    }

    /// Map a local filesystem error, keeping the path in the message
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let shown = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => SftpError::NotFound(shown),
            io::ErrorKind::AlreadyExists => SftpError::AlreadyExists(shown),
            io::ErrorKind::PermissionDenied => SftpError::PermissionDenied(shown),
            io::ErrorKind::NotADirectory => SftpError::NotADirectory(shown),
            io::ErrorKind::IsADirectory => SftpError::IsADirectory(shown),
            _ => SftpError::IoError(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SftpError::NotFound(_))
    }
}
