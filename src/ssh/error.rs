//! SSH Error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl SshError {
    /// Transport-level failure (DNS, refused, timeout, dropped link)
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            SshError::ConnectionFailed(_) | SshError::Timeout(_) | SshError::IoError(_)
        )
    }
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::IO(e) => SshError::ConnectionFailed(e.to_string()),
            russh::Error::ConnectionTimeout
            | russh::Error::KeepaliveTimeout
            | russh::Error::InactivityTimeout => SshError::Timeout(err.to_string()),
            russh::Error::Disconnect | russh::Error::HUP => {
                SshError::ConnectionFailed(err.to_string())
            }
            other => SshError::ProtocolError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_classification() {
        assert!(SshError::ConnectionFailed("refused".into()).is_connection_error());
        assert!(SshError::Timeout("connect".into()).is_connection_error());
        assert!(!SshError::AuthenticationFailed("rejected".into()).is_connection_error());
        assert!(!SshError::ConfigError("no key".into()).is_connection_error());
    }

    #[test]
    fn test_from_russh_error() {
        let err: SshError = russh::Error::Disconnect.into();
        assert!(matches!(err, SshError::ConnectionFailed(_)));

        let err: SshError = russh::Error::ConnectionTimeout.into();
        assert!(matches!(err, SshError::Timeout(_)));
    }
}
