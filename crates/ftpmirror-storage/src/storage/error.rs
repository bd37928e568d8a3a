//! Storage-level error type.

use crate::storage::endpoint::EndpointLabel;
use ftpmirror_client::{FtpError, FtpErrorKind};
use thiserror::Error;

/// Errors surfaced by the storage backend. FTP failures always carry the
/// endpoint they happened on.
#[derive(Debug, Error)]
pub enum StorageError {
    /// None of the configured servers could be connected.
    #[error("no FTP server available")]
    NoEndpointAvailable,

    /// TCP connect, connect timeout or a refusing greeting.
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: EndpointLabel,
        source: FtpError,
    },

    /// Credentials rejected. Never swallowed.
    #[error("login to {endpoint} rejected: {source}")]
    Auth {
        endpoint: EndpointLabel,
        source: FtpError,
    },

    /// Any other FTP failure.
    #[error("{endpoint}: {source}")]
    Transport {
        endpoint: EndpointLabel,
        source: FtpError,
    },

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A replication task failed or panicked.
    #[error("replication to {endpoint} failed: {message}")]
    Replica {
        endpoint: EndpointLabel,
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Attribute an FTP failure to `endpoint`, picking the variant from its kind.
    pub fn from_ftp(endpoint: &EndpointLabel, source: FtpError) -> Self {
        let endpoint = endpoint.clone();
        if source.is_connect_failure() {
            Self::Connect { endpoint, source }
        } else if source.kind == FtpErrorKind::AuthFailed {
            Self::Auth { endpoint, source }
        } else {
            Self::Transport { endpoint, source }
        }
    }

    /// The endpoint this error is attributed to, if any.
    pub fn endpoint(&self) -> Option<&EndpointLabel> {
        match self {
            Self::Connect { endpoint, .. }
            | Self::Auth { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::Replica { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// The underlying FTP error, if any.
    pub fn ftp_error(&self) -> Option<&FtpError> {
        match self {
            Self::Connect { source, .. }
            | Self::Auth { source, .. }
            | Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
