//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP response code that triggered the error, if any.
    pub code: Option<u16>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// TCP / DNS resolution failure, or a rejecting greeting.
    ConnectionFailed,
    /// Wrong username/password.
    AuthFailed,
    /// Server returned a 4xx/5xx for a command.
    CommandRejected,
    /// Data channel could not be established (PASV/PORT failed).
    DataChannelFailed,
    /// Transfer aborted or incomplete.
    TransferFailed,
    /// Server sent an un-parseable response.
    ProtocolError,
    /// An I/O error on the local side (file read/write).
    IoError,
    /// Operation timed out.
    Timeout,
    /// Session is disconnected / dropped.
    Disconnected,
    /// Permission denied on the server.
    PermissionDenied,
    /// File/directory not found on the server.
    NotFound,
    /// Config / parameter validation error.
    InvalidConfig,
    /// Catch-all.
    Unknown,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            session_id: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn data_channel(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::DataChannelFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::IoError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Disconnected, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::Disconnected,
            425 | 426 => FtpErrorKind::DataChannelFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else if lower.contains("not found") || lower.contains("no such") {
                    FtpErrorKind::NotFound
                } else {
                    FtpErrorKind::CommandRejected
                }
            }
            451 | 452 | 552 => FtpErrorKind::TransferFailed,
            500..=504 => FtpErrorKind::CommandRejected,
            _ if code >= 400 => FtpErrorKind::CommandRejected,
            _ => FtpErrorKind::Unknown,
        };
        Self {
            kind,
            message: text.to_string(),
            code: Some(code),
            session_id: None,
        }
    }

    // ── Reply-class predicates ───────────────────────────────────

    /// Transient negative completion (4xx).
    pub fn is_transient(&self) -> bool {
        matches!(self.code, Some(400..=499))
    }

    /// Permanent negative completion (5xx).
    pub fn is_permanent(&self) -> bool {
        matches!(self.code, Some(500..=599))
    }

    /// The addressed file or directory does not exist.
    ///
    /// Only replies whose text says so count; a bare 450/550 may just as
    /// well be a locked file or a refused operation.
    pub fn is_not_found(&self) -> bool {
        self.kind == FtpErrorKind::NotFound
    }

    /// Failure of the connect phase (TCP connect, timeout, greeting).
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self.kind,
            FtpErrorKind::ConnectionFailed | FtpErrorKind::Timeout
        )
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.message
    }
}
