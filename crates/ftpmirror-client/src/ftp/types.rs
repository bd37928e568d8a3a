//! Shared types for the FTP crate.

use serde::{Deserialize, Serialize};

/// Well-known FTP control port (RFC 959).
pub const FTP_PORT: u16 = 21;

// ─── Connection / Session ────────────────────────────────────────────

/// Transfer type (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    Ascii,
    #[default]
    Binary,
}

/// Transfer mode selected for the data channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DataChannelMode {
    Passive,
    ExtendedPassive,
    #[default]
    Active,
    ExtendedActive,
}

impl DataChannelMode {
    /// Map a plain passive/active switch onto a data channel mode.
    pub fn from_passive(passive: bool) -> Self {
        if passive {
            Self::Passive
        } else {
            Self::Active
        }
    }
}

/// Configuration for a single FTP connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub transfer_type: TransferType,
    #[serde(default)]
    pub data_channel_mode: DataChannelMode,
    /// Bound on the TCP connect + banner phase. `None` waits indefinitely.
    #[serde(default)]
    pub connect_timeout_sec: Option<u64>,
    /// Data-channel connect/accept timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    /// UTF-8 encoding (OPTS UTF8 ON).
    #[serde(default = "default_true")]
    pub utf8: bool,
    /// Local address to bind for active-mode data connections.
    #[serde(default)]
    pub active_bind_address: Option<String>,
    /// Friendly label used in log lines.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_port() -> u16 {
    FTP_PORT
}
fn default_data_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: FTP_PORT,
            username: "anonymous".into(),
            password: "anonymous@".into(),
            transfer_type: TransferType::Binary,
            data_channel_mode: DataChannelMode::Active,
            connect_timeout_sec: None,
            data_timeout_sec: default_data_timeout(),
            utf8: true,
            active_bind_address: None,
            label: None,
        }
    }
}

impl FtpConnectionConfig {
    /// `user@host:port`, used to attribute log lines and errors.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}@{}:{}", self.username, self.host, self.port),
        }
    }
}

/// State of an active FTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpSessionInfo {
    pub connected: bool,
    pub logged_in: bool,
    pub transfer_type: TransferType,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether this is a positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether this is a positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

// ─── Server Capabilities ─────────────────────────────────────────────

/// Parsed FEAT response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFeatures {
    pub utf8: bool,
}
