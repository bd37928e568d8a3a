//! Stateful FTP client: owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → `login()` (USER/PASS, FEAT, OPTS UTF8, TYPE)
//! → commands → `quit()`.
//!
//! Connect and login are separate steps so callers can treat a refused
//! socket differently from rejected credentials.
//!
//! The client exposes low-level command helpers used by `directory.rs`
//! and `file_ops.rs` for higher-level operations.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::transfer::{self, DataChannel};
use crate::ftp::types::*;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// A connected FTP client session.
pub struct FtpClient {
    pub id: String,
    pub codec: FtpCodec,
    pub config: FtpConnectionConfig,
    pub info: FtpSessionInfo,
    pub features: ServerFeatures,
}

impl FtpClient {
    /// Open the control connection and read the greeting. Does not log in.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        if config.host.is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let session_id = Uuid::new_v4().to_string();
        log::debug!("FTP [{}] connecting to {}:{}", session_id, config.host, config.port);
        let codec = connection::connect(&config)
            .await
            .map_err(|e| e.with_session(session_id.clone()))?;

        let info = FtpSessionInfo {
            connected: true,
            logged_in: false,
            transfer_type: config.transfer_type,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
        };

        Ok(Self {
            id: session_id,
            codec,
            config,
            info,
            features: ServerFeatures::default(),
        })
    }

    /// Open the control connection and log in.
    pub async fn connect_and_login(config: FtpConnectionConfig) -> FtpResult<Self> {
        let mut client = Self::connect(config).await?;
        client.login().await?;
        Ok(client)
    }

    /// Authenticate, then probe features and set the transfer type.
    pub async fn login(&mut self) -> FtpResult<()> {
        let user = self.config.username.clone();
        let password = self.config.password.clone();

        // ── Authenticate ─────────────────────────────────────────
        let user_resp = self.codec.execute(&format!("USER {}", user)).await?;
        if user_resp.code == 331 || user_resp.code == 332 {
            let pass_resp = self.codec.execute(&format!("PASS {}", password)).await?;
            if !pass_resp.is_completion() {
                return Err(FtpError::auth_failed(format!("Login failed: {}", pass_resp.text()))
                    .with_code(pass_resp.code)
                    .with_session(self.id.clone()));
            }
        } else if !user_resp.is_completion() {
            return Err(FtpError::auth_failed(format!("USER rejected: {}", user_resp.text()))
                .with_code(user_resp.code)
                .with_session(self.id.clone()));
        }
        self.info.logged_in = true;

        // ── FEAT ─────────────────────────────────────────────────
        self.features = Self::probe_features(&mut self.codec).await;

        // ── OPTS UTF8 ON ─────────────────────────────────────────
        if self.config.utf8 && self.features.utf8 {
            let _ = self.codec.execute("OPTS UTF8 ON").await;
        }

        // ── TYPE ─────────────────────────────────────────────────
        let tt = self.config.transfer_type;
        self.set_type(tt).await?;

        log::info!(
            "FTP [{}] logged in as {}",
            self.id,
            self.config.display_name()
        );
        Ok(())
    }

    // ─── FEAT probe ──────────────────────────────────────────────

    async fn probe_features(codec: &mut FtpCodec) -> ServerFeatures {
        let resp = match codec.execute("FEAT").await {
            Ok(r) if r.is_completion() => r,
            _ => return ServerFeatures::default(),
        };

        let utf8 = resp
            .lines
            .iter()
            .skip(1) // "211-Features:"
            .filter(|l| !l.starts_with("211"))
            .any(|l| l.trim().to_uppercase().starts_with("UTF8"));

        ServerFeatures { utf8 }
    }

    // ─── TYPE command ────────────────────────────────────────────

    /// Switch transfer type.
    pub async fn set_type(&mut self, tt: TransferType) -> FtpResult<()> {
        let cmd = match tt {
            TransferType::Ascii => "TYPE A",
            TransferType::Binary => "TYPE I",
        };
        self.codec.expect_ok(cmd).await?;
        self.info.transfer_type = tt;
        Ok(())
    }

    // ─── Data channel helper ─────────────────────────────────────

    /// Open a data channel with the current configuration.
    pub async fn open_data_channel(&mut self) -> FtpResult<DataChannel> {
        transfer::open_data_channel(
            &mut self.codec,
            self.config.data_channel_mode,
            &self.config.host,
            Duration::from_secs(self.config.data_timeout_sec),
            self.config.active_bind_address.as_deref(),
        )
        .await
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// Name list (NLST) of `path`.
    ///
    /// Entries are returned verbatim: depending on the server they are bare
    /// names or paths including `path`.
    pub async fn nlst(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let data = self
            .retrieve_data_as_string(&format!("NLST {}", path))
            .await?;
        Ok(data
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Generic helper: open data channel, send command, collect body as String.
    pub async fn retrieve_data_as_string(&mut self, cmd: &str) -> FtpResult<String> {
        let channel = self.open_data_channel().await?;
        let resp = self.codec.execute(cmd).await?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        // Some servers answer an empty listing with 226 and no data.
        if resp.is_completion() {
            return Ok(String::new());
        }

        let mut stream = channel.into_stream().await?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;
        drop(stream);

        // Read the 226 completion reply.
        let done = self.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }

        String::from_utf8(buf)
            .map_err(|e| FtpError::protocol_error(format!("Data not UTF-8: {}", e)))
    }

    // ─── QUIT ────────────────────────────────────────────────────

    /// Gracefully close the session. Safe to call more than once.
    pub async fn quit(&mut self) -> FtpResult<()> {
        if self.codec.is_open() {
            let _ = self.codec.execute("QUIT").await;
            self.codec.shutdown().await;
            log::debug!("FTP [{}] closed", self.id);
        }
        self.info.connected = false;
        Ok(())
    }

    // ─── Utility ─────────────────────────────────────────────────

    /// True while the control socket is open.
    pub fn is_connected(&self) -> bool {
        self.info.connected && self.codec.is_open()
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// The double-quoted path of a `257 "/some/path" ...` reply.
pub(crate) fn parse_quoted_path(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let end = text[start + 1..].find('"')?;
    Some(text[start + 1..start + 1 + end].to_string())
}
