//! TCP transport: establishes the FTP control connection.
//!
//! Handles the plain-TCP connect, the optional connect timeout from
//! `FtpConnectionConfig` and the server greeting.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::FtpConnectionConfig;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Establish the control connection and return a ready-to-use codec once
/// the server has greeted with 220.
///
/// The timeout (when configured) covers both the TCP connect and the
/// greeting; everything after that is unbounded.
pub async fn connect(config: &FtpConnectionConfig) -> FtpResult<FtpCodec> {
    let addr = format!("{}:{}", config.host, config.port);

    match config.connect_timeout_sec {
        Some(secs) => timeout(Duration::from_secs(secs), open(&addr))
            .await
            .map_err(|_| FtpError::timeout(format!("Connect to {} timed out after {}s", addr, secs)))?,
        None => open(&addr).await,
    }
}

async fn open(addr: &str) -> FtpResult<FtpCodec> {
    let tcp = TcpStream::connect(addr)
        .await
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();

    let mut codec = FtpCodec::from_tcp(tcp);
    let banner = codec
        .read_response()
        .await
        .map_err(|e| FtpError::connection_failed(format!("Greeting from {}: {}", addr, e.message)))?;

    // 120 "service ready in nnn minutes" is followed by the real 220.
    let banner = if banner.code == 120 {
        codec.read_response().await?
    } else {
        banner
    };

    if !banner.is_completion() {
        return Err(FtpError::connection_failed(format!(
            "{} refused the session: {}",
            addr,
            banner.text()
        ))
        .with_code(banner.code));
    }

    log::debug!("FTP {} greeting: {}", addr, banner.text());
    Ok(codec)
}
