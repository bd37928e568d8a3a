//! Low-level FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code
//! - Tracking whether the control socket is still open

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// The FTP command/response codec operating on split halves.
pub struct FtpCodec {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    open: bool,
}

impl FtpCodec {
    /// Create a codec from a plain TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        let (rd, wr) = stream.into_split();
        Self {
            reader: BufReader::new(rd),
            writer: wr,
            local_addr,
            peer_addr,
            open: true,
        }
    }

    /// Whether the control socket is still usable.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Local end of the control connection (used for PORT/EPRT).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Remote end of the control connection.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Send a raw FTP command. CRLF is appended here.
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        if !self.open {
            return Err(FtpError::disconnected("Control connection is closed"));
        }
        let line = format!("{}\r\n", cmd);
        if let Err(e) = self.writer.write_all(line.as_bytes()).await {
            self.open = false;
            return Err(e.into());
        }
        if cmd.starts_with("PASS ") {
            log::trace!(">>> PASS ****");
        } else {
            log::trace!(">>> {}", cmd);
        }
        Ok(())
    }

    /// Read a single line from the control channel (including CRLF).
    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = match self.reader.read_line(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                self.open = false;
                return Err(e.into());
            }
        };
        if n == 0 {
            self.open = false;
            return Err(FtpError::disconnected("Server closed connection"));
        }
        Ok(buf)
    }

    /// Read a complete FTP response (possibly multi-line).
    ///
    /// Multi-line responses look like:
    /// ```text
    /// 220-Welcome to my FTP server
    /// 220-This is line 2
    /// 220 End of greeting
    /// ```
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let first = self.read_line_raw().await?;
        let first_trimmed = first.trim_end_matches(|c| c == '\r' || c == '\n');

        let code = parse_code(first_trimmed)?;
        let mut lines = vec![first_trimmed.to_string()];

        // "NNN-" means more lines follow until "NNN " is seen.
        let is_multi = first_trimmed.len() >= 4 && first_trimmed.as_bytes()[3] == b'-';
        if is_multi {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next_trimmed = next.trim_end_matches(|c| c == '\r' || c == '\n');
                lines.push(next_trimmed.to_string());
                if next_trimmed.starts_with(&terminator) || next_trimmed == code.to_string() {
                    break;
                }
            }
        }

        let resp = FtpResponse { code, lines };
        log::trace!("<<< {}", resp.lines.last().map(String::as_str).unwrap_or(""));
        if resp.code == 421 {
            // Service closing control connection.
            self.open = false;
        }
        Ok(resp)
    }

    /// Send a command and return the response.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Convenience: send a command, expect a specific response-code class.
    pub async fn expect(&mut self, cmd: &str, expected_first_digit: u16) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if resp.code / 100 != expected_first_digit {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }

    /// Expect a 2xx reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.expect(cmd, 2).await
    }

    /// Shut down the write half and mark the codec closed.
    pub async fn shutdown(&mut self) {
        if self.open {
            let _ = self.writer.shutdown().await;
            self.open = false;
        }
    }
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    let digits = line
        .get(..3)
        .ok_or_else(|| FtpError::protocol_error(format!("Response too short: '{}'", line)))?;
    digits
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error(format!("Invalid reply code in: '{}'", line)))
}
