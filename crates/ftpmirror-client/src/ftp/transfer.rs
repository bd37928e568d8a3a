//! Data-channel management for FTP transfers.
//!
//! Supports four modes (RFC 959 + RFC 2428):
//! - **PASV**: server opens a port, client connects
//! - **EPSV**: extended passive (IPv6-ready)
//! - **PORT**: client opens a port, tells server
//! - **EPRT**: extended active (IPv6-ready)

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::DataChannelMode;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

/// A data connection that is either already connected (passive modes) or
/// still waiting for the server to connect back (active modes).
///
/// Active-mode channels can only be accepted *after* the transfer command
/// has been sent, hence the two-step shape.
pub enum DataChannel {
    Connected(TcpStream),
    Listening {
        listener: TcpListener,
        data_timeout: Duration,
    },
}

impl DataChannel {
    /// Resolve the channel into a connected stream.
    pub async fn into_stream(self) -> FtpResult<TcpStream> {
        match self {
            DataChannel::Connected(tcp) => Ok(tcp),
            DataChannel::Listening {
                listener,
                data_timeout,
            } => {
                let (tcp, _) = timeout(data_timeout, listener.accept())
                    .await
                    .map_err(|_| FtpError::data_channel("Active-mode accept timed out"))?
                    .map_err(|e| FtpError::data_channel(format!("Active-mode accept: {}", e)))?;
                Ok(tcp)
            }
        }
    }
}

/// Open a data channel according to the configured mode.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: DataChannelMode,
    host: &str,
    data_timeout: Duration,
    active_bind: Option<&str>,
) -> FtpResult<DataChannel> {
    match mode {
        DataChannelMode::Passive => {
            let peer = codec.peer_addr().map(|a| a.ip());
            open_pasv(codec, peer, data_timeout).await.map(DataChannel::Connected)
        }
        DataChannelMode::ExtendedPassive => open_epsv(codec, host, data_timeout)
            .await
            .map(DataChannel::Connected),
        DataChannelMode::Active => open_port(codec, active_bind, data_timeout).await,
        DataChannelMode::ExtendedActive => open_eprt(codec, active_bind, data_timeout).await,
    }
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV`, parse the response, connect to the returned address.
///
/// Response format: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
async fn open_pasv(
    codec: &mut FtpCodec,
    control_peer: Option<IpAddr>,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("PASV").await?;
    let mut addr = parse_pasv_response(&resp.text())?;
    // Servers behind NAT often advertise 0.0.0.0; reuse the control peer.
    if addr.ip().is_unspecified() {
        if let Some(ip) = control_peer {
            addr.set_ip(ip);
        }
    }
    let tcp = timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FtpError::data_channel("PASV data connect timed out"))?
        .map_err(|e| FtpError::data_channel(format!("PASV data connect: {}", e)))?;
    Ok(tcp)
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
pub(crate) fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let re = Regex::new(r"(\d+),(\d+),(\d+),(\d+),(\d+),(\d+)")
        .map_err(|e| FtpError::protocol_error(e.to_string()))?;
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

// ─── EPSV ────────────────────────────────────────────────────────────

/// Issue `EPSV`, parse port, connect to the *same host* on that port.
///
/// Response format: `229 Entering Extended Passive Mode (|||port|)`
async fn open_epsv(
    codec: &mut FtpCodec,
    host: &str,
    data_timeout: Duration,
) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("EPSV").await?;
    let port = parse_epsv_response(&resp.text())?;
    let tcp = match codec.peer_addr() {
        Some(peer) => {
            timeout(data_timeout, TcpStream::connect(SocketAddr::new(peer.ip(), port))).await
        }
        None => timeout(data_timeout, TcpStream::connect(format!("{}:{}", host, port))).await,
    }
    .map_err(|_| FtpError::data_channel("EPSV data connect timed out"))?
    .map_err(|e| FtpError::data_channel(format!("EPSV data connect: {}", e)))?;
    Ok(tcp)
}

pub(crate) fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let re = Regex::new(r"\|\|\|(\d+)\|").map_err(|e| FtpError::protocol_error(e.to_string()))?;
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}

// ─── PORT ────────────────────────────────────────────────────────────

/// Pick the address to listen on for active mode: the configured bind
/// address, else the local side of the control connection.
fn active_listen_ip(codec: &FtpCodec, bind_addr: Option<&str>) -> FtpResult<IpAddr> {
    if let Some(bind) = bind_addr {
        return bind
            .parse::<IpAddr>()
            .map_err(|_| FtpError::invalid_config(format!("Invalid active bind address '{}'", bind)));
    }
    Ok(codec
        .local_addr()
        .map(|a| a.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)))
}

/// Bind a local TCP listener and tell the server via `PORT`.
async fn open_port(
    codec: &mut FtpCodec,
    bind_addr: Option<&str>,
    data_timeout: Duration,
) -> FtpResult<DataChannel> {
    let ip = active_listen_ip(codec, bind_addr)?;
    let listener = TcpListener::bind(SocketAddr::new(ip, 0))
        .await
        .map_err(|e| FtpError::data_channel(format!("PORT bind: {}", e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::data_channel(format!("PORT local_addr: {}", e)))?;

    let v4 = match local.ip() {
        IpAddr::V4(v4) => v4,
        _ => return Err(FtpError::data_channel("PORT requires IPv4, use EPRT")),
    };
    codec.expect_ok(&format_port_command(v4, local.port())).await?;

    Ok(DataChannel::Listening {
        listener,
        data_timeout,
    })
}

pub(crate) fn format_port_command(ip: Ipv4Addr, port: u16) -> String {
    let o = ip.octets();
    format!(
        "PORT {},{},{},{},{},{}",
        o[0],
        o[1],
        o[2],
        o[3],
        port / 256,
        port % 256
    )
}

// ─── EPRT ────────────────────────────────────────────────────────────

/// Bind a local listener and tell the server via `EPRT`.
///
/// Command format: `EPRT |1|ip|port|` (1 = IPv4, 2 = IPv6)
async fn open_eprt(
    codec: &mut FtpCodec,
    bind_addr: Option<&str>,
    data_timeout: Duration,
) -> FtpResult<DataChannel> {
    let ip = active_listen_ip(codec, bind_addr)?;
    let listener = TcpListener::bind(SocketAddr::new(ip, 0))
        .await
        .map_err(|e| FtpError::data_channel(format!("EPRT bind: {}", e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::data_channel(format!("EPRT local_addr: {}", e)))?;

    let af = match local.ip() {
        IpAddr::V4(_) => 1,
        IpAddr::V6(_) => 2,
    };
    let cmd = format!("EPRT |{}|{}|{}|", af, local.ip(), local.port());
    codec.expect_ok(&cmd).await?;

    Ok(DataChannel::Listening {
        listener,
        data_timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pasv_reply() {
        let addr = parse_pasv_response("227 Entering Passive Mode (127,0,0,1,195,80).").unwrap();
        assert_eq!(addr, "127.0.0.1:50000".parse().unwrap());
    }

    #[test]
    fn pasv_reply_without_parens() {
        let addr = parse_pasv_response("227 Entering Passive Mode 10,0,0,7,4,1").unwrap();
        assert_eq!(addr, "10.0.0.7:1025".parse().unwrap());
    }

    #[test]
    fn rejects_bad_pasv_reply() {
        assert!(parse_pasv_response("227 nope").is_err());
        assert!(parse_pasv_response("227 (300,0,0,1,1,1)").is_err());
    }

    #[test]
    fn parses_epsv_reply() {
        assert_eq!(
            parse_epsv_response("229 Entering Extended Passive Mode (|||6446|)").unwrap(),
            6446
        );
        assert!(parse_epsv_response("229 (||6446|)").is_err());
    }

    #[test]
    fn port_command_splits_port_bytes() {
        assert_eq!(
            format_port_command(Ipv4Addr::new(192, 168, 1, 2), 50000),
            "PORT 192,168,1,2,195,80"
        );
    }
}
