//! File-level operations: binary upload (STOR) and download (RETR).

use crate::ftp::client::FtpClient;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::*;
use std::path::Path;
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};

impl FtpClient {
    // ─── DOWNLOAD (RETR) ─────────────────────────────────────────

    /// Download a remote file to a local path. Returns the byte count.
    pub async fn download(&mut self, remote_path: &str, local_path: &Path) -> FtpResult<u64> {
        if self.info.transfer_type != TransferType::Binary {
            self.set_type(TransferType::Binary).await?;
        }

        let channel = self.open_data_channel().await?;
        let resp = self.codec.execute(&format!("RETR {}", remote_path)).await?;
        if !resp.is_preliminary() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        let mut stream = channel.into_stream().await?;

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut file = fs::File::create(local_path).await?;
        let received = io::copy(&mut stream, &mut file).await?;
        file.flush().await?;
        drop(file);
        drop(stream);

        // Read 226 completion
        let done = self.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }

        self.info.bytes_downloaded += received;
        log::debug!("FTP [{}] RETR {} ({} bytes)", self.id, remote_path, received);
        Ok(received)
    }

    // ─── UPLOAD (STOR) ───────────────────────────────────────────

    /// Upload a local file to a remote path. Returns the byte count.
    pub async fn upload(&mut self, local_path: &Path, remote_path: &str) -> FtpResult<u64> {
        if self.info.transfer_type != TransferType::Binary {
            self.set_type(TransferType::Binary).await?;
        }

        // Open before touching the server so a missing local file costs no STOR.
        let mut file = fs::File::open(local_path).await?;

        let channel = self.open_data_channel().await?;
        let resp = self.codec.execute(&format!("STOR {}", remote_path)).await?;
        if !resp.is_preliminary() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        let mut stream = channel.into_stream().await?;

        let sent = io::copy(&mut file, &mut stream).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        drop(stream);

        // Read 226 completion
        let done = self.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }

        self.info.bytes_uploaded += sent;
        log::debug!("FTP [{}] STOR {} ({} bytes)", self.id, remote_path, sent);
        Ok(sent)
    }
}
