//! Directory operations: mkdir, rmdir, delete.
//!
//! Each helper issues exactly one command; recursion and the decision which
//! negative replies are benign belong to the caller.

use crate::ftp::client::{parse_quoted_path, FtpClient};
use crate::ftp::error::FtpResult;

impl FtpClient {
    // ─── MKD ─────────────────────────────────────────────────────

    /// Create a directory on the remote server.
    pub async fn mkdir(&mut self, path: &str) -> FtpResult<String> {
        let resp = self.codec.expect_ok(&format!("MKD {}", path)).await?;
        Ok(parse_quoted_path(&resp.text()).unwrap_or_else(|| path.to_string()))
    }

    // ─── RMD ─────────────────────────────────────────────────────

    /// Remove an empty directory.
    pub async fn rmdir(&mut self, path: &str) -> FtpResult<()> {
        self.codec.expect_ok(&format!("RMD {}", path)).await?;
        Ok(())
    }

    // ─── DELE ────────────────────────────────────────────────────

    /// Delete a remote file.
    pub async fn delete(&mut self, path: &str) -> FtpResult<()> {
        self.codec.expect_ok(&format!("DELE {}", path)).await?;
        Ok(())
    }
}
