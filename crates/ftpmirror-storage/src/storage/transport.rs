//! Transport seam between an `Endpoint` and the wire.
//!
//! `Connector::connect` performs the TCP connect and greeting (bounded by the
//! endpoint's connect timeout); `Transport::login` authenticates. Keeping the
//! two apart lets the endpoint apply different policies to each.

use crate::storage::endpoint::EndpointConfig;
use async_trait::async_trait;
use ftpmirror_client::{FtpClient, FtpResult};
use std::path::Path;

/// One open control connection.
#[async_trait]
pub trait Transport: Send {
    async fn login(&mut self) -> FtpResult<()>;

    /// Name list of `dir`; entries may be bare names or full paths.
    async fn nlst(&mut self, dir: &str) -> FtpResult<Vec<String>>;

    /// Binary download of `remote` into `local`.
    async fn get(&mut self, remote: &str, local: &Path) -> FtpResult<u64>;

    /// Binary upload of `local` to `remote`.
    async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64>;

    async fn delete(&mut self, path: &str) -> FtpResult<()>;

    async fn mkdir(&mut self, path: &str) -> FtpResult<()>;

    async fn rmdir(&mut self, path: &str) -> FtpResult<()>;

    /// True while the control socket is usable.
    fn is_open(&self) -> bool;

    /// Close the session. Safe to call more than once.
    async fn quit(&mut self) -> FtpResult<()>;
}

/// Opens transports for endpoint configurations.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &EndpointConfig) -> FtpResult<Box<dyn Transport>>;
}

// ─── FTP ─────────────────────────────────────────────────────────────

/// `Transport` backed by an `FtpClient` session.
pub struct FtpTransport {
    client: FtpClient,
}

impl FtpTransport {
    pub fn new(client: FtpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &FtpClient {
        &self.client
    }
}

#[async_trait]
impl Transport for FtpTransport {
    async fn login(&mut self) -> FtpResult<()> {
        self.client.login().await
    }

    async fn nlst(&mut self, dir: &str) -> FtpResult<Vec<String>> {
        self.client.nlst(dir).await
    }

    async fn get(&mut self, remote: &str, local: &Path) -> FtpResult<u64> {
        self.client.download(remote, local).await
    }

    async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64> {
        self.client.upload(local, remote).await
    }

    async fn delete(&mut self, path: &str) -> FtpResult<()> {
        self.client.delete(path).await
    }

    async fn mkdir(&mut self, path: &str) -> FtpResult<()> {
        self.client.mkdir(path).await.map(|_| ())
    }

    async fn rmdir(&mut self, path: &str) -> FtpResult<()> {
        self.client.rmdir(path).await
    }

    fn is_open(&self) -> bool {
        self.client.is_connected()
    }

    async fn quit(&mut self) -> FtpResult<()> {
        self.client.quit().await
    }
}

/// Production connector: plain FTP over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self, config: &EndpointConfig) -> FtpResult<Box<dyn Transport>> {
        let client = FtpClient::connect(config.to_client_config()).await?;
        Ok(Box::new(FtpTransport::new(client)))
    }
}
