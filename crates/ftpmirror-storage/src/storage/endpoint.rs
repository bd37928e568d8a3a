//! A single FTP server and the file operations the storage needs from it.
//!
//! Lifecycle: `Endpoint::new()` (disconnected) → `establish()` (connect +
//! login) → operations → `close()`. Nothing here retries; the replies that
//! are expected during normal operation (missing listing, existing
//! directory, non-empty directory, already deleted file) are absorbed,
//! everything else propagates attributed to this endpoint.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::path::{ancestor_chain, base_name, is_root, parent_dir};
use crate::storage::transport::{Connector, Transport};
use crate::storage::tree::DirectoryTree;
use ftpmirror_client::{DataChannelMode, FtpConnectionConfig, FtpError, FTP_PORT};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection parameters of one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub passive: bool,
    /// Bound on TCP connect + greeting. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Treat connect-phase failures as "server down" instead of an error.
    pub ignore_connect_errors: bool,
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: FTP_PORT,
            user: user.into(),
            password: password.into(),
            passive: false,
            connect_timeout: None,
            ignore_connect_errors: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn label(&self) -> EndpointLabel {
        EndpointLabel::new(&self.user, &self.host, self.port)
    }

    /// Client configuration for this server. The connect timeout is rounded
    /// up to whole seconds.
    pub fn to_client_config(&self) -> FtpConnectionConfig {
        FtpConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.user.clone(),
            password: self.password.clone(),
            data_channel_mode: DataChannelMode::from_passive(self.passive),
            connect_timeout_sec: self.connect_timeout.map(|d| {
                let whole = d.as_secs() + u64::from(d.subsec_nanos() > 0);
                whole.max(1)
            }),
            label: Some(self.label().to_string()),
            ..Default::default()
        }
    }
}

/// `user@host:port`, used in logs and to attribute failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointLabel(String);

impl EndpointLabel {
    pub fn new(user: &str, host: &str, port: u16) -> Self {
        Self(format!("{}@{}:{}", user, host, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime handle on one server. Owns at most one connection.
pub struct Endpoint {
    config: EndpointConfig,
    label: EndpointLabel,
    connector: Arc<dyn Connector>,
    connection: Option<Box<dyn Transport>>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("label", &self.label)
            .field("connected", &self.connected())
            .finish()
    }
}

impl Endpoint {
    pub fn new(config: EndpointConfig, connector: Arc<dyn Connector>) -> Self {
        let label = config.label();
        Self {
            config,
            label,
            connector,
            connection: None,
        }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn label(&self) -> &EndpointLabel {
        &self.label
    }

    // ─── Connection lifecycle ────────────────────────────────────

    /// Connect and log in.
    ///
    /// A connect-phase failure leaves the endpoint disconnected and returns
    /// `Ok(())` when `ignore_connect_errors` is set. Login failures are
    /// always returned.
    pub async fn establish(&mut self) -> StorageResult<()> {
        self.close().await;

        let mut conn = match self.connector.connect(&self.config).await {
            Ok(conn) => conn,
            Err(e) if self.config.ignore_connect_errors && e.is_connect_failure() => {
                warn!(endpoint = %self.label, error = %e, "FTP server unreachable, skipping");
                return Ok(());
            }
            Err(e) => return Err(StorageError::from_ftp(&self.label, e)),
        };

        if let Err(e) = conn.login().await {
            let _ = conn.quit().await;
            return Err(StorageError::Auth {
                endpoint: self.label.clone(),
                source: e,
            });
        }

        debug!(endpoint = %self.label, "FTP session established");
        self.connection = Some(conn);
        Ok(())
    }

    /// True iff a connection exists and its control socket is open.
    pub fn connected(&self) -> bool {
        self.connection.as_ref().map_or(false, |c| c.is_open())
    }

    /// Send QUIT if still open and drop the connection. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            if conn.is_open() {
                if let Err(e) = conn.quit().await {
                    debug!(endpoint = %self.label, error = %e, "QUIT failed");
                }
            }
        }
    }

    fn session(&mut self) -> StorageResult<(&EndpointLabel, &mut (dyn Transport + 'static))> {
        match self.connection.as_deref_mut() {
            Some(conn) => Ok((&self.label, conn)),
            None => Err(StorageError::Transport {
                endpoint: self.label.clone(),
                source: FtpError::disconnected("Endpoint is not connected"),
            }),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────

    /// Name list of `dir`. A listing refused with a transient or not-found
    /// reply is reported as an empty directory.
    pub async fn list_dir(&mut self, dir: &str) -> StorageResult<Vec<String>> {
        let (label, conn) = self.session()?;
        match conn.nlst(dir).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_transient() || e.is_not_found() => {
                debug!(endpoint = %label, dir, error = %e, "listing unavailable");
                Ok(Vec::new())
            }
            Err(e) => Err(StorageError::from_ftp(label, e)),
        }
    }

    /// Whether `path` is listed in its parent directory. Listings may hold
    /// bare names or full paths; both match. The root always exists.
    pub async fn file_exists(&mut self, path: &str) -> StorageResult<bool> {
        if is_root(path) {
            return Ok(true);
        }
        let name = base_name(path);
        let entries = self.list_dir(&parent_dir(path)).await?;
        Ok(entries.iter().any(|entry| base_name(entry) == name))
    }

    // ─── Transfers ───────────────────────────────────────────────

    /// Download `remote` into `local`.
    pub async fn get_file(&mut self, remote: &str, local: &Path) -> StorageResult<()> {
        let (label, conn) = self.session()?;
        let bytes = conn
            .get(remote, local)
            .await
            .map_err(|e| StorageError::from_ftp(label, e))?;
        debug!(endpoint = %label, path = remote, bytes, "fetched file");
        Ok(())
    }

    /// Upload `local` to `remote`. With `ensure_parent`, a missing parent
    /// directory chain is created first.
    pub async fn put_file(&mut self, local: &Path, remote: &str, ensure_parent: bool) -> StorageResult<()> {
        if ensure_parent {
            let parent = parent_dir(remote);
            if !self.file_exists(&parent).await? {
                self.mkdir_recursive(&parent).await?;
            }
        }

        let (label, conn) = self.session()?;
        info!(endpoint = %label, path = remote, "storing file");
        conn.put(local, remote)
            .await
            .map_err(|e| StorageError::from_ftp(label, e))?;
        Ok(())
    }

    /// Upload `(local, remote)` pairs in order.
    ///
    /// Several files share one directory reconciliation pass; a single file
    /// goes through `put_file` with the parent check.
    pub async fn put_files(&mut self, pairs: &[(PathBuf, String)]) -> StorageResult<()> {
        match pairs {
            [] => Ok(()),
            [(local, remote)] => self.put_file(local, remote, true).await,
            _ => {
                let tree = DirectoryTree::build(pairs.iter().map(|(_, remote)| remote.as_str()));
                tree.reconcile(self, "/").await?;
                for (local, remote) in pairs {
                    self.put_file(local, remote, false).await?;
                }
                Ok(())
            }
        }
    }

    /// Delete `remote`. A file that is already gone is not an error.
    pub async fn delete_file(&mut self, remote: &str) -> StorageResult<()> {
        let (label, conn) = self.session()?;
        info!(endpoint = %label, path = remote, "deleting file");
        match conn.delete(remote).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(endpoint = %label, path = remote, "file already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::from_ftp(label, e)),
        }
    }

    /// Delete each path in order, pruning emptied parents unless `keep_dirs`.
    pub async fn delete_files(&mut self, paths: &[String], keep_dirs: bool) -> StorageResult<()> {
        for path in paths {
            self.delete_file(path).await?;
            if !keep_dirs {
                self.rmdir_recursive_if_empty(&parent_dir(path)).await?;
            }
        }
        Ok(())
    }

    // ─── Directories ─────────────────────────────────────────────

    /// MKD `path`; a permanent rejection means the directory is already
    /// there and is absorbed.
    pub async fn make_dir(&mut self, path: &str) -> StorageResult<()> {
        let (label, conn) = self.session()?;
        match conn.mkdir(path).await {
            Ok(()) => {
                debug!(endpoint = %label, path, "created directory");
                Ok(())
            }
            Err(e) if e.is_permanent() => Ok(()),
            Err(e) => Err(StorageError::from_ftp(label, e)),
        }
    }

    /// Create `dir` and all of its ancestors, root first.
    pub async fn mkdir_recursive(&mut self, dir: &str) -> StorageResult<()> {
        for level in ancestor_chain(dir) {
            self.make_dir(&level).await?;
        }
        Ok(())
    }

    /// Remove `dir`, then its parent, and so on, stopping silently at the
    /// first permanent rejection (not empty, permission). `/` is never removed.
    pub async fn rmdir_recursive_if_empty(&mut self, dir: &str) -> StorageResult<()> {
        let mut current = dir.to_string();
        while !is_root(&current) && current != "." && !current.is_empty() {
            let (label, conn) = self.session()?;
            match conn.rmdir(&current).await {
                Ok(()) => debug!(endpoint = %label, path = %current, "removed empty directory"),
                Err(e) if e.is_permanent() => return Ok(()),
                Err(e) => return Err(StorageError::from_ftp(label, e)),
            }
            current = parent_dir(&current);
        }
        Ok(())
    }
}
