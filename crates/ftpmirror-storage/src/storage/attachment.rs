//! `FtpStorage`: storage facade for one attachment.
//!
//! Files are queued per style and replicated on `flush_writes`; deletions
//! are queued by remote path and replayed on `flush_deletes`. Reads go to
//! the primary server.

use crate::storage::batch::{DeleteBatch, LocalFile, WriteBatch};
use crate::storage::config::StorageConfig;
use crate::storage::error::StorageResult;
use crate::storage::hooks::{FlushHooks, NoHooks, PathResolver};
use crate::storage::path::base_name;
use crate::storage::pool::EndpointPool;
use crate::storage::replicate::{self, ReplicationReport};
use crate::storage::transport::Connector;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// A local copy of a stored style.
#[derive(Debug)]
pub enum AttachmentFile {
    /// The file still waiting in the write queue.
    Queued(PathBuf),
    /// Downloaded from the primary server; removed when dropped.
    Downloaded(NamedTempFile),
}

impl AttachmentFile {
    pub fn path(&self) -> &Path {
        match self {
            Self::Queued(path) => path,
            Self::Downloaded(tmp) => tmp.path(),
        }
    }
}

pub struct FtpStorage {
    pool: EndpointPool,
    resolver: Arc<dyn PathResolver>,
    hooks: Arc<dyn FlushHooks>,
    keep_empty_directories: bool,
    has_original: bool,
    queued_for_write: WriteBatch,
    queued_for_delete: DeleteBatch,
}

impl FtpStorage {
    pub fn new(config: &StorageConfig, resolver: impl PathResolver + 'static) -> Self {
        Self::from_pool(EndpointPool::from_config(config), resolver, config.keep_empty_directories)
    }

    /// Storage over an existing pool, e.g. one with a closure source.
    pub fn from_pool(pool: EndpointPool, resolver: impl PathResolver + 'static, keep_empty_directories: bool) -> Self {
        Self {
            pool,
            resolver: Arc::new(resolver),
            hooks: Arc::new(NoHooks),
            keep_empty_directories,
            has_original: false,
            queued_for_write: WriteBatch::new(),
            queued_for_delete: DeleteBatch::new(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.pool = self.pool.with_connector(connector);
        self
    }

    pub fn with_hooks(mut self, hooks: impl FlushHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Remote path of `style`.
    pub fn path(&self, style: &str) -> String {
        self.resolver.resolve(style)
    }

    /// Whether an original file has been assigned to the attachment.
    pub fn has_original(&self) -> bool {
        self.has_original
    }

    pub fn set_has_original(&mut self, present: bool) {
        self.has_original = present;
    }

    // ─── Queues ──────────────────────────────────────────────────

    /// Queue `local` for upload as `style`. Marks the attachment as having
    /// an original.
    pub fn queue_write(&mut self, style: impl Into<String>, local: impl Into<PathBuf>) {
        self.queued_for_write.insert(style, LocalFile::new(local));
        self.has_original = true;
    }

    pub fn queue_delete(&mut self, remote: impl Into<String>) {
        self.queued_for_delete.push(remote);
    }

    /// Queue the remote files of `styles` for deletion.
    pub fn queue_delete_styles<'a>(&mut self, styles: impl IntoIterator<Item = &'a str>) {
        for style in styles {
            let path = self.path(style);
            self.queued_for_delete.push(path);
        }
    }

    pub fn queued_for_write(&self) -> &WriteBatch {
        &self.queued_for_write
    }

    pub fn queued_for_delete(&self) -> &DeleteBatch {
        &self.queued_for_delete
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// Whether `style` is stored on the primary server. Always false while
    /// no original is assigned.
    pub async fn exists(&self, style: &str) -> StorageResult<bool> {
        if !self.has_original {
            return Ok(false);
        }
        let path = self.path(style);
        self.pool
            .with_primary(move |ep| async move { ep.file_exists(&path).await }.boxed())
            .await
    }

    /// Local copy of `style`: the queued file if there is one, otherwise a
    /// download from the primary server into a temp file.
    pub async fn to_file(&self, style: &str) -> StorageResult<AttachmentFile> {
        if let Some(queued) = self.queued_for_write.get(style) {
            return Ok(AttachmentFile::Queued(queued.path().to_path_buf()));
        }

        let remote = self.path(style);
        let name = base_name(&remote);
        let (stem, ext) = match name.rfind('.') {
            Some(i) if i > 0 => (&name[..i], &name[i..]),
            _ => (name, ""),
        };
        let tmp = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .suffix(ext)
            .tempfile()?;

        let local = tmp.path().to_path_buf();
        self.pool
            .with_primary(move |ep| async move { ep.get_file(&remote, &local).await }.boxed())
            .await?;
        Ok(AttachmentFile::Downloaded(tmp))
    }

    /// Download `style` from the primary server into `local`.
    pub async fn copy_to_local_file(&self, style: &str, local: &Path) -> StorageResult<()> {
        let remote = self.path(style);
        let local = local.to_path_buf();
        self.pool
            .with_primary(move |ep| async move { ep.get_file(&remote, &local).await }.boxed())
            .await
    }

    // ─── Flush ───────────────────────────────────────────────────

    pub async fn flush_writes(&mut self) -> StorageResult<ReplicationReport> {
        replicate::flush_writes(
            &self.pool,
            &mut self.queued_for_write,
            self.resolver.as_ref(),
            self.hooks.as_ref(),
        )
        .await
    }

    pub async fn flush_deletes(&mut self) -> StorageResult<ReplicationReport> {
        replicate::flush_deletes(&self.pool, &mut self.queued_for_delete, self.keep_empty_directories).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::ConnectPolicy;
    use crate::storage::endpoint::EndpointConfig;
    use crate::storage::pool::EndpointFn;
    use crate::storage::testing::{FakeNetwork, FakeOp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn storage(net: &FakeNetwork, hosts: &[&str]) -> FtpStorage {
        let configs: Vec<EndpointConfig> = hosts
            .iter()
            .map(|h| EndpointConfig::new(*h, "user", "secret"))
            .collect();
        let pool = EndpointPool::new(configs, ConnectPolicy::default());
        FtpStorage::from_pool(pool, |style: &str| format!("/users/1/{}/avatar.jpg", style), false)
            .with_connector(net.connector())
    }

    fn network(hosts: &[&str]) -> FakeNetwork {
        let net = FakeNetwork::new();
        for h in hosts {
            net.add(h);
        }
        net
    }

    #[tokio::test]
    async fn test_exists_is_false_without_original() {
        let net = network(&["ftp1"]);
        net.seed_file("ftp1", "/users/1/original/avatar.jpg", b"x");
        let store = storage(&net, &["ftp1"]);

        assert!(!store.exists("original").await.unwrap());
        assert!(net.ops("ftp1").is_empty());
    }

    #[tokio::test]
    async fn test_exists_asks_the_primary_server() {
        let net = network(&["ftp1", "ftp2"]);
        net.seed_file("ftp1", "/users/1/original/avatar.jpg", b"x");
        let mut store = storage(&net, &["ftp1", "ftp2"]);
        store.set_has_original(true);

        assert!(store.exists("original").await.unwrap());
        assert!(!store.exists("thumb").await.unwrap());
        assert!(net.ops("ftp2").is_empty());
        assert_eq!(net.count("ftp1", |op| matches!(op, FakeOp::Quit)), 2);
    }

    #[tokio::test]
    async fn test_to_file_downloads_into_temp_file() {
        let net = network(&["ftp1"]);
        net.seed_file("ftp1", "/users/1/thumb/avatar.jpg", b"thumb bytes");
        let store = storage(&net, &["ftp1"]);

        let file = store.to_file("thumb").await.unwrap();
        assert!(matches!(file, AttachmentFile::Downloaded(_)));
        assert_eq!(std::fs::read(file.path()).unwrap(), b"thumb bytes");
        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("avatar-"));
        assert!(name.ends_with(".jpg"));

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_to_file_prefers_the_write_queue() {
        let net = network(&["ftp1"]);
        let mut store = storage(&net, &["ftp1"]);
        store.queue_write("original", "/tmp/upload.jpg");

        let file = store.to_file("original").await.unwrap();
        assert_eq!(file.path(), Path::new("/tmp/upload.jpg"));
        assert!(net.ops("ftp1").is_empty());
    }

    #[tokio::test]
    async fn test_copy_to_local_file() {
        let net = network(&["ftp1"]);
        net.seed_file("ftp1", "/users/1/original/avatar.jpg", b"original");
        let store = storage(&net, &["ftp1"]);
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("copy.jpg");

        store.copy_to_local_file("original", &local).await.unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_flush_writes_then_deletes() {
        let net = network(&["ftp1", "ftp2"]);
        let hook_calls = Arc::new(AtomicUsize::new(0));

        struct Counter(Arc<AtomicUsize>);
        impl FlushHooks for Counter {
            fn after_flush_writes(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut store = storage(&net, &["ftp1", "ftp2"]).with_hooks(Counter(Arc::clone(&hook_calls)));
        let original = net.local_file(b"o");
        let thumb = net.local_file(b"t");
        store.queue_write("original", original.path());
        store.queue_write("thumb", thumb.path());
        assert!(store.has_original());

        let report = store.flush_writes().await.unwrap();
        assert!(report.is_complete());
        assert!(store.queued_for_write().is_empty());
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        for host in ["ftp1", "ftp2"] {
            assert_eq!(net.file(host, "/users/1/thumb/avatar.jpg").unwrap(), b"t");
        }

        store.queue_delete_styles(["original", "thumb"]);
        assert_eq!(store.queued_for_delete().len(), 2);
        store.flush_deletes().await.unwrap();
        assert!(store.queued_for_delete().is_empty());
        for host in ["ftp1", "ftp2"] {
            assert!(!net.has_dir(host, "/users"));
        }
    }

    #[tokio::test]
    async fn test_storage_over_closure_source() {
        let net = network(&["ftp1"]);
        net.seed_file("ftp1", "/users/1/original/avatar.jpg", b"x");
        let source = EndpointFn(|| vec![EndpointConfig::new("ftp1", "user", "secret")]);
        let pool = EndpointPool::new(source, ConnectPolicy::default()).with_connector(net.connector());
        let mut store = FtpStorage::from_pool(pool, |s: &str| format!("/users/1/{}/avatar.jpg", s), true);
        store.set_has_original(true);

        assert!(store.exists("original").await.unwrap());
    }
}
