//! # ftpmirror-storage: replicated file storage over FTP
//!
//! Stores the files of an attachment (one local file per *style*) on every
//! configured FTP server and keeps the remote directory trees in shape.
//!
//! Architecture:
//! - `config`: TOML storage configuration and connect policy
//! - `error`: `StorageError` and its per-endpoint attribution
//! - `transport`: `Transport` / `Connector` seam, FTP-backed implementation
//! - `path`: remote path helpers (parent, basename, ancestor chain)
//! - `endpoint`: one server: connect/login, exists, get/put/delete, mkdir -p, rmdir walk
//! - `tree`: directory tree derived from a batch, breadth-first reconciliation
//! - `pool`: primary / all-reachable selection with scoped connections
//! - `batch`: write and delete queues
//! - `hooks`: path resolver and flush callbacks supplied by the caller
//! - `replicate`: concurrent fan-out of a batch to every reachable server
//! - `attachment`: `FtpStorage`, the per-attachment facade

pub mod attachment;
pub mod batch;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod path;
pub mod pool;
pub mod replicate;
pub mod transport;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use attachment::{AttachmentFile, FtpStorage};
pub use batch::{DeleteBatch, LocalFile, WriteBatch};
pub use config::{ConnectPolicy, ServerConfig, StorageConfig};
pub use endpoint::{Endpoint, EndpointConfig, EndpointLabel};
pub use error::{StorageError, StorageResult};
pub use hooks::{FlushHooks, NoHooks, PathResolver};
pub use pool::{EndpointFn, EndpointPool, EndpointSource};
pub use replicate::{EndpointOutcome, ReplicationReport};
pub use transport::{Connector, FtpConnector, FtpTransport, Transport};
pub use tree::DirectoryTree;
