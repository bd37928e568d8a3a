//! In-memory servers for unit tests. Every transport call is recorded per
//! host so tests can assert on exact call sequences.

use crate::storage::endpoint::EndpointConfig;
use crate::storage::path::parent_dir;
use crate::storage::transport::{Connector, Transport};
use async_trait::async_trait;
use ftpmirror_client::{FtpError, FtpResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeOp {
    Connect,
    Login,
    Nlst(String),
    Get(String),
    Put(String),
    Delete(String),
    Mkdir(String),
    Rmdir(String),
    Quit,
}

#[derive(Default)]
struct FakeServer {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    ops: Vec<FakeOp>,
    down: bool,
    reject_login: bool,
    full_paths: bool,
    failures: HashMap<&'static str, FtpError>,
    panic_on: Option<&'static str>,
}

impl FakeServer {
    fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            dirs,
            ..Default::default()
        }
    }

    fn mkdir_p(&mut self, path: &str) {
        let mut current = String::new();
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(seg);
            self.dirs.insert(current.clone());
        }
    }

    fn children(&self, dir: &str) -> Vec<String> {
        self.dirs
            .iter()
            .filter(|d| d.as_str() != "/")
            .chain(self.files.keys())
            .filter(|p| parent_dir(p) == dir)
            .cloned()
            .collect()
    }
}

fn normalize(path: &str) -> String {
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    format!("/{}", segs.join("/"))
}

/// A set of named in-memory servers, addressed by `EndpointConfig::host`.
#[derive(Clone, Default)]
pub(crate) struct FakeNetwork {
    servers: Arc<Mutex<HashMap<String, FakeServer>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FakeServer>> {
        self.servers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with<T>(&self, host: &str, f: impl FnOnce(&mut FakeServer) -> T) -> T {
        let mut servers = self.lock();
        let srv = servers.get_mut(host).expect("unknown fake host");
        f(srv)
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(FakeConnector { net: self.clone() })
    }

    pub fn add(&self, host: &str) {
        self.lock().insert(host.to_string(), FakeServer::new());
    }

    pub fn set_down(&self, host: &str, down: bool) {
        self.with(host, |s| s.down = down);
    }

    pub fn reject_login(&self, host: &str) {
        self.with(host, |s| s.reject_login = true);
    }

    pub fn set_full_path_listing(&self, host: &str, full: bool) {
        self.with(host, |s| s.full_paths = full);
    }

    /// Every call of `verb` (NLST, RETR, STOR, DELE, MKD, RMD) fails with `err`.
    pub fn fail(&self, host: &str, verb: &'static str, err: FtpError) {
        self.with(host, |s| {
            s.failures.insert(verb, err);
        });
    }

    pub fn panic_on(&self, host: &str, verb: &'static str) {
        self.with(host, |s| s.panic_on = Some(verb));
    }

    pub fn seed_dir(&self, host: &str, path: &str) {
        self.with(host, |s| s.mkdir_p(&normalize(path)));
    }

    pub fn seed_file(&self, host: &str, path: &str, bytes: &[u8]) {
        let path = normalize(path);
        self.with(host, |s| {
            s.mkdir_p(&parent_dir(&path));
            s.files.insert(path, bytes.to_vec());
        });
    }

    pub fn file(&self, host: &str, path: &str) -> Option<Vec<u8>> {
        self.with(host, |s| s.files.get(&normalize(path)).cloned())
    }

    pub fn has_dir(&self, host: &str, path: &str) -> bool {
        self.with(host, |s| s.dirs.contains(&normalize(path)))
    }

    pub fn ops(&self, host: &str) -> Vec<FakeOp> {
        self.with(host, |s| s.ops.clone())
    }

    pub fn count(&self, host: &str, pred: impl Fn(&FakeOp) -> bool) -> usize {
        self.ops(host).iter().filter(|op| pred(op)).count()
    }

    pub fn mkdirs(&self, host: &str) -> Vec<String> {
        self.ops(host)
            .into_iter()
            .filter_map(|op| match op {
                FakeOp::Mkdir(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn rmdirs(&self, host: &str) -> Vec<String> {
        self.ops(host)
            .into_iter()
            .filter_map(|op| match op {
                FakeOp::Rmdir(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// A local temp file holding `bytes`.
    pub fn local_file(&self, bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(bytes).expect("write temp file");
        file
    }
}

struct FakeConnector {
    net: FakeNetwork,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, config: &EndpointConfig) -> FtpResult<Box<dyn Transport>> {
        let mut servers = self.net.lock();
        let srv = servers
            .get_mut(&config.host)
            .ok_or_else(|| FtpError::connection_failed(format!("unknown host {}", config.host)))?;
        srv.ops.push(FakeOp::Connect);
        if srv.down {
            return Err(FtpError::connection_failed("Connection refused"));
        }
        Ok(Box::new(FakeTransport {
            net: self.net.clone(),
            host: config.host.clone(),
            open: true,
        }))
    }
}

struct FakeTransport {
    net: FakeNetwork,
    host: String,
    open: bool,
}

impl FakeTransport {
    fn call<T>(
        &self,
        op: FakeOp,
        verb: &'static str,
        f: impl FnOnce(&mut FakeServer) -> FtpResult<T>,
    ) -> FtpResult<T> {
        let mut servers = self.net.lock();
        let srv = servers
            .get_mut(&self.host)
            .ok_or_else(|| FtpError::disconnected("server vanished"))?;
        srv.ops.push(op);
        if srv.panic_on == Some(verb) {
            drop(servers);
            panic!("injected failure on {}", verb);
        }
        if let Some(err) = srv.failures.get(verb) {
            return Err(err.clone());
        }
        f(srv)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn login(&mut self) -> FtpResult<()> {
        self.call(FakeOp::Login, "LOGIN", |s| {
            if s.reject_login {
                Err(FtpError::from_reply(530, "Login incorrect"))
            } else {
                Ok(())
            }
        })
    }

    async fn nlst(&mut self, dir: &str) -> FtpResult<Vec<String>> {
        let norm = normalize(dir);
        self.call(FakeOp::Nlst(dir.to_string()), "NLST", |s| {
            if !s.dirs.contains(&norm) {
                return Err(FtpError::from_reply(450, "No such directory"));
            }
            let full = s.full_paths;
            Ok(s.children(&norm)
                .into_iter()
                .map(|p| if full { p } else { p.rsplit('/').next().unwrap_or("").to_string() })
                .collect())
        })
    }

    async fn get(&mut self, remote: &str, local: &Path) -> FtpResult<u64> {
        let norm = normalize(remote);
        let bytes = self.call(FakeOp::Get(remote.to_string()), "RETR", |s| {
            s.files
                .get(&norm)
                .cloned()
                .ok_or_else(|| FtpError::from_reply(550, "No such file or directory"))
        })?;
        tokio::fs::write(local, &bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64> {
        let bytes = tokio::fs::read(local).await?;
        let norm = normalize(remote);
        self.call(FakeOp::Put(remote.to_string()), "STOR", |s| {
            if !s.dirs.contains(&parent_dir(&norm)) {
                return Err(FtpError::from_reply(553, "Could not create file"));
            }
            let len = bytes.len() as u64;
            s.files.insert(norm, bytes);
            Ok(len)
        })
    }

    async fn delete(&mut self, path: &str) -> FtpResult<()> {
        let norm = normalize(path);
        self.call(FakeOp::Delete(path.to_string()), "DELE", |s| {
            s.files
                .remove(&norm)
                .map(|_| ())
                .ok_or_else(|| FtpError::from_reply(550, "No such file or directory"))
        })
    }

    async fn mkdir(&mut self, path: &str) -> FtpResult<()> {
        let norm = normalize(path);
        self.call(FakeOp::Mkdir(path.to_string()), "MKD", |s| {
            if s.dirs.contains(&norm) || s.files.contains_key(&norm) {
                Err(FtpError::from_reply(550, "Create directory operation failed"))
            } else if !s.dirs.contains(&parent_dir(&norm)) {
                Err(FtpError::from_reply(550, "No such file or directory"))
            } else {
                s.dirs.insert(norm);
                Ok(())
            }
        })
    }

    async fn rmdir(&mut self, path: &str) -> FtpResult<()> {
        let norm = normalize(path);
        self.call(FakeOp::Rmdir(path.to_string()), "RMD", |s| {
            if norm == "/" {
                Err(FtpError::from_reply(550, "Permission denied"))
            } else if !s.dirs.contains(&norm) {
                Err(FtpError::from_reply(550, "No such file or directory"))
            } else if !s.children(&norm).is_empty() {
                Err(FtpError::from_reply(550, "Directory not empty"))
            } else {
                s.dirs.remove(&norm);
                Ok(())
            }
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn quit(&mut self) -> FtpResult<()> {
        self.open = false;
        self.call(FakeOp::Quit, "QUIT", |_| Ok(()))
    }
}
