//! Scripted in-memory FTP server for tests.
//!
//! Speaks enough RFC 959 for the client: USER/PASS, FEAT, OPTS, TYPE,
//! PASV/EPSV/PORT/EPRT, NLST, STOR, RETR, DELE, MKD, RMD, QUIT.
//! The working directory is always `/`. Every received command is recorded
//! and any verb can be forced to fail with a chosen reply.

use crate::ftp::types::{DataChannelMode, FtpConnectionConfig};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Server-side filesystem and knobs.
#[derive(Debug, Default)]
pub struct MockFs {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    /// Every command line received, across all sessions (PASS masked).
    pub commands: Vec<String>,
    /// NLST answers with full paths instead of bare names.
    pub nlst_full_paths: bool,
    /// Greet new sessions with 421 instead of 220.
    pub refuse_sessions: bool,
    /// Forced replies keyed by upper-case verb.
    pub failures: HashMap<String, (u16, String)>,
}

impl MockFs {
    fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            dirs,
            ..Default::default()
        }
    }

    fn children(&self, dir: &str) -> Vec<String> {
        self.dirs
            .iter()
            .filter(|d| d.as_str() != "/")
            .chain(self.files.keys())
            .filter(|p| parent_of(p) == dir)
            .cloned()
            .collect()
    }

    fn mkdir_p(&mut self, path: &str) {
        let mut current = String::new();
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(seg);
            self.dirs.insert(current.clone());
        }
    }
}

/// Normalise a client-supplied path against the fixed `/` working directory.
pub fn absolute(arg: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in arg.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A running mock server. Aborted on drop.
pub struct MockFtpServer {
    addr: SocketAddr,
    user: String,
    password: String,
    state: Arc<Mutex<MockFs>>,
    handle: JoinHandle<()>,
}

impl MockFtpServer {
    /// Bind on `127.0.0.1:0` and start accepting sessions.
    pub async fn start(user: &str, password: &str) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(MockFs::new()));

        let accept_state = Arc::clone(&state);
        let (u, p) = (user.to_string(), password.to_string());
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let st = Arc::clone(&accept_state);
                let (u, p) = (u.clone(), p.clone());
                tokio::spawn(async move {
                    if let Err(e) = serve_session(stream, st, u, p).await {
                        log::debug!("mock FTP session ended: {}", e);
                    }
                });
            }
        });

        Ok(Self {
            addr,
            user: user.to_string(),
            password: password.to_string(),
            state,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Client configuration pointing at this server.
    pub fn config(&self, mode: DataChannelMode) -> FtpConnectionConfig {
        FtpConnectionConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: self.user.clone(),
            password: self.password.clone(),
            data_channel_mode: mode,
            connect_timeout_sec: Some(5),
            data_timeout_sec: 5,
            ..Default::default()
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockFs> {
        lock(&self.state)
    }

    /// Seed a file, creating its parent directories.
    pub fn put(&self, path: &str, bytes: &[u8]) {
        let path = absolute(path);
        let mut fs = self.state();
        fs.mkdir_p(&parent_of(&path));
        fs.files.insert(path, bytes.to_vec());
    }

    pub fn mkdir_p(&self, path: &str) {
        self.state().mkdir_p(&absolute(path));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(&absolute(path)).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state().dirs.contains(&absolute(path))
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Commands whose verb equals `verb`.
    pub fn commands_for(&self, verb: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.split(' ').next().map(|v| v.eq_ignore_ascii_case(verb)) == Some(true))
            .collect()
    }

    pub fn fail(&self, verb: &str, code: u16, text: &str) {
        self.state()
            .failures
            .insert(verb.to_ascii_uppercase(), (code, text.to_string()));
    }
}

impl Drop for MockFtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn lock(state: &Arc<Mutex<MockFs>>) -> MutexGuard<'_, MockFs> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

async fn reply(wr: &mut OwnedWriteHalf, code: u16, text: &str) -> io::Result<()> {
    wr.write_all(format!("{} {}\r\n", code, text).as_bytes()).await
}

#[derive(Default)]
struct Session {
    user: Option<String>,
    logged_in: bool,
    passive: Option<TcpListener>,
    active: Option<SocketAddr>,
}

impl Session {
    async fn open_data(&mut self) -> io::Result<TcpStream> {
        if let Some(listener) = self.passive.take() {
            let (s, _) = listener.accept().await?;
            return Ok(s);
        }
        if let Some(addr) = self.active.take() {
            return TcpStream::connect(addr).await;
        }
        Err(io::Error::new(io::ErrorKind::NotConnected, "no data channel"))
    }
}

fn parse_port_arg(arg: &str) -> Option<SocketAddr> {
    let n: Vec<u16> = arg.split(',').filter_map(|x| x.trim().parse().ok()).collect();
    if n.len() != 6 {
        return None;
    }
    let ip = format!("{}.{}.{}.{}", n[0], n[1], n[2], n[3]);
    format!("{}:{}", ip, n[4] * 256 + n[5]).parse().ok()
}

fn parse_eprt_arg(arg: &str) -> Option<SocketAddr> {
    let parts: Vec<&str> = arg.split('|').collect();
    // ["", af, ip, port, ""]
    if parts.len() < 5 {
        return None;
    }
    let ip: std::net::IpAddr = parts[2].parse().ok()?;
    let port: u16 = parts[3].parse().ok()?;
    Some(SocketAddr::new(ip, port))
}

async fn serve_session(
    stream: TcpStream,
    state: Arc<Mutex<MockFs>>,
    user: String,
    password: String,
) -> io::Result<()> {
    let (rd, mut wr) = stream.into_split();
    let mut rd = BufReader::new(rd);

    let refuse = lock(&state).refuse_sessions;
    if refuse {
        reply(&mut wr, 421, "Too many connections").await?;
        return Ok(());
    }
    reply(&mut wr, 220, "mock FTP ready").await?;

    let mut session = Session::default();
    let mut line = String::new();
    loop {
        line.clear();
        if rd.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let cmd = line.trim_end_matches(|c| c == '\r' || c == '\n').to_string();
        let (verb, arg) = match cmd.split_once(' ') {
            Some((v, a)) => (v.to_ascii_uppercase(), a.to_string()),
            None => (cmd.to_ascii_uppercase(), String::new()),
        };

        let forced = {
            let mut fs = lock(&state);
            let recorded = if verb == "PASS" { "PASS ****".to_string() } else { cmd.clone() };
            fs.commands.push(recorded);
            fs.failures.get(&verb).cloned()
        };
        if let Some((code, text)) = forced {
            reply(&mut wr, code, &text).await?;
            continue;
        }

        let authed_only = !matches!(verb.as_str(), "USER" | "PASS" | "QUIT" | "FEAT");
        if authed_only && !session.logged_in {
            reply(&mut wr, 530, "Please login with USER and PASS").await?;
            continue;
        }

        match verb.as_str() {
            "USER" => {
                session.user = Some(arg);
                reply(&mut wr, 331, "Please specify the password").await?;
            }
            "PASS" => {
                if session.user.as_deref() == Some(user.as_str()) && arg == password {
                    session.logged_in = true;
                    reply(&mut wr, 230, "Login successful").await?;
                } else {
                    reply(&mut wr, 530, "Login incorrect").await?;
                }
            }
            "FEAT" => {
                wr.write_all(b"211-Features:\r\n EPSV\r\n EPRT\r\n SIZE\r\n UTF8\r\n211 End\r\n")
                    .await?;
            }
            "OPTS" | "TYPE" => reply(&mut wr, 200, "OK").await?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                session.passive = Some(listener);
                session.active = None;
                let text = format!("Entering Passive Mode (127,0,0,1,{},{})", port / 256, port % 256);
                reply(&mut wr, 227, &text).await?;
            }
            "EPSV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                session.passive = Some(listener);
                session.active = None;
                reply(&mut wr, 229, &format!("Entering Extended Passive Mode (|||{}|)", port)).await?;
            }
            "PORT" | "EPRT" => {
                let addr = if verb == "PORT" { parse_port_arg(&arg) } else { parse_eprt_arg(&arg) };
                match addr {
                    Some(a) => {
                        session.active = Some(a);
                        session.passive = None;
                        reply(&mut wr, 200, "Command okay").await?;
                    }
                    None => reply(&mut wr, 501, "Illegal PORT command").await?,
                }
            }
            "NLST" => {
                let dir = if arg.is_empty() { "/".to_string() } else { absolute(&arg) };
                let names = {
                    let fs = lock(&state);
                    if !fs.dirs.contains(&dir) {
                        None
                    } else {
                        let full = fs.nlst_full_paths;
                        Some(
                            fs.children(&dir)
                                .into_iter()
                                .map(|p| if full { p } else { basename(&p).to_string() })
                                .collect::<Vec<_>>(),
                        )
                    }
                };
                match names {
                    None => reply(&mut wr, 450, "No such directory").await?,
                    Some(names) => {
                        reply(&mut wr, 150, "Here comes the directory listing").await?;
                        let mut data = session.open_data().await?;
                        for n in names {
                            data.write_all(format!("{}\r\n", n).as_bytes()).await?;
                        }
                        data.shutdown().await?;
                        reply(&mut wr, 226, "Directory send OK").await?;
                    }
                }
            }
            "STOR" => {
                let path = absolute(&arg);
                let parent_ok = lock(&state).dirs.contains(&parent_of(&path));
                if !parent_ok {
                    reply(&mut wr, 553, "Could not create file").await?;
                    continue;
                }
                reply(&mut wr, 150, "Ok to send data").await?;
                let mut data = session.open_data().await?;
                let mut buf = Vec::new();
                data.read_to_end(&mut buf).await?;
                lock(&state).files.insert(path, buf);
                reply(&mut wr, 226, "Transfer complete").await?;
            }
            "RETR" => {
                let path = absolute(&arg);
                let content = lock(&state).files.get(&path).cloned();
                match content {
                    None => reply(&mut wr, 550, "Failed to open file: No such file").await?,
                    Some(bytes) => {
                        reply(&mut wr, 150, "Opening BINARY mode data connection").await?;
                        let mut data = session.open_data().await?;
                        data.write_all(&bytes).await?;
                        data.shutdown().await?;
                        reply(&mut wr, 226, "Transfer complete").await?;
                    }
                }
            }
            "DELE" => {
                let path = absolute(&arg);
                let removed = lock(&state).files.remove(&path).is_some();
                if removed {
                    reply(&mut wr, 250, "Delete operation successful").await?;
                } else {
                    reply(&mut wr, 550, "No such file or directory").await?;
                }
            }
            "MKD" => {
                let path = absolute(&arg);
                let outcome = {
                    let mut fs = lock(&state);
                    if path == "/" || fs.dirs.contains(&path) || fs.files.contains_key(&path) {
                        Err("Create directory operation failed")
                    } else if !fs.dirs.contains(&parent_of(&path)) {
                        Err("No such file or directory")
                    } else {
                        fs.dirs.insert(path.clone());
                        Ok(())
                    }
                };
                match outcome {
                    Ok(()) => reply(&mut wr, 257, &format!("\"{}\" created", path)).await?,
                    Err(text) => reply(&mut wr, 550, text).await?,
                }
            }
            "RMD" => {
                let path = absolute(&arg);
                let outcome = {
                    let mut fs = lock(&state);
                    if path == "/" {
                        Err("Permission denied")
                    } else if !fs.dirs.contains(&path) {
                        Err("No such file or directory")
                    } else if !fs.children(&path).is_empty() {
                        Err("Directory not empty")
                    } else {
                        fs.dirs.remove(&path);
                        Ok(())
                    }
                };
                match outcome {
                    Ok(()) => reply(&mut wr, 250, "Remove directory operation successful").await?,
                    Err(text) => reply(&mut wr, 550, text).await?,
                }
            }
            "QUIT" => {
                reply(&mut wr, 221, "Goodbye").await?;
                return Ok(());
            }
            _ => reply(&mut wr, 502, "Command not implemented").await?,
        }
    }
}
