use clap::Parser;
use ftpmirror::cli::Cli;
use ftpmirror_client::testing::MockFtpServer;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

async fn start_server() -> MockFtpServer {
    MockFtpServer::start("user1", "password1").await.unwrap()
}

fn write_config(dir: &TempDir, ports: &[u16]) -> PathBuf {
    let mut text = String::from("connect_timeout_sec = 5\n\n");
    for port in ports {
        text.push_str(&format!(
            "[[servers]]\nhost = \"127.0.0.1\"\nport = {}\nuser = \"user1\"\npassword = \"password1\"\npassive = true\n\n",
            port
        ));
    }
    let path = dir.path().join("ftpmirror.toml");
    std::fs::write(&path, text).unwrap();
    path
}

async fn run(config: &Path, args: &[&str]) -> anyhow::Result<String> {
    let mut argv = vec!["ftpmirror", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    ftpmirror::run(cli, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_put_get_exists_rm() {
    let ftp1 = start_server().await;
    let ftp2 = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &[ftp1.addr().port(), ftp2.addr().port()]);

    let local = dir.path().join("photo.jpg");
    std::fs::write(&local, b"jpeg").unwrap();
    let transfer = format!("{}=/files/original/photo.jpg", local.display());

    let out = run(&config, &["put", &transfer]).await.unwrap();
    assert_eq!(out.lines().count(), 2);
    assert!(out.lines().all(|l| l.ends_with("stored 1 file(s)")));
    assert_eq!(ftp2.file("/files/original/photo.jpg").unwrap(), b"jpeg");

    let out = run(&config, &["exists", "/files/original/photo.jpg"]).await.unwrap();
    assert_eq!(out.trim(), "true");
    let out = run(&config, &["exists", "/files/thumb/photo.jpg"]).await.unwrap();
    assert_eq!(out.trim(), "false");

    let copy = dir.path().join("copy.jpg");
    run(&config, &["get", "/files/original/photo.jpg", copy.to_str().unwrap()])
        .await
        .unwrap();
    assert_eq!(std::fs::read(&copy).unwrap(), b"jpeg");

    run(&config, &["rm", "/files/original/photo.jpg"]).await.unwrap();
    for server in [&ftp1, &ftp2] {
        assert!(server.file("/files/original/photo.jpg").is_none());
        assert!(!server.has_dir("/files"));
    }
}

#[tokio::test]
async fn test_rm_keep_dirs() {
    let ftp1 = start_server().await;
    ftp1.put("/files/original/photo.jpg", b"jpeg");
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &[ftp1.addr().port()]);

    run(&config, &["rm", "--keep-dirs", "/files/original/photo.jpg"])
        .await
        .unwrap();
    assert!(ftp1.has_dir("/files/original"));
}

#[tokio::test]
async fn test_servers_reports_reachability() {
    let ftp1 = start_server().await;
    let dead = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &[ftp1.addr().port(), dead]);

    let out = run(&config, &["servers"]).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], format!("user1@127.0.0.1:{}\tok", ftp1.addr().port()));
    assert!(lines[1].contains("unreachable"));
}

#[tokio::test]
async fn test_put_rejects_missing_local_file() {
    let ftp1 = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &[ftp1.addr().port()]);

    let missing = dir.path().join("nope.jpg");
    let transfer = format!("{}=/files/nope.jpg", missing.display());
    assert!(run(&config, &["put", &transfer]).await.is_err());
    assert!(ftp1.commands().is_empty());
}

#[tokio::test]
async fn test_missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(&dir.path().join("absent.toml"), &["servers"]).await.unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}
