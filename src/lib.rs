//! `ftpmirror` command-line front end over the replicated FTP storage.

pub mod cli;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ftpmirror_storage::{Endpoint, FtpConnector, FtpStorage, StorageConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command};

/// Install the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Remote paths are addressed directly, so the style name is the path.
fn identity_path(style: &str) -> String {
    style.to_string()
}

fn load_config(path: &Path) -> Result<StorageConfig> {
    StorageConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Execute one parsed command, writing user-facing output to `out`.
pub async fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    tracing::debug!(servers = config.servers.len(), "loaded storage config");

    match cli.command {
        Command::Put { files } => {
            let mut storage = FtpStorage::new(&config, identity_path);
            for t in &files {
                if !t.local.is_file() {
                    bail!("{} is not a file", t.local.display());
                }
                storage.queue_write(t.remote.as_str(), t.local.as_path());
            }
            let report = storage.flush_writes().await?;
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(()) => writeln!(out, "{}: stored {} file(s)", outcome.endpoint, files.len())?,
                    Err(e) => writeln!(out, "{}: failed: {}", outcome.endpoint, e)?,
                }
            }
            report.into_result()?;
        }

        Command::Rm { paths, keep_dirs } => {
            config.keep_empty_directories |= keep_dirs;
            let mut storage = FtpStorage::new(&config, identity_path);
            for path in paths {
                storage.queue_delete(path);
            }
            let report = storage.flush_deletes().await?;
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(()) => writeln!(out, "{}: deleted", outcome.endpoint)?,
                    Err(e) => writeln!(out, "{}: failed: {}", outcome.endpoint, e)?,
                }
            }
            report.into_result()?;
        }

        Command::Get { remote, local } => {
            let storage = FtpStorage::new(&config, identity_path);
            storage
                .copy_to_local_file(&remote, &local)
                .await
                .with_context(|| format!("downloading {}", remote))?;
            writeln!(out, "{} -> {}", remote, local.display())?;
        }

        Command::Exists { remote } => {
            let mut storage = FtpStorage::new(&config, identity_path);
            storage.set_has_original(true);
            let found = storage.exists(&remote).await?;
            writeln!(out, "{}", found)?;
        }

        Command::Servers => {
            let connector = Arc::new(FtpConnector);
            for mut endpoint_config in config.endpoint_configs() {
                endpoint_config.ignore_connect_errors = false;
                let mut endpoint = Endpoint::new(endpoint_config, connector.clone());
                match endpoint.establish().await {
                    Ok(()) => writeln!(out, "{}\tok", endpoint.label())?,
                    Err(e) => writeln!(out, "{}\tunreachable: {}", endpoint.label(), e)?,
                }
                endpoint.close().await;
            }
        }
    }

    Ok(())
}
