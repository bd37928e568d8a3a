use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

/// Mirror files across several FTP servers
#[derive(Parser, Debug)]
#[command(name = "ftpmirror")]
#[command(version, about)]
pub struct Cli {
    /// Storage configuration (TOML)
    #[arg(short = 'c', long = "config", global = true, default_value = "ftpmirror.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files to every server
    Put {
        /// Transfers as LOCAL=REMOTE
        #[arg(required = true, value_parser = parse_transfer)]
        files: Vec<Transfer>,
    },

    /// Delete remote files from every server
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Leave emptied directories in place
        #[arg(long)]
        keep_dirs: bool,
    },

    /// Download a remote file from the primary server
    Get {
        remote: String,
        local: PathBuf,
    },

    /// Check whether a remote file exists on the primary server
    Exists { remote: String },

    /// List configured servers and whether they accept a session
    Servers,
}

/// One `LOCAL=REMOTE` upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub local: PathBuf,
    pub remote: String,
}

/// Parse `LOCAL=REMOTE`. The remote side must be absolute.
pub fn parse_transfer(arg: &str) -> Result<Transfer> {
    let (local, remote) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected LOCAL=REMOTE, got '{}'", arg))?;
    if local.is_empty() {
        return Err(anyhow!("missing local path in '{}'", arg));
    }
    if !remote.starts_with('/') || remote.len() < 2 {
        return Err(anyhow!("remote path must be absolute: '{}'", remote));
    }
    Ok(Transfer {
        local: PathBuf::from(local),
        remote: remote.to_string(),
    })
}
