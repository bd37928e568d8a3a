//! # ftpmirror-client: async FTP client
//!
//! Implementation of the FTP protocol (RFC 959) with the extensions a
//! storage backend needs:
//! - **RFC 2428**: EPSV / EPRT (IPv6-ready)
//! - **RFC 2389**: FEAT negotiation
//!
//! Architecture:
//! - `types`: config, session info, reply and feature structs
//! - `error`: FTP-specific error type with reply-class predicates
//! - `protocol`: low-level command/response codec
//! - `connection`: TCP connect with optional timeout, banner check
//! - `client`: stateful FTP client (login, FEAT, TYPE, NLST, QUIT)
//! - `transfer`: data channel management (PASV/EPSV/PORT/EPRT)
//! - `directory`: mkdir, rmdir, delete
//! - `file_ops`: binary upload and download
//! - `testing`: scripted in-memory server (`test-server` feature)

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod client;
pub mod transfer;
pub mod directory;
pub mod file_ops;
#[cfg(any(test, feature = "test-server"))]
pub mod testing;

pub use client::FtpClient;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use types::*;
