//! # Satchel Sync Server
//!
//! Reference implementation of the remote backup service contract.
//!
//! This crate provides:
//! - Request handlers for the three service operations (store backup,
//!   fetch latest backup, push mutation)
//! - Last-writer-wins backup retention per user
//! - Idempotent mutation ingestion (replays are absorbed)
//! - Optional HMAC-SHA256 token authentication
//!
//! # Architecture
//!
//! The server is transport-agnostic: handlers take and return protocol
//! structs. In a real deployment you would expose HTTP endpoints that
//! call [`BackupServer::handle_put_backup`],
//! [`BackupServer::handle_latest_backup`], and
//! [`BackupServer::handle_push_item`]. Tests drive the handlers
//! directly.
//!
//! # Conflict policy
//!
//! The server keeps exactly one backup per user: the one with the
//! newest client timestamp. This is last-writer-wins - the documented
//! and accepted model; no merging is attempted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod server;

pub use auth::{AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::BackupServer;
