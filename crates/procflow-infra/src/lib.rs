//! Infrastructure layer for procflow.
//!
//! Implements the ports defined in `procflow-core`: SQLite definition
//! storage, an outbound HTTP client, plus config file and data directory
//! handling.

pub mod config;
pub mod filesystem;
pub mod http;
pub mod sqlite;
