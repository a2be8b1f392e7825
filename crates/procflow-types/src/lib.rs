//! Shared domain types for procflow.
//!
//! Graph definitions, nodes, run records, engine configuration and the
//! error types shared between the core and infrastructure crates.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod graph;
pub mod run;
