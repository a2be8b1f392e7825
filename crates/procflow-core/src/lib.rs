//! Business logic and port traits for procflow.
//!
//! This crate defines the "ports" (store, HTTP and expression traits) that
//! the infrastructure layer implements. It depends only on `procflow-types`
//! -- never on `procflow-infra` or any database/IO crate.

pub mod execution;
pub mod graph;
pub mod id;
pub mod node;
pub mod repository;
pub mod service;
