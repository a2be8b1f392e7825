//! Business logic services (use cases).
//!
//! Services orchestrate store calls and graph rules. They depend on traits
//! (ports), never on concrete infrastructure.

pub mod definition;
