//! Storage port traits.

pub mod definition;
