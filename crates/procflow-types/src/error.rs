use thiserror::Error;

/// Errors from repository operations (used by trait definitions in procflow-core).
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A graph definition failed structural validation.
///
/// Displays the first problem found; `errors` carries all of them.
#[derive(Debug, Clone, Error)]
#[error("{}", first_message(.errors))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

fn first_message(errors: &[String]) -> &str {
    errors.first().map(String::as_str).unwrap_or("invalid graph definition")
}

impl ValidationError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}
