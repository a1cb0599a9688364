use thiserror::Error;

/// Errors from the persistent store (used by trait definitions in
/// windlass-core and implemented against by windlass-infra).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
