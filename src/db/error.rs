use thiserror::Error;

/// Failures raised by the directory stores.
///
/// These are distinct from "not found": a missing principal is `Ok(None)`,
/// while an unreachable or corrupt store is an error.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DbResult<T> = Result<T, DbError>;
