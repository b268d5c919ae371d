//! Authorization errors.

use std::time::Duration;

use thiserror::Error;

use crate::db::DbError;

/// Failure to reach a decision.
///
/// A denied request is never an error; these variants mean the answer is
/// unknown and callers must not treat them as a denial.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Directory lookup failed: {0}")]
    Store(#[from] DbError),

    #[error("Permission evaluation timed out after {0:?}")]
    Timeout(Duration),
}
