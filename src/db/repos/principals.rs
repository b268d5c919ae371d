use async_trait::async_trait;

use crate::{db::error::DbResult, models::Principal};

#[async_trait]
pub trait PrincipalRepo: Send + Sync {
    /// Look up a principal by staff id. Inactive principals are returned as-is.
    async fn find_by_staff_id(&self, staff_id: &str) -> DbResult<Option<Principal>>;
}
