use async_trait::async_trait;

use crate::{db::error::DbResult, models::Role};

#[async_trait]
pub trait RoleRepo: Send + Sync {
    /// Return the active roles among `ids`.
    ///
    /// Unknown and inactive ids are dropped silently.
    async fn find_active_by_ids(&self, ids: &[String]) -> DbResult<Vec<Role>>;
}
