use async_trait::async_trait;

use crate::{db::error::DbResult, models::Resource};

#[async_trait]
pub trait ResourceRepo: Send + Sync {
    /// Return the active, API-typed resources among `ids`.
    ///
    /// Unknown, inactive and non-API ids are dropped silently.
    async fn find_active_api_by_ids(&self, ids: &[String]) -> DbResult<Vec<Resource>>;
}
