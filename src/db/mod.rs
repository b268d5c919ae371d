//! Directory stores the evaluator reads principals, roles and resources from.
//!
//! The evaluator only depends on the repository traits in [`repos`]; the
//! in-memory [`MemoryStore`] is the bundled implementation.

pub mod directory;
mod error;
pub mod memory;
pub mod repos;

use std::sync::Arc;

pub use directory::{DirectoryError, DirectorySnapshot, DirectorySummary};
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use repos::*;

/// Staff id used for health probes; never expected to exist.
const HEALTH_PROBE_STAFF_ID: &str = "__health_check__";

/// Repository trait objects shared by every evaluation.
#[derive(Clone)]
pub struct Stores {
    principals: Arc<dyn PrincipalRepo>,
    roles: Arc<dyn RoleRepo>,
    resources: Arc<dyn ResourceRepo>,
}

impl Stores {
    pub fn new(
        principals: Arc<dyn PrincipalRepo>,
        roles: Arc<dyn RoleRepo>,
        resources: Arc<dyn ResourceRepo>,
    ) -> Self {
        Self {
            principals,
            roles,
            resources,
        }
    }

    /// Serve all three repositories from one in-memory store.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            principals: store.clone(),
            roles: store.clone(),
            resources: store,
        }
    }

    pub fn principals(&self) -> &dyn PrincipalRepo {
        self.principals.as_ref()
    }

    pub fn roles(&self) -> &dyn RoleRepo {
        self.roles.as_ref()
    }

    pub fn resources(&self) -> &dyn ResourceRepo {
        self.resources.as_ref()
    }

    /// Probe the principal store with a lookup that should find nothing.
    pub async fn health_check(&self) -> DbResult<()> {
        self.principals
            .find_by_staff_id(HEALTH_PROBE_STAFF_ID)
            .await
            .map(|_| ())
    }
}
