//! In-memory directory store backed by `DashMap`.
//!
//! Suitable for single-node deployments seeded from a snapshot file and for
//! tests. Updates through the `upsert_*` methods are visible to the very next
//! evaluation.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    directory::{DirectoryError, DirectorySnapshot},
    error::DbResult,
    repos::{PrincipalRepo, ResourceRepo, RoleRepo},
};
use crate::models::{Principal, Resource, Role};

#[derive(Debug, Default)]
pub struct MemoryStore {
    principals: DashMap<String, Principal>,
    roles: DashMap<String, Role>,
    resources: DashMap<String, Resource>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Result<Self, DirectoryError> {
        snapshot.validate()?;

        let store = Self::new();
        for principal in snapshot.principals {
            store.upsert_principal(principal);
        }
        for role in snapshot.roles {
            store.upsert_role(role);
        }
        for resource in snapshot.resources {
            store.upsert_resource(resource);
        }
        Ok(store)
    }

    /// Insert or replace a principal, returning the previous value.
    pub fn upsert_principal(&self, principal: Principal) -> Option<Principal> {
        self.principals.insert(principal.staff_id.clone(), principal)
    }

    pub fn upsert_role(&self, role: Role) -> Option<Role> {
        self.roles.insert(role.id.clone(), role)
    }

    pub fn upsert_resource(&self, resource: Resource) -> Option<Resource> {
        self.resources.insert(resource.id.clone(), resource)
    }

    pub fn principal_count(&self) -> usize {
        self.principals.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

/// Yield each id once, keeping first-seen order.
fn unique_ids(ids: &[String]) -> impl Iterator<Item = &String> {
    let mut seen = HashSet::new();
    ids.iter().filter(move |id| seen.insert(id.as_str()))
}

#[async_trait]
impl PrincipalRepo for MemoryStore {
    async fn find_by_staff_id(&self, staff_id: &str) -> DbResult<Option<Principal>> {
        Ok(self.principals.get(staff_id).map(|p| p.value().clone()))
    }
}

#[async_trait]
impl RoleRepo for MemoryStore {
    async fn find_active_by_ids(&self, ids: &[String]) -> DbResult<Vec<Role>> {
        Ok(unique_ids(ids)
            .filter_map(|id| self.roles.get(id))
            .filter(|role| role.active)
            .map(|role| role.value().clone())
            .collect())
    }
}

#[async_trait]
impl ResourceRepo for MemoryStore {
    async fn find_active_api_by_ids(&self, ids: &[String]) -> DbResult<Vec<Resource>> {
        Ok(unique_ids(ids)
            .filter_map(|id| self.resources.get(id))
            .filter(|resource| resource.active && resource.is_api())
            .map(|resource| resource.value().clone())
            .collect())
    }
}
