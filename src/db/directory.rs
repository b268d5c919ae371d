//! Directory snapshots: the principals, roles and resources a store is seeded with.
//!
//! Snapshots are TOML documents:
//!
//! ```toml
//! [[principals]]
//! staff_id = "P1"
//! groups = ["g1"]
//! role_ids = ["R1"]
//!
//! [[roles]]
//! id = "R1"
//! resource_ids = ["X1"]
//!
//! [[resources]]
//! id = "X1"
//! type = "api"
//! groups = ["g1"]
//! rules = [{ method = "GET", path = "/orders/*" }, { code = "orders:export" }]
//! ```
//!
//! `active` defaults to `true` for every entity.

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Principal, Resource, Role};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read directory file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse directory: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate {kind} id `{id}`")]
    Duplicate { kind: &'static str, id: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub principals: Vec<Principal>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Entity counts reported after loading a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub principals: usize,
    pub roles: usize,
    pub resources: usize,
    pub api_resources: usize,
    pub uri_rules: usize,
    /// Rules without a method/path pair; ignored by evaluation.
    pub inert_rules: usize,
}

impl DirectorySnapshot {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DirectoryError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, DirectoryError> {
        let snapshot: DirectorySnapshot = toml::from_str(contents)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reject duplicate ids, which would otherwise silently shadow each other.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        check_unique("principal", self.principals.iter().map(|p| p.staff_id.as_str()))?;
        check_unique("role", self.roles.iter().map(|r| r.id.as_str()))?;
        check_unique("resource", self.resources.iter().map(|r| r.id.as_str()))?;
        Ok(())
    }

    pub fn summary(&self) -> DirectorySummary {
        let (uri_rules, inert_rules) = self
            .resources
            .iter()
            .flat_map(|r| r.rules.iter())
            .fold((0, 0), |(uri, inert), rule| {
                if rule.is_uri() {
                    (uri + 1, inert)
                } else {
                    (uri, inert + 1)
                }
            });

        DirectorySummary {
            principals: self.principals.len(),
            roles: self.roles.len(),
            resources: self.resources.len(),
            api_resources: self.resources.iter().filter(|r| r.is_api()).count(),
            uri_rules,
            inert_rules,
        }
    }
}

fn check_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), DirectoryError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DirectoryError::Duplicate {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
