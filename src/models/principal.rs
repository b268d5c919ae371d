use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The staff member whose access is being evaluated.
///
/// Owned by the identity directory; the evaluator only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique staff identifier
    pub staff_id: String,
    /// Organizational groups the principal belongs to
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Assigned role identifiers, in assignment order
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Principal {
    pub fn new(staff_id: impl Into<String>) -> Self {
        Self {
            staff_id: staff_id.into(),
            groups: BTreeSet::new(),
            role_ids: Vec::new(),
            active: true,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_role_ids<I, S>(mut self, role_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_ids = role_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

fn default_true() -> bool {
    true
}
