use serde::{Deserialize, Serialize};

/// A named bundle of resource identifiers assigned to principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// Inactive roles are invisible to evaluation.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_ids: Vec::new(),
            active: true,
        }
    }

    pub fn with_resource_ids<I, S>(mut self, resource_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_ids = resource_ids.into_iter().map(Into::into).collect();
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
