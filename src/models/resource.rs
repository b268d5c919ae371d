use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Declared kind of a protected resource.
///
/// Only [`ResourceType::Api`] resources carry URI/method rules that take part
/// in request authorization. Page and button resources drive UI visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[serde(alias = "API")]
    Api,
    #[serde(alias = "PAGE")]
    Page,
    #[serde(alias = "BUTTON")]
    Button,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Page => "page",
            Self::Button => "button",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "page" => Ok(Self::Page),
            "button" => Ok(Self::Button),
            _ => Err(format!("Invalid resource type: {}", s)),
        }
    }
}

/// A single permission rule attached to a resource.
///
/// Rules arrive as loosely-typed records. A record carrying both a string
/// `method` and a string `path` is a URI rule; its other keys are kept in
/// `extra` and written back on serialization. Anything else (for example a
/// record holding only an opaque `code`) is kept verbatim and never matches
/// a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRule {
    Uri {
        method: String,
        path: String,
        #[serde(flatten)]
        extra: Map<String, JsonValue>,
    },
    Opaque(Map<String, JsonValue>),
}

impl PermissionRule {
    pub fn uri(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Uri {
            method: method.into(),
            path: path.into(),
            extra: Map::new(),
        }
    }

    pub fn is_uri(&self) -> bool {
        matches!(self, Self::Uri { .. })
    }
}

/// A protected object that grants access to the groups it lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Groups eligible to use this resource
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            id: id.into(),
            resource_type,
            groups: BTreeSet::new(),
            rules: Vec::new(),
            active: true,
        }
    }

    pub fn api(id: impl Into<String>) -> Self {
        Self::new(id, ResourceType::Api)
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rule(mut self, rule: PermissionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this resource takes part in URI/method authorization at all.
    pub fn is_api(&self) -> bool {
        self.resource_type == ResourceType::Api
    }
}

fn default_true() -> bool {
    true
}
