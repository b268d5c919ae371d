use std::time::Duration;

use http::HeaderName;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::authz::PathPattern;

/// Authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    /// Request header carrying the caller's staff id.
    #[serde(default = "default_staff_id_header")]
    pub staff_id_header: String,

    /// Upper bound on a single evaluation, in milliseconds.
    /// Set to 0 to disable the bound.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// Path patterns the enforcement middleware lets through unchecked
    /// (e.g. `/health/**`).
    #[serde(default)]
    pub exempt_paths: Vec<String>,

    /// Decision audit logging.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            staff_id_header: default_staff_id_header(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            exempt_paths: Vec::new(),
            audit: AuditConfig::default(),
        }
    }
}

impl AuthzConfig {
    pub fn lookup_timeout(&self) -> Option<Duration> {
        (self.lookup_timeout_ms > 0).then(|| Duration::from_millis(self.lookup_timeout_ms))
    }

    /// The staff id header as a typed header name.
    pub fn staff_id_header_name(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::try_from(self.staff_id_header.as_str()).map_err(|e| {
            ConfigError::Validation(format!(
                "authz.staff_id_header '{}' is not a valid header name: {e}",
                self.staff_id_header
            ))
        })
    }

    /// `exempt_paths` tokenized once for per-request matching.
    pub fn exempt_patterns(&self) -> Vec<PathPattern> {
        self.exempt_paths
            .iter()
            .map(|pattern| PathPattern::parse(pattern))
            .collect()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.staff_id_header_name()?;

        if let Some(bad) = self
            .exempt_paths
            .iter()
            .find(|pattern| !pattern.starts_with('/'))
        {
            return Err(ConfigError::Validation(format!(
                "authz.exempt_paths entry '{bad}' must start with '/'"
            )));
        }

        Ok(())
    }
}

/// Audit log configuration.
///
/// Records are emitted on the `audit` tracing target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also record allowed decisions. Denials and failures are always recorded.
    #[serde(default)]
    pub include_allowed: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_allowed: false,
        }
    }
}

fn default_staff_id_header() -> String {
    "x-staff-id".to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
