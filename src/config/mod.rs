//! Configuration for the permission service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [directory]
//! seed_file = "directory.toml"
//!
//! [authz]
//! staff_id_header = "x-staff-id"
//! lookup_timeout_ms = 2000
//! exempt_paths = ["/health/**"]
//!
//! [observability.logging]
//! format = "json"
//! filter = "audit=info,tower_http=warn"
//! ```

mod authz;
mod directory;
mod observability;
mod server;

use std::{path::Path, sync::LazyLock};

pub use authz::*;
pub use directory::*;
pub use observability::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use server::*;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Root configuration.
///
/// Every section is optional; an empty file yields a service listening on
/// port 8080 with an empty directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory seed configuration.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Authorization behaviour: identity header, timeouts, exemptions, audit.
    #[serde(default)]
    pub authz: AuthzConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error. A relative `directory.seed_file` is
    /// resolved against the directory containing the config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e, path.to_path_buf()))?;

        let mut config = Self::from_str(&contents)?;
        if let Some(base) = path.parent() {
            config.directory.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: WardenConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.body_limit_bytes must be greater than zero".into(),
            ));
        }

        self.authz.validate()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_RE.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WardenConfig::from_str("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.authz.staff_id_header, "x-staff-id");
        assert_eq!(
            config.authz.lookup_timeout(),
            Some(Duration::from_millis(2000))
        );
        assert!(config.authz.exempt_paths.is_empty());
        assert!(config.authz.audit.enabled);
        assert!(!config.authz.audit.include_allowed);
        assert!(config.directory.seed_file.is_none());
        assert_eq!(config.observability.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_full_config() {
        let config = WardenConfig::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            body_limit_bytes = 4096

            [directory]
            seed_file = "/etc/warden/directory.toml"

            [authz]
            staff_id_header = "x-employee"
            lookup_timeout_ms = 0
            exempt_paths = ["/health/**", "/metrics"]

            [authz.audit]
            enabled = true
            include_allowed = true

            [observability.logging]
            level = "debug"
            format = "json"
            timestamps = false
            filter = "audit=info"
        "#,
        )
        .unwrap();

        assert_eq!(config.server.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.body_limit_bytes, 4096);
        assert_eq!(config.authz.lookup_timeout(), None);
        let exempt = config.authz.exempt_patterns();
        assert!(exempt.iter().any(|p| p.matches("/health/live")));
        assert!(exempt.iter().any(|p| p.matches("/metrics")));
        assert!(!exempt.iter().any(|p| p.matches("/orders/1")));
        assert!(config.authz.audit.include_allowed);
        assert_eq!(config.observability.logging.level, LogLevel::Debug);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
        assert!(!config.observability.logging.timestamps);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = WardenConfig::from_str("[authz]\nstaff_header = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let err = WardenConfig::from_str("[authz]\nstaff_id_header = \"bad header\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("staff_id_header")));
    }

    #[test]
    fn test_relative_exempt_path_rejected() {
        let err = WardenConfig::from_str("[authz]\nexempt_paths = [\"health\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("health")));
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let err = WardenConfig::from_str("[server]\nbody_limit_bytes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_from_file_resolves_relative_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[directory]\nseed_file = \"seed.toml\"").unwrap();

        let config = WardenConfig::from_file(&path).unwrap();
        assert_eq!(config.directory.seed_file, Some(dir.path().join("seed.toml")));
    }

    #[test]
    fn test_from_file_missing() {
        let err = WardenConfig::from_file("/nonexistent/warden.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("WARDEN_TEST_HEADER", Some("x-user"), || {
            let config =
                WardenConfig::from_str("[authz]\nstaff_id_header = \"${WARDEN_TEST_HEADER}\"")
                    .unwrap();
            assert_eq!(config.authz.staff_id_header, "x-user");
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("WARDEN_TEST_MISSING", || {
            let err = expand_env_vars("port = ${WARDEN_TEST_MISSING}").unwrap_err();
            assert!(matches!(
                err,
                ConfigError::EnvVarNotFound(name) if name == "WARDEN_TEST_MISSING"
            ));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# seed_file = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# seed_file = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_env_var_before_comment_expanded() {
        temp_env::with_var("TEST_BEFORE_COMMENT", Some("expanded"), || {
            let result =
                expand_env_vars("key = \"${TEST_BEFORE_COMMENT}\" # comment here").unwrap();
            assert_eq!(result, "key = \"expanded\" # comment here");
        });
    }

    #[test]
    fn test_seed_loading() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.toml");
        std::fs::write(
            &seed,
            "[[principals]]\nstaff_id = \"P1\"\n\n[[roles]]\nid = \"R1\"\n",
        )
        .unwrap();

        let config = DirectoryConfig {
            seed_file: Some(seed),
        };
        let snapshot = config.load_snapshot().unwrap();
        assert_eq!(snapshot.principals.len(), 1);
        assert_eq!(snapshot.roles.len(), 1);

        let empty = DirectoryConfig::default().load_snapshot().unwrap();
        assert!(empty.principals.is_empty());
    }
}
