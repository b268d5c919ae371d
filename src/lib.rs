//! Permission evaluation service.
//!
//! Decides whether a staff member may call an HTTP method on a URI path,
//! from the staff member's roles, the resources those roles grant, group
//! membership and hierarchical wildcard path rules.

pub mod api_types;
pub mod authz;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use http::HeaderName;
use thiserror::Error;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    authz::{PathPattern, PermissionEvaluator},
    config::{ConfigError, WardenConfig},
    db::{DirectoryError, MemoryStore, Stores},
};

/// Startup failures.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load directory: {0}")]
    Directory(#[from] DirectoryError),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WardenConfig>,
    pub evaluator: PermissionEvaluator,
    /// Parsed `authz.staff_id_header`
    pub staff_id_header: HeaderName,
    exempt_paths: Arc<[PathPattern]>,
}

impl AppState {
    pub fn new(config: WardenConfig, stores: Stores) -> Result<Self, ConfigError> {
        let staff_id_header = config.authz.staff_id_header_name()?;
        let mut evaluator = PermissionEvaluator::new(stores);
        match config.authz.lookup_timeout() {
            Some(timeout) => evaluator = evaluator.with_lookup_timeout(timeout),
            None => tracing::warn!(
                "authz.lookup_timeout_ms is 0; permission checks will wait on the directory \
                 indefinitely"
            ),
        }
        let exempt_paths = config.authz.exempt_patterns().into();

        Ok(Self {
            config: Arc::new(config),
            evaluator,
            staff_id_header,
            exempt_paths,
        })
    }

    /// Whether the normalized `path` is excluded from enforcement by
    /// `authz.exempt_paths`.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|pattern| pattern.matches(path))
    }

    /// Build the state with an in-memory directory seeded from
    /// `directory.seed_file`.
    pub fn from_config(config: WardenConfig) -> Result<Self, InitError> {
        let store = load_directory(&config)?;
        Ok(Self::new(config, Stores::from_memory(store))?)
    }
}

/// Load the configured seed snapshot into a fresh in-memory store.
pub fn load_directory(config: &WardenConfig) -> Result<Arc<MemoryStore>, DirectoryError> {
    let snapshot = config.directory.load_snapshot()?;
    let summary = snapshot.summary();
    let store = MemoryStore::from_snapshot(snapshot)?;

    tracing::info!(
        seed_file = ?config.directory.seed_file,
        principals = summary.principals,
        roles = summary.roles,
        resources = summary.resources,
        api_resources = summary.api_resources,
        uri_rules = summary.uri_rules,
        inert_rules = summary.inert_rules,
        "Directory loaded"
    );
    if summary.inert_rules > 0 {
        tracing::debug!(
            inert_rules = summary.inert_rules,
            "Rules without method and path are ignored during evaluation"
        );
    }

    Ok(Arc::new(store))
}

/// Build the service router.
pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    let authz_routes = Router::new()
        .route(
            "/api/v1/permissions/check",
            post(routes::permissions::check),
        )
        .route("/api/v1/authorize", get(routes::permissions::authorize))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::audit_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .merge(authz_routes)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_loads_seed() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.toml");
        std::fs::write(
            &seed,
            r#"
            [[principals]]
            staff_id = "P1"
            groups = ["g1"]
            role_ids = ["R1"]

            [[roles]]
            id = "R1"
            resource_ids = ["X1"]

            [[resources]]
            id = "X1"
            type = "api"
            groups = ["g1"]
            rules = [{ method = "GET", path = "/orders/*" }]
            "#,
        )
        .unwrap();
        let config_path = dir.path().join("warden.toml");
        std::fs::write(
            &config_path,
            "[directory]\nseed_file = \"seed.toml\"\n[authz]\nlookup_timeout_ms = 0\n",
        )
        .unwrap();

        let config = WardenConfig::from_file(&config_path).unwrap();
        let state = AppState::from_config(config).unwrap();
        assert_eq!(state.evaluator.lookup_timeout(), None);
        assert_eq!(state.staff_id_header.as_str(), "x-staff-id");
    }

    #[tokio::test]
    async fn test_from_config_evaluates_seed() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.toml");
        std::fs::write(
            &seed,
            "[[principals]]\nstaff_id = \"P1\"\ngroups = [\"g1\"]\nrole_ids = [\"R1\"]\n\n\
             [[roles]]\nid = \"R1\"\nresource_ids = [\"X1\"]\n\n\
             [[resources]]\nid = \"X1\"\ntype = \"API\"\ngroups = [\"g1\"]\n\
             rules = [{ method = \"*\", path = \"/reports/**\" }]\n",
        )
        .unwrap();

        let mut config = WardenConfig::default();
        config.directory.seed_file = Some(seed);
        let state = AppState::from_config(config).unwrap();

        assert!(
            state
                .evaluator
                .check_permission("P1", "GET", "/reports/2024/q1")
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_exempt_paths_are_precompiled() {
        let mut config = WardenConfig::default();
        config.authz.exempt_paths = vec!["/health/**".into(), "/public/*.css".into()];
        let state = AppState::new(config, Stores::from_memory(Arc::new(MemoryStore::new())))
            .unwrap();

        assert!(state.is_exempt("/health"));
        assert!(state.is_exempt("/health/live"));
        assert!(state.is_exempt("/public/site.css"));
        assert!(!state.is_exempt("/public/site.js"));
        assert!(!state.is_exempt("/orders/1"));
    }

    #[test]
    fn test_missing_seed_file() {
        let mut config = WardenConfig::default();
        config.directory.seed_file = Some("/nonexistent/seed.toml".into());
        assert!(matches!(
            AppState::from_config(config),
            Err(InitError::Directory(DirectoryError::Io(_, _)))
        ));
    }
}
