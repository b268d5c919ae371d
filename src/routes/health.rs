//! Health check endpoints for Kubernetes probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::AppState;

/// Detailed health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: String,
    /// Service version
    pub version: String,
    /// Directory store status
    pub directory: ComponentStatus,
}

/// Status of a single component.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
}

/// Full health check, probing the directory stores.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = std::time::Instant::now();
    let result = state.evaluator.stores().health_check().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let healthy = result.is_ok();
    if let Err(e) = &result {
        tracing::warn!(error = %e, "Directory health check failed");
    }

    let health = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        directory: ComponentStatus {
            healthy,
            message: result.err().map(|e| e.to_string()),
            latency_ms,
        },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Kubernetes liveness probe. Always 200 while the process serves requests.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{
        AppState, build_app,
        config::WardenConfig,
        db::{DbError, DbResult, MemoryStore, PrincipalRepo, Stores},
        models::Principal,
    };

    struct DownPrincipals;

    #[async_trait]
    impl PrincipalRepo for DownPrincipals {
        async fn find_by_staff_id(&self, _staff_id: &str) -> DbResult<Option<Principal>> {
            Err(DbError::Unavailable("no route to host".to_string()))
        }
    }

    async fn get_json(stores: Stores, uri: &str) -> (http::StatusCode, Value) {
        let state = AppState::new(WardenConfig::default(), stores).unwrap();
        let response = build_app(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_liveness() {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let (status, _) = get_json(stores, "/health/live").await;
        assert_eq!(status, http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_directory() {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let (status, json) = get_json(stores, "/health").await;

        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["directory"]["healthy"], true);
        assert!(json["directory"]["latency_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_health_unavailable_directory() {
        let memory = Arc::new(MemoryStore::new());
        let stores = Stores::new(Arc::new(DownPrincipals), memory.clone(), memory);
        let (status, json) = get_json(stores, "/health").await;

        assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
        assert!(
            json["directory"]["message"]
                .as_str()
                .unwrap()
                .contains("no route to host")
        );
    }
}
