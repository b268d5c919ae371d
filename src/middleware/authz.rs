//! Permission enforcement middleware and the shared decision outcome type.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api_types::ErrorResponse,
    authz::{AuthzError, Decision, DenyReason, RequestPathError, normalize_request_path},
};

/// What the service decided for one request.
///
/// Inserted into request extensions for downstream handlers, and into
/// response extensions for the audit middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzOutcome {
    pub staff_id: Option<String>,
    pub method: String,
    pub path: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed { resource_id: Option<String> },
    Denied { reason: DenyReason },
    /// No staff id on the request
    Unauthenticated,
    /// The path could resolve to something other than what would be matched
    InvalidPath { message: String },
    /// The directory failed or timed out; no decision was made
    Failed { timed_out: bool, message: String },
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed { .. } => "allowed",
            Self::Denied { .. } => "denied",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidPath { .. } => "invalid_path",
            Self::Failed { .. } => "error",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

impl From<&Decision> for Verdict {
    fn from(decision: &Decision) -> Self {
        match (decision.allowed, decision.reason) {
            (true, _) => Self::Allowed {
                resource_id: decision.resource_id.clone(),
            },
            (false, reason) => Self::Denied {
                reason: reason.unwrap_or(DenyReason::NoMatchingRule),
            },
        }
    }
}

impl From<&RequestPathError> for Verdict {
    fn from(error: &RequestPathError) -> Self {
        Self::InvalidPath {
            message: error.to_string(),
        }
    }
}

impl From<&AuthzError> for Verdict {
    fn from(error: &AuthzError) -> Self {
        Self::Failed {
            timed_out: matches!(error, AuthzError::Timeout(_)),
            message: error.to_string(),
        }
    }
}

impl AuthzOutcome {
    pub fn new(
        staff_id: Option<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        verdict: Verdict,
    ) -> Self {
        Self {
            staff_id,
            method: method.into(),
            path: path.into(),
            verdict,
        }
    }

    /// The error response matching a non-allowed verdict, with this outcome
    /// attached to its extensions.
    pub fn into_rejection(self) -> Response {
        let rejection = match &self.verdict {
            Verdict::Allowed { .. } => {
                AuthzResponse::Internal("Allowed outcome rejected".to_string())
            }
            Verdict::Denied { reason } => AuthzResponse::Forbidden(*reason),
            Verdict::Unauthenticated => {
                AuthzResponse::Unauthorized("Missing staff identity".to_string())
            }
            Verdict::InvalidPath { message } => AuthzResponse::BadRequest(message.clone()),
            Verdict::Failed { timed_out: true, message } => {
                AuthzResponse::Timeout(message.clone())
            }
            Verdict::Failed { message, .. } => AuthzResponse::Unavailable(message.clone()),
        };
        let mut response = rejection.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Response type for authorization errors.
#[derive(Debug)]
pub enum AuthzResponse {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(DenyReason),
    Unavailable(String),
    Timeout(String),
    Internal(String),
}

impl From<AuthzError> for AuthzResponse {
    fn from(error: AuthzError) -> Self {
        match error {
            AuthzError::Timeout(_) => Self::Timeout(error.to_string()),
            AuthzError::Store(_) => Self::Unavailable(error.to_string()),
        }
    }
}

impl IntoResponse for AuthzResponse {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                msg,
            ),
            Self::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                msg,
            ),
            Self::Forbidden(reason) => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "forbidden",
                format!("Access denied ({reason})"),
            ),
            Self::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "directory_unavailable",
                msg,
            ),
            Self::Timeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "service_unavailable",
                "directory_timeout",
                msg,
            ),
            Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal_error",
                msg,
            ),
        };

        (
            status,
            axum::Json(ErrorResponse::new(error_type, code, message)),
        )
            .into_response()
    }
}

/// Read a non-blank staff id from `header`.
pub fn staff_id_from_headers(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Enforce permissions on every request passing through.
///
/// The caller is identified by the configured staff id header and the
/// request's own method and path are evaluated. The path is normalized
/// first; paths with dot segments or encoded separators are refused with
/// 400. Paths matching `authz.exempt_paths` pass through unchecked. On
/// success the [`AuthzOutcome`] is available to handlers as a request
/// extension.
pub async fn enforce_permission_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let path = match normalize_request_path(req.uri().path()) {
        Ok(path) => path,
        Err(e) => {
            let raw = req.uri().path().to_string();
            tracing::debug!(method = %method, path = %raw, error = %e, "Refusing request path");
            return AuthzOutcome::new(None, method, raw, Verdict::from(&e)).into_rejection();
        }
    };

    if state.is_exempt(&path) {
        tracing::trace!(path = %path, "Path exempt from permission enforcement");
        return next.run(req).await;
    }

    let Some(staff_id) = staff_id_from_headers(req.headers(), &state.staff_id_header) else {
        tracing::debug!(method = %method, path = %path, "Request without staff identity");
        return AuthzOutcome::new(None, method, path, Verdict::Unauthenticated).into_rejection();
    };

    let verdict = match state.evaluator.evaluate(&staff_id, &method, &path).await {
        Ok(decision) => Verdict::from(&decision),
        Err(e) => Verdict::from(&e),
    };
    let outcome = AuthzOutcome::new(Some(staff_id), method, path, verdict);

    if !outcome.verdict.is_allowed() {
        return outcome.into_rejection();
    }

    req.extensions_mut().insert(outcome.clone());
    let mut response = next.run(req).await;
    response.extensions_mut().insert(outcome);
    response
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use axum::{Extension, Router, body::Body, routing::get};
    use http::Request;
    use rstest::rstest;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::WardenConfig,
        db::{DbError, DbResult, MemoryStore, PrincipalRepo, Stores},
        models::{PermissionRule, Principal, Resource, Role},
    };

    fn directory() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.upsert_principal(
            Principal::new("P1")
                .with_groups(["g1"])
                .with_role_ids(["R1"]),
        );
        store.upsert_role(Role::new("R1").with_resource_ids(["X1"]));
        store.upsert_resource(
            Resource::api("X1")
                .with_groups(["g1"])
                .with_rule(PermissionRule::uri("GET", "/orders/*")),
        );
        Arc::new(store)
    }

    fn app_with(stores: Stores) -> Router {
        let config = WardenConfig::from_str("[authz]\nexempt_paths = [\"/public/**\"]").unwrap();
        let state = AppState::new(config, stores).unwrap();

        let routes = Router::new()
            .route(
                "/orders/{id}",
                get(|Extension(outcome): Extension<AuthzOutcome>| async move {
                    outcome.staff_id.unwrap_or_default()
                }),
            )
            .route("/public/ping", get(|| async { "pong" }))
            .route("/public/{*rest}", get(|| async { "public" }));

        crate::middleware::protect(routes, &state).with_state(state)
    }

    fn app() -> Router {
        app_with(Stores::from_memory(directory()))
    }

    async fn send(app: Router, uri: &str, staff_id: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().uri(uri);
        if let Some(id) = staff_id {
            request = request.header("x-staff-id", id);
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    struct BrokenPrincipals;

    #[async_trait]
    impl PrincipalRepo for BrokenPrincipals {
        async fn find_by_staff_id(&self, _staff_id: &str) -> DbResult<Option<Principal>> {
            Err(DbError::Unavailable("directory offline".to_string()))
        }
    }

    struct SlowPrincipals;

    #[async_trait]
    impl PrincipalRepo for SlowPrincipals {
        async fn find_by_staff_id(&self, _staff_id: &str) -> DbResult<Option<Principal>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let (status, body) = send(app(), "/orders/42", Some("P1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"P1");
    }

    #[tokio::test]
    async fn test_denied_request_is_forbidden() {
        let (status, body) = send(app(), "/orders/42", Some("P2")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "forbidden");
        assert_eq!(json["error"]["type"], "permission_error");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (status, _) = send(app(), "/orders/42", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app(), "/orders/42", Some("   ")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_exempt_path_skips_enforcement() {
        let (status, body) = send(app(), "/public/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"pong");
    }

    #[rstest]
    #[case("/public/../orders/42")]
    #[case("/public/%2e%2e/orders/42")]
    #[case("/orders/%2e%2e")]
    #[case("/public/x%2f..%2f..%2forders")]
    #[tokio::test]
    async fn test_traversal_paths_are_refused(#[case] uri: &str) {
        let (status, body) = send(app(), uri, Some("P1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_encoded_path_is_decoded_before_matching() {
        let (status, body) = send(app(), "/orders/%34%32", Some("P1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"P1");
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let store = directory();
        let app = app_with(Stores::new(
            Arc::new(BrokenPrincipals),
            store.clone(),
            store,
        ));
        let (status, body) = send(app, "/orders/42", Some("P1")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "directory_unavailable");
    }

    #[tokio::test]
    async fn test_store_timeout_is_gateway_timeout() {
        let store = directory();
        let config = WardenConfig::from_str("[authz]\nlookup_timeout_ms = 20").unwrap();
        let state = AppState::new(
            config,
            Stores::new(Arc::new(SlowPrincipals), store.clone(), store),
        )
        .unwrap();
        let routes = Router::new().route("/orders/{id}", get(|| async { "unreachable" }));
        let app = crate::middleware::protect(routes, &state).with_state(state);

        let (status, _) = send(app, "/orders/42", Some("P1")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_verdict_from_decision() {
        assert_eq!(
            Verdict::from(&Decision::allow("X1")),
            Verdict::Allowed {
                resource_id: Some("X1".to_string())
            }
        );
        assert_eq!(
            Verdict::from(&Decision::deny(DenyReason::NoRoles)),
            Verdict::Denied {
                reason: DenyReason::NoRoles
            }
        );
    }

    #[test]
    fn test_staff_id_is_trimmed() {
        let header = HeaderName::from_static("x-staff-id");
        let mut headers = HeaderMap::new();
        headers.insert(&header, " P1 ".parse().unwrap());
        assert_eq!(staff_id_from_headers(&headers, &header), Some("P1".to_string()));
    }
}
