//! Permission decision endpoints.
//!
//! - `POST /api/v1/permissions/check`: explicit check with a JSON body
//! - `GET /api/v1/authorize`: forward-auth for reverse proxies; the original
//!   request is described by `X-Forwarded-Method` / `X-Forwarded-Uri`

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api_types::{PermissionCheckRequest, PermissionCheckResponse},
    authz::normalize_request_path,
    middleware::{AuthzOutcome, AuthzResponse, Verdict, staff_id_from_headers},
};

pub const X_FORWARDED_METHOD: &str = "x-forwarded-method";
pub const X_FORWARDED_URI: &str = "x-forwarded-uri";

/// Header naming the resource that granted a forward-auth request.
pub const X_AUTHZ_RESOURCE: &str = "x-authz-resource";

/// Check whether a staff member may call a method on a path.
///
/// Always 200 with `allowed` for a decision; 400 for a path with dot
/// segments or encoded separators; 503/504 when the directory could not be
/// consulted.
#[tracing::instrument(
    name = "permissions.check",
    skip(state, request),
    fields(staff_id = %request.staff_id, method = %request.method, path = %request.path)
)]
pub async fn check(
    State(state): State<AppState>,
    Json(request): Json<PermissionCheckRequest>,
) -> Response {
    if request.staff_id.trim().is_empty() {
        return AuthzResponse::BadRequest("staff_id must not be empty".to_string())
            .into_response();
    }

    let PermissionCheckRequest {
        staff_id,
        method,
        path,
    } = request;

    let path = match normalize_request_path(&path) {
        Ok(normalized) => normalized,
        Err(e) => {
            return AuthzOutcome::new(Some(staff_id), method, path, Verdict::from(&e))
                .into_rejection();
        }
    };

    match state.evaluator.evaluate(&staff_id, &method, &path).await {
        Ok(decision) => {
            let outcome =
                AuthzOutcome::new(Some(staff_id), method, path, Verdict::from(&decision));
            let mut response = Json(PermissionCheckResponse::from(decision)).into_response();
            response.extensions_mut().insert(outcome);
            response
        }
        Err(e) => AuthzOutcome::new(Some(staff_id), method, path, Verdict::from(&e))
            .into_rejection(),
    }
}

/// Forward-auth decision for a reverse proxy.
///
/// 204 when allowed, 401 without a staff id, 403 when denied, 400 when the
/// forwarded path carries dot segments or encoded separators.
#[tracing::instrument(name = "permissions.authorize", skip_all)]
pub async fn authorize(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let method = forwarded_method(&headers).unwrap_or_else(|| method.as_str().to_string());
    let raw_path = forwarded_path(&headers).unwrap_or_else(|| uri.path().to_string());
    let path = match normalize_request_path(&raw_path) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(
                method = %method,
                path = %raw_path,
                error = %e,
                "Refusing forwarded path"
            );
            return AuthzOutcome::new(None, method, raw_path, Verdict::from(&e)).into_rejection();
        }
    };

    let Some(staff_id) = staff_id_from_headers(&headers, &state.staff_id_header) else {
        return AuthzOutcome::new(None, method, path, Verdict::Unauthenticated).into_rejection();
    };

    let verdict = match state.evaluator.evaluate(&staff_id, &method, &path).await {
        Ok(decision) => Verdict::from(&decision),
        Err(e) => Verdict::from(&e),
    };
    let outcome = AuthzOutcome::new(Some(staff_id), method, path, verdict);

    let Verdict::Allowed { resource_id } = &outcome.verdict else {
        return outcome.into_rejection();
    };

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Some(value) = resource_id.as_deref().and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert(X_AUTHZ_RESOURCE, value);
    }
    response.extensions_mut().insert(outcome);
    response
}

fn forwarded_method(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_METHOD)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_uppercase())
}

/// Path component of `X-Forwarded-Uri`, without query string or fragment.
/// Absolute URIs are reduced to their path.
fn forwarded_path(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get(X_FORWARDED_URI)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    match raw.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() || raw.starts_with('/') => Some(uri.path().to_string()),
        _ => raw.split(['?', '#']).next().map(String::from),
    }
}
