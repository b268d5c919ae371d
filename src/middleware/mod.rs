mod audit;
mod authz;

use axum::{Router, middleware::from_fn_with_state};

pub use audit::{AUDIT_TARGET, AuditRecord, audit_middleware, should_audit};
pub use authz::{
    AuthzOutcome, AuthzResponse, Verdict, enforce_permission_middleware, staff_id_from_headers,
};

use crate::AppState;

/// Put `routes` behind permission enforcement, with decisions audited.
pub fn protect(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes
        .layer(from_fn_with_state(
            state.clone(),
            enforce_permission_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), audit_middleware))
}
