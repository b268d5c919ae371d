//! Decision audit logging.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::request_id::RequestId;

use super::{AuthzOutcome, Verdict};
use crate::{AppState, config::AuditConfig};

/// Tracing target audit records are emitted on.
pub const AUDIT_TARGET: &str = "audit";

/// One authorization decision as written to the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    pub method: String,
    pub path: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub status: u16,
    pub latency_ms: u64,
}

impl AuditRecord {
    pub fn new(
        outcome: &AuthzOutcome,
        request_id: Option<String>,
        status: u16,
        latency_ms: u64,
    ) -> Self {
        let (reason, resource_id) = match &outcome.verdict {
            Verdict::Allowed { resource_id } => (None, resource_id.clone()),
            Verdict::Denied { reason } => (Some(reason.to_string()), None),
            Verdict::Unauthenticated => (None, None),
            Verdict::InvalidPath { message } | Verdict::Failed { message, .. } => {
                (Some(message.clone()), None)
            }
        };

        Self {
            timestamp: Utc::now(),
            request_id,
            staff_id: outcome.staff_id.clone(),
            method: outcome.method.clone(),
            path: outcome.path.clone(),
            outcome: outcome.verdict.as_str(),
            reason,
            resource_id,
            status,
            latency_ms,
        }
    }

    /// Write the record to the `audit` target. Failures log at warn level.
    pub fn emit(&self) {
        let timestamp = self.timestamp.to_rfc3339();
        if self.outcome == "error" {
            tracing::warn!(
                target: AUDIT_TARGET,
                timestamp = %timestamp,
                request_id = self.request_id.as_deref(),
                staff_id = self.staff_id.as_deref(),
                method = %self.method,
                path = %self.path,
                outcome = self.outcome,
                reason = self.reason.as_deref(),
                status = self.status,
                latency_ms = self.latency_ms,
                "Authorization decision failed"
            );
        } else {
            tracing::info!(
                target: AUDIT_TARGET,
                timestamp = %timestamp,
                request_id = self.request_id.as_deref(),
                staff_id = self.staff_id.as_deref(),
                method = %self.method,
                path = %self.path,
                outcome = self.outcome,
                reason = self.reason.as_deref(),
                resource_id = self.resource_id.as_deref(),
                status = self.status,
                latency_ms = self.latency_ms,
                "Authorization decision"
            );
        }
    }
}

/// Whether `verdict` is recorded under `config`.
pub fn should_audit(config: &AuditConfig, verdict: &Verdict) -> bool {
    config.enabled && (config.include_allowed || !verdict.is_allowed())
}

/// Record the [`AuthzOutcome`] the inner service attached to its response.
///
/// Responses without an outcome (exempt paths, bad requests) are not audited.
pub async fn audit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let audit = &state.config.authz.audit;
    if !audit.enabled {
        return next.run(req).await;
    }

    let started = Instant::now();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(String::from);

    let response = next.run(req).await;

    if let Some(outcome) = response.extensions().get::<AuthzOutcome>()
        && should_audit(audit, &outcome.verdict)
    {
        let latency_ms = started.elapsed().as_millis() as u64;
        AuditRecord::new(outcome, request_id, response.status().as_u16(), latency_ms).emit();
    }

    response
}
