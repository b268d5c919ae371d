//! Permission evaluation: principal -> roles -> resources -> rules.

use std::{collections::BTreeSet, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use super::{AuthzError, groups::groups_intersect, rule::rule_matches};
use crate::db::Stores;

/// Why a request was not authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    PrincipalNotFound,
    PrincipalInactive,
    NoRoles,
    NoActiveRoles,
    NoResources,
    NoEligibleResources,
    NoGroupOverlap,
    NoMatchingRule,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrincipalNotFound => "principal_not_found",
            Self::PrincipalInactive => "principal_inactive",
            Self::NoRoles => "no_roles",
            Self::NoActiveRoles => "no_active_roles",
            Self::NoResources => "no_resources",
            Self::NoEligibleResources => "no_eligible_resources",
            Self::NoGroupOverlap => "no_group_overlap",
            Self::NoMatchingRule => "no_matching_rule",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a permission evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether access is allowed
    pub allowed: bool,
    /// Why access was denied (denials only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
    /// The resource whose rule granted access (allows only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl Decision {
    pub fn allow(resource_id: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: None,
            resource_id: Some(resource_id.into()),
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            resource_id: None,
        }
    }
}

/// Decides whether a principal may call `method` on `path`.
///
/// Holds nothing but handles to the directory stores, so it is cheap to
/// clone and every call re-reads the current directory state. Lookups
/// within one evaluation run in sequence; separate evaluations share no
/// state and may run concurrently.
#[derive(Clone)]
pub struct PermissionEvaluator {
    stores: Stores,
    lookup_timeout: Option<Duration>,
}

impl PermissionEvaluator {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            lookup_timeout: None,
        }
    }

    /// Bound the whole evaluation. A zero duration disables the bound.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Check whether `staff_id` may call `method` on `path`.
    ///
    /// Returns `Ok(false)` for every kind of normal denial; `Err` only when a
    /// store failed or the evaluation timed out.
    pub async fn check_permission(
        &self,
        staff_id: &str,
        method: &str,
        path: &str,
    ) -> Result<bool, AuthzError> {
        self.evaluate(staff_id, method, path)
            .await
            .map(|decision| decision.allowed)
    }

    /// Like [`check_permission`](Self::check_permission), with an explicit
    /// bound overriding the configured one.
    pub async fn check_permission_with_timeout(
        &self,
        staff_id: &str,
        method: &str,
        path: &str,
        timeout: Duration,
    ) -> Result<bool, AuthzError> {
        tokio::time::timeout(timeout, self.resolve(staff_id, method, path))
            .await
            .map_err(|_| AuthzError::Timeout(timeout))?
            .map(|decision| decision.allowed)
    }

    /// Evaluate and report the reason behind the decision.
    pub async fn evaluate(
        &self,
        staff_id: &str,
        method: &str,
        path: &str,
    ) -> Result<Decision, AuthzError> {
        let result = match self.lookup_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.resolve(staff_id, method, path))
                .await
                .map_err(|_| AuthzError::Timeout(timeout))?,
            None => self.resolve(staff_id, method, path).await,
        };

        match &result {
            Ok(decision) if decision.allowed => tracing::debug!(
                staff_id,
                method,
                path,
                resource_id = ?decision.resource_id,
                "Permission granted"
            ),
            Ok(decision) => tracing::debug!(
                staff_id,
                method,
                path,
                reason = ?decision.reason,
                "Permission denied"
            ),
            Err(e) => tracing::warn!(
                staff_id,
                method,
                path,
                error = %e,
                "Permission evaluation failed"
            ),
        }

        result
    }

    #[tracing::instrument(name = "authz.resolve", skip(self))]
    async fn resolve(
        &self,
        staff_id: &str,
        method: &str,
        path: &str,
    ) -> Result<Decision, AuthzError> {
        let Some(principal) = self.stores.principals().find_by_staff_id(staff_id).await? else {
            return Ok(Decision::deny(DenyReason::PrincipalNotFound));
        };
        if !principal.active {
            return Ok(Decision::deny(DenyReason::PrincipalInactive));
        }
        if principal.role_ids.is_empty() {
            return Ok(Decision::deny(DenyReason::NoRoles));
        }

        let roles = self
            .stores
            .roles()
            .find_active_by_ids(&principal.role_ids)
            .await?;
        let roles: Vec<_> = roles.into_iter().filter(|role| role.active).collect();
        if roles.is_empty() {
            return Ok(Decision::deny(DenyReason::NoActiveRoles));
        }

        let resource_ids: Vec<String> = roles
            .iter()
            .flat_map(|role| role.resource_ids.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if resource_ids.is_empty() {
            return Ok(Decision::deny(DenyReason::NoResources));
        }
        tracing::trace!(
            roles = roles.len(),
            resources = resource_ids.len(),
            "Resolved role resources"
        );

        let resources = self
            .stores
            .resources()
            .find_active_api_by_ids(&resource_ids)
            .await?;
        let resources: Vec<_> = resources
            .into_iter()
            .filter(|resource| resource.active && resource.is_api())
            .collect();
        if resources.is_empty() {
            return Ok(Decision::deny(DenyReason::NoEligibleResources));
        }

        let reachable: Vec<_> = resources
            .iter()
            .filter(|resource| groups_intersect(&principal.groups, &resource.groups))
            .collect();
        if reachable.is_empty() {
            return Ok(Decision::deny(DenyReason::NoGroupOverlap));
        }

        for resource in reachable {
            for rule in &resource.rules {
                if !rule.is_uri() {
                    tracing::trace!(resource_id = %resource.id, "Skipping non-URI rule");
                    continue;
                }
                if rule_matches(rule, method, path) {
                    return Ok(Decision::allow(&resource.id));
                }
            }
        }

        Ok(Decision::deny(DenyReason::NoMatchingRule))
    }
}
