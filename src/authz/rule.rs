//! Method and rule matching for URI permission rules.

use super::path;
use crate::models::PermissionRule;

/// Wildcard accepted in a rule's method position.
pub const ANY_METHOD: &str = "*";

/// Match a requested HTTP method against a rule's method pattern.
///
/// `*` matches every method; anything else is compared ASCII case-insensitively,
/// so `get` matches `GET`.
pub fn method_matches(pattern: &str, method: &str) -> bool {
    pattern == ANY_METHOD || pattern.eq_ignore_ascii_case(method)
}

/// Test one permission rule against a request.
///
/// Opaque rules, and URI rules with a blank method or path, are not URI
/// rules and never match.
pub fn rule_matches(rule: &PermissionRule, method: &str, path: &str) -> bool {
    match rule {
        PermissionRule::Uri {
            method: method_pattern,
            path: path_pattern,
            ..
        } => {
            if method_pattern.trim().is_empty() || path_pattern.trim().is_empty() {
                return false;
            }
            method_matches(method_pattern, method) && path::matches(path_pattern, path)
        }
        PermissionRule::Opaque(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case("*", "GET")]
    #[case("*", "post")]
    #[case("*", "DELETE")]
    #[case("*", "PATCH")]
    #[case("GET", "GET")]
    #[case("get", "GET")]
    #[case("Post", "POST")]
    fn test_method_matches(#[case] pattern: &str, #[case] method: &str) {
        assert!(method_matches(pattern, method));
    }

    #[rstest]
    #[case("GET", "POST")]
    #[case("GET", "GETS")]
    #[case("DELETE", "")]
    #[case("**", "GET")]
    fn test_method_does_not_match(#[case] pattern: &str, #[case] method: &str) {
        assert!(!method_matches(pattern, method));
    }

    #[test]
    fn test_uri_rule_requires_method_and_path() {
        let rule = PermissionRule::uri("GET", "/orders/*");
        assert!(rule_matches(&rule, "GET", "/orders/42"));
        assert!(rule_matches(&rule, "get", "/orders/42"));
        assert!(!rule_matches(&rule, "POST", "/orders/42"));
        assert!(!rule_matches(&rule, "GET", "/orders/42/items"));
    }

    #[test]
    fn test_wildcard_method_rule() {
        let rule = PermissionRule::uri("*", "/admin/**");
        assert!(rule_matches(&rule, "DELETE", "/admin/users/1"));
        assert!(rule_matches(&rule, "options", "/admin"));
        assert!(!rule_matches(&rule, "GET", "/public"));
    }

    #[test]
    fn test_opaque_rule_never_matches() {
        let rule: PermissionRule = serde_json::from_value(json!({"method": "GET"})).unwrap();
        assert!(!rule_matches(&rule, "GET", "/orders/42"));

        let rule: PermissionRule =
            serde_json::from_value(json!({"code": "orders:export", "path": "/orders/*"}))
                .unwrap();
        assert!(!rule_matches(&rule, "GET", "/orders/42"));
    }

    #[test]
    fn test_blank_fields_are_not_uri_rules() {
        assert!(!rule_matches(&PermissionRule::uri("", "/orders/*"), "GET", "/orders/1"));
        assert!(!rule_matches(&PermissionRule::uri("GET", " "), "GET", " "));
    }
}
