//! Group intersection between a principal and a resource.

use std::collections::BTreeSet;

/// Whether two group sets share at least one member.
///
/// An empty set on either side never intersects: having no groups grants
/// nothing. Names compare exactly and case-sensitively.
pub fn groups_intersect(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    !a.is_disjoint(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shared_group_intersects() {
        assert!(groups_intersect(&set(&["g1", "g2"]), &set(&["g2", "g3"])));
        assert!(groups_intersect(&set(&["g1"]), &set(&["g1"])));
    }

    #[test]
    fn test_disjoint_groups() {
        assert!(!groups_intersect(&set(&["g1"]), &set(&["g2"])));
    }

    #[test]
    fn test_empty_sets_never_intersect() {
        assert!(!groups_intersect(&set(&[]), &set(&["g1"])));
        assert!(!groups_intersect(&set(&["g1"]), &set(&[])));
        assert!(!groups_intersect(&set(&[]), &set(&[])));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!groups_intersect(&set(&["Finance"]), &set(&["finance"])));
    }
}
