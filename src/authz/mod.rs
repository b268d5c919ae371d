//! Permission evaluation.
//!
//! A request `(staff_id, method, path)` is allowed when:
//! 1. The principal exists, is active and holds at least one role
//! 2. Some active role references an active API resource
//! 3. That resource shares at least one group with the principal
//! 4. One of its URI rules matches the method and the path pattern
//!
//! Everything else is a denial. Store failures and timeouts surface as
//! [`AuthzError`] and are never folded into a denial.

mod engine;
mod error;
pub mod groups;
pub mod path;
pub mod rule;

pub use engine::{Decision, DenyReason, PermissionEvaluator};
pub use error::AuthzError;
pub use path::{PathPattern, RequestPathError, normalize_request_path};
