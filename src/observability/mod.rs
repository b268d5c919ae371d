//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an environment filter and a
//! formatting layer chosen by configuration (pretty, compact, JSON). Audit
//! records use the `audit` target so they can be routed or filtered on their
//! own (e.g. `filter = "audit=info"`).

mod tracing_init;

pub use tracing_init::*;
