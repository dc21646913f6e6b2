//! xck-daemon library target.
//!
//! Exposes the router, state, monitor operations and reporters for
//! integration tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod monitor;
pub mod reporter;
pub mod routes;
pub mod state;
