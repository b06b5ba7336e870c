// crates/backend-lib/src/handlers/mod.rs

//! Request handlers, independent of the HTTP layer.

pub mod users;

pub use users::{Reply, RequestContext};
