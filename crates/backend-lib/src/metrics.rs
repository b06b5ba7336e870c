// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_SUCCEEDED: &str = "auth.login.succeeded";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const ACCESS_DENIED: &str = "auth.access.denied";
pub const USER_CREATED: &str = "users.created";
pub const USER_UPDATED: &str = "users.updated";
pub const USER_DELETED: &str = "users.deleted";
