// ============================
// apishield-backend-lib/src/auth/mod.rs
// ============================
//! Authentication and authorization.

pub mod password;
pub mod policy;
pub mod requester;
pub mod token;

pub use password::{hash_password, verify_password, Credential, CredentialHasher};
pub use policy::{authorize, evaluate, parse_user_id, AccessDecision, Endpoint, Rule};
pub use requester::Requester;
pub use token::{Claims, CookieDirective, IssuedToken, TokenIssuer, MARKER_COOKIE_NAME};
