// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `apishield` clients and the server.
//! This module defines the JSON bodies of the user resource and the car form schema.

pub mod car;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a user record
pub type UserId = i64;

/// A user record minus its credential hash, safe for transmission
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Unique numeric id
    pub id: UserId,
    /// Unique login name
    pub username: String,
    /// Optional unique email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether this user may manage other users
    #[serde(default)]
    pub is_admin: bool,
}

/// Body of `POST /users`
///
/// Unknown fields are rejected so a client cannot smuggle in `id` or a
/// pre-computed hash.
#[derive(Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Body of `PUT`/`PATCH /users/{id}`; absent fields are left untouched
#[derive(Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct UserChanges {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Body of `POST /login`; the user is looked up by username OR email
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Body returned by a successful login
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub user: Identity,
}

fn redacted(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<none>"
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &redacted(&self.password))
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

impl fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserChanges")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &redacted(&self.password))
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_serialization_has_no_password() {
        let identity = Identity {
            id: 3,
            username: "ana".to_string(),
            email: None,
            is_admin: false,
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["is_admin"], false);
        assert!(json.get("email").is_none());
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_new_user_rejects_unknown_fields() {
        let body = r#"{"username":"a","password":"p1","id":99}"#;
        assert!(serde_json::from_str::<NewUser>(body).is_err());

        let body = r#"{"username":"a","password":"p1"}"#;
        let user: NewUser = serde_json::from_str(body).unwrap();
        assert_eq!(user.username, "a");
        assert_eq!(user.password.as_deref(), Some("p1"));
        assert_eq!(user.is_admin, None);
    }

    #[test]
    fn test_debug_never_prints_password() {
        let user = NewUser {
            username: "a".to_string(),
            password: Some("hunter2".to_string()),
            ..NewUser::default()
        };
        assert!(!format!("{user:?}").contains("hunter2"));

        let login = LoginRequest {
            username: Some("a".to_string()),
            email: None,
            password: "hunter2".to_string(),
        };
        assert!(!format!("{login:?}").contains("hunter2"));
    }
}
