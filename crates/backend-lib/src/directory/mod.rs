// ============================
// apishield-backend-lib/src/directory/mod.rs
// ============================
//! User directory abstraction.
//!
//! The directory is the only place user records live. Every backend
//! returns [`Identity`] values from its read operations so the credential
//! hash never leaves the store except through [`UserDirectory::find_for_login`].
//! Store-specific failures are translated into [`DirectoryError`] here, at
//! the boundary.

mod flat_file;
mod memory;

pub use flat_file::FlatFileDirectory;
pub use memory::MemoryDirectory;

use apishield_common::{Identity, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    /// No record has the requested id
    #[error("no user with id {0}")]
    RecordNotFound(UserId),

    /// A unique column already holds this value
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("directory backend failure: {0}")]
    Backend(String),

    #[error("directory IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A stored user, hash included
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl UserRecord {
    /// The transmissible part of the record
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// Values for a new record; the id is assigned by the directory
#[derive(Clone, Default)]
pub struct NewUserRecord {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: bool,
}

/// Partial update; `None` leaves a column untouched
#[derive(Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: Option<bool>,
}

/// Trait for user directory backends
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All users, without hashes
    async fn list(&self) -> Result<Vec<Identity>, DirectoryError>;

    /// One user by id, without hash
    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, DirectoryError>;

    /// First user whose username OR email matches. A `None` criterion matches nothing.
    async fn find_for_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    async fn create(&self, user: NewUserRecord) -> Result<Identity, DirectoryError>;

    /// Fails with [`DirectoryError::RecordNotFound`] when `id` does not exist
    async fn update(&self, id: UserId, patch: UserPatch) -> Result<Identity, DirectoryError>;

    /// Fails with [`DirectoryError::RecordNotFound`] when `id` does not exist
    async fn delete(&self, id: UserId) -> Result<(), DirectoryError>;

    async fn is_empty(&self) -> Result<bool, DirectoryError>;
}

/// Row storage shared by the in-memory and flat-file backends
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct Table {
    /// Last id handed out
    next_id: UserId,
    users: Vec<UserRecord>,
}

impl Table {
    pub(crate) fn from_records(users: Vec<UserRecord>) -> Self {
        let next_id = users.iter().map(|u| u.id).max().unwrap_or(0);
        Self { next_id, users }
    }

    pub(crate) fn identities(&self) -> Vec<Identity> {
        self.users.iter().map(UserRecord::identity).collect()
    }

    pub(crate) fn get(&self, id: UserId) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    pub(crate) fn find_for_login(&self, username: Option<&str>, email: Option<&str>) -> Option<&UserRecord> {
        self.users.iter().find(|u| {
            username.is_some_and(|name| u.username == name)
                || email.is_some_and(|mail| u.email.as_deref() == Some(mail))
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn check_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<UserId>,
    ) -> Result<(), DirectoryError> {
        let others = self.users.iter().filter(|u| Some(u.id) != except);
        for user in others {
            if username.is_some_and(|name| user.username == name) {
                return Err(DirectoryError::Duplicate("username"));
            }
            if email.is_some() && user.email.as_deref() == email {
                return Err(DirectoryError::Duplicate("email"));
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, new: NewUserRecord) -> Result<Identity, DirectoryError> {
        self.check_unique(Some(&new.username), new.email.as_deref(), None)?;

        let id = self.next_id + 1;
        let record = UserRecord {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            is_admin: new.is_admin,
        };
        let identity = record.identity();
        self.users.push(record);
        self.next_id = id;
        Ok(identity)
    }

    pub(crate) fn update(&mut self, id: UserId, patch: UserPatch) -> Result<Identity, DirectoryError> {
        if self.get(id).is_none() {
            return Err(DirectoryError::RecordNotFound(id));
        }
        self.check_unique(patch.username.as_deref(), patch.email.as_deref(), Some(id))?;

        let record = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(DirectoryError::RecordNotFound(id))?;
        if let Some(username) = patch.username {
            record.username = username;
        }
        if let Some(email) = patch.email {
            record.email = Some(email);
        }
        if let Some(hash) = patch.password_hash {
            record.password_hash = Some(hash);
        }
        if let Some(is_admin) = patch.is_admin {
            record.is_admin = is_admin;
        }
        Ok(record.identity())
    }

    pub(crate) fn remove(&mut self, id: UserId) -> Result<(), DirectoryError> {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        if self.users.len() == before {
            return Err(DirectoryError::RecordNotFound(id));
        }
        Ok(())
    }
}
