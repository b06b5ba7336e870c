// ============================
// apishield-backend-lib/src/lib.rs
// ============================
//! Core backend functionality for the `apishield` user service.

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod router;
pub mod validation;

use crate::auth::{Credential, CredentialHasher, TokenIssuer};
use crate::config::Settings;
use crate::directory::{FlatFileDirectory, NewUserRecord, UserDirectory};
use crate::error::AppError;
use apishield_common::Identity;
use std::sync::Arc;

/// Application state shared across all handlers
///
/// Everything in here is read-only after startup; the directory is the only
/// thing requests change.
#[derive(Clone)]
pub struct AppState {
    /// User directory backend
    pub directory: Arc<dyn UserDirectory>,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
    /// Credential hasher
    pub hasher: CredentialHasher,
    /// Session token issuer
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Create a new application state
    pub fn new(directory: Arc<dyn UserDirectory>, settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;
        let hasher = CredentialHasher::new(settings.hash_cost)?;
        let tokens = TokenIssuer::new(&settings);

        Ok(Self {
            directory,
            settings: Arc::new(settings),
            hasher,
            tokens,
        })
    }

    /// Create a state backed by the flat-file directory under `settings.data_dir`
    pub fn with_flat_file(settings: Settings) -> Result<Self, AppError> {
        let directory = FlatFileDirectory::open(&settings.data_dir)?;
        Self::new(Arc::new(directory), settings)
    }

    /// Seed `bootstrap_admin` if the directory holds no users yet
    ///
    /// Every way of creating users is admin-only, so a fresh deployment needs
    /// one admin from somewhere.
    pub async fn bootstrap_admin(&self) -> Result<Option<Identity>, AppError> {
        let Some(admin) = &self.settings.bootstrap_admin else {
            return Ok(None);
        };
        if !self.directory.is_empty().await? {
            tracing::debug!("directory already has users, skipping bootstrap admin");
            return Ok(None);
        }

        validation::validate_username(&admin.username)?;
        if let Some(email) = &admin.email {
            validation::validate_email(email)?;
        }
        let password_hash = self
            .hasher
            .hash(Credential::from(admin.password.clone()))
            .await?;

        let created = self
            .directory
            .create(NewUserRecord {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password_hash: Some(password_hash),
                is_admin: true,
            })
            .await?;
        tracing::info!(user_id = created.id, username = %created.username, "bootstrap admin created");
        Ok(Some(created))
    }
}
