// ============================
// apishield-backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use crate::error::AppError;
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use std::{fmt, sync::Arc};
use zeroize::Zeroizing;

const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_OUTPUT_LEN: usize = 32;

/// Plaintext secret supplied by a client; wiped from memory on drop
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Credential {
    fn from(plain: String) -> Self {
        Credential(Zeroizing::new(plain))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Hash a password using scrypt with the given parameters
///
/// A fresh salt is drawn for every call; salt and parameters end up in the
/// PHC string, so nothing else needs storing.
pub fn hash_password(plain: &str, params: Params) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| AppError::Hash(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash; malformed hashes simply do not match
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Credential hasher with a fixed work factor
///
/// Both operations run on the blocking pool. `verify` against a missing hash
/// still burns one verification against a throwaway hash so an unknown user
/// costs as much as a wrong password.
#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
    dummy_hash: Arc<str>,
}

impl CredentialHasher {
    /// `cost` is the scrypt `log_n`
    pub fn new(cost: u8) -> Result<Self, AppError> {
        let params = Params::new(cost, SCRYPT_R, SCRYPT_P, SCRYPT_OUTPUT_LEN)
            .map_err(|e| AppError::Hash(e.to_string()))?;
        let dummy_hash = hash_password("apishield-dummy-credential", params.clone())?;
        Ok(Self {
            params,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub async fn hash(&self, credential: Credential) -> Result<String, AppError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || hash_password(credential.expose(), params)).await?
    }

    /// `false` for a wrong credential, a malformed hash, or no hash at all
    pub async fn verify(&self, credential: Credential, hash: Option<String>) -> bool {
        let has_hash = hash.is_some();
        let hash = hash.unwrap_or_else(|| self.dummy_hash.to_string());
        let outcome =
            tokio::task::spawn_blocking(move || verify_password(&hash, credential.expose())).await;
        let matched = verification_outcome(outcome);
        matched && has_hash
    }
}

/// A verification task that died is a failed verification, but a loud one
fn verification_outcome(outcome: Result<bool, tokio::task::JoinError>) -> bool {
    match outcome {
        Ok(matched) => matched,
        Err(e) => {
            tracing::error!(error = %e, "credential verification task failed");
            false
        },
    }
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("log_n", &self.params.log_n())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(4).unwrap()
    }

    fn credential(plain: &str) -> Credential {
        Credential::from(plain.to_string())
    }

    #[tokio::test]
    async fn test_password_hashing_and_verification() {
        let hasher = hasher();
        let hash = hasher.hash(credential("SecureP@ssw0rd")).await.unwrap();

        assert_ne!(hash, "SecureP@ssw0rd");
        assert!(hash.starts_with("$scrypt$"));
        assert!(hasher.verify(credential("SecureP@ssw0rd"), Some(hash.clone())).await);
        assert!(!hasher.verify(credential("SecureP@ssw0rD"), Some(hash)).await);
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let hasher = hasher();
        let first = hasher.hash(credential("p1")).await.unwrap();
        let second = hasher.hash(credential("p1")).await.unwrap();
        assert_ne!(first, second);
        assert!(verify_password(&first, "p1"));
        assert!(verify_password(&second, "p1"));
    }

    #[tokio::test]
    async fn test_malformed_or_missing_hash_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify(credential("p1"), Some("garbage".to_string())).await);
        assert!(!hasher.verify(credential("p1"), Some(String::new())).await);
        assert!(!hasher.verify(credential("apishield-dummy-credential"), None).await);
    }

    #[tokio::test]
    async fn test_panicked_verification_is_a_mismatch() {
        let outcome = tokio::task::spawn_blocking(|| -> bool { panic!("hasher blew up") }).await;
        assert!(outcome.as_ref().is_err_and(|e| e.is_panic()));
        assert!(!verification_outcome(outcome));
        assert!(verification_outcome(Ok(true)));
    }

    #[test]
    fn test_cost_is_embedded_in_hash() {
        let params = Params::new(5, SCRYPT_R, SCRYPT_P, SCRYPT_OUTPUT_LEN).unwrap();
        let hash = hash_password("p1", params).unwrap();
        assert!(hash.contains("ln=5"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        assert_eq!(format!("{:?}", credential("hunter2")), "Credential(<redacted>)");
    }
}
