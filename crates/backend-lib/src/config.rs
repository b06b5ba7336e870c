// ============================
// apishield-backend-lib/src/config.rs
// ============================
//! Configuration management.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file, looked up in the working directory
pub const CONFIG_FILE: &str = "apishield.toml";
/// Prefix of environment overrides, e.g. `APISHIELD_TOKEN_TTL_SECS`
pub const ENV_PREFIX: &str = "APISHIELD_";

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_LENGTH: usize = 32;
/// Cheapest scrypt `log_n` accepted
pub const MIN_HASH_COST: u8 = 4;
/// Most expensive scrypt `log_n` accepted
pub const MAX_HASH_COST: u8 = 20;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// `SameSite` attribute of the session cookies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Admin account seeded into an empty directory at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Application settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Root of the flat-file user directory
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// HMAC secret the session tokens are signed with
    pub token_secret: String,
    /// Name of the cookie carrying the session token
    pub auth_cookie_name: String,
    /// Token lifetime in seconds; also the cookie `Max-Age`
    pub token_ttl_secs: u64,
    /// scrypt `log_n` work factor
    pub hash_cost: u8,
    /// Send cookies with the `Secure` attribute
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Also send a script-readable cookie telling the front-end a session exists
    pub marker_cookie: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            token_secret: String::new(),
            auth_cookie_name: String::new(),
            token_ttl_secs: 60 * 60 * 24, // 24h
            hash_cost: 15,
            cookie_secure: true,
            cookie_same_site: SameSite::Strict,
            marker_cookie: true,
            bootstrap_admin: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("log_level", &self.log_level)
            .field("token_secret", &"<redacted>")
            .field("auth_cookie_name", &self.auth_cookie_name)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("hash_cost", &self.hash_cost)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("marker_cookie", &self.marker_cookie)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl Settings {
    /// Defaults plus the two values that have none
    pub fn new(token_secret: impl Into<String>, auth_cookie_name: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            auth_cookie_name: auth_cookie_name.into(),
            ..Self::default()
        }
    }

    /// Load from `apishield.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load from `path` and the environment, then validate
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Provider stack: defaults, then the file, then `APISHIELD_*`, then the
    /// bare `TOKEN_SECRET` / `AUTH_COOKIE_NAME` variables.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["TOKEN_SECRET", "AUTH_COOKIE_NAME"]))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "token_secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        if self.auth_cookie_name.is_empty()
            || !self
                .auth_cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ConfigError::Invalid(
                "auth_cookie_name must be a non-empty cookie token".to_string(),
            ));
        }

        if self.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token_ttl_secs must be positive".to_string()));
        }

        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.hash_cost) {
            return Err(ConfigError::Invalid(format!(
                "hash_cost must be between {MIN_HASH_COST} and {MAX_HASH_COST}"
            )));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        // Browsers drop SameSite=None cookies that are not Secure
        if self.cookie_same_site == SameSite::None && !self.cookie_secure {
            return Err(ConfigError::Invalid(
                "cookie_same_site = none requires cookie_secure".to_string(),
            ));
        }

        if let Some(admin) = &self.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(ConfigError::Invalid(
                    "bootstrap_admin needs a username and a password".to_string(),
                ));
            }
        }

        Ok(())
    }
}
