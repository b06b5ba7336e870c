// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! Session token issuance, verification and cookie delivery.
//!
//! Tokens are HS256 JWTs carrying the caller's [`Identity`] (which has no
//! hash field) plus `sub`, `iat` and `exp`. The server keeps no session
//! table: a token is valid until `exp` no matter what. `revoke` only asks the
//! browser to forget the cookie; a copied token keeps working until it
//! expires.

use crate::config::{SameSite, Settings};
use crate::error::AppError;
use apishield_common::Identity;
use axum::http::HeaderValue;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the script-readable marker cookie
pub const MARKER_COOKIE_NAME: &str = "session-present";

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string, per RFC 7519
    pub sub: String,
    #[serde(flatten)]
    pub identity: Identity,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// A freshly signed token
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One `Set-Cookie` instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: &'static str,
    pub max_age: u64,
}

impl CookieDirective {
    /// Render as a `Set-Cookie` header value
    pub fn to_header_value(&self) -> Result<HeaderValue, AppError> {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}",
            self.name, self.value, self.path, self.max_age
        );
        if self.max_age == 0 {
            cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());

        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))
    }
}

/// Signs, verifies and delivers session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    cookie_name: String,
    cookie_secure: bool,
    same_site: SameSite,
    marker_cookie: bool,
}

impl TokenIssuer {
    pub fn new(settings: &Settings) -> Self {
        let secret = settings.token_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: settings.token_ttl_secs,
            cookie_name: settings.auth_cookie_name.clone(),
            cookie_secure: settings.cookie_secure,
            same_site: settings.cookie_same_site,
            marker_cookie: settings.marker_cookie,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Sign a token for `identity`, valid for the configured lifetime
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, AppError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl_secs)
            .map_err(|_| AppError::Internal("token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: identity.id.to_string(),
            identity: identity.clone(),
            iat: now,
            exp: now + ttl,
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims with the server secret
    pub fn sign(&self, claims: &Claims) -> Result<IssuedToken, AppError> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// The identity inside a valid token; `None` for anything tampered,
    /// expired, or signed with another key
    pub fn verify(&self, token: &str) -> Option<Identity> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) if data.claims.sub == data.claims.identity.id.to_string() => {
                Some(data.claims.identity)
            },
            Ok(_) => {
                tracing::debug!("token subject does not match its identity");
                None
            },
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            },
        }
    }

    /// Cookies handing `token` to the browser, out of reach of page scripts
    pub fn deliver(&self, token: &IssuedToken) -> Vec<CookieDirective> {
        let mut cookies = vec![CookieDirective {
            name: self.cookie_name.clone(),
            value: token.token.clone(),
            http_only: true,
            secure: self.cookie_secure,
            same_site: self.same_site,
            path: "/",
            max_age: self.ttl_secs,
        }];
        if self.marker_cookie {
            cookies.push(CookieDirective {
                name: MARKER_COOKIE_NAME.to_string(),
                value: "1".to_string(),
                http_only: false,
                secure: self.cookie_secure,
                same_site: self.same_site,
                path: "/",
                max_age: self.ttl_secs,
            });
        }
        cookies
    }

    /// Cookies erasing whatever `deliver` set
    pub fn revoke(&self) -> Vec<CookieDirective> {
        self.deliver(&IssuedToken {
            token: String::new(),
            expires_at: 0,
        })
        .into_iter()
        .map(|cookie| CookieDirective {
            value: String::new(),
            max_age: 0,
            ..cookie
        })
        .collect()
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("same_site", &self.same_site)
            .field("marker_cookie", &self.marker_cookie)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Settings::new(SECRET, "auth_token"))
    }

    fn identity() -> Identity {
        Identity {
            id: 5,
            username: "ana".to_string(),
            email: Some("ana@example.com".to_string()),
            is_admin: false,
        }
    }

    fn flip_payload_bit(token: &str) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut payload = URL_SAFE_NO_PAD.decode(&parts[1]).unwrap();
        // lowest bit of the last byte of the JSON payload
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        parts[1] = URL_SAFE_NO_PAD.encode(payload);
        parts.join(".")
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = issuer();
        let token = issuer.issue(&identity()).unwrap();
        assert_eq!(issuer.verify(&token.token), Some(identity()));
    }

    #[test]
    fn test_single_bit_tamper_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue(&identity()).unwrap();
        assert_eq!(issuer.verify(&flip_payload_bit(&token.token)), None);
    }

    #[test]
    fn test_forged_admin_claim_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue(&identity()).unwrap();
        let parts: Vec<&str> = token.token.split('.').collect();
        let payload = String::from_utf8(URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        let forged_payload = payload.replace("\"is_admin\":false", "\"is_admin\":true");
        assert_ne!(payload, forged_payload);
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(forged_payload),
            parts[2]
        );
        assert_eq!(issuer.verify(&forged), None);
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = issuer().issue(&identity()).unwrap();
        let other = TokenIssuer::new(&Settings::new("ffffffffffffffffffffffffffffffff", "auth_token"));
        assert_eq!(other.verify(&token.token), None);
        assert_eq!(other.verify("not.a.token"), None);
        assert_eq!(other.verify(""), None);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let expired = issuer
            .sign(&Claims {
                sub: "5".to_string(),
                identity: identity(),
                iat: now - 100,
                exp: now - 1,
            })
            .unwrap();
        assert_eq!(issuer.verify(&expired.token), None);
    }

    #[test]
    fn test_subject_must_match_identity() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let mismatched = issuer
            .sign(&Claims {
                sub: "1".to_string(),
                identity: identity(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();
        assert_eq!(issuer.verify(&mismatched.token), None);
    }

    #[test]
    fn test_payload_has_no_password_field() {
        let token = issuer().issue(&identity()).unwrap();
        let payload = token.token.split('.').nth(1).unwrap();
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(claims["username"], "ana");
        assert_eq!(claims["sub"], "5");
        assert!(claims.get("password").is_none());
        assert!(claims.get("password_hash").is_none());
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            86_400
        );
    }

    #[test]
    fn test_delivery_cookies() {
        let issuer = issuer();
        let token = issuer.issue(&identity()).unwrap();
        let cookies = issuer.deliver(&token);
        assert_eq!(cookies.len(), 2);

        let auth = cookies[0].to_header_value().unwrap();
        let auth = auth.to_str().unwrap();
        assert!(auth.starts_with(&format!("auth_token={}", token.token)));
        assert!(auth.contains("; HttpOnly"));
        assert!(auth.contains("; Secure"));
        assert!(auth.contains("; SameSite=Strict"));
        assert!(auth.contains("; Max-Age=86400"));

        let marker = cookies[1].to_header_value().unwrap();
        let marker = marker.to_str().unwrap();
        assert!(marker.starts_with("session-present=1"));
        assert!(!marker.contains("HttpOnly"));
    }

    #[test]
    fn test_marker_cookie_can_be_disabled() {
        let mut settings = Settings::new(SECRET, "auth_token");
        settings.marker_cookie = false;
        let issuer = TokenIssuer::new(&settings);
        let token = issuer.issue(&identity()).unwrap();
        assert_eq!(issuer.deliver(&token).len(), 1);
        assert_eq!(issuer.revoke().len(), 1);
    }

    #[test]
    fn test_revoke_erases_cookies() {
        let cookies = issuer().revoke();
        assert_eq!(cookies[0].name, "auth_token");
        for cookie in cookies {
            assert_eq!(cookie.value, "");
            assert_eq!(cookie.max_age, 0);
            let header = cookie.to_header_value().unwrap();
            assert!(header.to_str().unwrap().contains("Expires=Thu, 01 Jan 1970"));
        }
    }
}
