//! Requester extraction.
//!
//! Turns the session cookie (or an `Authorization: Bearer` header) into the
//! identity of whoever is calling. A missing, tampered or expired token just
//! means "anonymous"; the access policy decides what anonymous may do.

use crate::AppState;
use apishield_common::Identity;
use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use std::{convert::Infallible, sync::Arc};

/// Identity attached to the current request, if any
#[derive(Debug, Clone, Default)]
pub struct Requester(pub Option<Identity>);

/// Raw token from the named cookie, falling back to a bearer header
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

impl FromRequestParts<Arc<AppState>> for Requester {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = token_from_headers(&parts.headers, state.tokens.cookie_name())
            .and_then(|token| state.tokens.verify(&token));
        Ok(Requester(identity))
    }
}
