//! Access policy evaluation.
//!
//! Pure functions deciding whether a requester may reach an endpoint. Every
//! listing, detail and mutating handler calls [`authorize`] before it reads
//! the body or touches the directory.

use crate::error::AppError;
use apishield_common::{Identity, UserId};

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allow: bool,
}

impl AccessDecision {
    const ALLOW: AccessDecision = AccessDecision { allow: true };
    const DENY: AccessDecision = AccessDecision { allow: false };

    fn from_bool(allow: bool) -> Self {
        if allow {
            Self::ALLOW
        } else {
            Self::DENY
        }
    }
}

/// Rule attached to an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// No requester needed
    Public,
    /// Any authenticated requester
    AnySession,
    AdminOnly,
    /// Admins, or the requester whose id is the target. `None` is a target
    /// id that failed canonicalization; only admins get past it.
    SelfOrAdmin(Option<UserId>),
}

/// The user resource endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    CreateUser,
    ListUsers,
    GetUser,
    UpdateUser,
    DeleteUser,
    Login,
    Me,
    Logout,
}

impl Endpoint {
    /// Fixed endpoint-to-rule table; `target` is the canonical path id, if any
    pub fn rule(self, target: Option<UserId>) -> Rule {
        match self {
            Endpoint::CreateUser
            | Endpoint::ListUsers
            | Endpoint::UpdateUser
            | Endpoint::DeleteUser => Rule::AdminOnly,
            Endpoint::GetUser => Rule::SelfOrAdmin(target),
            Endpoint::Login => Rule::Public,
            Endpoint::Me | Endpoint::Logout => Rule::AnySession,
        }
    }
}

/// Canonical form of a path id: a positive integer, or nothing
pub fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}

pub fn is_admin_only(requester: Option<&Identity>) -> AccessDecision {
    AccessDecision::from_bool(requester.is_some_and(|r| r.is_admin))
}

pub fn is_self_or_admin(requester: Option<&Identity>, target: Option<UserId>) -> AccessDecision {
    AccessDecision::from_bool(requester.is_some_and(|r| {
        r.is_admin || target.is_some_and(|target| r.id == target)
    }))
}

pub fn any_session(requester: Option<&Identity>) -> AccessDecision {
    AccessDecision::from_bool(requester.is_some())
}

pub fn evaluate(requester: Option<&Identity>, rule: Rule) -> AccessDecision {
    match rule {
        Rule::Public => AccessDecision::ALLOW,
        Rule::AnySession => any_session(requester),
        Rule::AdminOnly => is_admin_only(requester),
        Rule::SelfOrAdmin(target) => is_self_or_admin(requester, target),
    }
}

/// Evaluate `rule`, turning a denial into the matching error
///
/// A missing session on an `AnySession` endpoint is an authentication
/// problem (401); every other denial is 403.
pub fn authorize(requester: Option<&Identity>, rule: Rule) -> Result<(), AppError> {
    if evaluate(requester, rule).allow {
        return Ok(());
    }

    metrics::counter!(crate::metrics::ACCESS_DENIED).increment(1);
    tracing::info!(
        requester = requester.map(|r| r.id),
        ?rule,
        "access denied"
    );

    match rule {
        Rule::AnySession => Err(AppError::Unauthorized),
        _ => Err(AppError::Forbidden),
    }
}
