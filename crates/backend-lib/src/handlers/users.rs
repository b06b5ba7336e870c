// ============================
// crates/backend-lib/src/handlers/users.rs
// ============================
//! User resource handlers.
//!
//! Each operation takes the shared state and a [`RequestContext`] and returns
//! a [`Reply`] or an [`AppError`]; the HTTP layer in `router` only adapts
//! extractors to this shape. Every operation that needs a rule calls
//! [`authorize`] first, before decoding the body or touching the directory.

use crate::auth::{authorize, parse_user_id, CookieDirective, Credential, Endpoint};
use crate::directory::{NewUserRecord, UserPatch};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED, USER_CREATED, USER_DELETED, USER_UPDATED};
use crate::validation::{validate_new_user, validate_user_changes};
use crate::AppState;
use apishield_common::{Identity, LoginRequest, LoginResponse, NewUser, UserChanges, UserId};
use axum::{
    body::Bytes,
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::de::DeserializeOwned;

const MALFORMED_BODY: &str = "Invalid request body";

/// Everything a handler may look at: who is asking, the raw path id, the raw body
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub requester: Option<Identity>,
    pub path_id: Option<String>,
    pub body: Bytes,
}

impl RequestContext {
    pub fn new(requester: Option<Identity>) -> Self {
        Self {
            requester,
            ..Self::default()
        }
    }

    pub fn with_path_id(mut self, id: impl Into<String>) -> Self {
        self.path_id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn requester_id(&self) -> Option<UserId> {
        self.requester.as_ref().map(|r| r.id)
    }

    /// Canonical target id, if the path carries a valid one
    fn target(&self) -> Option<UserId> {
        self.path_id.as_deref().and_then(parse_user_id)
    }

    /// Target id of an id-scoped operation; an id that cannot exist is a miss
    fn require_target(&self) -> Result<UserId, AppError> {
        self.target().ok_or_else(|| {
            AppError::NotFound(format!(
                "user {}",
                self.path_id.as_deref().unwrap_or_default()
            ))
        })
    }

    /// Parse errors stay in the log; the client only learns the body was bad
    fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::debug!(error = %e, "request body did not decode");
            AppError::InvalidInput(MALFORMED_BODY.to_string())
        })
    }
}

/// Successful outcome of a handler
#[derive(Debug)]
pub enum Reply {
    Created(Identity),
    Users(Vec<Identity>),
    User(Identity),
    NoContent,
    LoggedIn {
        user: Identity,
        cookies: Vec<CookieDirective>,
    },
    LoggedOut {
        cookies: Vec<CookieDirective>,
    },
}

impl Reply {
    pub fn status(&self) -> StatusCode {
        match self {
            Reply::Created(_) => StatusCode::CREATED,
            Reply::Users(_) | Reply::User(_) | Reply::LoggedIn { .. } => StatusCode::OK,
            Reply::NoContent | Reply::LoggedOut { .. } => StatusCode::NO_CONTENT,
        }
    }
}

fn with_cookies(mut response: Response, cookies: &[CookieDirective]) -> Response {
    for cookie in cookies {
        match cookie.to_header_value() {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            },
            Err(e) => return e.into_response(),
        }
    }
    response
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Reply::Created(user) | Reply::User(user) => (status, Json(user)).into_response(),
            Reply::Users(users) => (status, Json(users)).into_response(),
            Reply::NoContent => status.into_response(),
            Reply::LoggedIn { user, cookies } => {
                with_cookies((status, Json(LoginResponse { user })).into_response(), &cookies)
            },
            Reply::LoggedOut { cookies } => with_cookies(status.into_response(), &cookies),
        }
    }
}

/// `POST /users`
#[tracing::instrument(skip_all, fields(requester = ctx.requester_id()))]
pub async fn create(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::CreateUser.rule(None))?;

    let body: NewUser = ctx.decode()?;
    validate_new_user(&body)?;
    let NewUser {
        username,
        email,
        password,
        is_admin,
    } = body;

    let password_hash = match password {
        Some(plain) => Some(state.hasher.hash(Credential::from(plain)).await?),
        None => None,
    };

    let created = state
        .directory
        .create(NewUserRecord {
            username,
            email,
            password_hash,
            is_admin: is_admin.unwrap_or(false),
        })
        .await?;

    counter!(USER_CREATED).increment(1);
    tracing::info!(user_id = created.id, is_admin = created.is_admin, "user created");
    Ok(Reply::Created(created))
}

/// `GET /users`
#[tracing::instrument(skip_all, fields(requester = ctx.requester_id()))]
pub async fn retrieve_all(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::ListUsers.rule(None))?;
    Ok(Reply::Users(state.directory.list().await?))
}

/// `GET /users/{id}`
#[tracing::instrument(skip_all, fields(requester = ctx.requester_id(), target = ctx.path_id.as_deref()))]
pub async fn retrieve_one(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::GetUser.rule(ctx.target()))?;

    let id = ctx.require_target()?;
    match state.directory.find_by_id(id).await? {
        Some(user) => Ok(Reply::User(user)),
        None => Err(AppError::NotFound(format!("user {id}"))),
    }
}

/// `PUT`/`PATCH /users/{id}`
#[tracing::instrument(skip_all, fields(requester = ctx.requester_id(), target = ctx.path_id.as_deref()))]
pub async fn update(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::UpdateUser.rule(ctx.target()))?;

    let id = ctx.require_target()?;
    let body: UserChanges = ctx.decode()?;
    validate_user_changes(&body)?;
    let UserChanges {
        username,
        email,
        password,
        is_admin,
    } = body;

    let password_hash = match password {
        Some(plain) => Some(state.hasher.hash(Credential::from(plain)).await?),
        None => None,
    };

    state
        .directory
        .update(
            id,
            UserPatch {
                username,
                email,
                password_hash,
                is_admin,
            },
        )
        .await?;

    counter!(USER_UPDATED).increment(1);
    tracing::info!(user_id = id, "user updated");
    Ok(Reply::NoContent)
}

/// `DELETE /users/{id}`
#[tracing::instrument(skip_all, fields(requester = ctx.requester_id(), target = ctx.path_id.as_deref()))]
pub async fn delete(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::DeleteUser.rule(ctx.target()))?;

    let id = ctx.require_target()?;
    state.directory.delete(id).await?;

    counter!(USER_DELETED).increment(1);
    tracing::info!(user_id = id, "user deleted");
    Ok(Reply::NoContent)
}

/// `POST /login`
///
/// Unknown user and wrong password fail the same way, after the same amount
/// of hashing work.
#[tracing::instrument(skip_all)]
pub async fn login(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::Login.rule(None))?;

    let body: LoginRequest = ctx.decode()?;
    let LoginRequest {
        username,
        email,
        password,
    } = body;
    let credential = Credential::from(password);

    let record = state
        .directory
        .find_for_login(username.as_deref(), email.as_deref())
        .await?;
    let (identity, hash) = match record {
        Some(record) => (Some(record.identity()), record.password_hash),
        None => (None, None),
    };

    let verified = state.hasher.verify(credential, hash).await;
    let user = match identity {
        Some(user) if verified => user,
        _ => {
            counter!(LOGIN_FAILED).increment(1);
            tracing::info!("login failed");
            return Err(AppError::Unauthorized);
        },
    };

    let token = state.tokens.issue(&user)?;
    let cookies = state.tokens.deliver(&token);

    counter!(LOGIN_SUCCEEDED).increment(1);
    tracing::info!(user_id = user.id, expires_at = token.expires_at, "login succeeded");
    Ok(Reply::LoggedIn { user, cookies })
}

/// `GET /me`
pub async fn me(_state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::Me.rule(None))?;
    ctx.requester.map(Reply::User).ok_or(AppError::Unauthorized)
}

/// `POST /logout`
///
/// Only the browser forgets the token; it stays valid until it expires.
pub async fn logout(state: &AppState, ctx: RequestContext) -> Result<Reply, AppError> {
    authorize(ctx.requester.as_ref(), Endpoint::Logout.rule(None))?;
    tracing::info!(user_id = ctx.requester_id(), "logout");
    Ok(Reply::LoggedOut {
        cookies: state.tokens.revoke(),
    })
}
