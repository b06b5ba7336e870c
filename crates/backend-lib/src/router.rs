// ============================
// apishield-backend-lib/src/router.rs
// ============================
//! HTTP router for the user resource.
use crate::auth::Requester;
use crate::error::AppError;
use crate::handlers::{users, Reply, RequestContext};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/{id}",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Bodies are taken as raw bytes: a denied request must get its 403 even when
// the body would not have parsed.

async fn create_user(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    body: Bytes,
) -> Result<Reply, AppError> {
    users::create(&state, RequestContext::new(requester).with_body(body)).await
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
) -> Result<Reply, AppError> {
    users::retrieve_all(&state, RequestContext::new(requester)).await
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    Path(id): Path<String>,
) -> Result<Reply, AppError> {
    users::retrieve_one(&state, RequestContext::new(requester).with_path_id(id)).await
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Reply, AppError> {
    let ctx = RequestContext::new(requester).with_path_id(id).with_body(body);
    users::update(&state, ctx).await
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    Path(id): Path<String>,
) -> Result<Reply, AppError> {
    users::delete(&state, RequestContext::new(requester).with_path_id(id)).await
}

async fn login(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
    body: Bytes,
) -> Result<Reply, AppError> {
    users::login(&state, RequestContext::new(requester).with_body(body)).await
}

async fn me(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
) -> Result<Reply, AppError> {
    users::me(&state, RequestContext::new(requester)).await
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Requester(requester): Requester,
) -> Result<Reply, AppError> {
    users::logout(&state, RequestContext::new(requester)).await
}
