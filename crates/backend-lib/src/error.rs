// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// The access policy denied the request
    #[error("Access denied")]
    Forbidden,

    /// Missing session, bad credentials, or an unusable token
    #[error("Authentication failed")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Forbidden => "AUTHZ_001",
            AppError::Unauthorized => "AUTH_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Conflict(_) => "CONFLICT_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Hash(_) => "AUTH_002",
            AppError::Token(_) => "AUTH_003",
            AppError::Internal(_) => "INT_001",
            AppError::Config(_) => "CFG_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Message safe to hand to clients; never carries internal detail
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Forbidden => "Access denied".to_string(),
            AppError::Unauthorized => "Authentication failed".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Conflict(field) => format!("A user with this {field} already exists"),
            AppError::InvalidInput(reason) => reason.clone(),
            AppError::Hash(_)
            | AppError::Token(_)
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Json(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // The one place unexpected failures get logged
        if status.is_server_error() {
            tracing::error!(error = %self, code = error_code, "request failed");
        } else {
            tracing::debug!(error = %self, code = error_code, "request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": self.sanitized_message(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::RecordNotFound(id) => AppError::NotFound(format!("user {id}")),
            DirectoryError::Duplicate(field) => AppError::Conflict(field.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
