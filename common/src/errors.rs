//! Application error types.
//!
//! Every layer returns [`AppResult`]; handlers let axum turn the error into the
//! standard [`ApiResponse`] envelope with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// The logical database name is neither declared nor discovered.
    #[error("database '{0}' not found")]
    UnknownDatabase(String),

    #[error("table '{table}' not found in database '{database}'")]
    TableNotFound { database: String, table: String },

    #[error("{table} record {id} not found")]
    RecordNotFound { table: String, id: u64 },

    /// A connection handle could not be opened or pinged.
    #[error("unable to connect: {0}")]
    ConnectionFailure(String),

    /// The schema catalog query failed.
    #[error("database discovery failed: {0}")]
    DiscoveryFailure(String),

    /// An ad-hoc statement contained a denylisted keyword.
    #[error("query type '{0}' is not allowed")]
    ForbiddenStatement(String),

    /// The database rejected the statement.
    #[error("query execution failed: {0}")]
    QueryFailure(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error code placed in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnknownDatabase(_) => "DATABASE_NOT_FOUND",
            AppError::TableNotFound { .. } => "TABLE_NOT_FOUND",
            AppError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            AppError::ConnectionFailure(_) => "CONNECTION_FAILURE",
            AppError::DiscoveryFailure(_) => "DISCOVERY_FAILURE",
            AppError::ForbiddenStatement(_) => "FORBIDDEN_STATEMENT",
            AppError::QueryFailure(_) => "QUERY_FAILURE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnknownDatabase(_)
            | AppError::TableNotFound { .. }
            | AppError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ConnectionFailure(_) | AppError::DiscoveryFailure(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::ForbiddenStatement(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::QueryFailure(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "an internal error occurred".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::warn!(code = other.code(), error = %other, "request failed");
                }
                other.to_string()
            }
        };

        (status, Json(ApiResponse::err(self.code(), message))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => AppError::ConnectionFailure(e.to_string()),
            other => AppError::QueryFailure(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
