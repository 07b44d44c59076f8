//! Authentication middleware.
//!
//! Optional static bearer-token gate. When no token is configured every
//! request passes through.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;

/// Token the middleware compares incoming bearer tokens against.
#[derive(Clone, Debug, Default)]
pub struct BearerToken(Option<Arc<str>>);

impl BearerToken {
    /// Creates a gate; `None` disables authentication.
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()).map(Arc::from))
    }

    /// Whether the gate is active.
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Checks a presented token against the configured one.
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (None, _) => true,
            (Some(expected), Some(given)) => expected.as_ref() == given,
            (Some(_), None) => false,
        }
    }
}

/// Authentication middleware handler.
///
/// Rejects the request with `401` when a token is configured and the
/// `Authorization: Bearer` header is missing or does not match.
pub async fn auth_middleware(
    State(token): State<BearerToken>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !token.accepts(extract_bearer_token(&req)) {
        tracing::debug!(uri = %req.uri(), "rejected request without valid bearer token");
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header.
pub fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
