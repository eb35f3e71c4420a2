//! Bearer token authentication middleware for the embed route.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use super::routes::ApiError;
use crate::error::TensorError;

/// Shared auth state injected via axum middleware state.
#[derive(Clone)]
pub struct AuthState {
    pub token: String,
}

/// Auth middleware validating `Authorization: Bearer <token>`.
///
/// The scheme prefix is stripped and the remaining token compared in
/// constant time against the configured key; anything else is a 401.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if let Some(header) = headers.get("authorization") {
        if let Ok(value) = header.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                if bool::from(token.as_bytes().ct_eq(auth.token.as_bytes())) {
                    return next.run(request).await;
                }
            }
        }
    }

    ApiError::from(TensorError::Unauthorized).into_response()
}
