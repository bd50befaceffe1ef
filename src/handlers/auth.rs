//! Bearer token extractor
//!
//! Handlers that take a [`VerifiedUser`] never run for unauthenticated
//! requests, so no store access happens before authorization.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::services::auth::{AuthError, AuthProvider, Identity};

/// Identity attached to a request after successful token verification
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub Identity);

#[derive(Debug)]
pub enum AuthRejection {
    /// No `Authorization: Bearer` header, or an empty token
    MissingToken,
    /// The provider refused the token
    InvalidToken(AuthError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::MissingToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "unauthorized access" })),
            )
                .into_response(),
            AuthRejection::InvalidToken(_) => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "forbidden access" })),
            )
                .into_response(),
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for VerifiedUser
where
    S: Send + Sync,
    Arc<dyn AuthProvider>: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthRejection::MissingToken)?;

        let provider = Arc::<dyn AuthProvider>::from_ref(state);
        match provider.verify(token).await {
            Ok(identity) => Ok(VerifiedUser(identity)),
            Err(e) => {
                warn!(error = %e, path = %parts.uri.path(), "Token verification failed");
                Err(AuthRejection::InvalidToken(e))
            }
        }
    }
}
