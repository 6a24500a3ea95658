use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::extract_basic_credentials;
use crate::server::AppState;
use crate::types::Principal;

/// The principal a request acts as. Requests without an Authorization
/// header are anonymous; bad credentials are rejected outright.
pub struct CurrentPrincipal(pub Principal);

#[derive(Debug)]
pub enum AuthError {
    InvalidScheme,
    InvalidCredentials,
    InternalError,
}

pub const BASIC_CHALLENGE: &str = "Basic realm=\"pkgvault\"";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static(BASIC_CHALLENGE),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentPrincipal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
        else {
            return Ok(CurrentPrincipal(Principal::anonymous()));
        };

        if !header.starts_with("Basic ") {
            return Err(AuthError::InvalidScheme);
        }
        let (username, password) =
            extract_basic_credentials(header).ok_or(AuthError::InvalidCredentials)?;

        let principal = state
            .registry
            .authenticate(&username, &password)
            .map_err(|e| {
                tracing::error!("Failed to verify credentials for {}: {e}", username);
                AuthError::InternalError
            })?
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(CurrentPrincipal(principal))
    }
}
