use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::auth::BASIC_CHALLENGE;
use crate::error::Error;
use crate::types::role::ANONYMOUS;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// Paginated response for list endpoints
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<usize>,
    pub has_more: bool,
}

/// Cuts one 1-based page out of `items`.
#[must_use]
pub fn paginate<T: Serialize>(items: Vec<T>, page: usize, per_page: usize) -> PaginatedResponse<T> {
    let page = page.max(1);
    let skip = (page - 1).saturating_mul(per_page);
    let has_more = items.len() > skip.saturating_add(per_page);
    let data: Vec<T> = items.into_iter().skip(skip).take(per_page).collect();

    PaginatedResponse {
        data,
        next_page: has_more.then_some(page + 1),
        has_more,
    }
}

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Ask the client to retry with Basic credentials.
    pub challenge: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            challenge: false,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => Self::not_found(msg),
            Error::PermissionDenied { ref principal, .. } if principal == ANONYMOUS => Self {
                status: StatusCode::UNAUTHORIZED,
                message: err.to_string(),
                challenge: true,
            },
            Error::PermissionDenied { .. } => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            Error::InvalidArgument(msg) => Self::bad_request(msg),
            Error::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            Error::Disabled(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            other => {
                tracing::error!("Request failed: {other}");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        let mut response = (self.status, Json(body)).into_response();

        if self.challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }

        response
    }
}
