//! Maps [`CoreError`] to an HTTP response, per SPEC_FULL §7's status table:
//! `Validation`→400, `Authorization`→403, `NotFound`→404, `Conflict`→409,
//! `QuotaExceeded`→429, `Upstream`→502, `Cancelled`→499 (non-standard, nginx
//! convention for client-cancelled requests), `Internal`→500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use ragflow_core::error::{CoreError, ErrorKind};

use crate::dto::ApiErrorBody;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation"),
            ErrorKind::Authorization => (StatusCode::FORBIDDEN, "authorization"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
            ErrorKind::QuotaExceeded => (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded"),
            ErrorKind::Upstream => (StatusCode::BAD_GATEWAY, "upstream"),
            ErrorKind::Cancelled => (StatusCode::from_u16(499).unwrap(), "cancelled"),
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = ApiErrorBody { error: self.0.to_string(), kind };
        (status, Json(body)).into_response()
    }
}
