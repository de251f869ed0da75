use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

/// Structured error payload returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub error_type: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
        }
    }
}

pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const AUTHORIZATION_ERROR: &str = "AUTHORIZATION_ERROR";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const ALREADY_READ: &str = "ALREADY_READ";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Map domain errors to HTTP responses.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::BadRequest(_) => ("validation_error", error_codes::INVALID_REQUEST),
        AppError::Unauthorized => ("authentication_error", error_codes::INVALID_CREDENTIALS),
        AppError::Forbidden => ("authorization_error", error_codes::AUTHORIZATION_ERROR),
        AppError::NotFound => ("not_found_error", error_codes::RESOURCE_NOT_FOUND),
        AppError::AlreadyRead => ("conflict_error", error_codes::ALREADY_READ),
        AppError::Database(_) => ("server_error", error_codes::DATABASE_ERROR),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
            ("server_error", error_codes::INTERNAL_SERVER_ERROR)
        }
    };

    let message = err.to_string();
    let response = ErrorResponse::new(
        match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::CONFLICT => "Conflict",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        },
        &message,
        status.as_u16(),
        error_type,
        code,
    );

    (status, response)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, response) = map_error(&err);
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_404() {
        let (status, body) = map_error(&AppError::NotFound);
        assert_eq!(status.as_u16(), 404);
        assert_eq!(body.code, error_codes::RESOURCE_NOT_FOUND);
        assert_eq!(body.error_type, "not_found_error");
    }

    #[test]
    fn maps_already_read_to_conflict() {
        let (status, body) = map_error(&AppError::AlreadyRead);
        assert_eq!(status.as_u16(), 409);
        assert_eq!(body.code, error_codes::ALREADY_READ);
    }

    #[test]
    fn maps_forbidden_to_403() {
        let (status, body) = map_error(&AppError::Forbidden);
        assert_eq!(status.as_u16(), 403);
        assert_eq!(body.error, "Forbidden");
    }

    #[test]
    fn maps_config_error_to_500() {
        let (status, body) = map_error(&AppError::Config("missing".into()));
        assert_eq!(status.as_u16(), 500);
        assert!(body.message.contains("configuration"));
    }
}
