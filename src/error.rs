use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("{0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(DbErr),
}

/// JSON error envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            AppError::Internal(_) | AppError::Database(_) => ErrorBody {
                error: "Internal server error".to_string(),
                // Only debug builds leak the underlying cause.
                details: cfg!(debug_assertions).then(|| self.to_string()),
            },
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("Resource already exists".to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Internal(format!("Upstream request failed: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_carry_their_message() {
        let err = AppError::BadRequest("License number is required for drivers".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let body = err.body();
        assert_eq!(body.error, "License number is required for drivers");
        assert!(body.details.is_none());
    }

    #[test]
    fn internal_errors_hide_the_cause_behind_a_generic_message() {
        let err = AppError::Internal("connection reset".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().error, "Internal server error");
    }

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(AppError::Unauthorized(String::new()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden(String::new()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound(String::new()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict(String::new()).status_code(), StatusCode::CONFLICT);
    }
}
