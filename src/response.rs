#![allow(dead_code)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::exam::ExamError;
use crate::services::curriculum::CurriculumError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Non-operational detail stays in the logs, never in the body.
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(code = %self.code, detail = %self.message, "internal error");
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::internal(format!("database error: {err}"))
    }
}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::EmptyQueue => {
                AppError::bad_request("No askable elements match the requested scope")
                    .with_code("EMPTY_QUEUE")
            }
            ExamError::SessionNotFound => AppError::not_found("Exam session not found"),
            ExamError::StaleSession => {
                AppError::conflict("Session was modified by another request; refetch and retry")
                    .with_code("STALE_SESSION")
            }
            ExamError::SessionNotActive => {
                AppError::conflict("Session is no longer active").with_code("SESSION_NOT_ACTIVE")
            }
            ExamError::Curriculum(CurriculumError::NotFound(rating)) => {
                AppError::not_found(format!("Unknown rating: {rating}"))
            }
            ExamError::Curriculum(inner) => {
                AppError::service_unavailable(format!("Curriculum unavailable: {inner}"))
                    .with_code("CURRICULUM_UNAVAILABLE")
            }
            ExamError::Storage(inner) => AppError::internal(format!("storage error: {inner}")),
            ExamError::Validation(message) => AppError::validation(message),
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
        is_operational: true,
    }
}
