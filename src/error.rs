use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Per-field validation messages, keyed by the submitted field name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation timed out")]
    Timeout,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable failure kind so clients can branch without
    /// string-matching messages.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Database(_) => "database_error",
            AppError::Generation(_) => "generation_failed",
            AppError::Timeout => "timeout",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidTransition(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Validation(_) => "Invalid report data".to_string(),
            AppError::NotFound(msg) => format!("Not found: {msg}"),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".to_string()
            }
            AppError::Generation(msg) => {
                tracing::error!(error = %msg, "Report generation failed");
                "Report generation failed".to_string()
            }
            AppError::Timeout => "Report generation timed out".to_string(),
            AppError::InvalidTransition(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
        };

        let mut body = json!({
            "success": false,
            "message": message,
            "code": self.code(),
            "status": status.as_u16(),
        });

        if let AppError::Validation(field_errors) = &self {
            body["fieldErrors"] = json!(field_errors);
        }

        if let Some(trace_id) = get_trace_id() {
            body["trace_id"] = json!(trace_id);
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(pairs: &[(&str, &str)]) -> FieldErrors {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_validation_error_display() {
        let error = AppError::Validation(field_errors(&[("projectId", "too short")]));
        assert_eq!(error.to_string(), "Validation failed for 1 field(s)");
    }

    #[test]
    fn test_not_found_error_display() {
        let error = AppError::NotFound("Report REP-1".to_string());
        assert_eq!(error.to_string(), "Not found: Report REP-1");
    }

    #[test]
    fn test_generation_error_display() {
        let error = AppError::Generation("provider rejected input".to_string());
        assert_eq!(
            error.to_string(),
            "Generation failed: provider rejected input"
        );
    }

    #[test]
    fn test_error_codes() {
        let cases = vec![
            (
                AppError::Validation(FieldErrors::new()),
                "validation_failed",
            ),
            (AppError::NotFound("x".into()), "not_found"),
            (AppError::Generation("x".into()), "generation_failed"),
            (AppError::Timeout, "timeout"),
            (AppError::InvalidTransition("x".into()), "invalid_transition"),
            (AppError::Conflict("x".into()), "conflict"),
            (AppError::Internal("x".into()), "internal"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.code(), expected);
        }
    }

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (
                AppError::Validation(FieldErrors::new()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Generation("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (AppError::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected);
        }
    }

    #[test]
    fn test_validation_keeps_field_names() {
        let errors = field_errors(&[("manpower", "too short"), ("weather", "required")]);
        let error = AppError::Validation(errors);

        match error {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("manpower"));
                assert!(fields.contains_key("weather"));
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_app_result_ok() {
        fn returns_ok() -> AppResult<i32> {
            Ok(42)
        }
        assert_eq!(returns_ok().unwrap(), 42);
    }
}
