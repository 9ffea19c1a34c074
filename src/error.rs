use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::event::EventType;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Payload does not match event type {event_type:?}: {reason}")]
    PayloadMismatch { event_type: EventType, reason: String },

    #[error("{failed} of {matched} handlers failed for event {event_id}: {messages:?}")]
    Handler {
        event_id: i64,
        matched: usize,
        failed: usize,
        messages: Vec<String>,
    },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] validator::ValidationErrors),
}

impl AppError {
    /// 是否可以通过重新投递事件恢复
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Conflict(_)
            | AppError::Transient(_)
            | AppError::Handler { .. }
            | AppError::Internal(_)
            | AppError::ServiceUnavailable(_) => true,
            AppError::NotFound(_)
            | AppError::BadRequest(_)
            | AppError::PayloadMismatch { .. }
            | AppError::Serialization(_)
            | AppError::ValidatorError(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), "NOT_FOUND"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "BAD_REQUEST"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "CONFLICT"),
            AppError::Transient(msg) => {
                tracing::warn!("Transient error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    msg.clone(),
                    "TRANSIENT_ERROR",
                )
            }
            AppError::PayloadMismatch { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string(), "PAYLOAD_MISMATCH")
            }
            AppError::Handler { .. } => {
                tracing::error!("Handler error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Event handling failed".to_string(),
                    "HANDLER_ERROR",
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg.clone(),
                "SERVICE_UNAVAILABLE",
            ),
            AppError::Serialization(e) => {
                tracing::debug!("Serialization error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    "Malformed JSON".to_string(),
                    "SERIALIZATION_ERROR",
                )
            }
            AppError::ValidatorError(e) => {
                let validation_errors = e
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        (
                            field.to_string(),
                            errors
                                .iter()
                                .map(|e| {
                                    e.message
                                        .as_ref()
                                        .map(|m| m.to_string())
                                        .unwrap_or_else(|| "Invalid value".to_string())
                                })
                                .collect::<Vec<_>>(),
                        )
                    })
                    .collect::<std::collections::HashMap<String, Vec<String>>>();

                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "code": "VALIDATION_ERROR",
                            "message": "Validation failed",
                            "details": validation_errors
                        }
                    })),
                )
                    .into_response();
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

// 便利函数，用于创建常见错误
impl AppError {
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{} not found", resource))
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn transient(msg: &str) -> Self {
        Self::Transient(msg.to_string())
    }
}

// 从其他错误类型转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
