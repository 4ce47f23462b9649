use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ModelRole;

pub type Result<T> = std::result::Result<T, ExamPrepError>;

#[derive(Debug, Error)]
pub enum ExamPrepError {
    #[error("Failed to load {role} model '{model_id}': {reason}")]
    ModelLoad {
        role: ModelRole,
        model_id: String,
        reason: String,
    },

    #[error("Error processing PDF: {0}")]
    MalformedDocument(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Model inference timed out after {} seconds", .0.as_secs())]
    InferenceTimeout(Duration),

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExamPrepError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure belongs to the caller's input rather than the system.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Model load failures block the view until the selection changes.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::ModelLoad { .. })
    }
}

impl IntoResponse for ExamPrepError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation { .. } | Self::MalformedDocument(_) => StatusCode::BAD_REQUEST,
            Self::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ModelLoad { .. } | Self::Inference(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(%status, "request failed: {}", self);
        (status, self.to_string()).into_response()
    }
}
