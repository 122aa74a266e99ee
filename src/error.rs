//! Domain error taxonomy shared by every engine.
//!
//! Validation, access, not-found, and conflict errors are expected control
//! flow and carry a machine-readable `code`. Internal errors are logged with
//! full context and surfaced to the client as an opaque failure.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("access denied")]
    AccessDenied,

    #[error("{what} not found")]
    NotFound { what: &'static str },

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } | Self::Conflict { code, .. } => code,
            Self::AccessDenied => "access_denied",
            Self::NotFound { .. } => "not_found",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(e: sqlx::Error) -> Self {
        Self::Internal(anyhow::Error::from(e))
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } | Self::InsufficientBalance { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Self::InsufficientBalance { balance, required } => json!({
                "error": self.to_string(),
                "code": self.code(),
                "balance": balance,
                "required": required,
            }),
            Self::Internal(e) => {
                // Full context stays in the log; the client gets an opaque body.
                error!(err = ?e, "internal error");
                json!({ "error": "internal error", "code": "internal" })
            }
            _ => json!({ "error": self.to_string(), "code": self.code() }),
        };

        (status, Json(body)).into_response()
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
