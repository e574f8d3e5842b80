//! Error handling for the REST surface.
//!
//! One `ApiError` enum covers the whole surface, with a stable `code`
//! string per variant and a structured JSON body. Denials deliberately
//! over-share: a 403 carries the full allow list and a 404 carries the
//! names that were available, so API callers (GPT tool integrations
//! included) can correct themselves without operator help.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::error::GraphError;
use crate::policy::{DecisionCode, PolicyError};

/// Standardized error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Names available at the scope that missed (404s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<Vec<String>>,
    /// The full allow list (403s), for client self-correction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_ranges: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid API key: {reason}")]
    InvalidApiKey { reason: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Invalid range: {message}")]
    InvalidRange { message: String },

    #[error("{kind} not found: {name}")]
    NameNotFound {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    #[error("Write denied: {reason}")]
    RangeDenied {
        reason: String,
        code: DecisionCode,
        allowed_ranges: Vec<String>,
    },

    #[error("Policy validation failed: {message}")]
    PolicyFailure { message: String },

    #[error("Graph upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> String {
        match self {
            ApiError::Unauthorized => "AUTH_REQUIRED".to_string(),
            ApiError::InvalidApiKey { .. } => "INVALID_API_KEY".to_string(),
            ApiError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED".to_string(),
            ApiError::BadRequest { .. } => "BAD_REQUEST".to_string(),
            ApiError::InvalidRange { .. } => "INVALID_RANGE_FORMAT".to_string(),
            ApiError::NameNotFound { kind, .. } => format!("{}_NOT_FOUND", kind.to_uppercase()),
            ApiError::RangeDenied { code, .. } => code.as_str().to_string(),
            ApiError::PolicyFailure { .. } => "VALIDATION_ERROR".to_string(),
            ApiError::Upstream { .. } => "GRAPH_UPSTREAM_ERROR".to_string(),
            ApiError::Internal { .. } => "INTERNAL_ERROR".to_string(),
        }
    }

    fn details(&self) -> Option<ErrorDetails> {
        match self {
            ApiError::NameNotFound { available, .. } => Some(ErrorDetails {
                available: Some(available.clone()),
                ..Default::default()
            }),
            ApiError::RangeDenied {
                reason,
                allowed_ranges,
                ..
            } => Some(ErrorDetails {
                allowed_ranges: Some(allowed_ranges.clone()),
                reason: Some(reason.clone()),
                ..Default::default()
            }),
            _ => None,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::InvalidRange { .. } => StatusCode::BAD_REQUEST,

            ApiError::Unauthorized | ApiError::InvalidApiKey { .. } => StatusCode::UNAUTHORIZED,

            ApiError::RangeDenied { .. } => StatusCode::FORBIDDEN,

            ApiError::NameNotFound { .. } => StatusCode::NOT_FOUND,

            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,

            ApiError::PolicyFailure { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match status.as_u16() {
            400..=499 => log::warn!("Client error: {} ({})", self, status),
            _ => log::error!("Server error: {} ({})", self, status),
        }

        HttpResponse::build(status).json(ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            details: self.details(),
            timestamp: chrono::Utc::now(),
        })
    }
}

// === Type Conversions ===

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DriveNotFound { name, available } => ApiError::NameNotFound {
                kind: "drive",
                name,
                available,
            },
            GraphError::ItemNotFound { name, available } => ApiError::NameNotFound {
                kind: "item",
                name,
                available,
            },
            GraphError::WorksheetNotFound { name, available } => ApiError::NameNotFound {
                kind: "worksheet",
                name,
                available,
            },
            GraphError::Upstream { status, message } => ApiError::Upstream { status, message },
            GraphError::Token(message) | GraphError::Http(message) => ApiError::Upstream {
                status: 502,
                message,
            },
            GraphError::Decode(message) => ApiError::Internal { message },
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        ApiError::PolicyFailure {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest {
            message: format!("Request validation failed: {}", errors),
        }
    }
}

/// Create a standardized success response
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "data": data,
        "timestamp": chrono::Utc::now(),
    }))
}
