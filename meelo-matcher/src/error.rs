//! Error types for meelo-matcher
//!
//! Provider failures are local: they degrade one provider's contribution to
//! "no data" and never abort a match. Catalog failures fail the match.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of one external metadata provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network communication error (includes timeouts)
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with an unexpected status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the provider's response
    #[error("Parse error: {0}")]
    Parse(String),

    /// A feature handler returned an output of the wrong shape
    #[error("Feature {feature} returned {actual}, expected {expected}")]
    Contract {
        feature: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure talking to the catalog API
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Network(String),

    #[error("Catalog returned {status} for {route}: {body}")]
    Status {
        route: String,
        status: u16,
        body: String,
    },

    #[error("Catalog response could not be parsed: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::Parse(err.to_string())
        } else {
            CatalogError::Network(err.to_string())
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failure of a whole match
#[derive(Debug, Error)]
pub enum MatchError {
    /// Reading the entity or writing results failed
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),

    /// A match task panicked or was aborted
    #[error("Match aborted: {0}")]
    Aborted(String),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// meelo-common error
    #[error("Common error: {0}")]
    Common(#[from] meelo_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Common(meelo_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
