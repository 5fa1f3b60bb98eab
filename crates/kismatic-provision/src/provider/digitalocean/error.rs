//! DigitalOcean API error classification
//!
//! Errors are classified from the HTTP status and the `id` field of the
//! API's JSON error body.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// DigitalOcean error categories for retry and cleanup logic
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DoApiError {
    /// Resource was not found (safe to skip in cleanup)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Token missing, expired or lacking scope
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Request was understood but rejected (bad size, region, image, ...)
    #[error("Request rejected: {message}")]
    Unprocessable { message: String },

    /// Any other API error
    #[error("DigitalOcean API error ({status}): {message}")]
    Api {
        status: u16,
        id: Option<String>,
        message: String,
    },
}

/// JSON error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    id: Option<String>,
    message: Option<String>,
}

impl DoApiError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, DoApiError::NotFound { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            DoApiError::RateLimited => true,
            DoApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DoApiError::Unauthorized { .. } => {
                Some("Check that DO_API_TOKEN holds a valid read/write API token.")
            }
            DoApiError::RateLimited => {
                Some("DigitalOcean API rate limit hit. The operation will be retried automatically.")
            }
            DoApiError::Unprocessable { message } if message.contains("droplet limit") => {
                Some("Request a droplet limit increase or delete unused droplets.")
            }
            DoApiError::Unprocessable { .. } => {
                Some("Check that the size, image and region exist and are available together.")
            }
            _ => None,
        }
    }
}

/// Classify a failed API response from its status and body.
pub fn classify_api_error(status: StatusCode, body: &str) -> DoApiError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let id = parsed.as_ref().and_then(|b| b.id.clone());
    let message = parsed
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        });

    match (status.as_u16(), id.as_deref()) {
        (404, _) | (_, Some("not_found")) => DoApiError::NotFound { message },
        (401 | 403, _) | (_, Some("unauthorized")) => DoApiError::Unauthorized { message },
        (429, _) | (_, Some("too_many_requests")) => DoApiError::RateLimited,
        (422, _) | (_, Some("unprocessable_entity")) => DoApiError::Unprocessable { message },
        _ => DoApiError::Api {
            status: status.as_u16(),
            id,
            message,
        },
    }
}

/// Find a classified API error anywhere in an error chain.
pub fn find_api_error(error: &anyhow::Error) -> Option<&DoApiError> {
    error.chain().find_map(|cause| cause.downcast_ref::<DoApiError>())
}

/// Check if an error chain carries a retryable API error
pub fn is_retryable(error: &anyhow::Error) -> bool {
    find_api_error(error).is_some_and(DoApiError::is_retryable)
}
