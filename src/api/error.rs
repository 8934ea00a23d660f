use thiserror::Error;

/// Failures surfaced by the booking portal API.
///
/// Beyond the conventional REST statuses, the portal's payments side
/// returns 402 when the operator's subscription has lapsed, 409 when a
/// write collides with a concurrent change, and 422 when validation
/// rejects a payload; list reads can see any of these through the shared
/// middleware.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired or token invalid - sign in again")]
    Unauthorized,

    #[error("Subscription lapsed - payment required: {0}")]
    PaymentRequired(String),

    #[error("Operator is not allowed to access this resource")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting concurrent change: {0}")]
    Conflict(String),

    #[error("Request rejected by validation: {0}")]
    Validation(String),

    #[error("Rate limited by the portal API")]
    RateLimited,

    #[error("Portal API server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// Response bodies end up in logs; clip them to a readable length.
const ERROR_BODY_LIMIT: usize = 300;

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = clip_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            402 => ApiError::PaymentRequired(body),
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound(body),
            409 => ApiError::Conflict(body),
            422 => ApiError::Validation(body),
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::Server { status: code, body },
            _ => ApiError::Unexpected(format!("{}: {}", status, body)),
        }
    }

    /// Whether retrying the same request can plausibly succeed.
    /// Drives the client's backoff loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited | ApiError::Server { .. })
    }
}

/// Clip a response body for error messages, keeping UTF-8 boundaries intact.
fn clip_body(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &body[..end], body.len())
}
