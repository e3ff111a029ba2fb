use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized - access token may be expired")]
    Unauthorized,

    #[error("No active session - sign in first")]
    NotSignedIn,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!("{}... (truncated, {} total bytes)",
                    &body[..MAX_ERROR_BODY_LENGTH],
                    body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            // The auth backend reports bad credentials and consumed refresh
            // tokens as 400 with a grant error in the body
            400 if body.contains("invalid_grant") || body.contains("Invalid login credentials") => {
                AuthError::InvalidCredentials
            }
            401 => AuthError::Unauthorized,
            429 => AuthError::RateLimited,
            500..=599 => AuthError::ServerError(truncated),
            _ => AuthError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_auth_failures() {
        assert!(matches!(
            AuthError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_status(StatusCode::UNAUTHORIZED, ""),
            AuthError::Unauthorized
        ));
        assert!(matches!(
            AuthError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            AuthError::RateLimited
        ));
        assert!(matches!(
            AuthError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            AuthError::ServerError(_)
        ));
        // A 400 without a grant error is not a credentials failure
        assert!(matches!(
            AuthError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"validation_failed"}"#),
            AuthError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        match AuthError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            AuthError::ServerError(msg) => {
                assert!(msg.len() < body.len());
                assert!(msg.contains("truncated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
