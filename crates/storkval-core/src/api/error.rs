use reqwest::StatusCode;
use thiserror::Error;

/// Longest response body quoted in an error
const MAX_BODY_IN_ERROR: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 401; the token was rejected
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Rate limited by the oracle API")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            _ => ApiError::Status {
                status,
                body: clip(body),
            },
        }
    }

    /// Whether the server side failed (5xx)
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if status.is_server_error())
    }
}

fn clip(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::RateLimited));

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway: upstream down");

        assert!(!ApiError::from_status(StatusCode::FORBIDDEN, "").is_server_error());
    }

    #[test]
    fn test_long_body_is_clipped() {
        let body = "é".repeat(1000);
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::Status { body: clipped, .. } => {
                assert!(clipped.len() < 600);
                assert!(clipped.ends_with("(2000 bytes)"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
