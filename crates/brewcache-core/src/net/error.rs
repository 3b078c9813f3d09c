use thiserror::Error;

use super::Response;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Unexpected status {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Invalid response body from {url}: {reason}")]
    InvalidBody { url: String, reason: String },
}

/// Maximum length for response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    /// Build a status error from a response that was not a success.
    pub fn from_response(response: &Response) -> Self {
        let body = response.text();
        FetchError::Status {
            status: response.status,
            url: response.url.clone(),
            body: Self::truncate_body(&body),
        }
    }

    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        FetchError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_keeps_short_body() {
        let response = Response::new("https://example.com/x", 404, b"not here".to_vec());
        match FetchError::from_response(&response) {
            FetchError::Status { status, url, body } => {
                assert_eq!(status, 404);
                assert_eq!(url, "https://example.com/x");
                assert_eq!(body, "not here");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_truncates_long_body() {
        let response = Response::new("https://example.com/x", 500, vec![b'a'; 2000]);
        let message = FetchError::from_response(&response).to_string();
        assert!(message.contains("truncated, 2000 total bytes"));
        assert!(message.len() < 700);
    }
}
