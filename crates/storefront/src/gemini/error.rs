//! Error types for the Gemini API client.

use thiserror::Error;

/// Errors that can occur when calling the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gemini returned an error object.
    #[error("API error ({status}): {message}")]
    Api {
        /// Google status string, e.g. `INVALID_ARGUMENT`.
        status: String,
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited")]
    RateLimited,

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response had no text (e.g. blocked by safety filters).
    #[error("empty response")]
    EmptyResponse,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

/// Error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_error_display() {
        let err = GeminiError::Api {
            status: "INVALID_ARGUMENT".to_string(),
            message: "API key not valid".to_string(),
        };
        assert_eq!(err.to_string(), "API error (INVALID_ARGUMENT): API key not valid");
    }

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.code, 400);
        assert_eq!(response.error.status, "INVALID_ARGUMENT");
    }
}
