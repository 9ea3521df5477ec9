//! Error taxonomy for the capture → ask → stream pipeline.
//! Settings load and per-event parse failures are recovered where they occur;
//! the rest bubble up to `Assistant::ask` and are rendered inline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistError {
    /// Settings file missing or malformed. Never surfaced; the store falls back to defaults.
    #[error("Error loading settings: {0}")]
    SettingsLoad(String),

    #[error("Failed to capture screen: {0}")]
    Capture(String),

    /// Non-2xx response from the chat endpoint. Raised before any streaming starts.
    #[error("HTTP error! status: {status}, message: {body}")]
    HttpStatus { status: u16, body: String },

    /// One SSE event could not be parsed. The reader logs it and moves on.
    #[error("Error parsing chunk: {0}")]
    StreamEventParse(String),

    #[error("{0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_carries_code_and_body() {
        let err = AssistError::HttpStatus { status: 401, body: "invalid key".into() };
        assert_eq!(err.to_string(), "HTTP error! status: 401, message: invalid key");
    }

    #[test]
    fn capture_message_prefix() {
        let err = AssistError::Capture("No screens found".into());
        assert_eq!(err.to_string(), "Failed to capture screen: No screens found");
    }
}
