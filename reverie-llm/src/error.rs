//! LLM error types.

use thiserror::Error;

/// Errors that can occur during text generation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed or the server answered with a transient error.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// Response body was not the expected JSON shape.
    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    /// Response text did not have the structure the caller asked for.
    #[error("LLM output validation failed: {0}")]
    SchemaValidation(String),

    /// A single attempt timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// Backend could not be reached.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// Configuration error. Never retried.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ParseError(_)
            | Self::SchemaValidation(_)
            | Self::Timeout(_)
            | Self::Unavailable(_) => true,
            Self::RetriesExhausted { .. } | Self::ConfigError(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else if err.is_decode() {
            LlmError::ParseError(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_exhaustion_are_final() {
        assert!(!LlmError::ConfigError("bad url".into()).is_retryable());
        assert!(
            !LlmError::RetriesExhausted {
                attempts: 3,
                last_error: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn transient_and_malformed_retry() {
        assert!(LlmError::Timeout(10).is_retryable());
        assert!(LlmError::ParseError("no choices".into()).is_retryable());
        assert!(LlmError::Unavailable("refused".into()).is_retryable());
    }
}
