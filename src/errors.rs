use thiserror::Error;

/// Errors emitted by the testweaver crate.
///
/// Malformed model output is deliberately *not* represented here: every
/// component recovers from it locally (single-step plan, no-op command),
/// so only unrecoverable conditions surface as errors.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Raised when an instruction or request is malformed or missing required fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Raised when the language model provider is unreachable or returns a transport failure.
    #[error("model provider failure: {0}")]
    Provider(String),

    /// Raised when the page-state extractor cannot supply a snapshot.
    #[error("surface observation failure: {0}")]
    Surface(String),
}

impl SynthError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Helper for provider-unavailable failures.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Helper for snapshot/observation failures.
    pub fn surface(message: impl Into<String>) -> Self {
        Self::Surface(message.into())
    }
}
