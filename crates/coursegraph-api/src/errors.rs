use thiserror::Error;

/// Failure of a single aggregation call.
///
/// Callers only ever see one of these per request, never partial data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("aggregation request failed: {0}")]
    Transport(String),
    #[error("aggregation endpoint returned HTTP {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },
    #[error("aggregation endpoint reported failure ({code}): {message}")]
    Envelope { code: String, message: String },
    #[error("failed to decode aggregation response: {0}")]
    Decode(String),
    #[error("aggregation service unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Stable machine-readable code, mirroring the backend error codes.
    pub fn code(&self) -> &str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status { code, .. } | FetchError::Envelope { code, .. } => code,
            FetchError::Decode(_) => "decode",
            FetchError::Unavailable(_) => "unavailable",
        }
    }
}
