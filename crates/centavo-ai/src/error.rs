use thiserror::Error;

/// Failures of the AI path. Only transport and protocol errors are retried.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Gemini API key not configured. Set GEMINI_API_KEY or EXPO_PUBLIC_GEMINI_API_KEY")]
    MissingCredentials,

    #[error("Invalid AI client configuration: {0}")]
    InvalidConfig(String),

    #[error("Request has no content parts")]
    EmptyRequest,

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gemini API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode Gemini response: {0}")]
    Decode(String),

    #[error("Gemini response has no usable text")]
    NoText,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out")]
    TimedOut,

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<AiError> },

    #[error("Could not parse model output: {0}")]
    Parse(String),

    #[error("Model returned no valid {0}")]
    NoItems(&'static str),
}

impl AiError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Transport(_) | AiError::Status { .. } | AiError::Decode(_)
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AiError::MissingCredentials | AiError::InvalidConfig(_) => "configuration",
            AiError::EmptyRequest | AiError::Encode(_) => "request",
            AiError::Transport(_) => "transport",
            AiError::Status { .. } | AiError::Decode(_) => "protocol",
            AiError::NoText => "content",
            AiError::Cancelled | AiError::TimedOut => "cancellation",
            AiError::RetriesExhausted { .. } => "exhausted",
            AiError::Parse(_) | AiError::NoItems(_) => "domain",
        }
    }
}
