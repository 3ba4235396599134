//! Error taxonomy for the chat engine.
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Detected before any request is attempted; nothing is appended.
    #[error("API key is not set. Configure GEMINI_API_KEY before sending.")]
    MissingApiKey,

    /// Any failure during a model call. The orchestrator recovers from
    /// every variant of this uniformly, so the kind is not broken out.
    #[error("model request failed: {message}")]
    Model { message: String },

    #[error("failed to read attachment '{name}': {source}")]
    Attachment {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("persistence unavailable: {message}")]
    Persistence { message: String },

    #[error("session '{0}' not found")]
    SessionNotFound(String),
}
