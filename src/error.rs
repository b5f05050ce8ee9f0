//! Error kinds surfaced by conversation operations.

use thiserror::Error;

use crate::llm::ProviderError;

/// Failure of a conversation or chat operation.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The caller supplied unusable input (e.g. a blank message).
    #[error("{0}")]
    InvalidInput(String),

    /// No conversation with this identifier exists in the session.
    #[error("conversation not found: {0}")]
    NotFound(String),

    /// The AI backend failed to produce a reply.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result type alias for conversation operations.
pub type Result<T> = std::result::Result<T, ChatError>;
