use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Queue already declared: {0}")]
    QueueExists(String),

    #[error("Invalid binding pattern: {0}")]
    InvalidPattern(String),

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
