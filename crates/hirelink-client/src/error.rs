use thiserror::Error;

/// Errors surfaced by the client core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level HTTP failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// WebSocket failure on the live channel.
    #[error("Gateway error: {0}")]
    Gateway(#[from] tokio_tungstenite::tungstenite::Error),

    /// Event encoding/decoding failure.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An operation needed a selected conversation.
    #[error("No active conversation")]
    NoActiveConversation,

    /// Refused to send an empty draft.
    #[error("Cannot send an empty message")]
    EmptyDraft,
}
