//! Remote authority error types.

use thiserror::Error;

/// Errors from the remote query surface.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("Remote request failed: {0}")]
    RequestFailed(String),

    /// The server answered with a non-success status.
    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request timed out.
    #[error("Remote request timed out after {0}ms")]
    Timeout(u64),

    /// Server unreachable.
    #[error("Remote authority unavailable: {0}")]
    Unavailable(String),

    /// Response body did not match the expected shape.
    #[error("Failed to decode remote response: {0}")]
    Decode(String),

    /// The server refused an operation (e.g. an intervention).
    #[error("Remote rejected the request: {0}")]
    Rejected(String),

    /// Push-channel failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(0)
        } else if err.is_connect() {
            RemoteError::Unavailable(err.to_string())
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::RequestFailed(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RemoteError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Why an inbound push frame was dropped.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Binary or control frame where text was expected.
    #[error("Unsupported frame kind: {0}")]
    Unsupported(&'static str),

    /// Not JSON, or missing the `type` discriminant.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// A `type` this client does not understand.
    #[error("Unknown message type: {0}")]
    UnknownType(String),
}
