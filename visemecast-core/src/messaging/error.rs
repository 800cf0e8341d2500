use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Server rejected the connection: {0}")]
    Rejected(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed packet: {0}")]
    Protocol(String),

    #[error("Not connected")]
    NotConnected,
}
