use thiserror::Error;

/// Reasons a single blend-shape frame is dropped
#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("Failed to decode animation payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected animation payload type: {0}")]
    UnexpectedShape(&'static str),
}
