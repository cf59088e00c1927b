//! Client error types

use shared::ModelError;
use thiserror::Error;

/// Everything that can go wrong between building an order and holding
/// a receipt
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure reaching the platform or object storage
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform rejected the request with a structured error
    #[error("{message}")]
    Platform { code: String, message: String },

    /// The platform answered 2xx but the body is not what the protocol
    /// promises
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The operation is not valid in the order's current state
    #[error("{0}")]
    IllegalState(String),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Reading a local image file failed
    #[error("failed to read asset: {0}")]
    AssetRead(#[from] std::io::Error),

    /// Decoding or re-encoding image pixels failed
    #[error("render failed: {0}")]
    Render(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// Stored as a string so fakes can construct transport failures without
// a live reqwest error
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
