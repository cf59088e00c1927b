//! Model-level error types

use thiserror::Error;

/// Errors raised by the order model itself, before any network activity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Asset construction from an unrecognized image format
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Remote asset URL with a scheme other than http/https
    #[error("invalid asset url: {0}")]
    InvalidUrl(String),

    /// Proof-of-payment string with an unknown prefix
    #[error("invalid proof of payment: {0}")]
    InvalidProofOfPayment(String),

    /// A job was serialized before its images finished uploading
    #[error("image has not been uploaded: {0}")]
    ImageNotUploaded(String),
}
