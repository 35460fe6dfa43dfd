//! Error types for the netobject core.

use thiserror::Error;

/// Core errors that can occur while building, encoding, or parsing primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("not a version component: {0}")]
    NotAVersion(String),

    #[error("not a segment component: {0}")]
    NotASegment(String),

    #[error("malformed fragment: {0}")]
    MalformedFragment(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for fragment structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("publisher digest does not match the signing key")]
    PublisherMismatch,

    #[error("gone fragment must be empty, found {0} bytes")]
    GoneWithContent(usize),

    #[error("gone fragment must be the final segment")]
    GoneNotTerminal,

    #[error("segment {segment} is past the final segment {final_segment}")]
    PastFinalSegment { segment: u64, final_segment: u64 },

    #[error("key locator does not carry a verifiable key")]
    NoVerificationKey,

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            CoreError::InvalidName(msg)
            | CoreError::NotAVersion(msg)
            | CoreError::NotASegment(msg)
            | CoreError::MalformedFragment(msg)
            | CoreError::EncodingError(msg)
            | CoreError::DecodingError(msg) => ValidationError::StructuralError(msg),
        }
    }
}
