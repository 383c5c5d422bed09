use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("transport codec error: {0}")]
    Codec(String),
}

impl From<crosstown_crypto::CryptoError> for ProtocolError {
    fn from(e: crosstown_crypto::CryptoError) -> Self {
        match e {
            crosstown_crypto::CryptoError::InvalidSignature => ProtocolError::SignatureInvalid,
            crosstown_crypto::CryptoError::DecryptionFailed => {
                ProtocolError::DecryptionFailed(e.to_string())
            }
            other => ProtocolError::DecryptionFailed(other.to_string()),
        }
    }
}
