use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CryptoError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),
}
