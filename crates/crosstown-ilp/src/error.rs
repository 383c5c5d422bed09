use thiserror::Error;

#[derive(Debug, Error)]
pub enum IlpError {
    #[error("connector admin call failed: {0}")]
    ConnectorError(String),

    #[error("SPSP handshake failed: {code}: {message}")]
    SpspFailed { code: String, message: String },

    #[error("SPSP handshake timed out")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] crosstown_protocol::ProtocolError),
}
