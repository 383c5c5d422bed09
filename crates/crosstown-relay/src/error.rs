use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("peer-info query timed out after {0}ms")]
    Timeout(u64),

    #[error("peer {0} has not been discovered yet")]
    NotDiscovered(String),

    #[error(transparent)]
    Protocol(#[from] crosstown_protocol::ProtocolError),
}
