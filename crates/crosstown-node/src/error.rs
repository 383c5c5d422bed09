use thiserror::Error;

/// Errors escaping `Orchestrator::bootstrap` itself (spec.md §4.6's
/// failure table: everything else in the per-candidate pipeline is caught
/// and demoted to a logged warning + emitted event instead).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("bootstrap already started for this node")]
    AlreadyStarted,

    #[error(transparent)]
    InvalidIdentity(#[from] crosstown_crypto::CryptoError),
}

/// The crate-level error `create_node`/`Node::start` can return (spec.md
/// §7's propagation policy: invalid configuration, double-start, and
/// catastrophic connector failures only).
#[derive(Debug, Error)]
pub enum CrosstownError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Bootstrap(#[from] OrchestratorError),

    #[error("connector handle failed catastrophically: {0}")]
    Connector(#[from] crosstown_ilp::IlpError),

    #[error(transparent)]
    Relay(#[from] crosstown_relay::RelayError),
}
