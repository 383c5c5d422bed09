use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("malformed genesis peers: {0}")]
    MalformedGenesis(String),
}
