pub mod aggregator;
pub mod candidate;
pub mod error;
pub mod source;

pub use aggregator::PeerAggregator;
pub use candidate::{PeerCandidate, RawPeerEntry};
pub use error::DiscoveryError;
pub use source::{complete, ConfigSource, GenesisSource, PeerSource, RegistrySource};
