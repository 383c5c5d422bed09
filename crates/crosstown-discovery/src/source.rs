//! Peer sources: genesis (compiled-in/config-file), registry (HTTP, tolerant
//! of unavailability), and config-supplied known peers. The relay-stream
//! source lives in `crosstown-relay` (it is stateful, not a one-shot fetch).

use std::path::Path;

use async_trait::async_trait;

use crate::candidate::{PeerCandidate, RawPeerEntry};
use crate::error::DiscoveryError;

/// One-shot peer-source fetch. Implementors never retry internally —
/// the aggregator decides failure policy per source.
#[async_trait]
pub trait PeerSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawPeerEntry>, DiscoveryError>;
}

/// Static, compiled-in (or config-loaded) cold-start peer list.
#[derive(Debug, Clone, Default)]
pub struct GenesisSource {
    peers: Vec<RawPeerEntry>,
}

impl GenesisSource {
    pub fn new(peers: Vec<RawPeerEntry>) -> Self {
        Self { peers }
    }

    /// Load a genesis list from a JSON file of `RawPeerEntry` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, DiscoveryError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DiscoveryError::MalformedGenesis(e.to_string()))?;
        let peers: Vec<RawPeerEntry> =
            serde_json::from_str(&text).map_err(|e| DiscoveryError::MalformedGenesis(e.to_string()))?;
        Ok(Self { peers })
    }
}

#[async_trait]
impl PeerSource for GenesisSource {
    async fn fetch(&self) -> Result<Vec<RawPeerEntry>, DiscoveryError> {
        Ok(self.peers.clone())
    }
}

/// Fetches peers from a decentralized storage URL (HTTP GET, JSON array of
/// `RawPeerEntry`). Failure here is non-fatal at the aggregator level, but
/// this source still reports the error so the aggregator can log it.
pub struct RegistrySource {
    url: String,
    client: reqwest::Client,
}

impl RegistrySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PeerSource for RegistrySource {
    async fn fetch(&self) -> Result<Vec<RawPeerEntry>, DiscoveryError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DiscoveryError::RegistryUnavailable(e.to_string()))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| DiscoveryError::RegistryUnavailable(e.to_string()))?;
        resp.json::<Vec<RawPeerEntry>>()
            .await
            .map_err(|e| DiscoveryError::RegistryUnavailable(e.to_string()))
    }
}

/// Configuration-provided known peers — highest merge precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    peers: Vec<RawPeerEntry>,
}

impl ConfigSource {
    pub fn new(peers: Vec<RawPeerEntry>) -> Self {
        Self { peers }
    }
}

#[async_trait]
impl PeerSource for ConfigSource {
    async fn fetch(&self) -> Result<Vec<RawPeerEntry>, DiscoveryError> {
        Ok(self.peers.clone())
    }
}

/// Promote a raw entry to a full `PeerCandidate`, applying `default_relay_url`
/// when absent. Returns `None` when required fields (`ilpAddress`/
/// `btpEndpoint`) are missing — such entries are incomplete and dropped.
pub fn complete(entry: RawPeerEntry, default_relay_url: &str) -> Option<PeerCandidate> {
    let btp_endpoint = entry.btp_endpoint?;
    let ilp_address = entry.ilp_address?;
    Some(PeerCandidate {
        pubkey: entry.pubkey,
        relay_url: entry.relay_url.unwrap_or_else(|| default_relay_url.to_string()),
        btp_endpoint: Some(btp_endpoint),
        ilp_address: Some(ilp_address),
    })
}
