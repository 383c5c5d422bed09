use serde::{Deserialize, Serialize};

/// A peer known to the node but not yet peered with. Aggregator output
/// (spec.md §3 "PeerCandidate"). Exists only during a single `bootstrap()`
/// call — the orchestrator does not persist this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PeerCandidate {
    pub pubkey: String,
    pub relay_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btp_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilp_address: Option<String>,
}

/// On-disk / over-the-wire shape a genesis file or registry response uses;
/// `relay_url` is optional there since the aggregator supplies a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPeerEntry {
    pub pubkey: String,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub btp_endpoint: Option<String>,
    #[serde(default)]
    pub ilp_address: Option<String>,
}
