use serde::{Deserialize, Serialize};

use crosstown_protocol::PeerInfo;

/// The bootstrap state machine's phases (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovering,
    Registering,
    Handshaking,
    Announcing,
    Ready,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Discovering => "discovering",
            Phase::Registering => "registering",
            Phase::Handshaking => "handshaking",
            Phase::Announcing => "announcing",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One candidate's outcome from the per-candidate pipeline (spec.md §4.6
/// step 5: "Append PeeringResult to the returned list regardless of
/// handshake outcome, provided peer-info was obtained").
#[derive(Debug, Clone, PartialEq)]
pub struct PeeringResult {
    pub pubkey: String,
    pub peer_id: String,
    pub peer_info: PeerInfo,
    pub registered: bool,
    pub channel_id: Option<String>,
    pub negotiated_chain: Option<String>,
    pub settlement_address: Option<String>,
}
