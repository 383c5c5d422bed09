use crosstown_protocol::PeerInfo;

/// A peer observed via the relay monitor but not yet peered with
/// (spec.md §3). `peer_id` is the deterministic `"nostr-" + pubkey[0..16]`
/// identifier used on the connector side.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPeer {
    pub pubkey: String,
    pub peer_id: String,
    pub peer_info: PeerInfo,
    pub discovered_at: i64,
}

/// The deterministic connector-facing peer id for a pubkey.
pub fn peer_id_for(pubkey: &str) -> String {
    format!("nostr-{}", &pubkey[..16.min(pubkey.len())])
}
