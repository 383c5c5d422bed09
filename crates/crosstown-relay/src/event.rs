use crosstown_protocol::PeerInfo;

/// Events the monitor emits to the host (spec.md §6.5, the monitor's share
/// of the vocabulary; `crosstown-node` adds the orchestrator's own
/// `phase`/`announced`/`ready` variants on top when it forwards these).
#[derive(Debug, Clone)]
pub enum RelayEvent {
    PeerDiscovered {
        pubkey: String,
        peer_id: String,
        peer_info: PeerInfo,
        discovered_at: i64,
    },
    PeerRegistered {
        pubkey: String,
        peer_id: String,
    },
    ChannelOpened {
        pubkey: String,
        peer_id: String,
        channel_id: String,
    },
    HandshakeFailed {
        pubkey: String,
        peer_id: String,
        reason: String,
    },
    PeerDeregistered {
        pubkey: String,
        peer_id: String,
    },
}
