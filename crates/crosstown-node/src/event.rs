use crosstown_protocol::PeerInfo;
use crosstown_relay::RelayEvent;

use crate::phase::Phase;

/// The full event vocabulary a host observes (spec.md §6.5): the
/// orchestrator's own `phase`/`announced`/`announce-failed`/`ready`
/// variants on top of whatever the relay monitor emits, unified onto a
/// single broadcast channel so ordering between the two is preserved
/// exactly as produced.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Phase {
        phase: Phase,
        previous_phase: Phase,
    },
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
    Announced {
        event_id: String,
    },
    AnnounceFailed {
        reason: String,
    },
    Ready {
        peer_count: usize,
        channel_count: usize,
    },
}

impl From<RelayEvent> for NodeEvent {
    fn from(e: RelayEvent) -> Self {
        match e {
            RelayEvent::PeerDiscovered { pubkey, peer_id, peer_info, discovered_at } => {
                NodeEvent::PeerDiscovered { pubkey, peer_id, peer_info, discovered_at }
            }
            RelayEvent::PeerRegistered { pubkey, peer_id } => NodeEvent::PeerRegistered { pubkey, peer_id },
            RelayEvent::ChannelOpened { pubkey, peer_id, channel_id } => {
                NodeEvent::ChannelOpened { pubkey, peer_id, channel_id }
            }
            RelayEvent::HandshakeFailed { pubkey, peer_id, reason } => {
                NodeEvent::HandshakeFailed { pubkey, peer_id, reason }
            }
            RelayEvent::PeerDeregistered { pubkey, peer_id } => NodeEvent::PeerDeregistered { pubkey, peer_id },
        }
    }
}
