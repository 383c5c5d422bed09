//! Relay wire protocol, one-shot peer-info queries and the long-lived
//! relay monitor that owns Crosstown's discovered-set and peered-set
//! (spec.md §4.5).

pub mod discovered;
pub mod error;
pub mod event;
pub mod monitor;
pub mod query;
pub mod wire;

pub use discovered::{peer_id_for, DiscoveredPeer};
pub use error::RelayError;
pub use event::RelayEvent;
pub use monitor::{PeeringOutcome, RelayMonitor};
pub use query::{publish_event, query_peer_info};
pub use wire::{close_message, parse_relay_message, publish_message, req_message, Filter, RelayMessage};
