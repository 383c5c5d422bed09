use std::sync::Arc;

use crosstown_discovery::RawPeerEntry;
use crosstown_ilp::{ConnectorAdmin, PacketHandler, PacketHandlerRegistrar, PaymentRuntime};
use crosstown_protocol::{decode_from_transport, encode_to_transport, PeerInfo, SettlementPreference, TransportDecoder, TransportEncoder};

/// Construction config for [`crate::create_node`] (spec.md §6.4). Required
/// fields are constructor arguments; everything spec.md marks optional is
/// defaulted inline in [`NodeConfig::new`] and can be overridden by
/// assigning the public field afterwards, matching this codebase's
/// `P2pConfig` convention of a thin constructor plus public fields rather
/// than a chained builder.
pub struct NodeConfig {
    pub secret_key: [u8; 32],
    pub ilp_info: PeerInfo,
    pub relay_url: String,
    pub own_ilp_address: String,
    pub connector: Arc<dyn ConnectorAdmin>,
    pub payment_runtime: Arc<dyn PaymentRuntime>,

    pub transport_encoder: TransportEncoder,
    pub transport_decoder: TransportDecoder,

    pub known_peers: Vec<RawPeerEntry>,
    pub genesis_peers: Vec<RawPeerEntry>,
    pub ardrive_enabled: bool,
    pub registry_url: Option<String>,
    pub default_relay_url: Option<String>,
    pub base_price_per_byte: u64,
    pub query_timeout_ms: u64,
    pub default_timeout_ms: u64,
    pub settlement_info: Option<SettlementPreference>,
    /// Destination ILP address for the announce phase's paid write, when
    /// the configured relay charges for kind-10032 publishes. `None` means
    /// the announce event is published directly over the monitor's relay
    /// WebSocket instead (spec.md §4.6 "may itself be a paid write").
    pub relay_ilp_address: Option<String>,

    pub handle_packet: Option<Arc<dyn PacketHandler>>,
    pub packet_registrar: Option<Arc<dyn PacketHandlerRegistrar>>,

    /// Whether `connector` additionally implements channel operations
    /// (spec.md §9's capability probing: "the facade checks whether the
    /// supplied connector handle exposes `openChannel`/`getChannelState`").
    /// Rust trait objects can't be probed for a second trait at runtime
    /// without `Any`-downcasting machinery with no other caller in this
    /// crate, so the host declares this explicitly — the same shape as
    /// `ardrive_enabled` below. `false` means `Node::channel_client()`
    /// returns `None` and channel-opening phases are skipped.
    pub connector_supports_channels: bool,
}

impl NodeConfig {
    pub fn new(
        secret_key: [u8; 32],
        ilp_info: PeerInfo,
        relay_url: impl Into<String>,
        own_ilp_address: impl Into<String>,
        connector: Arc<dyn ConnectorAdmin>,
        payment_runtime: Arc<dyn PaymentRuntime>,
    ) -> Self {
        Self {
            secret_key,
            ilp_info,
            relay_url: relay_url.into(),
            own_ilp_address: own_ilp_address.into(),
            connector,
            payment_runtime,
            transport_encoder: encode_to_transport,
            transport_decoder: decode_from_transport,
            known_peers: Vec::new(),
            genesis_peers: Vec::new(),
            ardrive_enabled: true,
            registry_url: None,
            default_relay_url: None,
            base_price_per_byte: 10,
            query_timeout_ms: 5_000,
            default_timeout_ms: 30_000,
            settlement_info: None,
            relay_ilp_address: None,
            handle_packet: None,
            packet_registrar: None,
            connector_supports_channels: false,
        }
    }
}
