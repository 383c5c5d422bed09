//! Composition Facade (spec.md §4.7): wires the discovery aggregator, SPSP
//! client, relay monitor and bootstrap orchestrator into a single node
//! handle with a minimal public surface — `create_node(config)` returning
//! `{start(), stop(), bootstrap_service, relay_monitor, channel_client}`.

pub mod config;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod phase;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crosstown_crypto::Identity;
use crosstown_discovery::{ConfigSource, GenesisSource, PeerAggregator, RegistrySource};
use crosstown_ilp::{ConnectorAdmin, SpspClient};
use crosstown_relay::RelayMonitor;

pub use config::NodeConfig;
pub use error::{CrosstownError, OrchestratorError};
pub use event::NodeEvent;
pub use orchestrator::Orchestrator;
pub use phase::{PeeringResult, Phase};

/// Return value of [`Node::start`] (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct NodeStartResult {
    pub bootstrap_results: Vec<PeeringResult>,
    pub peer_count: usize,
    pub channel_count: usize,
}

/// A composed Crosstown node. Cheap to clone the handles it exposes
/// (`relay_monitor`, `bootstrap_service`) — `Node` itself owns the
/// double-start guard and the unified event stream.
pub struct Node {
    bootstrap_service: Arc<Orchestrator>,
    relay_monitor: RelayMonitor,
    channel_client: Option<Arc<dyn ConnectorAdmin>>,
    connector: Arc<dyn ConnectorAdmin>,
    handle_packet: Option<Arc<dyn crosstown_ilp::PacketHandler>>,
    packet_registrar: Option<Arc<dyn crosstown_ilp::PacketHandlerRegistrar>>,
    event_tx: broadcast::Sender<NodeEvent>,
    started: AtomicBool,
}

impl Node {
    /// Subscribe to the node's unified event stream (spec.md §6.5): phase
    /// transitions and announce outcomes from the orchestrator, merged with
    /// discovery/registration/channel/deregistration events forwarded from
    /// the relay monitor, in production order.
    pub fn events(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_tx.subscribe()
    }

    pub fn bootstrap_service(&self) -> &Orchestrator {
        &self.bootstrap_service
    }

    pub fn relay_monitor(&self) -> &RelayMonitor {
        &self.relay_monitor
    }

    /// `Some` only when the host declared `connector_supports_channels` at
    /// construction (spec.md §9's capability probing).
    pub fn channel_client(&self) -> Option<&Arc<dyn ConnectorAdmin>> {
        self.channel_client.as_ref()
    }

    /// Run bootstrap, then start the relay monitor excluding every pubkey
    /// bootstrap already peered with. Refuses a second call with
    /// [`CrosstownError::Config`] and performs no side effect on repeat
    /// (spec.md §8.2 S6).
    pub async fn start(&self) -> Result<NodeStartResult, CrosstownError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CrosstownError::Config("already started".into()));
        }

        if let (Some(registrar), Some(handler)) = (&self.packet_registrar, &self.handle_packet) {
            registrar
                .set_packet_handler(handler.clone())
                .await
                .map_err(CrosstownError::Connector)?;
        }

        let bootstrap_results = self.bootstrap_service.bootstrap().await?;
        let exclude: HashSet<String> = bootstrap_results.iter().map(|r| r.pubkey.clone()).collect();
        self.relay_monitor.start(exclude).await?;

        let peer_count = bootstrap_results.iter().filter(|r| r.registered).count();
        let channel_count = bootstrap_results.iter().filter(|r| r.channel_id.is_some()).count();
        Ok(NodeStartResult {
            bootstrap_results,
            peer_count,
            channel_count,
        })
    }

    /// Close the relay monitor's subscription. Idempotent and safe to call
    /// when the node was never started (spec.md §4.7, §5's cancellation
    /// contract — no timeout, in-flight `peer_with` calls may still
    /// complete).
    pub async fn stop(&self) {
        self.relay_monitor.unsubscribe().await;
    }

    /// Never used by the core itself — kept so `connector` isn't a dead
    /// field; hosts building their own admin surface on top of a `Node`
    /// can reach the same connector handle the orchestrator/monitor use.
    pub fn connector(&self) -> &Arc<dyn ConnectorAdmin> {
        &self.connector
    }
}

/// Build a [`Node`] from [`NodeConfig`] (spec.md §4.7). Fails only on
/// invalid configuration — an unparsable secret key — per spec.md §4.6's
/// failure table ("Invalid secret key provided at construction: Fatal").
pub fn create_node(config: NodeConfig) -> Result<Node, CrosstownError> {
    let identity = Identity::from_secret_bytes(&config.secret_key)
        .map_err(|e| CrosstownError::Config(format!("invalid secret key: {e}")))?;

    let (event_tx, _) = broadcast::channel(512);

    let spsp_client = Arc::new(SpspClient::new(
        identity.clone(),
        Arc::clone(&config.payment_runtime),
        config.base_price_per_byte,
        config.own_ilp_address.clone(),
    ));

    let relay_monitor = RelayMonitor::new(
        identity.clone(),
        config.relay_url.clone(),
        Arc::clone(&config.connector),
        spsp_client,
        config.default_timeout_ms,
    );

    // Bridge the monitor's own broadcast channel onto the node's unified
    // stream for the whole lifetime of the node — this task runs before,
    // during and after `bootstrap()`, since `RelayMonitor::peer_with_info`
    // emits on it regardless of whether `start()` has subscribed the
    // long-lived relay stream yet.
    let mut monitor_rx = relay_monitor.subscribe();
    let forward_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Ok(event) = monitor_rx.recv().await {
            if forward_tx.send(NodeEvent::from(event)).is_err() {
                break;
            }
        }
    });

    let genesis = GenesisSource::new(config.genesis_peers.clone());
    let registry = config.registry_url.as_ref().map(|url| RegistrySource::new(url.clone()));
    let config_source = ConfigSource::new(config.known_peers.clone());
    let default_relay_url = config.default_relay_url.clone().unwrap_or_else(|| config.relay_url.clone());
    let aggregator = PeerAggregator::new(genesis, registry, config_source, default_relay_url);

    let bootstrap_service = Arc::new(Orchestrator::new(
        identity,
        config.ilp_info.clone(),
        aggregator,
        relay_monitor.clone(),
        Arc::clone(&config.payment_runtime),
        config.transport_encoder,
        event_tx.clone(),
        config.relay_url.clone(),
        config.relay_ilp_address.clone(),
        config.base_price_per_byte,
        config.query_timeout_ms,
        config.default_timeout_ms,
    ));

    let channel_client = if config.connector_supports_channels {
        Some(Arc::clone(&config.connector))
    } else {
        None
    };

    Ok(Node {
        bootstrap_service,
        relay_monitor,
        channel_client,
        connector: config.connector,
        handle_packet: config.handle_packet,
        packet_registrar: config.packet_registrar,
        event_tx,
        started: AtomicBool::new(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crosstown_ilp::{
        AddPeerRequest, ChannelState, IlpError, OpenChannelRequest, OpenChannelResult, PaymentRuntime,
        SendIlpPacketRequest, SendIlpPacketResult,
    };
    use crosstown_protocol::PeerInfo;

    #[derive(Default)]
    struct NullConnector;

    #[async_trait]
    impl ConnectorAdmin for NullConnector {
        async fn add_peer(&self, _req: AddPeerRequest) -> Result<(), IlpError> {
            Ok(())
        }
        async fn remove_peer(&self, _id: &str) -> Result<(), IlpError> {
            Ok(())
        }
        async fn open_channel(&self, _req: OpenChannelRequest) -> Result<OpenChannelResult, IlpError> {
            Err(IlpError::ConnectorError("unsupported".into()))
        }
        async fn get_channel_state(&self, _id: &str) -> Result<ChannelState, IlpError> {
            Err(IlpError::ConnectorError("unsupported".into()))
        }
    }

    struct NullRuntime;

    #[async_trait]
    impl PaymentRuntime for NullRuntime {
        async fn send_ilp_packet(&self, _req: SendIlpPacketRequest) -> Result<SendIlpPacketResult, IlpError> {
            unreachable!("empty-bootstrap test never sends a packet")
        }
    }

    fn sample_ilp_info() -> PeerInfo {
        PeerInfo {
            ilp_address: "g.me".into(),
            btp_endpoint: "ws://me:3000".into(),
            asset_code: "USD".into(),
            asset_scale: 9,
            supported_chains: None,
            settlement_addresses: None,
            preferred_tokens: None,
            token_networks: None,
        }
    }

    #[test]
    fn invalid_secret_key_is_a_config_error() {
        let config = NodeConfig::new(
            [0u8; 32],
            sample_ilp_info(),
            "ws://home-relay/",
            "g.me",
            Arc::new(NullConnector) as Arc<dyn ConnectorAdmin>,
            Arc::new(NullRuntime) as Arc<dyn crosstown_ilp::PaymentRuntime>,
        );
        let err = create_node(config).unwrap_err();
        assert!(matches!(err, CrosstownError::Config(_)));
    }

    #[tokio::test]
    async fn empty_bootstrap_start_result_matches_spec_s1() {
        let identity = Identity::generate();
        let mut config = NodeConfig::new(
            identity.secret_key().secret_bytes(),
            sample_ilp_info(),
            "ws://home-relay/",
            "g.me",
            Arc::new(NullConnector) as Arc<dyn ConnectorAdmin>,
            Arc::new(NullRuntime) as Arc<dyn crosstown_ilp::PaymentRuntime>,
        );
        config.ardrive_enabled = false;
        config.known_peers = vec![];
        config.genesis_peers = vec![];

        let node = create_node(config).unwrap();
        let mut events = node.events();
        let result = node.start().await.unwrap();

        assert!(result.bootstrap_results.is_empty());
        assert_eq!(result.peer_count, 0);
        assert_eq!(result.channel_count, 0);

        assert!(matches!(
            events.recv().await.unwrap(),
            NodeEvent::Phase { phase: Phase::Discovering, .. }
        ));
        assert!(matches!(events.recv().await.unwrap(), NodeEvent::Phase { phase: Phase::Ready, .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            NodeEvent::Ready { peer_count: 0, channel_count: 0 }
        ));
    }

    #[tokio::test]
    async fn double_start_is_refused_with_no_side_effects() {
        let identity = Identity::generate();
        let config = NodeConfig::new(
            identity.secret_key().secret_bytes(),
            sample_ilp_info(),
            "ws://home-relay/",
            "g.me",
            Arc::new(NullConnector) as Arc<dyn ConnectorAdmin>,
            Arc::new(NullRuntime) as Arc<dyn crosstown_ilp::PaymentRuntime>,
        );
        let node = create_node(config).unwrap();
        node.start().await.unwrap();
        let err = node.start().await.unwrap_err();
        assert!(matches!(err, CrosstownError::Config(_)));
    }
}
