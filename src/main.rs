mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use crosstown_ilp::{ConnectorAdmin, HttpConnectorAdmin, HttpPaymentRuntime, PaymentRuntime};
use crosstown_node::{create_node, NodeConfig, NodeEvent};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Assemble a [`NodeConfig`] from a loaded [`crosstown_config::Config`].
fn build_node_config(config: crosstown_config::Config) -> anyhow::Result<NodeConfig> {
    let secret_key = crosstown_config::resolve_secret_key(&config.identity)?;
    let ilp_info = crosstown_config::build_own_peer_info(&config.node);
    let settlement_info = crosstown_config::build_settlement_preference(&config.node);
    let genesis_peers = crosstown_config::load_genesis_peers(&config.discovery)?;

    let connector: Arc<dyn ConnectorAdmin> = if config.connector.supports_channels {
        Arc::new(HttpConnectorAdmin::with_channel_support(config.connector.admin_url.clone()))
    } else {
        Arc::new(HttpConnectorAdmin::new(config.connector.admin_url.clone()))
    };
    let payment_runtime: Arc<dyn PaymentRuntime> = Arc::new(HttpPaymentRuntime::new(config.connector.payment_url.clone()));

    let mut node_config = NodeConfig::new(
        secret_key,
        ilp_info,
        config.node.relay_url.clone(),
        config.node.own_ilp_address.clone(),
        connector,
        payment_runtime,
    );

    node_config.known_peers = config.discovery.known_peers;
    node_config.genesis_peers = genesis_peers;
    node_config.ardrive_enabled = config.discovery.ardrive_enabled;
    node_config.registry_url = config.discovery.registry_url;
    node_config.default_relay_url = config.discovery.default_relay_url;
    node_config.base_price_per_byte = config.node.base_price_per_byte;
    node_config.query_timeout_ms = config.node.query_timeout_ms;
    node_config.default_timeout_ms = config.node.default_timeout_ms;
    node_config.settlement_info = settlement_info;
    node_config.relay_ilp_address = config.node.relay_ilp_address;
    node_config.connector_supports_channels = config.connector.supports_channels;

    Ok(node_config)
}

fn log_event(event: &NodeEvent) {
    match event {
        NodeEvent::Phase { phase, previous_phase } => {
            tracing::info!(%phase, %previous_phase, "phase transition");
        }
        NodeEvent::PeerDiscovered { pubkey, peer_id, .. } => {
            tracing::info!(%pubkey, %peer_id, "peer discovered");
        }
        NodeEvent::PeerRegistered { pubkey, peer_id } => {
            tracing::info!(%pubkey, %peer_id, "peer registered");
        }
        NodeEvent::ChannelOpened { pubkey, peer_id, channel_id } => {
            tracing::info!(%pubkey, %peer_id, %channel_id, "channel opened");
        }
        NodeEvent::HandshakeFailed { pubkey, peer_id, reason } => {
            tracing::warn!(%pubkey, %peer_id, %reason, "handshake failed");
        }
        NodeEvent::PeerDeregistered { pubkey, peer_id } => {
            tracing::info!(%pubkey, %peer_id, "peer deregistered");
        }
        NodeEvent::Announced { event_id } => {
            tracing::info!(%event_id, "peer-info announced");
        }
        NodeEvent::AnnounceFailed { reason } => {
            tracing::warn!(%reason, "announce failed");
        }
        NodeEvent::Ready { peer_count, channel_count } => {
            tracing::info!(peer_count, channel_count, "node ready");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Start { config } => {
            let config = crosstown_config::load(config.as_deref())?;
            let node_config = build_node_config(config)?;
            let node = create_node(node_config)?;
            let mut events = node.events();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    log_event(&event);
                }
            });

            let result = node.start().await?;
            tracing::info!(
                peer_count = result.peer_count,
                channel_count = result.channel_count,
                "bootstrap complete, relay monitor running"
            );

            tokio::signal::ctrl_c().await?;
            node.stop().await;
        }
        Commands::Bootstrap { config } => {
            let config = crosstown_config::load(config.as_deref())?;
            let node_config = build_node_config(config)?;
            let node = create_node(node_config)?;
            let results = node.bootstrap_service().bootstrap().await?;
            println!("{}", serde_json::to_string_pretty(&peering_results_json(&results))?);
        }
        Commands::ShowConfig { config } => {
            let config = crosstown_config::load(config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Completions { shell } => {
            cli::print_completions(shell);
        }
    }

    Ok(())
}

/// [`crosstown_node::PeeringResult`] has no `Serialize` impl of its own
/// (spec.md §4.6 defines it as an in-process return value, not a wire
/// type) — build the printable shape by hand for the one-shot CLI command.
fn peering_results_json(results: &[crosstown_node::PeeringResult]) -> serde_json::Value {
    let items: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "pubkey": r.pubkey,
                "peerId": r.peer_id,
                "registered": r.registered,
                "channelId": r.channel_id,
                "negotiatedChain": r.negotiated_chain,
                "settlementAddress": r.settlement_address,
            })
        })
        .collect();
    serde_json::Value::Array(items)
}
