//! External interfaces the core consumes but never implements: the
//! connector's admin surface (spec.md §6.2) and the payment-sending path
//! (spec.md §6.3). Hosts supply concrete adapters at `create_node` time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::IlpError;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Route {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settlement {
    pub preference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_network_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_deposit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AddPeerRequest {
    pub id: String,
    pub url: String,
    pub auth_token: String,
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenChannelRequest {
    pub peer_id: String,
    pub chain: String,
    pub peer_address: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenChannelResult {
    pub channel_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelState {
    pub channel_id: String,
    pub status: String,
    pub chain: String,
}

/// The peering/routing surface consumed from the external connector.
/// `remove_peer`/`open_channel`/`get_channel_state` are optional
/// capabilities — a connector handle that doesn't implement channel
/// management simply never has those methods called (spec.md §9's
/// capability-probing design note; modeled here as always-present methods
/// on the trait with a default that reports "unsupported", so the facade's
/// capability probe is a constructor-time decision about which concrete
/// type to wrap rather than a runtime trait-object check).
#[async_trait]
pub trait ConnectorAdmin: Send + Sync {
    async fn add_peer(&self, req: AddPeerRequest) -> Result<(), IlpError>;

    async fn remove_peer(&self, id: &str) -> Result<(), IlpError>;

    async fn open_channel(&self, req: OpenChannelRequest) -> Result<OpenChannelResult, IlpError>;

    async fn get_channel_state(&self, channel_id: &str) -> Result<ChannelState, IlpError>;
}

/// Marker trait a `ConnectorAdmin` implementation opts into when it
/// genuinely supports channel operations — `crosstown-node`'s facade
/// probes for this at construction time (spec.md §9's capability probing)
/// to decide whether `channelClient` is populated.
pub trait ChannelOps: ConnectorAdmin {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SendIlpPacketRequest {
    pub destination: String,
    pub amount: u64,
    /// Base64-encoded transport bytes.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SendIlpPacketResult {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<String>,
    /// Base64-encoded reply transport bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The payment-sending path consumed from the host's runtime. The wire
/// field for success may be named `accepted` or `fulfilled` upstream —
/// normalizing that is the host adapter's job; this trait only sees the
/// normalized `accepted` flag.
#[async_trait]
pub trait PaymentRuntime: Send + Sync {
    async fn send_ilp_packet(&self, req: SendIlpPacketRequest) -> Result<SendIlpPacketResult, IlpError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundPacketRequest {
    pub destination: String,
    pub amount: u64,
    /// Base64-encoded transport bytes.
    pub data: String,
}

/// Mirrors spec.md §6.4's `{accept: true, fulfillment}` /
/// `{accept: false, code, message, data?}` shape; kept as a plain Rust enum
/// since this trait is implemented in-process by the host, never carried
/// over HTTP by this crate's own adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InboundPacketResult {
    Accept { fulfillment: String },
    Reject {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
}

/// The host's inbound-payment callback (spec.md §6.4's `handlePacket`).
/// The core never calls this itself — it only hands the `Arc` to
/// `connector.set_packet_handler` at `start()` time.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle(&self, req: InboundPacketRequest) -> InboundPacketResult;
}

/// Upcall a `ConnectorAdmin` implementation additionally supports to
/// register the host's inbound-payment handler (spec.md §6.4:
/// "connector... exposing... a `setPacketHandler(handler)` upcall").
/// Kept as a separate trait rather than a `ConnectorAdmin` method since not
/// every admin surface needs it wired at construction time.
#[async_trait]
pub trait PacketHandlerRegistrar: Send + Sync {
    async fn set_packet_handler(&self, handler: std::sync::Arc<dyn PacketHandler>) -> Result<(), IlpError>;
}
