//! SPSP-over-ILP handshake client and the connector-admin / payment-runtime
//! trait seams Crosstown consumes but never implements (spec.md §4.4, §6.2,
//! §6.3).

pub mod error;
pub mod http_adapters;
pub mod spsp;
pub mod traits;

pub use error::IlpError;
pub use http_adapters::{HttpConnectorAdmin, HttpPaymentRuntime};
pub use spsp::{default_spsp_price, free_when_permitted, PricingRule, SpspClient, SpspRequestParams};
pub use traits::{
    AddPeerRequest, ChannelOps, ChannelState, ConnectorAdmin, InboundPacketRequest, InboundPacketResult,
    OpenChannelRequest, OpenChannelResult, PacketHandler, PacketHandlerRegistrar, PaymentRuntime, Route,
    SendIlpPacketRequest, SendIlpPacketResult, Settlement,
};
