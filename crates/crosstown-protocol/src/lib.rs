//! Social event codec: the three peering-related event kinds, their
//! canonical id/signature, and CBOR transport framing.

pub mod codec;
pub mod error;
pub mod event;

pub use codec::{decode_from_transport, encode_to_transport, TransportDecoder, TransportEncoder};
pub use error::ProtocolError;
pub use event::{
    build_deregistration_event, build_peer_info_event, build_spsp_request, build_spsp_response,
    is_deregistration, parse_peer_info, parse_spsp_request, parse_spsp_response, PeerInfo,
    SettlementPreference, SignedEvent, SpspRequestPlaintext, SpspResponsePlaintext,
    SpspSettlementInfo, KIND_PEER_INFO, KIND_SPSP_REQUEST, KIND_SPSP_RESPONSE,
};
