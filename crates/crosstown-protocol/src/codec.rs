//! CBOR transport framing — the compact encoding of a signed event carried
//! as the `data` payload inside a payment packet.
//!
//! This is the crate's working default for the two injected callbacks
//! spec.md §9 describes ("the same event can be encoded into multiple wire
//! formats by different protocol revisions"); `crosstown-node`'s facade
//! still accepts an override pair at construction time.

use crate::error::ProtocolError;
use crate::event::SignedEvent;

pub fn encode_to_transport(event: &SignedEvent) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    ciborium::into_writer(event, &mut buf).map_err(|e| ProtocolError::Codec(e.to_string()))?;
    Ok(buf)
}

pub fn decode_from_transport(bytes: &[u8]) -> Result<SignedEvent, ProtocolError> {
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::Codec(e.to_string()))
}

/// Function-pointer pair shape matching the host-injectable transport
/// encoder/decoder spec.md §6.4 describes. `crosstown-node::NodeConfig`
/// defaults this to [`encode_to_transport`]/[`decode_from_transport`].
pub type TransportEncoder = fn(&SignedEvent) -> Result<Vec<u8>, ProtocolError>;
pub type TransportDecoder = fn(&[u8]) -> Result<SignedEvent, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crosstown_crypto::Identity;

    #[test]
    fn transport_roundtrip_preserves_id_and_sig() {
        let id = Identity::generate();
        let event = crate::event::build_deregistration_event(&id, 42);
        let bytes = encode_to_transport(&event).unwrap();
        let decoded = decode_from_transport(&bytes).unwrap();
        assert_eq!(decoded.id, event.id);
        assert_eq!(decoded.sig, event.sig);
        decoded.verify().unwrap();
    }

    #[test]
    fn transport_roundtrip_preserves_tags_and_content() {
        let id = Identity::generate();
        let peer_info = crate::event::PeerInfo {
            ilp_address: "g.peer1".into(),
            btp_endpoint: "ws://peer:3000".into(),
            asset_code: "USD".into(),
            asset_scale: 9,
            supported_chains: None,
            settlement_addresses: None,
            preferred_tokens: None,
            token_networks: None,
        };
        let event = crate::event::build_peer_info_event(&peer_info, &id, 100);
        let bytes = encode_to_transport(&event).unwrap();
        let decoded = decode_from_transport(&bytes).unwrap();
        assert_eq!(decoded, event);
    }
}
