//! The SPSP-over-ILP handshake client (spec.md §4.4): a single round trip
//! where the wire transport is a paid ILP payment packet rather than a
//! direct relay message.

use std::sync::Arc;

use base64::Engine;
use crosstown_crypto::Identity;
use crosstown_protocol::event::{SettlementPreference, SignedEvent, SpspResponsePlaintext};
use crosstown_protocol::{build_spsp_request, decode_from_transport, encode_to_transport, parse_spsp_response};

use crate::error::IlpError;
use crate::traits::{PaymentRuntime, SendIlpPacketRequest};

/// Default pricing: SPSP requests pay half of a regular paid write.
/// `base_price_per_byte` is host-configured (spec.md §6.4 default 10).
pub fn default_spsp_price(transport_byte_length: usize, base_price_per_byte: u64) -> u64 {
    let full = transport_byte_length as u64 * base_price_per_byte;
    full.div_ceil(2)
}

/// Opt-in pricing rule permitting a zero-amount SPSP packet when the
/// recipient's server accepts it for bootstrap (spec.md §9(b)). Never the
/// default — callers must construct `SpspClient` with this explicitly.
pub fn free_when_permitted(_transport_byte_length: usize, _base_price_per_byte: u64) -> u64 {
    0
}

pub type PricingRule = fn(usize, u64) -> u64;

pub struct SpspClient {
    identity: Identity,
    runtime: Arc<dyn PaymentRuntime>,
    base_price_per_byte: u64,
    pricing: PricingRule,
    /// This node's own ILP address, sent as the SPSP-Request plaintext's
    /// `destination` field (spec.md §3: "the requester's own return
    /// address") — never the recipient's address we're requesting from.
    own_ilp_address: String,
}

pub struct SpspRequestParams {
    pub amount_override: Option<u64>,
    pub timeout: Option<u64>,
    pub own_settlement_info: Option<SettlementPreference>,
}

impl Default for SpspRequestParams {
    fn default() -> Self {
        Self {
            amount_override: None,
            timeout: None,
            own_settlement_info: None,
        }
    }
}

impl SpspClient {
    pub fn new(
        identity: Identity,
        runtime: Arc<dyn PaymentRuntime>,
        base_price_per_byte: u64,
        own_ilp_address: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            runtime,
            base_price_per_byte,
            pricing: default_spsp_price,
            own_ilp_address: own_ilp_address.into(),
        }
    }

    /// Construct a client that additionally permits the 0-amount path when
    /// the recipient accepts it. The canonical default (`new`) never does
    /// this; callers opt in explicitly (spec.md §9(b)).
    pub fn with_free_path(
        identity: Identity,
        runtime: Arc<dyn PaymentRuntime>,
        base_price_per_byte: u64,
        own_ilp_address: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            runtime,
            base_price_per_byte,
            pricing: free_when_permitted,
            own_ilp_address: own_ilp_address.into(),
        }
    }

    pub async fn request_spsp_info(
        &self,
        recipient_pubkey: &str,
        recipient_ilp_address: &str,
        params: SpspRequestParams,
    ) -> Result<SpspResponsePlaintext, IlpError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let own_destination = self.own_ilp_address.clone();
        let created_at = chrono::Utc::now().timestamp();

        let (request_event, request_id) = build_spsp_request(
            recipient_pubkey,
            &self.identity,
            own_destination,
            params.own_settlement_info,
            request_id,
            created_at,
        )?;

        let transport = encode_to_transport(&request_event)?;
        let amount = params
            .amount_override
            .unwrap_or_else(|| (self.pricing)(transport.len(), self.base_price_per_byte));

        let reply = self
            .runtime
            .send_ilp_packet(SendIlpPacketRequest {
                destination: recipient_ilp_address.to_string(),
                amount,
                data: base64::engine::general_purpose::STANDARD.encode(&transport),
                timeout: params.timeout,
            })
            .await?;

        if !reply.accepted {
            return Err(IlpError::SpspFailed {
                code: reply.code.unwrap_or_else(|| "UNKNOWN".into()),
                message: reply.message.unwrap_or_else(|| "SPSP request rejected".into()),
            });
        }

        let reply_data = reply
            .data
            .ok_or_else(|| IlpError::SpspFailed {
                code: "F00".into(),
                message: "accepted reply carried no data".into(),
            })?;
        let reply_bytes = base64::engine::general_purpose::STANDARD
            .decode(&reply_data)
            .map_err(|e| IlpError::SpspFailed {
                code: "F00".into(),
                message: format!("malformed reply data: {e}"),
            })?;
        let response_event: SignedEvent = decode_from_transport(&reply_bytes)?;
        response_event.verify()?;

        let plaintext = parse_spsp_response(&response_event, &self.identity, &request_event.id)?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crosstown_protocol::event::{build_spsp_response, parse_spsp_request, SpspSettlementInfo};
    use std::sync::Mutex;

    use crate::traits::SendIlpPacketResult;

    struct FakeRuntime {
        recipient: Identity,
        reply: Mutex<Option<SpspResponsePlaintext>>,
        accepted: bool,
        seen_destination: Mutex<Option<String>>,
    }

    #[async_trait]
    impl PaymentRuntime for FakeRuntime {
        async fn send_ilp_packet(&self, req: SendIlpPacketRequest) -> Result<SendIlpPacketResult, IlpError> {
            if !self.accepted {
                return Ok(SendIlpPacketResult {
                    accepted: false,
                    code: Some("F02".into()),
                    message: Some("insufficient liquidity".into()),
                    ..Default::default()
                });
            }
            let raw = base64::engine::general_purpose::STANDARD.decode(&req.data).unwrap();
            let request_event: SignedEvent = decode_from_transport(&raw).unwrap();
            let parsed_request = parse_spsp_request(&request_event, &self.recipient).unwrap();
            assert!(!parsed_request.request_id.is_empty());
            *self.seen_destination.lock().unwrap() = Some(parsed_request.destination.clone());

            let plaintext = self.reply.lock().unwrap().take().unwrap();
            let response_event =
                build_spsp_response(&request_event, &plaintext, &self.recipient, 2_000).unwrap();
            let bytes = encode_to_transport(&response_event).unwrap();
            Ok(SendIlpPacketResult {
                accepted: true,
                data: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn successful_handshake_returns_plaintext() {
        let requester = Identity::generate();
        let recipient = Identity::generate();
        let reply = SpspResponsePlaintext {
            destination_account: "g.recipient.~1234".into(),
            shared_secret: "c2VjcmV0".into(),
            settlement: Some(SpspSettlementInfo {
                negotiated_chain: Some("evm:base:84532".into()),
                settlement_address: None,
                token_address: None,
                token_network_address: None,
                channel_id: Some("ch-1".into()),
            }),
        };
        let runtime = Arc::new(FakeRuntime {
            recipient: recipient.clone(),
            reply: Mutex::new(Some(reply.clone())),
            accepted: true,
            seen_destination: Mutex::new(None),
        });
        let client = SpspClient::new(requester, runtime.clone(), 10, "g.requester");
        let result = client
            .request_spsp_info(recipient.pubkey_hex(), "g.peer1", SpspRequestParams::default())
            .await
            .unwrap();
        assert_eq!(result, reply);
        // The request's own return address must be the requester's address,
        // never the recipient's (spec.md §3: "the requester's own return
        // address") — `g.peer1` is the recipient's ILP address, passed only
        // as the payment destination, and must never leak into the plaintext.
        assert_eq!(runtime.seen_destination.lock().unwrap().as_deref(), Some("g.requester"));
    }

    #[tokio::test]
    async fn rejected_packet_surfaces_spsp_failed() {
        let requester = Identity::generate();
        let recipient = Identity::generate();
        let runtime = Arc::new(FakeRuntime {
            recipient: recipient.clone(),
            reply: Mutex::new(None),
            accepted: false,
            seen_destination: Mutex::new(None),
        });
        let client = SpspClient::new(requester, runtime, 10, "g.requester");
        let err = client
            .request_spsp_info(recipient.pubkey_hex(), "g.peer1", SpspRequestParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IlpError::SpspFailed { code, .. } if code == "F02"));
    }

    #[test]
    fn pricing_is_half_of_full_and_rounds_up() {
        assert_eq!(default_spsp_price(9, 10), 45);
        assert_eq!(default_spsp_price(3, 1), 2);
    }

    #[test]
    fn free_path_is_always_zero() {
        assert_eq!(free_when_permitted(9, 10), 0);
    }
}
