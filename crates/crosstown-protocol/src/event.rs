//! Signed social events: the three peering-related kinds, their canonical
//! id hash, and the build/parse operations spec.md §4.1 names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crosstown_crypto::identity::{self, Identity};
use crosstown_crypto::{envelope, CryptoError};

use crate::error::ProtocolError;

/// Replaceable: per-author, strictly-newer `created_at` wins. Empty/missing
/// `ilpAddress` content is a deregistration signal.
pub const KIND_PEER_INFO: u32 = 10032;
/// Ephemeral, recipient-addressed via a `p` tag.
pub const KIND_SPSP_REQUEST: u32 = 23194;
/// Ephemeral, addressed back to the requester via `p`/`e` tags.
pub const KIND_SPSP_RESPONSE: u32 = 23195;

/// An immutable, signed social event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedEvent {
    /// Hex-encoded SHA-256 of the canonical serialization.
    pub id: String,
    /// Author's 64-char hex pubkey.
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    /// Hex-encoded 64-byte BIP-340 Schnorr signature over `id`.
    pub sig: String,
}

impl SignedEvent {
    pub fn tag_value<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// Recompute the canonical id and check it matches `self.id`, then verify
    /// the signature over that id. Both checks must pass for the event to be
    /// considered authentic.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        let expected_id = canonical_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content);
        if expected_id != self.id {
            return Err(ProtocolError::InvalidEvent("id does not match canonical hash".into()));
        }
        let digest = decode_id(&self.id)?;
        let sig = decode_sig(&self.sig)?;
        identity::verify(&self.pubkey, &digest, &sig).map_err(|_| ProtocolError::SignatureInvalid)
    }
}

/// Build, sign and return a `SignedEvent` with the given fields.
fn build_event(
    identity: &Identity,
    created_at: i64,
    kind: u32,
    tags: Vec<Vec<String>>,
    content: String,
) -> SignedEvent {
    let id = canonical_id(identity.pubkey_hex(), created_at, kind, &tags, &content);
    let digest = decode_id(&id).expect("canonical_id always returns 32-byte hex");
    let sig = identity.sign(&digest);
    SignedEvent {
        id,
        pubkey: identity.pubkey_hex().to_string(),
        created_at,
        kind,
        tags,
        content,
        sig: hex::encode(sig),
    }
}

/// The canonical serialization is `[0, pubkey, created_at, kind, tags, content]`
/// as a JSON array with no insignificant whitespace; `id` is its SHA-256,
/// hex-encoded.
fn canonical_id(pubkey: &str, created_at: i64, kind: u32, tags: &[Vec<String>], content: &str) -> String {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    // serde_json's Display/to_string never inserts insignificant whitespace.
    let serialized = arr.to_string();
    hex::encode(identity::sha256(serialized.as_bytes()))
}

fn decode_id(id: &str) -> Result<[u8; 32], ProtocolError> {
    let bytes = hex::decode(id).map_err(|e| ProtocolError::InvalidEvent(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ProtocolError::InvalidEvent("id must be 32 bytes".into()))
}

fn decode_sig(sig: &str) -> Result<[u8; 64], ProtocolError> {
    let bytes = hex::decode(sig).map_err(|e| ProtocolError::InvalidEvent(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ProtocolError::InvalidEvent("sig must be 64 bytes".into()))
}

// ── Peer-info event (kind 10032) ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub ilp_address: String,
    pub btp_endpoint: String,
    pub asset_code: String,
    pub asset_scale: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_chains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_addresses: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_tokens: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_networks: Option<HashMap<String, String>>,
}

/// `content` is empty or unparsable/missing `ilpAddress` → deregistration
/// sentinel. Checked *before* calling [`parse_peer_info`], which treats the
/// same condition as an error (spec.md §4.1's codec contract), so callers
/// that need to distinguish "deregister" from "malformed" check this first.
pub fn is_deregistration(content: &str) -> bool {
    if content.trim().is_empty() {
        return true;
    }
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(v) => v
            .get("ilpAddress")
            .and_then(|x| x.as_str())
            .map(str::is_empty)
            .unwrap_or(true),
        Err(_) => true,
    }
}

pub fn build_peer_info_event(peer_info: &PeerInfo, identity: &Identity, created_at: i64) -> SignedEvent {
    let content = serde_json::to_string(peer_info).expect("PeerInfo always serializes");
    build_event(identity, created_at, KIND_PEER_INFO, Vec::new(), content)
}

/// Build a deregistration event: empty content, no tags.
pub fn build_deregistration_event(identity: &Identity, created_at: i64) -> SignedEvent {
    build_event(identity, created_at, KIND_PEER_INFO, Vec::new(), String::new())
}

pub fn parse_peer_info(event: &SignedEvent) -> Result<PeerInfo, ProtocolError> {
    if event.kind != KIND_PEER_INFO {
        return Err(ProtocolError::InvalidEvent(format!(
            "expected kind {KIND_PEER_INFO}, got {}",
            event.kind
        )));
    }
    if event.content.trim().is_empty() {
        return Err(ProtocolError::InvalidEvent("empty content (deregistration)".into()));
    }
    let info: PeerInfo = serde_json::from_str(&event.content)
        .map_err(|e| ProtocolError::InvalidEvent(format!("unparsable peer-info content: {e}")))?;
    if info.ilp_address.is_empty() {
        return Err(ProtocolError::InvalidEvent("missing ilpAddress".into()));
    }
    Ok(info)
}

// ── SPSP request/response (kinds 23194 / 23195) ──────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_chains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_addresses: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_tokens: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpspRequestPlaintext {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementPreference>,
    /// The requester's own return ILP address.
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpspSettlementInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiated_chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_network_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpspResponsePlaintext {
    pub destination_account: String,
    pub shared_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SpspSettlementInfo>,
}

/// Build, encrypt and sign an SPSP-Request event addressed to `recipient_pubkey`.
/// Returns the event plus the freshly generated `requestId`.
pub fn build_spsp_request(
    recipient_pubkey: &str,
    identity: &Identity,
    destination: String,
    settlement: Option<SettlementPreference>,
    request_id: String,
    created_at: i64,
) -> Result<(SignedEvent, String), ProtocolError> {
    let plaintext = SpspRequestPlaintext {
        request_id: request_id.clone(),
        settlement,
        destination,
    };
    let plaintext_json = serde_json::to_vec(&plaintext).expect("always serializable");
    let content = envelope::encrypt(&plaintext_json, &identity.secret_key(), recipient_pubkey)?;

    let tags = vec![vec!["p".to_string(), recipient_pubkey.to_string()]];
    let event = build_event(identity, created_at, KIND_SPSP_REQUEST, tags, content);
    Ok((event, request_id))
}

/// Decrypt and parse an SPSP-Request event, for the recipient side (the
/// payment-verification server, out of scope, but the decode path is shared).
pub fn parse_spsp_request(
    event: &SignedEvent,
    local_identity: &Identity,
) -> Result<SpspRequestPlaintext, ProtocolError> {
    if event.kind != KIND_SPSP_REQUEST {
        return Err(ProtocolError::InvalidEvent(format!(
            "expected kind {KIND_SPSP_REQUEST}, got {}",
            event.kind
        )));
    }
    let plaintext = envelope::decrypt(&event.content, &local_identity.secret_key(), &event.pubkey)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| ProtocolError::InvalidEvent(format!("unparsable SPSP request: {e}")))
}

/// Build, encrypt and sign an SPSP-Response event in reply to `request`.
pub fn build_spsp_response(
    request: &SignedEvent,
    response: &SpspResponsePlaintext,
    identity: &Identity,
    created_at: i64,
) -> Result<SignedEvent, ProtocolError> {
    let plaintext_json = serde_json::to_vec(response).expect("always serializable");
    let content = envelope::encrypt(&plaintext_json, &identity.secret_key(), &request.pubkey)?;
    let tags = vec![
        vec!["p".to_string(), request.pubkey.clone()],
        vec!["e".to_string(), request.id.clone()],
    ];
    Ok(build_event(identity, created_at, KIND_SPSP_RESPONSE, tags, content))
}

/// Decrypt and parse an SPSP-Response event. Verifies the `p` tag matches
/// `local_identity`'s own pubkey and the `e` tag matches `request_event_id`
/// before attempting decryption.
pub fn parse_spsp_response(
    event: &SignedEvent,
    local_identity: &Identity,
    request_event_id: &str,
) -> Result<SpspResponsePlaintext, ProtocolError> {
    if event.kind != KIND_SPSP_RESPONSE {
        return Err(ProtocolError::InvalidEvent(format!(
            "expected kind {KIND_SPSP_RESPONSE}, got {}",
            event.kind
        )));
    }
    let recipient = event
        .tag_value("p")
        .ok_or_else(|| ProtocolError::InvalidEvent("missing p tag".into()))?;
    if recipient != local_identity.pubkey_hex() {
        return Err(ProtocolError::InvalidEvent("p tag does not match local pubkey".into()));
    }
    let e_tag = event
        .tag_value("e")
        .ok_or_else(|| ProtocolError::InvalidEvent("missing e tag".into()))?;
    if e_tag != request_event_id {
        return Err(ProtocolError::InvalidEvent("e tag does not match request id".into()));
    }
    let plaintext = envelope::decrypt(&event.content, &local_identity.secret_key(), &event.pubkey)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| ProtocolError::InvalidEvent(format!("unparsable SPSP response: {e}")))
}

/// Convert a crypto-layer error that escaped `envelope::decrypt`/`encrypt`
/// into `DecryptionFailed`. `?` above already does this via `From`; kept as
/// a named helper used by `crosstown-ilp` when it needs the same mapping
/// outside of this module.
pub fn map_crypto_err(e: CryptoError) -> ProtocolError {
    e.into()
}
