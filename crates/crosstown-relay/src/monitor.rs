//! Long-lived subscription to the home relay's peer-info stream, plus the
//! explicit `peer_with` registration+handshake call (spec.md §4.5).
//!
//! Ownership: this is the single component that owns both the
//! discovered-set and the peered-set (spec.md §9's Design Notes; see
//! DESIGN.md's Open Questions log for why this overrides §3's orchestrator
//! assignment). `crosstown-node::Orchestrator` never keeps a second set —
//! it calls [`RelayMonitor::peer_with_info`] per candidate instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch, Mutex};
use tokio_tungstenite::connect_async;

use crosstown_crypto::Identity;
use crosstown_ilp::{AddPeerRequest, ConnectorAdmin, Route, Settlement, SpspClient, SpspRequestParams};
use crosstown_protocol::{is_deregistration, parse_peer_info, PeerInfo};

use crate::discovered::{peer_id_for, DiscoveredPeer};
use crate::error::RelayError;
use crate::event::RelayEvent;
use crate::wire::{parse_relay_message, req_message, Filter, RelayMessage};

/// Outcome of a (possibly cached) `peer_with` call. Handshake failure is
/// non-fatal — `channel_id` stays `None` but `registered` remains `true`,
/// since the peer stays registered for inbound routing (spec.md §4.5 step 5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeeringOutcome {
    pub peer_id: String,
    pub registered: bool,
    pub channel_id: Option<String>,
    pub negotiated_chain: Option<String>,
    pub settlement_address: Option<String>,
}

struct Shared {
    discovered: Mutex<HashMap<String, DiscoveredPeer>>,
    last_seen: Mutex<HashMap<String, i64>>,
    peered: Mutex<HashSet<String>>,
    outcomes: Mutex<HashMap<String, PeeringOutcome>>,
    exclude: Mutex<HashSet<String>>,
}

/// The relay monitor. Cheap to clone (internally `Arc`-backed) so the host
/// can hold a handle while `start()` owns the subscription task.
#[derive(Clone)]
pub struct RelayMonitor {
    identity: Identity,
    relay_url: String,
    connector: Arc<dyn ConnectorAdmin>,
    spsp_client: Arc<SpspClient>,
    default_timeout_ms: u64,
    shared: Arc<Shared>,
    event_tx: broadcast::Sender<RelayEvent>,
    stop_tx: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

impl RelayMonitor {
    pub fn new(
        identity: Identity,
        relay_url: impl Into<String>,
        connector: Arc<dyn ConnectorAdmin>,
        spsp_client: Arc<SpspClient>,
        default_timeout_ms: u64,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            identity,
            relay_url: relay_url.into(),
            connector,
            spsp_client,
            default_timeout_ms,
            shared: Arc::new(Shared {
                discovered: Mutex::new(HashMap::new()),
                last_seen: Mutex::new(HashMap::new()),
                peered: Mutex::new(HashSet::new()),
                outcomes: Mutex::new(HashMap::new()),
                exclude: Mutex::new(HashSet::new()),
            }),
            event_tx,
            stop_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    /// Start the long-lived subscription to `{kinds:[10032]}` on the home
    /// relay. `exclude` is the set of pubkeys (besides our own) for which
    /// discovery/deregistration events should never be emitted — the
    /// bootstrap facade passes its own already-peered pubkeys here.
    pub async fn start(&self, exclude: HashSet<String>) -> Result<(), RelayError> {
        {
            let mut ex = self.shared.exclude.lock().await;
            *ex = exclude;
            ex.insert(self.identity.pubkey_hex().to_string());
        }

        let (ws, _) = connect_async(&self.relay_url)
            .await
            .map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;
        let (mut tx, mut rx) = ws.split();

        let sub_id = "crosstown-peer-info".to_string();
        let filter = Filter {
            kinds: Some(vec![crosstown_protocol::KIND_PEER_INFO]),
            authors: None,
            limit: None,
        };
        tx.send(req_message(&sub_id, &filter))
            .await
            .map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;

        let (stop_watch_tx, mut stop_watch_rx) = watch::channel(false);
        *self.stop_tx.lock().await = Some(stop_watch_tx);

        let shared = Arc::clone(&self.shared);
        let connector = Arc::clone(&self.connector);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = rx.next() => {
                        let Some(msg) = msg else { break };
                        let Ok(msg) = msg else { break };
                        let Ok(text) = msg.into_text() else { continue };
                        let Some(RelayMessage::Event { sub_id: sid, event }) = parse_relay_message(&text) else { continue };
                        if sid != sub_id {
                            continue;
                        }
                        if event.verify().is_err() {
                            tracing::debug!(pubkey = %event.pubkey, "dropping peer-info event with invalid signature");
                            continue;
                        }
                        handle_peer_info_event(&shared, &connector, &event_tx, &event).await;
                    }
                    _ = stop_watch_rx.changed() => {
                        if *stop_watch_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Close the subscription. Idempotent and safe to call when not started
    /// (spec.md §4.7). Local registration (`peer_with`) remains valid after
    /// this returns; only new discoveries stop.
    pub async fn unsubscribe(&self) {
        if let Some(tx) = self.stop_tx.lock().await.take() {
            let _ = tx.send(true);
        }
    }

    pub async fn discovered_peers(&self) -> Vec<DiscoveredPeer> {
        self.shared.discovered.lock().await.values().cloned().collect()
    }

    pub async fn peered_pubkeys(&self) -> HashSet<String> {
        self.shared.peered.lock().await.clone()
    }

    /// Peer with a pubkey already present in the discovered map (the
    /// host-facing entry point: spec.md §4.5, "The host... calls
    /// peerWith(pubkey)").
    pub async fn peer_with(&self, pubkey: &str) -> Result<PeeringOutcome, RelayError> {
        let peer_info = {
            let discovered = self.shared.discovered.lock().await;
            discovered
                .get(pubkey)
                .map(|d| d.peer_info.clone())
                .ok_or_else(|| RelayError::NotDiscovered(pubkey.to_string()))?
        };
        Ok(self.peer_with_info(pubkey, peer_info).await)
    }

    /// Peer with an explicitly supplied `PeerInfo` — used by the bootstrap
    /// orchestrator, which queries peer-info directly from each candidate's
    /// own relay rather than waiting for it to show up on the home relay
    /// (spec.md §4.6 step 1). Idempotent: a pubkey already in the peered set
    /// returns its cached outcome without a second admin call or handshake
    /// (spec.md §8.1 "Idempotent peering").
    pub async fn peer_with_info(&self, pubkey: &str, peer_info: PeerInfo) -> PeeringOutcome {
        {
            let mut peered = self.shared.peered.lock().await;
            if peered.contains(pubkey) {
                if let Some(outcome) = self.shared.outcomes.lock().await.get(pubkey) {
                    return outcome.clone();
                }
            }
            peered.insert(pubkey.to_string());
        }

        let peer_id = peer_id_for(pubkey);
        let outcome = self.run_peering(pubkey, &peer_id, &peer_info).await;
        self.shared
            .outcomes
            .lock()
            .await
            .insert(pubkey.to_string(), outcome.clone());
        outcome
    }

    async fn run_peering(&self, pubkey: &str, peer_id: &str, peer_info: &PeerInfo) -> PeeringOutcome {
        let add_req = AddPeerRequest {
            id: peer_id.to_string(),
            url: peer_info.btp_endpoint.clone(),
            auth_token: String::new(),
            routes: vec![Route {
                prefix: peer_info.ilp_address.clone(),
                priority: None,
            }],
            settlement: None,
        };

        if let Err(e) = self.connector.add_peer(add_req).await {
            tracing::warn!(pubkey, "connectorAdmin.addPeer failed: {e}");
            let _ = self.event_tx.send(RelayEvent::HandshakeFailed {
                pubkey: pubkey.to_string(),
                peer_id: peer_id.to_string(),
                reason: e.to_string(),
            });
            return PeeringOutcome {
                peer_id: peer_id.to_string(),
                registered: false,
                ..Default::default()
            };
        }
        let _ = self.event_tx.send(RelayEvent::PeerRegistered {
            pubkey: pubkey.to_string(),
            peer_id: peer_id.to_string(),
        });

        let params = SpspRequestParams {
            timeout: Some(self.default_timeout_ms),
            ..Default::default()
        };
        let handshake = self
            .spsp_client
            .request_spsp_info(pubkey, &peer_info.ilp_address, params)
            .await;

        let response = match handshake {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(pubkey, "SPSP handshake failed: {e}");
                let _ = self.event_tx.send(RelayEvent::HandshakeFailed {
                    pubkey: pubkey.to_string(),
                    peer_id: peer_id.to_string(),
                    reason: e.to_string(),
                });
                return PeeringOutcome {
                    peer_id: peer_id.to_string(),
                    registered: true,
                    ..Default::default()
                };
            }
        };

        let mut outcome = PeeringOutcome {
            peer_id: peer_id.to_string(),
            registered: true,
            ..Default::default()
        };

        if let Some(settlement) = response.settlement {
            outcome.negotiated_chain = settlement.negotiated_chain.clone();
            outcome.settlement_address = settlement.settlement_address.clone();
            if let Some(channel_id) = settlement.channel_id.clone() {
                let reregister = AddPeerRequest {
                    id: peer_id.to_string(),
                    url: peer_info.btp_endpoint.clone(),
                    auth_token: String::new(),
                    routes: vec![Route {
                        prefix: peer_info.ilp_address.clone(),
                        priority: None,
                    }],
                    settlement: Some(Settlement {
                        preference: settlement.negotiated_chain.clone().unwrap_or_default(),
                        evm_address: None,
                        token_address: settlement.token_address.clone(),
                        token_network_address: settlement.token_network_address.clone(),
                        chain_id: None,
                        channel_id: Some(channel_id.clone()),
                        initial_deposit: None,
                    }),
                };
                if let Err(e) = self.connector.add_peer(reregister).await {
                    tracing::warn!(pubkey, "re-register with channel info failed: {e}");
                } else {
                    outcome.channel_id = Some(channel_id.clone());
                    let _ = self.event_tx.send(RelayEvent::ChannelOpened {
                        pubkey: pubkey.to_string(),
                        peer_id: peer_id.to_string(),
                        channel_id,
                    });
                }
            }
        }

        outcome
    }
}

async fn handle_peer_info_event(
    shared: &Arc<Shared>,
    connector: &Arc<dyn ConnectorAdmin>,
    event_tx: &broadcast::Sender<RelayEvent>,
    event: &crosstown_protocol::SignedEvent,
) {
    let pubkey = event.pubkey.clone();
    if shared.exclude.lock().await.contains(&pubkey) {
        return;
    }

    {
        let mut last_seen = shared.last_seen.lock().await;
        let stale = last_seen.get(&pubkey).map(|&ts| event.created_at <= ts).unwrap_or(false);
        if stale {
            return;
        }
        last_seen.insert(pubkey.clone(), event.created_at);
    }

    if is_deregistration(&event.content) {
        shared.discovered.lock().await.remove(&pubkey);
        let was_peered = shared.peered.lock().await.remove(&pubkey);
        if was_peered {
            shared.outcomes.lock().await.remove(&pubkey);
            let peer_id = peer_id_for(&pubkey);
            if let Err(e) = connector.remove_peer(&peer_id).await {
                tracing::warn!(pubkey = %pubkey, "connectorAdmin.removePeer failed: {e}");
            }
            let _ = event_tx.send(RelayEvent::PeerDeregistered { pubkey, peer_id });
        }
        return;
    }

    let peer_info = match parse_peer_info(event) {
        Ok(info) => info,
        Err(e) => {
            tracing::debug!(pubkey = %pubkey, "unparsable peer-info event: {e}");
            return;
        }
    };
    let peer_id = peer_id_for(&pubkey);
    let discovered = DiscoveredPeer {
        pubkey: pubkey.clone(),
        peer_id: peer_id.clone(),
        peer_info: peer_info.clone(),
        discovered_at: event.created_at,
    };
    shared.discovered.lock().await.insert(pubkey.clone(), discovered);
    let _ = event_tx.send(RelayEvent::PeerDiscovered {
        pubkey,
        peer_id,
        peer_info,
        discovered_at: event.created_at,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crosstown_ilp::{ChannelState, IlpError, OpenChannelRequest, OpenChannelResult, PaymentRuntime, SendIlpPacketRequest, SendIlpPacketResult};
    use crosstown_protocol::{build_peer_info_event, build_spsp_response, decode_from_transport, encode_to_transport, parse_spsp_request, SignedEvent, SpspResponsePlaintext, SpspSettlementInfo};
    use std::sync::Mutex as StdMutex;

    fn sample_peer_info(ilp: &str, btp: &str) -> PeerInfo {
        PeerInfo {
            ilp_address: ilp.into(),
            btp_endpoint: btp.into(),
            asset_code: "USD".into(),
            asset_scale: 9,
            supported_chains: None,
            settlement_addresses: None,
            preferred_tokens: None,
            token_networks: None,
        }
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared {
            discovered: Mutex::new(HashMap::new()),
            last_seen: Mutex::new(HashMap::new()),
            peered: Mutex::new(HashSet::new()),
            outcomes: Mutex::new(HashMap::new()),
            exclude: Mutex::new(HashSet::new()),
        })
    }

    #[derive(Default)]
    struct RecordingConnector {
        added: StdMutex<Vec<AddPeerRequest>>,
        removed: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ConnectorAdmin for RecordingConnector {
        async fn add_peer(&self, req: AddPeerRequest) -> Result<(), IlpError> {
            self.added.lock().unwrap().push(req);
            Ok(())
        }
        async fn remove_peer(&self, id: &str) -> Result<(), IlpError> {
            self.removed.lock().unwrap().push(id.to_string());
            Ok(())
        }
        async fn open_channel(&self, _req: OpenChannelRequest) -> Result<OpenChannelResult, IlpError> {
            Err(IlpError::ConnectorError("unsupported".into()))
        }
        async fn get_channel_state(&self, _id: &str) -> Result<ChannelState, IlpError> {
            Err(IlpError::ConnectorError("unsupported".into()))
        }
    }

    #[tokio::test]
    async fn self_events_are_never_emitted() {
        let shared = shared();
        let connector: Arc<dyn ConnectorAdmin> = Arc::new(RecordingConnector::default());
        let (event_tx, mut rx) = broadcast::channel(16);
        let me = Identity::generate();
        shared.exclude.lock().await.insert(me.pubkey_hex().to_string());

        let event = build_peer_info_event(&sample_peer_info("g.me", "ws://me"), &me, 100);
        handle_peer_info_event(&shared, &connector, &event_tx, &event).await;

        assert!(shared.discovered.lock().await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn replaceable_event_monotonicity_and_deregistration() {
        let shared = shared();
        let connector: Arc<dyn ConnectorAdmin> = Arc::new(RecordingConnector::default());
        let (event_tx, mut rx) = broadcast::channel(16);
        let peer = Identity::generate();

        let a = build_peer_info_event(&sample_peer_info("g.a", "ws://a"), &peer, 100);
        handle_peer_info_event(&shared, &connector, &event_tx, &a).await;
        assert!(matches!(rx.recv().await.unwrap(), RelayEvent::PeerDiscovered { .. }));

        // Older event (created_at=99) is dropped — no new emission.
        let b = build_peer_info_event(&sample_peer_info("g.b", "ws://b"), &peer, 99);
        handle_peer_info_event(&shared, &connector, &event_tx, &b).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(
            shared.discovered.lock().await.get(peer.pubkey_hex()).unwrap().peer_info.ilp_address,
            "g.a"
        );

        // Newer event (created_at=200) with empty content is a deregistration.
        // The pubkey isn't peered, so it's a no-op per spec.md §8.1.
        let c = crosstown_protocol::build_deregistration_event(&peer, 200);
        handle_peer_info_event(&shared, &connector, &event_tx, &c).await;
        assert!(rx.try_recv().is_err());
        assert!(shared.discovered.lock().await.get(peer.pubkey_hex()).is_none());
    }

    #[tokio::test]
    async fn deregistration_of_peered_pubkey_removes_routing() {
        let shared = shared();
        let connector = Arc::new(RecordingConnector::default());
        let (event_tx, mut rx) = broadcast::channel(16);
        let peer = Identity::generate();
        shared.peered.lock().await.insert(peer.pubkey_hex().to_string());

        let dereg = crosstown_protocol::build_deregistration_event(&peer, 100);
        let connector_dyn: Arc<dyn ConnectorAdmin> = connector.clone();
        handle_peer_info_event(&shared, &connector_dyn, &event_tx, &dereg).await;

        assert_eq!(connector.removed.lock().unwrap().len(), 1);
        assert!(matches!(rx.recv().await.unwrap(), RelayEvent::PeerDeregistered { .. }));
        assert!(!shared.peered.lock().await.contains(peer.pubkey_hex()));
    }

    struct FakeRuntime {
        recipient: Identity,
        reply: StdMutex<Option<SpspResponsePlaintext>>,
    }

    #[async_trait]
    impl PaymentRuntime for FakeRuntime {
        async fn send_ilp_packet(&self, req: SendIlpPacketRequest) -> Result<SendIlpPacketResult, IlpError> {
            use base64::Engine;
            let raw = base64::engine::general_purpose::STANDARD.decode(&req.data).unwrap();
            let request_event: SignedEvent = decode_from_transport(&raw).unwrap();
            let _ = parse_spsp_request(&request_event, &self.recipient).unwrap();
            let plaintext = self.reply.lock().unwrap().take().unwrap();
            let response_event = build_spsp_response(&request_event, &plaintext, &self.recipient, 2_000).unwrap();
            let bytes = encode_to_transport(&response_event).unwrap();
            Ok(SendIlpPacketResult {
                accepted: true,
                data: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn peer_with_info_is_idempotent() {
        let requester = Identity::generate();
        let recipient = Identity::generate();
        let reply = SpspResponsePlaintext {
            destination_account: "g.recipient.~1".into(),
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
            reply: StdMutex::new(Some(reply)),
        });
        let connector = Arc::new(RecordingConnector::default());
        let connector_dyn: Arc<dyn ConnectorAdmin> = connector.clone();
        let spsp = Arc::new(SpspClient::new(requester.clone(), runtime, 10, "g.requester"));
        let monitor = RelayMonitor::new(requester, "ws://home-relay/", connector_dyn, spsp, 5_000);

        let info = sample_peer_info("g.peer1", "ws://peer:3000");
        let first = monitor.peer_with_info(recipient.pubkey_hex(), info.clone()).await;
        assert!(first.registered);
        assert_eq!(first.channel_id.as_deref(), Some("ch-1"));

        // Second call for the same pubkey is idempotent: no additional
        // addPeer calls, same cached outcome returned.
        let second = monitor.peer_with_info(recipient.pubkey_hex(), info).await;
        assert_eq!(second, first);
        // One initial register + one re-register with channel info.
        assert_eq!(connector.added.lock().unwrap().len(), 2);
    }
}
