//! Bootstrap Orchestrator: the multi-phase state machine (spec.md §4.6)
//! that discovers candidates, drives each through the per-candidate
//! pipeline — query peer-info, register, SPSP handshake, re-register with
//! channel info — and finally publishes the node's own peer-info event.
//! Runs exactly once per node lifetime; a second call is refused rather
//! than silently repeating the work (spec.md §8.2 S6).
//!
//! Per-candidate work is delegated to [`crosstown_relay::RelayMonitor`],
//! which owns the peered-set this module must stay idempotent against
//! (DESIGN.md's Open Questions #1). The orchestrator itself owns only the
//! phase state and the per-candidate query/announce steps the monitor
//! doesn't do on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crosstown_crypto::Identity;
use crosstown_discovery::PeerAggregator;
use crosstown_ilp::{IlpError, PaymentRuntime, SendIlpPacketRequest};
use crosstown_protocol::{build_peer_info_event, parse_peer_info, PeerInfo, TransportEncoder};
use crosstown_relay::{publish_event, query_peer_info, RelayMonitor};

use crate::error::OrchestratorError;
use crate::event::NodeEvent;
use crate::phase::{PeeringResult, Phase};

/// Full-price write rule for the orchestrator's own announcement — the
/// monitor's SPSP handshake uses the half-price rule; the announce event is
/// a regular paid write, not an SPSP request (DESIGN.md Open Questions #3,
/// spec.md §9(a)).
fn announce_price(transport_byte_length: usize, base_price_per_byte: u64) -> u64 {
    transport_byte_length as u64 * base_price_per_byte
}

pub struct Orchestrator {
    identity: Identity,
    ilp_info: PeerInfo,
    aggregator: PeerAggregator,
    monitor: RelayMonitor,
    payment_runtime: Arc<dyn PaymentRuntime>,
    transport_encoder: TransportEncoder,
    event_tx: broadcast::Sender<NodeEvent>,
    relay_url: String,
    relay_ilp_address: Option<String>,
    base_price_per_byte: u64,
    query_timeout_ms: u64,
    default_timeout_ms: u64,
    phase: Mutex<Phase>,
    started: AtomicBool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Identity,
        ilp_info: PeerInfo,
        aggregator: PeerAggregator,
        monitor: RelayMonitor,
        payment_runtime: Arc<dyn PaymentRuntime>,
        transport_encoder: TransportEncoder,
        event_tx: broadcast::Sender<NodeEvent>,
        relay_url: String,
        relay_ilp_address: Option<String>,
        base_price_per_byte: u64,
        query_timeout_ms: u64,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            identity,
            ilp_info,
            aggregator,
            monitor,
            payment_runtime,
            transport_encoder,
            event_tx,
            relay_url,
            relay_ilp_address,
            base_price_per_byte,
            query_timeout_ms,
            default_timeout_ms,
            phase: Mutex::new(Phase::Discovering),
            started: AtomicBool::new(false),
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.lock().await
    }

    async fn transition(&self, to: Phase) {
        let previous = {
            let mut guard = self.phase.lock().await;
            let previous = *guard;
            *guard = to;
            previous
        };
        let _ = self.event_tx.send(NodeEvent::Phase {
            phase: to,
            previous_phase: previous,
        });
    }

    /// Drive the full state machine exactly once (spec.md §4.6). Refuses a
    /// second invocation with [`OrchestratorError::AlreadyStarted`] — the
    /// only error this method itself returns; every per-candidate failure
    /// is caught, logged, and demoted to an emitted event (spec.md §7).
    pub async fn bootstrap(&self) -> Result<Vec<PeeringResult>, OrchestratorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyStarted);
        }

        self.transition(Phase::Discovering).await;
        let candidates = self.aggregator.load_peers().await;

        if candidates.is_empty() {
            self.transition(Phase::Ready).await;
            let _ = self.event_tx.send(NodeEvent::Ready {
                peer_count: 0,
                channel_count: 0,
            });
            return Ok(Vec::new());
        }

        self.transition(Phase::Registering).await;
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            // Idempotency: a candidate already peered (e.g. from relay
            // discovery that beat bootstrap to it) is skipped rather than
            // re-queried (spec.md §8.1 "Idempotent peering").
            if self.monitor.peered_pubkeys().await.contains(&candidate.pubkey) {
                continue;
            }

            let event = match query_peer_info(&candidate.relay_url, &candidate.pubkey, self.query_timeout_ms).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    tracing::warn!(pubkey = %candidate.pubkey, "peer-info query returned nothing, skipping candidate");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(pubkey = %candidate.pubkey, "peer-info query failed: {e}, skipping candidate");
                    continue;
                }
            };
            if let Err(e) = event.verify() {
                tracing::warn!(pubkey = %candidate.pubkey, "peer-info event failed verification: {e}, skipping candidate");
                continue;
            }
            let peer_info = match parse_peer_info(&event) {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(pubkey = %candidate.pubkey, "unparsable peer-info, skipping candidate: {e}");
                    continue;
                }
            };

            // register + SPSP handshake + channel re-register, all owned by
            // the monitor (spec.md §4.5/§4.6 steps 2-4).
            let outcome = self.monitor.peer_with_info(&candidate.pubkey, peer_info.clone()).await;
            results.push(PeeringResult {
                pubkey: candidate.pubkey.clone(),
                peer_id: outcome.peer_id,
                peer_info,
                registered: outcome.registered,
                channel_id: outcome.channel_id,
                negotiated_chain: outcome.negotiated_chain,
                settlement_address: outcome.settlement_address,
            });
        }

        // The per-candidate pipeline interleaves registration and handshake
        // (monitor.peer_with_info does both atomically per pubkey); the
        // Handshaking phase transition below marks that interleaved work as
        // complete for every candidate rather than gating a second pass.
        self.transition(Phase::Handshaking).await;

        self.transition(Phase::Announcing).await;
        match self.announce().await {
            Ok(event_id) => {
                let _ = self.event_tx.send(NodeEvent::Announced { event_id });
            }
            Err(e) => {
                tracing::warn!("own peer-info announcement failed: {e}");
                let _ = self.event_tx.send(NodeEvent::AnnounceFailed { reason: e.to_string() });
            }
        }

        self.transition(Phase::Ready).await;
        let peer_count = results.iter().filter(|r| r.registered).count();
        let channel_count = results.iter().filter(|r| r.channel_id.is_some()).count();
        let _ = self.event_tx.send(NodeEvent::Ready { peer_count, channel_count });

        Ok(results)
    }

    /// Publish the node's own peer-info event (spec.md §4.6's Announce
    /// phase). When `relay_ilp_address` is configured this is a paid write
    /// through the payment runtime at the full-price rate; otherwise the
    /// event is published directly over a fresh WebSocket to the home
    /// relay (DESIGN.md Open Questions #2/#3).
    async fn announce(&self) -> Result<String, IlpError> {
        let created_at = chrono::Utc::now().timestamp();
        let event = build_peer_info_event(&self.ilp_info, &self.identity, created_at);

        match &self.relay_ilp_address {
            Some(destination) => {
                use base64::Engine;
                let transport = (self.transport_encoder)(&event).map_err(IlpError::Protocol)?;
                let amount = announce_price(transport.len(), self.base_price_per_byte);
                let reply = self
                    .payment_runtime
                    .send_ilp_packet(SendIlpPacketRequest {
                        destination: destination.clone(),
                        amount,
                        data: base64::engine::general_purpose::STANDARD.encode(&transport),
                        timeout: Some(self.default_timeout_ms),
                    })
                    .await?;
                if !reply.accepted {
                    return Err(IlpError::SpspFailed {
                        code: reply.code.unwrap_or_else(|| "UNKNOWN".into()),
                        message: reply.message.unwrap_or_else(|| "announce payment rejected".into()),
                    });
                }
                Ok(event.id)
            }
            None => {
                publish_event(&self.relay_url, &event, self.default_timeout_ms)
                    .await
                    .map_err(|e| IlpError::ConnectorError(e.to_string()))?;
                Ok(event.id)
            }
        }
    }
}
