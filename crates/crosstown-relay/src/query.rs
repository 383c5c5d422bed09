//! One-shot peer-info lookup against a candidate's relay (spec.md §4.6 step
//! 1, "Query peer-info"). Independent of [`crate::monitor::RelayMonitor`]'s
//! long-lived subscription — the orchestrator dials a fresh connection per
//! candidate and closes it once the answer (or the timeout) arrives.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;

use crosstown_protocol::SignedEvent;

use crate::error::RelayError;
use crate::wire::{close_message, parse_relay_message, req_message, Filter, RelayMessage};

/// Open a WebSocket to `relay_url`, subscribe
/// `{kinds:[10032], authors:[pubkey], limit:1}`, and wait up to
/// `timeout_ms` for stored events, returning the one with the highest
/// `created_at` if several arrive before `EOSE`. Returns `Ok(None)` when the
/// relay sends `EOSE` with no matching event — the caller treats this as
/// "skip candidate", not as an error.
pub async fn query_peer_info(
    relay_url: &str,
    pubkey: &str,
    timeout_ms: u64,
) -> Result<Option<SignedEvent>, RelayError> {
    let fut = run_query(relay_url, pubkey);
    match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout(timeout_ms)),
    }
}

async fn run_query(relay_url: &str, pubkey: &str) -> Result<Option<SignedEvent>, RelayError> {
    let (ws, _) = connect_async(relay_url)
        .await
        .map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;
    let (mut tx, mut rx) = ws.split();

    let sub_id = format!("query-{}", &pubkey[..8.min(pubkey.len())]);
    let filter = Filter {
        kinds: Some(vec![crosstown_protocol::KIND_PEER_INFO]),
        authors: Some(vec![pubkey.to_string()]),
        limit: Some(1),
    };
    tx.send(req_message(&sub_id, &filter))
        .await
        .map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;

    let mut best: Option<SignedEvent> = None;
    while let Some(msg) = rx.next().await {
        let msg = msg.map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;
        let text = match msg.into_text() {
            Ok(t) => t,
            Err(_) => continue,
        };
        match parse_relay_message(&text) {
            Some(RelayMessage::Event { sub_id: sid, event }) if sid == sub_id => {
                if event.pubkey != pubkey {
                    continue;
                }
                let newer = best.as_ref().map(|b| event.created_at > b.created_at).unwrap_or(true);
                if newer {
                    best = Some(event);
                }
            }
            Some(RelayMessage::Eose { sub_id: sid }) if sid == sub_id => break,
            _ => {}
        }
    }

    let _ = tx.send(close_message(&sub_id)).await;
    Ok(best)
}

/// Publish a single signed event to `relay_url` over a fresh connection and
/// wait for the relay's `OK` acknowledgement (spec.md §4.6's Announce phase,
/// the no-paid-write branch: "this may itself be a paid write... `None`
/// means the announce event is published directly over the monitor's relay
/// WebSocket instead"). The connection is closed once the `OK` arrives or
/// `timeout_ms` elapses.
pub async fn publish_event(
    relay_url: &str,
    event: &crosstown_protocol::SignedEvent,
    timeout_ms: u64,
) -> Result<(), RelayError> {
    let fut = run_publish(relay_url, event);
    match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout(timeout_ms)),
    }
}

async fn run_publish(relay_url: &str, event: &crosstown_protocol::SignedEvent) -> Result<(), RelayError> {
    let (ws, _) = connect_async(relay_url)
        .await
        .map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;
    let (mut tx, mut rx) = ws.split();

    tx.send(crate::wire::publish_message(event))
        .await
        .map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;

    while let Some(msg) = rx.next().await {
        let msg = msg.map_err(|e| RelayError::RelayUnavailable(e.to_string()))?;
        let text = match msg.into_text() {
            Ok(t) => t,
            Err(_) => continue,
        };
        match parse_relay_message(&text) {
            Some(RelayMessage::Ok { event_id, accepted, message }) if event_id == event.id => {
                return if accepted {
                    Ok(())
                } else {
                    Err(RelayError::RelayUnavailable(format!("relay rejected publish: {message}")))
                };
            }
            _ => {}
        }
    }
    Err(RelayError::RelayUnavailable("relay closed before acknowledging publish".into()))
}
