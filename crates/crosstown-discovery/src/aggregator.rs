//! Merges genesis, registry and config peer sources into a deduplicated
//! candidate set (spec.md §4.3/§8.1).

use std::collections::HashMap;
use std::sync::Arc;

use crate::candidate::PeerCandidate;
use crate::source::{complete, ConfigSource, GenesisSource, PeerSource, RegistrySource};

pub struct PeerAggregator {
    genesis: GenesisSource,
    registry: Option<Arc<RegistrySource>>,
    config: ConfigSource,
    default_relay_url: String,
}

impl PeerAggregator {
    pub fn new(
        genesis: GenesisSource,
        registry: Option<RegistrySource>,
        config: ConfigSource,
        default_relay_url: impl Into<String>,
    ) -> Self {
        Self {
            genesis,
            registry: registry.map(Arc::new),
            config,
            default_relay_url: default_relay_url.into(),
        }
    }

    /// Load and merge all sources. Registry-fetch failure is logged and
    /// treated as an empty contribution — never fatal (spec.md §4.3's
    /// failure policy, §8.1's "Non-fatal registry" invariant).
    pub async fn load_peers(&self) -> Vec<PeerCandidate> {
        let genesis = self.genesis.fetch().await.unwrap_or_else(|e| {
            tracing::warn!("genesis source failed: {e}");
            Vec::new()
        });

        let registry = match &self.registry {
            Some(source) => match source.fetch().await {
                Ok(peers) => peers,
                Err(e) => {
                    tracing::warn!("registry unavailable, proceeding with genesis+config: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let config = self.config.fetch().await.unwrap_or_default();

        merge(genesis, registry, config, &self.default_relay_url)
    }
}

/// Merge rule (spec.md §4.3/§8.1): dedupe by pubkey; for the same pubkey,
/// config overrides registry, registry overrides genesis. Entries missing
/// `ilpAddress`/`btpEndpoint` after default-relay-url completion are dropped.
fn merge(
    genesis: Vec<crate::candidate::RawPeerEntry>,
    registry: Vec<crate::candidate::RawPeerEntry>,
    config: Vec<crate::candidate::RawPeerEntry>,
    default_relay_url: &str,
) -> Vec<PeerCandidate> {
    let mut by_pubkey: HashMap<String, PeerCandidate> = HashMap::new();

    for entry in genesis {
        if let Some(c) = complete(entry, default_relay_url) {
            by_pubkey.insert(c.pubkey.clone(), c);
        }
    }
    for entry in registry {
        if let Some(c) = complete(entry, default_relay_url) {
            by_pubkey.insert(c.pubkey.clone(), c);
        }
    }
    for entry in config {
        if let Some(c) = complete(entry, default_relay_url) {
            by_pubkey.insert(c.pubkey.clone(), c);
        }
    }

    by_pubkey.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::RawPeerEntry;
    use crate::source::GenesisSource;

    fn entry(pubkey: &str, relay: Option<&str>, ilp: Option<&str>, btp: Option<&str>) -> RawPeerEntry {
        RawPeerEntry {
            pubkey: pubkey.to_string(),
            relay_url: relay.map(str::to_string),
            btp_endpoint: btp.map(str::to_string),
            ilp_address: ilp.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn config_overrides_registry_overrides_genesis() {
        let genesis = GenesisSource::new(vec![entry(
            "aaaa",
            Some("ws://genesis-relay/"),
            Some("g.genesis"),
            Some("ws://genesis-peer"),
        )]);
        let aggregator = PeerAggregator::new(
            genesis,
            None,
            ConfigSource::new(vec![]),
            "ws://default-relay/",
        );
        let merged = merge(
            aggregator.genesis.fetch().await.unwrap(),
            vec![entry(
                "aaaa",
                Some("ws://registry-relay/"),
                Some("g.registry"),
                Some("ws://registry-peer"),
            )],
            vec![entry(
                "aaaa",
                Some("ws://config-relay/"),
                Some("g.config"),
                Some("ws://config-peer"),
            )],
            "ws://default-relay/",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].ilp_address.as_deref(), Some("g.config"));
    }

    #[tokio::test]
    async fn missing_relay_url_gets_default() {
        let merged = merge(
            vec![],
            vec![entry("bbbb", None, Some("g.registry"), Some("ws://peer"))],
            vec![],
            "ws://default-relay/",
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].relay_url, "ws://default-relay/");
    }

    #[tokio::test]
    async fn entries_missing_ilp_fields_are_dropped() {
        let merged = merge(
            vec![entry("cccc", Some("ws://relay/"), None, None)],
            vec![],
            vec![],
            "ws://default-relay/",
        );
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn registry_failure_is_non_fatal_and_keeps_genesis_and_config() {
        struct FailingRegistry;
        #[async_trait::async_trait]
        impl PeerSource for FailingRegistry {
            async fn fetch(&self) -> Result<Vec<crate::candidate::RawPeerEntry>, crate::error::DiscoveryError> {
                Err(crate::error::DiscoveryError::RegistryUnavailable("HTTP 500".into()))
            }
        }

        let genesis = GenesisSource::new(vec![entry(
            "bbbbb",
            Some("ws://relay/"),
            Some("g.genesis"),
            Some("ws://peer"),
        )]);
        let aggregator = PeerAggregator {
            genesis,
            registry: None,
            config: ConfigSource::new(vec![]),
            default_relay_url: "ws://default-relay/".into(),
        };
        let genesis_peers = aggregator.genesis.fetch().await.unwrap();
        // Simulate: registry.fetch() would fail, aggregator treats as empty.
        let failing = FailingRegistry;
        let registry_peers = failing.fetch().await.unwrap_or_else(|_| Vec::new());
        let merged = merge(genesis_peers, registry_peers, vec![], "ws://default-relay/");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pubkey, "bbbbb");
    }

    #[tokio::test]
    async fn empty_union_is_permitted() {
        let aggregator = PeerAggregator::new(
            GenesisSource::default(),
            None,
            ConfigSource::new(vec![]),
            "ws://default-relay/",
        );
        let peers = aggregator.load_peers().await;
        assert!(peers.is_empty());
    }
}
