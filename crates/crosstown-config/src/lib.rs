//! Layered YAML configuration for the `crosstown` CLI/daemon (spec.md §6.4's
//! construction config, loaded from disk instead of built in-process).

pub mod loader;
pub mod schema;

pub use loader::{config_search_paths, load};
pub use schema::{Config, ConnectorSection, DiscoverySection, IdentityConfig, NodeSection};

use anyhow::Context;
use crosstown_discovery::RawPeerEntry;
use crosstown_protocol::{PeerInfo, SettlementPreference};

/// Resolve the 32-byte secret key from whichever of `identity`'s two sources
/// is set, preferring the inline hex string over the file path when both are
/// present. Returns an error if neither is set or the value doesn't decode
/// to exactly 32 bytes.
pub fn resolve_secret_key(identity: &IdentityConfig) -> anyhow::Result<[u8; 32]> {
    let hex_str = if let Some(inline) = &identity.secret_key_hex {
        inline.clone()
    } else if let Some(path) = &identity.secret_key_file {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading secret key file {path}"))?
            .trim()
            .to_string()
    } else {
        anyhow::bail!("no identity.secret_key_hex or identity.secret_key_file configured");
    };

    let bytes = hex::decode(hex_str.trim())?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("secret key must be 32 bytes, got {}", v.len()))?;
    Ok(array)
}

/// Build this node's own [`PeerInfo`] announcement payload from the loaded
/// `node` section (spec.md §3's peer-info event content).
pub fn build_own_peer_info(node: &NodeSection) -> PeerInfo {
    PeerInfo {
        ilp_address: node.ilp_address.clone(),
        btp_endpoint: node.btp_endpoint.clone(),
        asset_code: node.asset_code.clone(),
        asset_scale: node.asset_scale,
        supported_chains: node.supported_chains.clone(),
        settlement_addresses: None,
        preferred_tokens: None,
        token_networks: None,
    }
}

/// Build a [`SettlementPreference`] from the node section, or `None` when
/// nothing settlement-related was configured (spec.md §5's "no common
/// chain" is then unconditionally hit, which is the correct behavior for a
/// node that never declared settlement support).
pub fn build_settlement_preference(node: &NodeSection) -> Option<SettlementPreference> {
    node.supported_chains.as_ref().map(|chains| SettlementPreference {
        supported_chains: Some(chains.clone()),
        settlement_addresses: None,
        preferred_tokens: None,
    })
}

/// Load the genesis peer list from `discovery.genesis_file`, or an empty
/// list when unconfigured (spec.md §4.3's genesis source is optional).
pub fn load_genesis_peers(discovery: &DiscoverySection) -> anyhow::Result<Vec<RawPeerEntry>> {
    match &discovery.genesis_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading genesis file {path}: {e}"))?;
            let peers: Vec<RawPeerEntry> =
                serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("parsing genesis file {path}: {e}"))?;
            Ok(peers)
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_secret_key_from_inline_hex() {
        let identity = IdentityConfig {
            secret_key_hex: Some("11".repeat(32)),
            secret_key_file: None,
        };
        let key = resolve_secret_key(&identity).unwrap();
        assert_eq!(key, [0x11u8; 32]);
    }

    #[test]
    fn resolve_secret_key_rejects_wrong_length() {
        let identity = IdentityConfig {
            secret_key_hex: Some("11".repeat(16)),
            secret_key_file: None,
        };
        assert!(resolve_secret_key(&identity).is_err());
    }

    #[test]
    fn resolve_secret_key_errors_with_neither_source() {
        let identity = IdentityConfig {
            secret_key_hex: None,
            secret_key_file: None,
        };
        assert!(resolve_secret_key(&identity).is_err());
    }

    #[test]
    fn resolve_secret_key_reads_from_file() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "{}", "22".repeat(32)).unwrap();
        let identity = IdentityConfig {
            secret_key_hex: None,
            secret_key_file: Some(f.path().to_str().unwrap().to_string()),
        };
        let key = resolve_secret_key(&identity).unwrap();
        assert_eq!(key, [0x22u8; 32]);
    }

    #[test]
    fn load_genesis_peers_defaults_to_empty() {
        let discovery = DiscoverySection::default();
        assert!(load_genesis_peers(&discovery).unwrap().is_empty());
    }

    #[test]
    fn build_settlement_preference_none_without_chains() {
        let node = NodeSection::default();
        assert!(build_settlement_preference(&node).is_none());
    }
}
