use serde::{Deserialize, Serialize};

use crosstown_discovery::RawPeerEntry;

fn default_true() -> bool {
    true
}

fn default_relay_url() -> String {
    "ws://localhost:7000".to_string()
}

fn default_asset_code() -> String {
    "USD".to_string()
}

fn default_asset_scale() -> u8 {
    9
}

fn default_base_price_per_byte() -> u64 {
    10
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connector_url() -> String {
    "http://localhost:7768".to_string()
}

/// Top-level configuration shape, assembled by layering YAML files found on
/// [`crate::loader::config_search_paths`] plus an optional explicit
/// `--config` path (later layers override earlier ones, matching the
/// teacher's `sven-config` merge behavior).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub connector: ConnectorSection,
}

/// Where the host process's identity secret key comes from. The library
/// itself never generates a production key (spec.md §3); exactly one of
/// these should be set, checked in that order by the CLI at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// 64 lowercase hex characters (32 raw bytes).
    #[serde(default)]
    pub secret_key_hex: Option<String>,
    /// Path to a file containing the same hex string, for keeping the key
    /// out of the YAML file itself.
    #[serde(default)]
    pub secret_key_file: Option<String>,
}

/// This node's own peering identity: the home relay, the ILP address the
/// node answers paid writes on, and the `PeerInfo` payload it announces
/// (spec.md §3, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    #[serde(default)]
    pub own_ilp_address: String,
    #[serde(default)]
    pub ilp_address: String,
    #[serde(default)]
    pub btp_endpoint: String,
    #[serde(default = "default_asset_code")]
    pub asset_code: String,
    #[serde(default = "default_asset_scale")]
    pub asset_scale: u8,
    #[serde(default)]
    pub supported_chains: Option<Vec<String>>,
    /// Destination ILP address for a paid announce write; `None` publishes
    /// directly over the relay WebSocket instead (spec.md §4.6).
    #[serde(default)]
    pub relay_ilp_address: Option<String>,
    #[serde(default = "default_base_price_per_byte")]
    pub base_price_per_byte: u64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            own_ilp_address: String::new(),
            ilp_address: String::new(),
            btp_endpoint: String::new(),
            asset_code: default_asset_code(),
            asset_scale: default_asset_scale(),
            supported_chains: None,
            relay_ilp_address: None,
            base_price_per_byte: default_base_price_per_byte(),
            query_timeout_ms: default_query_timeout_ms(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Peer-source configuration (spec.md §4.3): the registry fetch toggle and
/// URL, a genesis peer-list file, and inline config-supplied known peers
/// (highest merge precedence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_true")]
    pub ardrive_enabled: bool,
    #[serde(default)]
    pub registry_url: Option<String>,
    #[serde(default)]
    pub default_relay_url: Option<String>,
    /// Path to a JSON file of `RawPeerEntry` objects (spec.md §4.3's
    /// "compiled into the binary or read from a configured JSON").
    #[serde(default)]
    pub genesis_file: Option<String>,
    #[serde(default)]
    pub known_peers: Vec<RawPeerEntry>,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            ardrive_enabled: true,
            registry_url: None,
            default_relay_url: None,
            genesis_file: None,
            known_peers: Vec::new(),
        }
    }
}

/// Where the external connector admin API and payment runtime live
/// (spec.md §6.2/§6.3), for hosts using the crate's default HTTP adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSection {
    #[serde(default = "default_connector_url")]
    pub admin_url: String,
    #[serde(default = "default_connector_url")]
    pub payment_url: String,
    #[serde(default)]
    pub supports_channels: bool,
}

impl Default for ConnectorSection {
    fn default() -> Self {
        Self {
            admin_url: default_connector_url(),
            payment_url: default_connector_url(),
            supports_channels: false,
        }
    }
}
