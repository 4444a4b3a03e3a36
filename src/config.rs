use crate::errors::ConfigError;
use crate::models::Protocol;
use crate::snapshot::SnapshotMode;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AEVO_URL: &str = "https://api.aevo.xyz";
pub const DEFAULT_MANGO_URL: &str = "https://api.mngo.cloud/data/v4";
pub const DEFAULT_VERTEX_URL: &str = "https://prod.vertexprotocol-backend.com";
pub const DEFAULT_HYPERLIQUID_URL: &str = "https://api.hyperliquid.xyz";

/// Vertex product id → token symbol. Product ids missing here are dropped.
pub const DEFAULT_VERTEX_PRODUCTS: [(u32, &str); 19] = [
    (2, "BTC"),
    (4, "ETH"),
    (6, "ARB"),
    (8, "BNB"),
    (10, "XRP"),
    (12, "SOL"),
    (14, "MATIC"),
    (16, "SUI"),
    (18, "OP"),
    (20, "APT"),
    (22, "LTC"),
    (24, "BCH"),
    (26, "COMP"),
    (28, "MKR"),
    (30, "PEPE"),
    (34, "DOGE"),
    (36, "LINK"),
    (38, "DYDX"),
    (40, "CRV"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    /// Per-exchange file overrides; exchanges without one use `output_dir`.
    pub snapshot_paths: HashMap<Protocol, PathBuf>,
    pub exchanges: Vec<Protocol>,
    pub aevo_url: String,
    pub mango_url: String,
    pub vertex_url: String,
    pub hyperliquid_url: String,
    pub vertex_products: Vec<(u32, String)>,
    /// `None` means requests may block indefinitely.
    pub request_timeout: Option<Duration>,
    pub snapshot_mode: SnapshotMode,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            snapshot_paths: HashMap::new(),
            exchanges: vec![
                Protocol::Aevo,
                Protocol::Hyperliquid,
                Protocol::Mango,
                Protocol::Vertex,
            ],
            aevo_url: DEFAULT_AEVO_URL.to_string(),
            mango_url: DEFAULT_MANGO_URL.to_string(),
            vertex_url: DEFAULT_VERTEX_URL.to_string(),
            hyperliquid_url: DEFAULT_HYPERLIQUID_URL.to_string(),
            vertex_products: DEFAULT_VERTEX_PRODUCTS
                .iter()
                .map(|(id, symbol)| (*id, symbol.to_string()))
                .collect(),
            request_timeout: Some(Duration::from_secs(30)),
            snapshot_mode: SnapshotMode::Rewrite,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        for (protocol, key) in [
            (Protocol::Aevo, "AEVO_SNAPSHOT_PATH"),
            (Protocol::Mango, "MANGO_SNAPSHOT_PATH"),
            (Protocol::Vertex, "VERTEX_SNAPSHOT_PATH"),
            (Protocol::Hyperliquid, "HYPERLIQUID_SNAPSHOT_PATH"),
        ] {
            if let Some(path) = lookup(key).filter(|p| !p.trim().is_empty()) {
                config
                    .snapshot_paths
                    .insert(protocol, PathBuf::from(path.trim()));
            }
        }

        if let Some(list) = lookup("EXCHANGES") {
            config.exchanges = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    Protocol::from_id(s).ok_or_else(|| ConfigError::Invalid {
                        key: "EXCHANGES",
                        value: s.trim().to_string(),
                        reason: "unknown exchange".to_string(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(url) = lookup("AEVO_API_URL") {
            config.aevo_url = trim_url(url);
        }
        if let Some(url) = lookup("MANGO_API_URL") {
            config.mango_url = trim_url(url);
        }
        if let Some(url) = lookup("VERTEX_API_URL") {
            config.vertex_url = trim_url(url);
        }
        if let Some(url) = lookup("HYPERLIQUID_API_URL") {
            config.hyperliquid_url = trim_url(url);
        }

        if let Some(table) = lookup("VERTEX_PRODUCTS") {
            config.vertex_products = parse_products(&table)?;
        }

        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                value: secs.clone(),
                reason: e.to_string(),
            })?;
            // 0 turns the timeout off
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(mode) = lookup("SNAPSHOT_MODE") {
            config.snapshot_mode = match mode.trim().to_lowercase().as_str() {
                "rewrite" => SnapshotMode::Rewrite,
                "append" => SnapshotMode::Append,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SNAPSHOT_MODE",
                        value: mode,
                        reason: "expected `rewrite` or `append`".to_string(),
                    });
                }
            };
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            config.log_format = match format.trim().to_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT",
                        value: format,
                        reason: "expected `text` or `json`".to_string(),
                    });
                }
            };
        }

        Ok(config)
    }

    /// Snapshot file for an exchange: its override if set, otherwise e.g.
    /// `./hl_funding_snap.csv`.
    pub fn snapshot_path(&self, protocol: Protocol) -> PathBuf {
        if let Some(path) = self.snapshot_paths.get(&protocol) {
            return path.clone();
        }
        let stem = match protocol {
            Protocol::Hyperliquid => "hl",
            other => other.id(),
        };
        self.output_dir.join(format!("{stem}_funding_snap.csv"))
    }

    pub fn base_url(&self, protocol: Protocol) -> &str {
        match protocol {
            Protocol::Aevo => &self.aevo_url,
            Protocol::Mango => &self.mango_url,
            Protocol::Vertex => &self.vertex_url,
            Protocol::Hyperliquid => &self.hyperliquid_url,
        }
    }
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Parses `2:BTC,4:ETH,...`, keeping the given order.
fn parse_products(table: &str) -> Result<Vec<(u32, String)>, ConfigError> {
    table
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let invalid = |reason: &str| ConfigError::Invalid {
                key: "VERTEX_PRODUCTS",
                value: entry.trim().to_string(),
                reason: reason.to_string(),
            };

            let (id, symbol) = entry
                .split_once(':')
                .ok_or_else(|| invalid("expected `product_id:SYMBOL`"))?;
            let id = id
                .trim()
                .parse::<u32>()
                .map_err(|_| invalid("product id must be an unsigned integer"))?;
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() {
                return Err(invalid("symbol must not be empty"));
            }

            Ok((id, symbol))
        })
        .collect()
}
