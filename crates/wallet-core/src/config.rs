use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OperationError;
use crate::types::{Protocol, TokenInfo};

const DEFAULT_LISTENER_RETRY_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub protocol: Protocol,
    pub network_identifier: String,
    pub node_url: String,
    /// Etherscan-compatible API used for Ethereum history.
    pub explorer_url: Option<String>,
    /// Price endpoint answering `?fsym=XYM&tsyms=USD` with `{"USD": 0.02}`.
    pub price_feed_url: Option<String>,
    pub request_timeout_secs: u64,
    pub listener_retry_secs: u64,
    pub page_size: u32,
    /// ERC-20 tokens whose balances are reported with the account.
    pub tracked_tokens: Vec<TokenInfo>,
    /// NEM public keys eligible for the opt-in key.
    pub opt_in_allow_list: Vec<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Symbol,
            network_identifier: "testnet".into(),
            node_url: "http://localhost:3000".into(),
            explorer_url: None,
            price_feed_url: None,
            request_timeout_secs: 30,
            listener_retry_secs: DEFAULT_LISTENER_RETRY_SECS,
            page_size: 20,
            tracked_tokens: Vec::new(),
            opt_in_allow_list: Vec::new(),
        }
    }
}

impl WalletConfig {
    /// Reads `path`, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::error!("fail to deserialize config {}", e);
                Self::default()
            }),
            Err(e) => {
                tracing::error!("fail to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, OperationError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| OperationError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OperationError> {
        self.protocol.network_type(&self.network_identifier)?;
        if !(self.node_url.starts_with("http://") || self.node_url.starts_with("https://")) {
            return Err(OperationError::Configuration(format!(
                "node url must be http(s): {}",
                self.node_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(OperationError::Configuration("request timeout must be positive".into()));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(OperationError::Configuration(format!(
                "page size {} outside 1..=100",
                self.page_size
            )));
        }
        if self.protocol != Protocol::Ethereum && !self.tracked_tokens.is_empty() {
            return Err(OperationError::Configuration(
                "tracked tokens only apply to ethereum".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listener_retry_interval(&self) -> Duration {
        Duration::from_secs(self.listener_retry_secs)
    }
}
