//! Node access, one adapter per protocol.
//!
//! Adapters return quantities already normalized to [`Token`]s and never
//! retry; the store decides what to do with a failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::WalletConfig;
use crate::error::OperationError;
use crate::types::{
    AccountInfo, AliasTarget, HarvestedBlock, NetworkProperties, Page, Protocol, SignedTransaction,
    TokenInfo, TransactionCriteria, WireTransaction,
};

pub mod client;
pub mod ethereum;
pub mod nem;
pub mod symbol;

pub use ethereum::EthereumAdapter;
pub use nem::NemAdapter;
pub use symbol::SymbolAdapter;

#[async_trait]
pub trait NetworkAdapter: Send + Sync {
    fn protocol(&self) -> Protocol;

    async fn fetch_network_properties(&self) -> Result<NetworkProperties, OperationError>;

    async fn fetch_account_info(&self, address: &str) -> Result<AccountInfo, OperationError>;

    /// Announces a signed transaction and returns its hash.
    async fn submit(&self, signed: &SignedTransaction) -> Result<String, OperationError>;

    async fn fetch_transaction_page(
        &self,
        criteria: &TransactionCriteria,
    ) -> Result<Page<WireTransaction>, OperationError>;

    async fn fetch_token_info(&self, id: &str) -> Result<TokenInfo, OperationError>;

    async fn fetch_harvested_blocks(
        &self,
        _address: &str,
        _page_number: u32,
        _page_size: u32,
    ) -> Result<Page<HarvestedBlock>, OperationError> {
        Err(OperationError::unsupported(self.protocol(), "harvesting"))
    }

    async fn fetch_alias_target(&self, _namespace_id: &str) -> Result<AliasTarget, OperationError> {
        Err(OperationError::unsupported(self.protocol(), "namespaces"))
    }
}

pub fn create_adapter(config: &WalletConfig) -> Result<Arc<dyn NetworkAdapter>, OperationError> {
    config.validate()?;
    let adapter: Arc<dyn NetworkAdapter> = match config.protocol {
        Protocol::Symbol => Arc::new(SymbolAdapter::new(config)?),
        Protocol::Ethereum => Arc::new(EthereumAdapter::new(config)?),
        Protocol::Nem => Arc::new(NemAdapter::new(config)?),
    };
    Ok(adapter)
}

/// Token metadata seen so far, keyed by uppercase id.
#[derive(Debug, Default)]
pub(crate) struct TokenCache {
    entries: Mutex<HashMap<String, TokenInfo>>,
}

impl TokenCache {
    pub(crate) fn get(&self, id: &str) -> Option<TokenInfo> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&id.to_ascii_uppercase()).cloned())
    }

    pub(crate) fn insert(&self, info: TokenInfo) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(info.id.to_ascii_uppercase(), info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_matches_configured_protocol() {
        for protocol in Protocol::ALL {
            let config = WalletConfig {
                protocol,
                network_identifier: protocol.network_identifiers()[0].into(),
                ..Default::default()
            };
            assert_eq!(create_adapter(&config).unwrap().protocol(), protocol);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = WalletConfig {
            protocol: Protocol::Nem,
            network_identifier: "sepolia".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_adapter(&config),
            Err(OperationError::Configuration(_))
        ));
    }

    #[test]
    fn token_cache_is_case_insensitive() {
        let cache = TokenCache::default();
        cache.insert(TokenInfo {
            id: "0xAbC".into(),
            name: "T".into(),
            divisibility: 2,
        });
        assert_eq!(cache.get("0xabc").unwrap().divisibility, 2);
        assert!(cache.get("0xdef").is_none());
    }
}
