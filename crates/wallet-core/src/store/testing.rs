//! In-process adapter and storage doubles for store tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::storage::{MemoryStorage, Storage};
use super::WalletStore;
use crate::config::WalletConfig;
use crate::deriver::AccountDeriver;
use crate::error::OperationError;
use crate::network::NetworkAdapter;
use crate::protocol::codec_for;
use crate::types::{
    AccountInfo, AliasTarget, FeeMultipliers, HarvestedBlock, NativeCurrency, NetworkProperties,
    Page, PrivateAccount, Protocol, SignedTransaction, Token, TokenInfo, Transaction,
    TransactionCriteria, TransactionGroup, WireTransaction,
};

pub const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub fn network(protocol: Protocol) -> NetworkProperties {
    match protocol {
        Protocol::Symbol => NetworkProperties {
            protocol,
            node_url: "http://localhost:3000".into(),
            network_identifier: "testnet".into(),
            network_type: 152,
            generation_hash: Some(
                "49D6E1CE276A85B70EAFE52349AACCA389302E7A9754BCF1221E79494FC665A4".into(),
            ),
            epoch_adjustment: 1_667_250_467,
            chain_height: 100,
            fee_multipliers: FeeMultipliers {
                min: 10,
                average: 100,
                highest: 1000,
            },
            base_fee_per_gas: None,
            native_currency: NativeCurrency {
                id: "72C0212E67A08BCE".into(),
                name: "symbol.xym".into(),
                divisibility: 6,
            },
        },
        Protocol::Ethereum => NetworkProperties {
            protocol,
            node_url: "http://localhost:8545".into(),
            network_identifier: "sepolia".into(),
            network_type: 11_155_111,
            generation_hash: None,
            epoch_adjustment: 0,
            chain_height: 5_000_000,
            fee_multipliers: FeeMultipliers {
                min: 1_000_000_000,
                average: 2_000_000_000,
                highest: 3_000_000_000,
            },
            base_fee_per_gas: Some(10_000_000_000),
            native_currency: NativeCurrency {
                id: "ETH".into(),
                name: "ETH".into(),
                divisibility: 18,
            },
        },
        Protocol::Nem => NetworkProperties {
            protocol,
            node_url: "http://localhost:7890".into(),
            network_identifier: "testnet".into(),
            network_type: 152,
            generation_hash: None,
            epoch_adjustment: chain_nem::network::NEMESIS_EPOCH,
            chain_height: 1,
            fee_multipliers: FeeMultipliers::default(),
            base_fee_per_gas: None,
            native_currency: NativeCurrency {
                id: "nem:xem".into(),
                name: "nem:xem".into(),
                divisibility: 6,
            },
        },
    }
}

pub fn symbol_account(index: u32) -> PrivateAccount {
    AccountDeriver::new(Protocol::Symbol)
        .derive_account(MNEMONIC, index, "testnet", "test")
        .unwrap()
}

/// A signed Symbol transfer of `micro_xym` between mnemonic accounts.
pub fn signed_transfer(from: u32, to: u32, micro_xym: u64) -> SignedTransaction {
    let network = network(Protocol::Symbol);
    let (sender, recipient) = (symbol_account(from), symbol_account(to));
    let xym = network.native_currency.token_info();
    let tx = Transaction {
        signer_public_key: Some(sender.public_key().to_owned()),
        signer_address: sender.address().to_owned(),
        recipient_address: Some(recipient.address().to_owned()),
        tokens: vec![Token::from_absolute(&xym, u128::from(micro_xym)).unwrap()],
        fee: Some(Token::from_absolute(&xym, 20_000).unwrap()),
        deadline: Some(1_700_000_000_000),
        ..Default::default()
    };
    codec_for(Protocol::Symbol).sign(&tx, &network, &sender).unwrap()
}

/// Memory storage whose writes can be made to fail.
#[derive(Default)]
pub struct TestStorage {
    inner: MemoryStorage,
    fail_writes: AtomicBool,
}

impl TestStorage {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), OperationError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(OperationError::Storage("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for TestStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, OperationError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), OperationError> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), OperationError> {
        self.check()?;
        self.inner.remove(key).await
    }
}

/// Scripted node. Every call sleeps `delay` first and is counted.
pub struct MockAdapter {
    protocol: Protocol,
    pub delay: Mutex<Duration>,
    pub network: Mutex<Result<NetworkProperties, OperationError>>,
    pub account_info: Mutex<HashMap<String, AccountInfo>>,
    pub pages: Mutex<HashMap<TransactionGroup, Vec<WireTransaction>>>,
    pub harvested: Mutex<Vec<HarvestedBlock>>,
    pub aliases: Mutex<HashMap<String, AliasTarget>>,
    pub submitted: Mutex<Vec<SignedTransaction>>,
    pub calls: Mutex<HashMap<&'static str, usize>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockAdapter {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            delay: Mutex::new(Duration::ZERO),
            network: Mutex::new(Ok(network(protocol))),
            account_info: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            harvested: Mutex::new(Vec::new()),
            aliases: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_account_info(&self, info: AccountInfo) {
        self.account_info
            .lock()
            .unwrap()
            .insert(info.address.to_ascii_uppercase(), info);
    }

    pub fn set_page(&self, group: TransactionGroup, items: Vec<WireTransaction>) {
        self.pages.lock().unwrap().insert(group, items);
    }

    async fn enter(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkAdapter for MockAdapter {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn fetch_network_properties(&self) -> Result<NetworkProperties, OperationError> {
        self.enter("network").await;
        self.network.lock().unwrap().clone()
    }

    async fn fetch_account_info(&self, address: &str) -> Result<AccountInfo, OperationError> {
        self.enter("account_info").await;
        Ok(self
            .account_info
            .lock()
            .unwrap()
            .get(&address.to_ascii_uppercase())
            .cloned()
            .unwrap_or_else(|| AccountInfo::empty(address)))
    }

    async fn submit(&self, signed: &SignedTransaction) -> Result<String, OperationError> {
        self.enter("submit").await;
        self.submitted.lock().unwrap().push(signed.clone());
        Ok(signed.hash.clone())
    }

    async fn fetch_transaction_page(
        &self,
        criteria: &TransactionCriteria,
    ) -> Result<Page<WireTransaction>, OperationError> {
        self.enter("transactions").await;
        if criteria.group == TransactionGroup::Partial && self.protocol != Protocol::Symbol {
            return Err(OperationError::unsupported(self.protocol, "partial transactions"));
        }
        let items = self
            .pages
            .lock()
            .unwrap()
            .get(&criteria.group)
            .cloned()
            .unwrap_or_default();
        let start = (criteria.page_number.saturating_sub(1) * criteria.page_size) as usize;
        let page: Vec<_> = items
            .iter()
            .skip(start)
            .take(criteria.page_size as usize)
            .cloned()
            .collect();
        Ok(Page {
            is_last_page: start + page.len() >= items.len(),
            items: page,
            page_number: criteria.page_number,
            next_cursor: None,
        })
    }

    async fn fetch_token_info(&self, id: &str) -> Result<TokenInfo, OperationError> {
        self.enter("token_info").await;
        Ok(TokenInfo {
            id: id.to_ascii_uppercase(),
            name: format!("token.{}", id.to_ascii_lowercase()),
            divisibility: 0,
        })
    }

    async fn fetch_harvested_blocks(
        &self,
        _address: &str,
        page_number: u32,
        _page_size: u32,
    ) -> Result<Page<HarvestedBlock>, OperationError> {
        self.enter("harvested").await;
        if self.protocol != Protocol::Symbol {
            return Err(OperationError::unsupported(self.protocol, "harvesting"));
        }
        Ok(Page {
            items: self.harvested.lock().unwrap().clone(),
            page_number,
            is_last_page: true,
            next_cursor: None,
        })
    }

    async fn fetch_alias_target(&self, namespace_id: &str) -> Result<AliasTarget, OperationError> {
        self.enter("alias").await;
        Ok(self
            .aliases
            .lock()
            .unwrap()
            .get(&namespace_id.to_ascii_uppercase())
            .cloned()
            .unwrap_or(AliasTarget::None))
    }
}

pub struct Harness {
    pub store: Arc<WalletStore>,
    pub adapter: Arc<MockAdapter>,
    pub storage: Arc<TestStorage>,
    pub secure: Arc<TestStorage>,
    pub config: WalletConfig,
}

impl Harness {
    /// A fresh store over the same storage and node.
    pub fn reopen(&self) -> Harness {
        build(
            self.config.clone(),
            self.adapter.clone(),
            self.storage.clone(),
            self.secure.clone(),
        )
    }
}

pub fn config(protocol: Protocol) -> WalletConfig {
    WalletConfig {
        protocol,
        network_identifier: network(protocol).network_identifier,
        page_size: 2,
        ..Default::default()
    }
}

pub fn harness(protocol: Protocol) -> Harness {
    harness_with(config(protocol))
}

pub fn harness_with(config: WalletConfig) -> Harness {
    build(
        config.clone(),
        Arc::new(MockAdapter::new(config.protocol)),
        Arc::new(TestStorage::default()),
        Arc::new(TestStorage::default()),
    )
}

fn build(
    config: WalletConfig,
    adapter: Arc<MockAdapter>,
    storage: Arc<TestStorage>,
    secure: Arc<TestStorage>,
) -> Harness {
    let store = WalletStore::new(
        config.clone(),
        adapter.clone(),
        codec_for(config.protocol),
        storage.clone(),
        secure.clone(),
    )
    .unwrap();
    Harness {
        store,
        adapter,
        storage,
        secure,
        config,
    }
}
