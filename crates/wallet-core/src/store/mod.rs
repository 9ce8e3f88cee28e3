//! Wallet state: one module per concern, each with a pure reducer, a watch
//! channel for subscribers and its own error slot.
//!
//! Remote fetches go through a [`Coalescer`]: at most one request per
//! module is in flight, concurrent callers share its result, and a result
//! that arrives after an invalidation is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::future::{BoxFuture, FutureExt, Shared as SharedFuture};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WalletConfig;
use crate::deriver::AccountDeriver;
use crate::error::OperationError;
use crate::fee::FeeCalculator;
use crate::network::NetworkAdapter;
use crate::protocol::{EncodeContext, TransactionCodec};
use crate::types::{
    AccountType, NetworkProperties, PrivateAccount, Protocol, PublicAccount, Transaction,
    TransactionFeeTiers, TransactionGroup,
};

pub mod accounts;
pub mod address_book;
pub mod harvesting;
pub mod listener;
pub mod market;
pub mod storage;
pub mod transactions;

pub use accounts::{AccountsAction, AccountsModule, AccountsState};
pub use address_book::{AddressBookAction, AddressBookModule, AddressBookState};
pub use harvesting::{HarvestingAction, HarvestingModule, HarvestingState, HarvestingStatus};
pub use listener::{ListenerConnection, ListenerEvent, ListenerTransport};
pub use market::{MarketAction, MarketModule, MarketState};
pub use storage::{MemoryStorage, ScopedStorage, Storage, StorageKey};
pub use transactions::{TransactionsAction, TransactionsModule, TransactionsState};

use storage::{load_json, save_json};

type SharedFetch<T> = SharedFuture<BoxFuture<'static, Result<T, OperationError>>>;

struct InFlight<T> {
    ticket: u64,
    generation: u64,
    future: SharedFetch<T>,
}

/// Deduplicates concurrent fetches and discards superseded results.
pub struct Coalescer<T> {
    slot: Mutex<Option<InFlight<T>>>,
    generation: AtomicU64,
    next_ticket: AtomicU64,
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
            next_ticket: AtomicU64::new(0),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Coalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the fetch in flight or starts one with `start`.
    ///
    /// Returns `Ok(None)` when [`invalidate`](Self::invalidate) was called
    /// while the fetch ran.
    pub async fn run<F>(&self, start: F) -> Result<Option<T>, OperationError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, OperationError>>,
    {
        let (ticket, generation, future) = {
            let mut slot = self
                .slot
                .lock()
                .map_err(|_| OperationError::Storage("fetch slot poisoned".into()))?;
            match slot.as_ref() {
                Some(in_flight) => (
                    in_flight.ticket,
                    in_flight.generation,
                    in_flight.future.clone(),
                ),
                None => {
                    let in_flight = InFlight {
                        ticket: self.next_ticket.fetch_add(1, Ordering::SeqCst),
                        generation: self.generation.load(Ordering::SeqCst),
                        future: start().shared(),
                    };
                    let joined = (in_flight.ticket, in_flight.generation, in_flight.future.clone());
                    *slot = Some(in_flight);
                    joined
                }
            }
        };

        let result = future.await;

        if let Ok(mut slot) = self.slot.lock() {
            if slot.as_ref().is_some_and(|in_flight| in_flight.ticket == ticket) {
                *slot = None;
            }
        }
        if generation != self.generation.load(Ordering::SeqCst) {
            return Ok(None);
        }
        result.map(Some)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Services every module reads from.
pub(crate) struct Shared {
    pub(crate) config: WalletConfig,
    pub(crate) adapter: Arc<dyn NetworkAdapter>,
    pub(crate) codec: Arc<dyn TransactionCodec>,
    pub(crate) deriver: AccountDeriver,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) secure: Arc<dyn Storage>,
    network: watch::Sender<Option<NetworkProperties>>,
    network_fetch: Coalescer<NetworkProperties>,
    current: watch::Sender<Option<PublicAccount>>,
}

impl Shared {
    pub(crate) fn current_account(&self) -> Option<PublicAccount> {
        self.current.borrow().clone()
    }

    pub(crate) fn set_current_account(&self, account: Option<PublicAccount>) {
        self.current.send_if_modified(|current| {
            if *current == account {
                return false;
            }
            *current = account;
            true
        });
    }

    /// Cached properties, fetching them on first use.
    pub(crate) async fn network_properties(&self) -> Result<NetworkProperties, OperationError> {
        let cached = self.network.borrow().clone();
        match cached {
            Some(properties) => Ok(properties),
            None => self.refresh_network().await,
        }
    }

    pub(crate) async fn refresh_network(&self) -> Result<NetworkProperties, OperationError> {
        let adapter = self.adapter.clone();
        let fetched = self
            .network_fetch
            .run(move || async move { adapter.fetch_network_properties().await }.boxed())
            .await?;
        let properties = fetched
            .ok_or_else(|| OperationError::network("network properties fetch was superseded"))?;
        if let Err(e) =
            save_json(&*self.storage, StorageKey::NETWORK_PROPERTIES, &properties).await
        {
            warn!("fail to cache network properties: {}", e);
        }
        self.network.send_replace(Some(properties.clone()));
        Ok(properties)
    }

    /// Reads the account's key material from secure storage.
    pub(crate) async fn signing_account(
        &self,
        account: &PublicAccount,
    ) -> Result<PrivateAccount, OperationError> {
        let private = match account.account_type {
            AccountType::Mnemonic => {
                let index = account.index.ok_or_else(|| {
                    OperationError::Storage(format!("account {} has no index", account.address))
                })?;
                let mnemonic = self
                    .secure
                    .get(StorageKey::MNEMONIC)
                    .await?
                    .map(crypto_utils::zeroizing::ZeroizingString::new)
                    .ok_or_else(|| OperationError::Storage("no mnemonic stored".into()))?;
                self.deriver.derive_account(
                    &mnemonic,
                    index,
                    &account.network_identifier,
                    &account.name,
                )?
            }
            AccountType::External => {
                let key = StorageKey::for_account(StorageKey::PRIVATE_KEY, &account.address);
                let private_key = self
                    .secure
                    .get(&key)
                    .await?
                    .map(crypto_utils::zeroizing::ZeroizingString::new)
                    .ok_or_else(|| {
                        OperationError::Storage(format!("no key stored for {}", account.address))
                    })?;
                self.deriver.import_private_key(
                    &private_key,
                    &account.network_identifier,
                    &account.name,
                )?
            }
        };
        if private.account.address != account.address {
            return Err(OperationError::Storage(format!(
                "stored key does not match account {}",
                account.address
            )));
        }
        Ok(private)
    }
}

struct ListenerHandle {
    transport: Arc<dyn ListenerTransport>,
    cancel: CancellationToken,
}

pub struct WalletStore {
    shared: Arc<Shared>,
    pub accounts: AccountsModule,
    pub transactions: TransactionsModule,
    pub address_book: AddressBookModule,
    pub market: MarketModule,
    pub harvesting: HarvestingModule,
    listener: Mutex<Option<ListenerHandle>>,
}

impl WalletStore {
    pub fn new(
        config: WalletConfig,
        adapter: Arc<dyn NetworkAdapter>,
        codec: Arc<dyn TransactionCodec>,
        storage: Arc<dyn Storage>,
        secure: Arc<dyn Storage>,
    ) -> Result<Arc<Self>, OperationError> {
        config.validate()?;
        if adapter.protocol() != config.protocol || codec.protocol() != config.protocol {
            return Err(OperationError::Configuration(format!(
                "adapter ({}) and codec ({}) must match configured protocol {}",
                adapter.protocol(),
                codec.protocol(),
                config.protocol
            )));
        }
        let shared = Arc::new(Shared {
            deriver: AccountDeriver::new(config.protocol),
            config,
            adapter,
            codec,
            storage,
            secure,
            network: watch::Sender::new(None),
            network_fetch: Coalescer::new(),
            current: watch::Sender::new(None),
        });
        Ok(Arc::new(Self {
            accounts: AccountsModule::new(shared.clone()),
            transactions: TransactionsModule::new(shared.clone()),
            address_book: AddressBookModule::new(shared.clone()),
            market: MarketModule::new(shared.clone())?,
            harvesting: HarvestingModule::new(shared.clone()),
            shared,
            listener: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &WalletConfig {
        &self.shared.config
    }

    pub fn network(&self) -> Option<NetworkProperties> {
        self.shared.network.borrow().clone()
    }

    pub fn subscribe_network(&self) -> watch::Receiver<Option<NetworkProperties>> {
        self.shared.network.subscribe()
    }

    pub async fn network_properties(&self) -> Result<NetworkProperties, OperationError> {
        self.shared.network_properties().await
    }

    /// Restores every module from storage. Never fails; unreadable entries
    /// leave the defaults in place.
    pub async fn load_cache(&self) {
        match load_json::<NetworkProperties>(&*self.shared.storage, StorageKey::NETWORK_PROPERTIES)
            .await
        {
            Ok(Some(properties)) if properties.protocol == self.shared.config.protocol => {
                self.shared.network.send_replace(Some(properties));
            }
            Ok(_) => {}
            Err(e) => warn!("ignoring cached network properties: {}", e),
        }
        self.accounts.load_cache().await;
        tokio::join!(
            self.transactions.load_cache(),
            self.harvesting.load_cache(),
            self.address_book.load_cache(),
            self.market.load_cache(),
        );
    }

    /// Refreshes network properties, then every module concurrently.
    pub async fn fetch_all(&self) {
        if let Err(e) = self.shared.refresh_network().await {
            warn!("fail to refresh network properties: {}", e);
        }
        tokio::join!(
            self.accounts.fetch_data(),
            self.transactions.fetch_data(),
            self.address_book.fetch_data(),
            self.market.fetch_data(),
            self.harvesting.fetch_data(),
        );
    }

    /// Switches account. Transactions, harvesting and balances are dropped
    /// and reloaded; market data is kept.
    pub async fn select_account(self: &Arc<Self>, address: &str) -> Result<(), OperationError> {
        if !self.accounts.select(address).await? {
            return Ok(());
        }
        self.accounts.invalidate_balances();
        self.transactions.invalidate();
        self.harvesting.invalidate();

        let transport = self
            .listener
            .lock()
            .ok()
            .and_then(|listener| listener.as_ref().map(|handle| handle.transport.clone()));
        if let Some(transport) = transport {
            self.start_listener(transport);
        }

        tokio::join!(self.transactions.load_cache(), self.harvesting.load_cache());
        tokio::join!(
            self.accounts.fetch_data(),
            self.transactions.fetch_data(),
            self.harvesting.fetch_data(),
        );
        Ok(())
    }

    pub async fn fee_tiers(&self, tx: &Transaction) -> Result<TransactionFeeTiers, OperationError> {
        let network = self.shared.network_properties().await?;
        FeeCalculator::new(self.shared.config.protocol).compute_fee_tiers(tx, &network)
    }

    /// Signs with the current account and announces.
    pub async fn send_transaction(
        &self,
        tx: &Transaction,
        recipient_public_key: Option<&str>,
    ) -> Result<String, OperationError> {
        let account = self
            .shared
            .current_account()
            .ok_or_else(|| OperationError::Validation("no account selected".into()))?;
        let network = self.shared.network_properties().await?;
        let signer = self.shared.signing_account(&account).await?;

        let mut tx = tx.clone();
        if tx.nonce.is_none() && self.shared.config.protocol == Protocol::Ethereum {
            tx.nonce = self.shared.adapter.fetch_account_info(&account.address).await?.nonce;
        }
        let mut ctx = EncodeContext::new(&network).signed_by(&signer);
        if let Some(public_key) = recipient_public_key {
            ctx = ctx.with_recipient_public_key(public_key);
        }
        let signed = self.shared.codec.sign_with(&tx, &ctx)?;
        let hash = self.shared.adapter.submit(&signed).await?;
        info!("submitted transaction {} from {}", hash, account.address);

        tx.hash = Some(hash.clone());
        tx.signer_public_key = Some(signer.public_key().to_owned());
        tx.signer_address = signer.address().to_owned();
        self.transactions.dispatch(TransactionsAction::Added {
            group: TransactionGroup::Unconfirmed,
            transaction: tx,
        });
        Ok(hash)
    }

    /// Purges secrets and cached data and stops the listener.
    pub async fn reset(&self) -> Result<(), OperationError> {
        self.stop_listener();
        let accounts = self.accounts.state().accounts;
        for account in &accounts {
            if account.account_type == AccountType::External {
                self.shared
                    .secure
                    .remove(&StorageKey::for_account(StorageKey::PRIVATE_KEY, &account.address))
                    .await?;
            }
            for key in [StorageKey::LATEST_TRANSACTIONS, StorageKey::HARVESTING] {
                self.shared
                    .storage
                    .remove(&StorageKey::for_account(key, &account.address))
                    .await?;
            }
        }
        self.shared.secure.remove(StorageKey::MNEMONIC).await?;
        for key in [
            StorageKey::ACCOUNTS,
            StorageKey::SELECTED_ACCOUNT,
            StorageKey::ADDRESS_BOOK,
            StorageKey::USER_CURRENCY,
            StorageKey::NETWORK_PROPERTIES,
        ] {
            self.shared.storage.remove(key).await?;
        }

        self.accounts.reset();
        self.transactions.invalidate();
        self.harvesting.invalidate();
        self.address_book.dispatch(AddressBookAction::CacheLoaded(Vec::new()));
        self.market.reset();
        self.shared.network.send_replace(None);
        info!("wallet reset");
        Ok(())
    }

    /// Listens for the current account, replacing any running listener.
    pub fn start_listener(self: &Arc<Self>, transport: Arc<dyn ListenerTransport>) {
        self.stop_listener();
        let Some(account) = self.shared.current_account() else {
            warn!("no account selected, listener not started");
            return;
        };

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(listener::run(
            transport.clone(),
            account.address.clone(),
            self.shared.config.listener_retry_interval(),
            events_tx,
            cancel.clone(),
        ));
        tokio::spawn(consume_events(Arc::downgrade(self), events_rx));

        if let Ok(mut listener) = self.listener.lock() {
            *listener = Some(ListenerHandle { transport, cancel });
        }
    }

    /// Cancels the listener; its connection closes in the background.
    pub fn stop_listener(&self) {
        let handle = self.listener.lock().ok().and_then(|mut listener| listener.take());
        if let Some(handle) = handle {
            handle.cancel.cancel();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .map(|listener| listener.is_some())
            .unwrap_or(false)
    }
}

impl Drop for WalletStore {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

async fn consume_events(store: Weak<WalletStore>, mut events: mpsc::Receiver<ListenerEvent>) {
    while let Some(event) = events.recv().await {
        let Some(store) = store.upgrade() else {
            break;
        };
        let refresh_balances = matches!(event, ListenerEvent::ConfirmedAdd(_));
        store.transactions.apply_event(event).await;
        if refresh_balances {
            store.accounts.fetch_data().await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{codec_for, DecodeContext};
    use crate::store::listener::tests::MockTransport;
    use crate::store::testing::{harness, network, signed_transfer, symbol_account, MNEMONIC};
    use crate::types::{AccountInfo, Token, WireTransaction};
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn wait_until<T>(updates: &mut watch::Receiver<T>, done: impl Fn(&T) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if done(&updates.borrow_and_update()) {
                    return;
                }
                updates.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_runs_share_one_fetch() {
        let coalescer = Coalescer::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let start = || {
            let calls = calls.clone();
            move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(7)
                }
                .boxed()
            }
        };
        let (a, b, c) = tokio::join!(
            coalescer.run(start()),
            coalescer.run(start()),
            coalescer.run(start()),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (Some(7), Some(7), Some(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A later call starts a new fetch.
        assert_eq!(coalescer.run(start()).await.unwrap(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_results_are_dropped() {
        let coalescer = Coalescer::<u32>::new();
        let stale = coalescer.run(|| {
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1)
            }
            .boxed()
        });
        let invalidate = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            coalescer.invalidate();
        };
        let (stale, ()) = tokio::join!(stale, invalidate);
        assert_eq!(stale.unwrap(), None);
        assert_eq!(coalescer.run(|| async { Ok(2) }.boxed()).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn errors_are_shared_too() {
        let coalescer = Coalescer::<u32>::new();
        let err = coalescer
            .run(|| async { Err(OperationError::network("down")) }.boxed())
            .await
            .unwrap_err();
        assert_eq!(err, OperationError::network("down"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_balance_fetch_in_flight() {
        let h = harness(Protocol::Symbol);
        h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        h.adapter.set_delay(Duration::from_millis(100));
        tokio::join!(
            h.store.accounts.fetch_data(),
            h.store.accounts.fetch_data(),
            h.store.accounts.fetch_data(),
        );
        assert_eq!(h.adapter.calls("account_info"), 1);
        assert_eq!(h.adapter.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(h.store.accounts.state().info.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_account_drops_stale_balances() {
        let h = harness(Protocol::Symbol);
        let main = h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let second = h.store.accounts.add_mnemonic_account("second").await.unwrap();
        h.store.market.set_currency("EUR").await.unwrap();

        let xym = network(Protocol::Symbol).native_currency.token_info();
        let mut rich = AccountInfo::empty(&main.address);
        rich.tokens = vec![Token::new(&xym, Decimal::from(100))];
        h.adapter.set_account_info(rich);
        h.adapter.set_delay(Duration::from_millis(100));

        let store = h.store.clone();
        let slow = tokio::spawn(async move { store.accounts.fetch_data().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.store.select_account(&second.address).await.unwrap();
        slow.await.unwrap();

        let state = h.store.accounts.state();
        assert_eq!(state.selected.as_deref(), Some(second.address.as_str()));
        assert!(state.info.is_some());
        assert!(state.balances().is_empty());
        assert_eq!(h.store.market.state().currency, "EUR");
    }

    #[tokio::test(start_paused = true)]
    async fn listener_follows_selected_account() {
        let h = harness(Protocol::Symbol);
        let main = h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let second = h.store.accounts.add_mnemonic_account("second").await.unwrap();
        let transport = Arc::new(MockTransport::default());

        h.store.start_listener(transport.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.store.select_account(&second.address).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let log = transport.log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], format!("connect {}", main.address));
        assert!(log.contains(&"close".to_owned()));
        assert!(log.contains(&format!("connect {}", second.address)));

        h.store.stop_listener();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!h.store.is_listening());
        assert_eq!(transport.log().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn confirmed_event_lands_in_history() {
        let h = harness(Protocol::Symbol);
        h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let incoming = signed_transfer(1, 0, 5_000_000);
        let wire = WireTransaction::Payload(incoming.wire_payload.clone());
        let transport = Arc::new(MockTransport::new(vec![Ok(vec![
            ListenerEvent::UnconfirmedAdd(wire.clone()),
            ListenerEvent::ConfirmedAdd(wire),
        ])]));

        let mut transactions = h.store.transactions.subscribe();
        let mut accounts = h.store.accounts.subscribe();
        h.store.start_listener(transport);
        wait_until(&mut transactions, |s| !s.confirmed.is_empty()).await;
        wait_until(&mut accounts, |s| s.info.is_some()).await;
        h.store.stop_listener();

        let state = h.store.transactions.state();
        assert!(state.unconfirmed.is_empty());
        assert_eq!(state.confirmed[0].hash.as_deref(), Some(incoming.hash.as_str()));
    }

    #[tokio::test]
    async fn send_signs_with_stored_mnemonic() {
        let h = harness(Protocol::Symbol);
        let me = h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let xym = network(Protocol::Symbol).native_currency.token_info();
        let tx = Transaction {
            signer_address: me.address.clone(),
            recipient_address: Some(symbol_account(1).address().to_owned()),
            tokens: vec![Token::new(&xym, Decimal::ONE)],
            fee: Some(Token::new(&xym, Decimal::new(2, 2))),
            deadline: Some(1_700_000_000_000),
            ..Default::default()
        };

        let tiers = h.store.fee_tiers(&tx).await.unwrap();
        assert!(tiers.slow.token.amount <= tiers.fast.token.amount);

        let hash = h.store.send_transaction(&tx, None).await.unwrap();
        let submitted = h.adapter.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].hash, hash);
        assert_eq!(
            h.store.transactions.state().unconfirmed[0].hash.as_deref(),
            Some(hash.as_str())
        );

        let decoded = codec_for(Protocol::Symbol)
            .from_wire(
                &WireTransaction::Payload(submitted[0].wire_payload.clone()),
                &DecodeContext::new(network(Protocol::Symbol)),
            )
            .unwrap();
        assert!(decoded
            .signer_public_key
            .unwrap()
            .eq_ignore_ascii_case(&me.public_key));
    }

    #[tokio::test]
    async fn send_without_account_fails() {
        let h = harness(Protocol::Symbol);
        let err = h
            .store
            .send_transaction(&Transaction::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));
        assert!(h.adapter.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_purges_secrets_and_state() {
        let h = harness(Protocol::Symbol);
        h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let imported = h
            .store
            .accounts
            .import_account(
                "575DBB3062267EFF57C970A336EBBC8FBCFE12C5BD3ED7BC11EB0481D7704CED",
                "cold",
            )
            .await
            .unwrap();
        h.store.market.set_currency("EUR").await.unwrap();
        h.store.fetch_all().await;
        assert!(h.store.network().is_some());

        h.store.reset().await.unwrap();
        let key = StorageKey::for_account(StorageKey::PRIVATE_KEY, &imported.address);
        assert_eq!(h.secure.get(&key).await.unwrap(), None);
        assert_eq!(h.secure.get(StorageKey::MNEMONIC).await.unwrap(), None);
        assert_eq!(h.storage.get(StorageKey::ACCOUNTS).await.unwrap(), None);
        assert!(h.store.accounts.state().accounts.is_empty());
        assert_eq!(h.store.market.state().currency, "USD");
        assert!(h.store.network().is_none());

        h.store.accounts.create_wallet(MNEMONIC, "again").await.unwrap();
    }

    #[tokio::test]
    async fn cached_network_properties_survive_restart() {
        let h = harness(Protocol::Symbol);
        h.store.network_properties().await.unwrap();
        assert_eq!(h.adapter.calls("network"), 1);

        let reopened = h.reopen();
        reopened.store.load_cache().await;
        assert_eq!(reopened.store.network(), Some(network(Protocol::Symbol)));
        reopened.store.network_properties().await.unwrap();
        assert_eq!(h.adapter.calls("network"), 1);
    }
}
