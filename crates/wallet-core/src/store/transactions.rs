use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::listener::ListenerEvent;
use super::storage::{load_json, save_json, StorageKey};
use super::{Coalescer, Shared};
use crate::error::OperationError;
use crate::protocol::{lookup_key, DecodeContext, References};
use crate::types::{
    AliasTarget, NetworkProperties, Page, Protocol, PublicAccount, Transaction,
    TransactionCriteria, TransactionGroup, WireTransaction,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionsState {
    /// Newest first.
    pub confirmed: Vec<Transaction>,
    pub unconfirmed: Vec<Transaction>,
    pub partial: Vec<Transaction>,
    /// Last confirmed page loaded; `0` until the first fetch lands.
    pub page_number: u32,
    pub is_last_page: bool,
    pub next_cursor: Option<String>,
    pub loading: bool,
    /// Undecodable items dropped from the loaded pages.
    pub skipped: usize,
    pub error: Option<OperationError>,
}

/// First page of every group the protocol serves.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPages {
    pub confirmed: Page<Transaction>,
    pub unconfirmed: Vec<Transaction>,
    pub partial: Vec<Transaction>,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionsAction {
    CacheLoaded(Vec<Transaction>),
    FetchStarted,
    Loaded(FirstPages),
    PageAppended {
        page: Page<Transaction>,
        skipped: usize,
    },
    Added {
        group: TransactionGroup,
        transaction: Transaction,
    },
    /// Left the unconfirmed or partial group.
    Removed(String),
    /// Rejected by the node after announce.
    Failed { hash: String, error: OperationError },
    FetchFailed(OperationError),
    Invalidated,
}

fn has_hash(tx: &Transaction, hash: &str) -> bool {
    tx.hash
        .as_deref()
        .is_some_and(|h| h.eq_ignore_ascii_case(hash))
}

fn contains(list: &[Transaction], tx: &Transaction) -> bool {
    tx.hash
        .as_deref()
        .is_some_and(|hash| list.iter().any(|t| has_hash(t, hash)))
}

fn remove_hash(list: &mut Vec<Transaction>, hash: Option<&str>) {
    if let Some(hash) = hash {
        list.retain(|t| !has_hash(t, hash));
    }
}

pub fn reduce(mut state: TransactionsState, action: TransactionsAction) -> TransactionsState {
    match action {
        TransactionsAction::CacheLoaded(confirmed) => state.confirmed = confirmed,
        TransactionsAction::FetchStarted => state.loading = true,
        TransactionsAction::Loaded(pages) => {
            state.confirmed = pages.confirmed.items;
            state.page_number = pages.confirmed.page_number;
            state.is_last_page = pages.confirmed.is_last_page;
            state.next_cursor = pages.confirmed.next_cursor;
            state.unconfirmed = pages.unconfirmed;
            state.partial = pages.partial;
            state.skipped = pages.skipped;
            state.loading = false;
            state.error = None;
        }
        TransactionsAction::PageAppended { page, skipped } => {
            if page.page_number == state.page_number + 1 {
                state.skipped += skipped;
                for tx in page.items {
                    if !contains(&state.confirmed, &tx) {
                        state.confirmed.push(tx);
                    }
                }
                state.page_number = page.page_number;
                state.is_last_page = page.is_last_page;
                state.next_cursor = page.next_cursor;
            }
            state.loading = false;
        }
        TransactionsAction::Added { group, transaction } => {
            let hash = transaction.hash.clone();
            match group {
                TransactionGroup::Confirmed => {
                    remove_hash(&mut state.unconfirmed, hash.as_deref());
                    remove_hash(&mut state.partial, hash.as_deref());
                    if !contains(&state.confirmed, &transaction) {
                        state.confirmed.insert(0, transaction);
                    }
                }
                TransactionGroup::Unconfirmed => {
                    remove_hash(&mut state.partial, hash.as_deref());
                    if !contains(&state.confirmed, &transaction)
                        && !contains(&state.unconfirmed, &transaction)
                    {
                        state.unconfirmed.insert(0, transaction);
                    }
                }
                TransactionGroup::Partial => {
                    let known = contains(&state.confirmed, &transaction)
                        || contains(&state.unconfirmed, &transaction)
                        || contains(&state.partial, &transaction);
                    if !known {
                        state.partial.insert(0, transaction);
                    }
                }
            }
        }
        TransactionsAction::Removed(hash) => {
            remove_hash(&mut state.unconfirmed, Some(&hash));
            remove_hash(&mut state.partial, Some(&hash));
        }
        TransactionsAction::Failed { hash, error } => {
            remove_hash(&mut state.unconfirmed, Some(&hash));
            remove_hash(&mut state.partial, Some(&hash));
            state.error = Some(error);
        }
        TransactionsAction::FetchFailed(error) => {
            state.loading = false;
            state.error = Some(error);
        }
        TransactionsAction::Invalidated => return TransactionsState::default(),
    }
    state
}

/// Transaction history of the selected account.
pub struct TransactionsModule {
    shared: Arc<Shared>,
    state: watch::Sender<TransactionsState>,
    fetch: Coalescer<FirstPages>,
    page_fetch: Coalescer<(Page<Transaction>, usize)>,
}

impl TransactionsModule {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: watch::Sender::new(TransactionsState::default()),
            fetch: Coalescer::new(),
            page_fetch: Coalescer::new(),
        }
    }

    pub fn state(&self) -> TransactionsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionsState> {
        self.state.subscribe()
    }

    pub(crate) fn dispatch(&self, action: TransactionsAction) {
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action);
        });
    }

    fn is_current(&self, address: &str) -> bool {
        self.shared
            .current_account()
            .is_some_and(|current| lookup_key(&current.address) == lookup_key(address))
    }

    pub async fn load_cache(&self) {
        let Some(account) = self.shared.current_account() else {
            return;
        };
        let key = StorageKey::for_account(StorageKey::LATEST_TRANSACTIONS, &account.address);
        match load_json::<Vec<Transaction>>(&*self.shared.storage, &key).await {
            Ok(Some(cached)) if self.is_current(&account.address) => {
                self.dispatch(TransactionsAction::CacheLoaded(cached))
            }
            Ok(_) => {}
            Err(e) => warn!("ignoring cached transactions: {}", e),
        }
    }

    /// Loads the first page of each group.
    pub async fn fetch_data(&self) {
        let Some(account) = self.shared.current_account() else {
            return;
        };
        self.dispatch(TransactionsAction::FetchStarted);
        let shared = self.shared.clone();
        let target = account.clone();
        let result = self
            .fetch
            .run(move || async move { fetch_first_pages(&shared, &target).await }.boxed())
            .await;
        match result {
            Ok(Some(pages)) if self.is_current(&account.address) => {
                self.persist(&account, &pages.confirmed.items).await;
                self.dispatch(TransactionsAction::Loaded(pages));
            }
            Ok(_) => {}
            Err(e) => {
                warn!("fail to fetch transactions: {}", e);
                self.dispatch(TransactionsAction::FetchFailed(e));
            }
        }
    }

    /// Appends the next confirmed page, if any.
    pub async fn fetch_next_page(&self) {
        let state = self.state();
        if state.page_number == 0 || state.is_last_page {
            return;
        }
        let Some(account) = self.shared.current_account() else {
            return;
        };
        let criteria = TransactionCriteria {
            address: account.address.clone(),
            group: TransactionGroup::Confirmed,
            page_number: state.page_number + 1,
            page_size: self.shared.config.page_size,
            cursor: state.next_cursor,
        };
        let shared = self.shared.clone();
        let target = account.clone();
        let result = self
            .page_fetch
            .run(move || async move { fetch_page(&shared, &target, &criteria).await }.boxed())
            .await;
        match result {
            Ok(Some((page, skipped))) if self.is_current(&account.address) => {
                self.dispatch(TransactionsAction::PageAppended { page, skipped })
            }
            Ok(_) => {}
            Err(e) => {
                warn!("fail to fetch transaction page: {}", e);
                self.dispatch(TransactionsAction::FetchFailed(e));
            }
        }
    }

    pub(crate) async fn apply_event(&self, event: ListenerEvent) {
        let Some(account) = self.shared.current_account() else {
            return;
        };
        let (group, wire) = match event {
            ListenerEvent::ConfirmedAdd(wire) => (TransactionGroup::Confirmed, wire),
            ListenerEvent::UnconfirmedAdd(wire) => (TransactionGroup::Unconfirmed, wire),
            ListenerEvent::AggregateBondedAdd(wire) => (TransactionGroup::Partial, wire),
            ListenerEvent::UnconfirmedRemove(hash)
            | ListenerEvent::AggregateBondedRemove(hash) => {
                self.dispatch(TransactionsAction::Removed(hash));
                return;
            }
            ListenerEvent::TransactionError { hash, code } => {
                warn!("transaction {} rejected: {}", hash, code);
                self.dispatch(TransactionsAction::Failed {
                    error: OperationError::NetworkRequest {
                        status: None,
                        code: Some(code),
                        message: format!("transaction {hash} rejected"),
                    },
                    hash,
                });
                return;
            }
        };
        let network = match self.shared.network_properties().await {
            Ok(network) => network,
            Err(e) => {
                warn!("dropping listener event: {}", e);
                return;
            }
        };
        let (decoded, _) = decode_all(&self.shared, network, &account, vec![wire]).await;
        if decoded.is_empty() || !self.is_current(&account.address) {
            return;
        }
        let actions: Vec<_> = decoded
            .into_iter()
            .map(|(_, transaction)| TransactionsAction::Added { group, transaction })
            .collect();
        if group == TransactionGroup::Confirmed {
            let next = actions.iter().cloned().fold(self.state(), reduce);
            if let Err(e) = self.save(&account, &next.confirmed).await {
                warn!("dropping confirmed transaction, cache write failed: {}", e);
                return;
            }
        }
        for action in actions {
            self.dispatch(action);
        }
    }

    async fn save(
        &self,
        account: &PublicAccount,
        confirmed: &[Transaction],
    ) -> Result<(), OperationError> {
        let key = StorageKey::for_account(StorageKey::LATEST_TRANSACTIONS, &account.address);
        save_json(&*self.shared.storage, &key, confirmed).await
    }

    async fn persist(&self, account: &PublicAccount, confirmed: &[Transaction]) {
        if let Err(e) = self.save(account, confirmed).await {
            warn!("fail to cache transactions: {}", e);
        }
    }

    pub(crate) fn invalidate(&self) {
        self.fetch.invalidate();
        self.page_fetch.invalidate();
        self.dispatch(TransactionsAction::Invalidated);
    }
}

async fn fetch_first_pages(
    shared: &Shared,
    account: &PublicAccount,
) -> Result<FirstPages, OperationError> {
    let criteria = |group| TransactionCriteria {
        address: account.address.clone(),
        group,
        page_number: 1,
        page_size: shared.config.page_size,
        cursor: None,
    };
    let confirmed_criteria = criteria(TransactionGroup::Confirmed);
    let unconfirmed_criteria = criteria(TransactionGroup::Unconfirmed);
    let partial_criteria = criteria(TransactionGroup::Partial);
    let serves_partial = shared.config.protocol == Protocol::Symbol;

    let (network, confirmed, unconfirmed, partial) = tokio::try_join!(
        shared.network_properties(),
        shared.adapter.fetch_transaction_page(&confirmed_criteria),
        shared.adapter.fetch_transaction_page(&unconfirmed_criteria),
        async {
            if serves_partial {
                shared.adapter.fetch_transaction_page(&partial_criteria).await
            } else {
                Ok(Page::empty(1))
            }
        },
    )?;

    let confirmed_count = confirmed.items.len();
    let unconfirmed_count = unconfirmed.items.len();
    let mut wires = confirmed.items;
    wires.extend(unconfirmed.items);
    wires.extend(partial.items);
    // decode_all keeps order but may skip items, so regroup by origin.
    let mut pages = FirstPages {
        confirmed: Page {
            items: Vec::new(),
            page_number: confirmed.page_number,
            is_last_page: confirmed.is_last_page,
            next_cursor: confirmed.next_cursor,
        },
        unconfirmed: Vec::new(),
        partial: Vec::new(),
        skipped: 0,
    };
    let (decoded, skipped) = decode_all(shared, network, account, wires).await;
    pages.skipped = skipped;
    for (origin, tx) in decoded {
        if origin < confirmed_count {
            pages.confirmed.items.push(tx);
        } else if origin < confirmed_count + unconfirmed_count {
            pages.unconfirmed.push(tx);
        } else {
            pages.partial.push(tx);
        }
    }
    Ok(pages)
}

async fn fetch_page(
    shared: &Shared,
    account: &PublicAccount,
    criteria: &TransactionCriteria,
) -> Result<(Page<Transaction>, usize), OperationError> {
    let (network, page) = tokio::try_join!(
        shared.network_properties(),
        shared.adapter.fetch_transaction_page(criteria),
    )?;
    let (decoded, skipped) = decode_all(shared, network, account, page.items).await;
    let decoded_page = Page {
        items: decoded.into_iter().map(|(_, tx)| tx).collect(),
        page_number: page.page_number,
        is_last_page: page.is_last_page,
        next_cursor: page.next_cursor,
    };
    Ok((decoded_page, skipped))
}

/// Resolves what the wires refer to, then decodes them. Items that fail are
/// skipped and counted; each result carries its input position.
async fn decode_all(
    shared: &Shared,
    network: NetworkProperties,
    account: &PublicAccount,
    wires: Vec<WireTransaction>,
) -> (Vec<(usize, Transaction)>, usize) {
    let codec = &shared.codec;
    let adapter = &shared.adapter;

    let mut refs = References::default();
    for wire in &wires {
        match codec.references(wire) {
            Ok(found) => refs.merge(found),
            Err(e) => debug!("no references for wire transaction: {}", e),
        }
    }

    let native_id = network.native_currency.id.clone();
    let mut ctx = DecodeContext::new(network);
    ctx.current_account = Some(account.clone());
    match shared.signing_account(account).await {
        Ok(signer) => ctx.decryption_key = Some(signer),
        Err(e) => debug!("messages stay sealed: {}", e),
    }

    let aliases = join_all(refs.aliases.iter().map(|id| adapter.fetch_alias_target(id))).await;
    let mut token_ids = refs.tokens;
    for (id, target) in refs.aliases.iter().zip(aliases) {
        match target {
            Ok(AliasTarget::Address(address)) => ctx.add_address_alias(id, &address),
            Ok(AliasTarget::Token(token_id)) => {
                ctx.add_token_alias(id, &token_id);
                if !token_ids.contains(&token_id) {
                    token_ids.push(token_id);
                }
            }
            Ok(AliasTarget::None) => {}
            Err(e) => warn!("fail to resolve alias {}: {}", id, e),
        }
    }

    token_ids.retain(|id| !id.eq_ignore_ascii_case(&native_id));
    let tokens = join_all(token_ids.iter().map(|id| adapter.fetch_token_info(id))).await;
    for (id, info) in token_ids.iter().zip(tokens) {
        match info {
            Ok(info) => ctx.add_token(info),
            Err(e) => warn!("fail to fetch token {}: {}", id, e),
        }
    }

    let decoded: Vec<_> = wires
        .iter()
        .enumerate()
        .filter_map(|(origin, wire)| match codec.from_wire(wire, &ctx) {
            Ok(tx) => Some((origin, tx)),
            Err(e) => {
                warn!("skipping undecodable transaction: {}", e);
                None
            }
        })
        .collect();
    let skipped = wires.len() - decoded.len();
    (decoded, skipped)
}
