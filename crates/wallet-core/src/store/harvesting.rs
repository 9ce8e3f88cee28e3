use std::sync::Arc;

use futures::FutureExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use super::storage::{load_json, save_json, StorageKey};
use super::{Coalescer, Shared};
use crate::error::OperationError;
use crate::protocol::lookup_key;
use crate::types::{HarvestedBlock, HarvestingKeys, PublicAccount, Transaction, TransactionKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvestingStatus {
    #[default]
    Inactive,
    /// Some but not all of the linked, node and VRF keys are set.
    KeysLinked,
    Active,
}

impl HarvestingStatus {
    pub fn from_keys(keys: &HarvestingKeys) -> Self {
        let set = [&keys.linked, &keys.node, &keys.vrf]
            .iter()
            .filter(|k| k.is_some())
            .count();
        match set {
            0 => HarvestingStatus::Inactive,
            3 => HarvestingStatus::Active,
            _ => HarvestingStatus::KeysLinked,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestingState {
    pub status: HarvestingStatus,
    pub blocks: Vec<HarvestedBlock>,
    /// Blocks as read-only reward transactions, newest first.
    pub rewards: Vec<Transaction>,
    /// Sum of the loaded block rewards.
    pub total: Decimal,
    pub loading: bool,
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harvest {
    pub status: HarvestingStatus,
    pub blocks: Vec<HarvestedBlock>,
    pub rewards: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HarvestingAction {
    FetchStarted,
    Loaded(Harvest),
    FetchFailed(OperationError),
    Invalidated,
}

pub fn reduce(mut state: HarvestingState, action: HarvestingAction) -> HarvestingState {
    match action {
        HarvestingAction::FetchStarted => state.loading = true,
        HarvestingAction::Loaded(harvest) => {
            state.total = harvest.blocks.iter().map(|b| b.amount.amount).sum();
            state.status = harvest.status;
            state.blocks = harvest.blocks;
            state.rewards = harvest.rewards;
            state.loading = false;
            state.error = None;
        }
        HarvestingAction::FetchFailed(error) => {
            state.loading = false;
            state.error = Some(error);
        }
        HarvestingAction::Invalidated => return HarvestingState::default(),
    }
    state
}

/// A harvested block as a reward credited to `account`.
pub fn reward_transaction(account: &PublicAccount, block: &HarvestedBlock) -> Transaction {
    Transaction {
        kind: TransactionKind::HarvestReward,
        signer_address: account.address.clone(),
        recipient_address: Some(account.address.clone()),
        tokens: vec![block.amount.clone()],
        height: Some(block.height),
        timestamp: block.timestamp,
        ..Default::default()
    }
}

/// Harvesting status and rewards of the selected account.
pub struct HarvestingModule {
    shared: Arc<Shared>,
    state: watch::Sender<HarvestingState>,
    fetch: Coalescer<Harvest>,
}

impl HarvestingModule {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: watch::Sender::new(HarvestingState::default()),
            fetch: Coalescer::new(),
        }
    }

    pub fn state(&self) -> HarvestingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HarvestingState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: HarvestingAction) {
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

    /// Restores the last harvest of the selected account.
    pub async fn load_cache(&self) {
        let Some(account) = self.shared.current_account() else {
            return;
        };
        let key = StorageKey::for_account(StorageKey::HARVESTING, &account.address);
        match load_json::<Harvest>(&*self.shared.storage, &key).await {
            Ok(Some(cached)) if self.is_current(&account.address) => {
                self.dispatch(HarvestingAction::Loaded(cached))
            }
            Ok(_) => {}
            Err(e) => warn!("ignoring cached harvesting data: {}", e),
        }
    }

    pub async fn fetch_data(&self) {
        let Some(account) = self.shared.current_account() else {
            return;
        };
        self.dispatch(HarvestingAction::FetchStarted);
        let shared = self.shared.clone();
        let address = account.address.clone();
        let result = self
            .fetch
            .run(move || async move { fetch_harvest(&shared, &account).await }.boxed())
            .await;
        match result {
            Ok(Some(harvest)) => {
                let key = StorageKey::for_account(StorageKey::HARVESTING, &address);
                if let Err(e) = save_json(&*self.shared.storage, &key, &harvest).await {
                    warn!("fail to cache harvesting data: {}", e);
                }
                self.dispatch(HarvestingAction::Loaded(harvest));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("fail to fetch harvesting data: {}", e);
                self.dispatch(HarvestingAction::FetchFailed(e));
            }
        }
    }

    pub(crate) fn invalidate(&self) {
        self.fetch.invalidate();
        self.dispatch(HarvestingAction::Invalidated);
    }
}

async fn fetch_harvest(shared: &Shared, account: &PublicAccount) -> Result<Harvest, OperationError> {
    let (info, page) = tokio::try_join!(
        shared.adapter.fetch_account_info(&account.address),
        shared
            .adapter
            .fetch_harvested_blocks(&account.address, 1, shared.config.page_size),
    )?;
    let rewards = page
        .items
        .iter()
        .map(|block| reward_transaction(account, block))
        .collect();
    Ok(Harvest {
        status: HarvestingStatus::from_keys(&info.harvesting_keys),
        blocks: page.items,
        rewards,
    })
}
