use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::storage::{load_json, save_json, StorageKey};
use super::{Coalescer, Shared};
use crate::error::OperationError;
use crate::mnemonic;
use crate::protocol::lookup_key;
use crate::types::{AccountInfo, AccountType, PublicAccount, Token};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountsState {
    pub accounts: Vec<PublicAccount>,
    pub selected: Option<String>,
    /// Balances and key links of the selected account.
    pub info: Option<AccountInfo>,
    pub loading: bool,
    pub error: Option<OperationError>,
}

impl AccountsState {
    pub fn find(&self, address: &str) -> Option<&PublicAccount> {
        let key = lookup_key(address);
        self.accounts.iter().find(|a| lookup_key(&a.address) == key)
    }

    pub fn current(&self) -> Option<&PublicAccount> {
        self.selected.as_deref().and_then(|address| self.find(address))
    }

    pub fn balances(&self) -> &[Token] {
        self.info.as_ref().map(|i| i.tokens.as_slice()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountsAction {
    CacheLoaded {
        accounts: Vec<PublicAccount>,
        selected: Option<String>,
    },
    Added(PublicAccount),
    Renamed { address: String, name: String },
    Removed(String),
    Selected(String),
    BalancesInvalidated,
    FetchStarted,
    InfoLoaded(AccountInfo),
    FetchFailed(OperationError),
    Reset,
}

fn same_address(a: &str, b: &str) -> bool {
    lookup_key(a) == lookup_key(b)
}

pub fn reduce(mut state: AccountsState, action: AccountsAction) -> AccountsState {
    match action {
        AccountsAction::CacheLoaded { accounts, selected } => {
            state.selected = selected
                .filter(|s| accounts.iter().any(|a| same_address(&a.address, s)))
                .or_else(|| accounts.first().map(|a| a.address.clone()));
            state.accounts = accounts;
        }
        AccountsAction::Added(account) => {
            if state.find(&account.address).is_none() {
                if state.selected.is_none() {
                    state.selected = Some(account.address.clone());
                }
                state.accounts.push(account);
            }
        }
        AccountsAction::Renamed { address, name } => {
            if let Some(account) = state
                .accounts
                .iter_mut()
                .find(|a| same_address(&a.address, &address))
            {
                account.name = name;
            }
        }
        AccountsAction::Removed(address) => {
            state.accounts.retain(|a| !same_address(&a.address, &address));
            if state
                .selected
                .as_deref()
                .is_some_and(|s| same_address(s, &address))
            {
                state.selected = state.accounts.first().map(|a| a.address.clone());
                state.info = None;
                state.error = None;
            }
        }
        AccountsAction::Selected(address) => {
            let changed = !state
                .selected
                .as_deref()
                .is_some_and(|s| same_address(s, &address));
            if changed {
                state.info = None;
                state.error = None;
                state.loading = false;
            }
            state.selected = Some(address);
        }
        AccountsAction::BalancesInvalidated => {
            state.info = None;
            state.error = None;
            state.loading = false;
        }
        AccountsAction::FetchStarted => state.loading = true,
        AccountsAction::InfoLoaded(info) => {
            state.loading = false;
            state.error = None;
            state.info = Some(info);
        }
        AccountsAction::FetchFailed(error) => {
            state.loading = false;
            state.error = Some(error);
        }
        AccountsAction::Reset => return AccountsState::default(),
    }
    state
}

/// Wallet accounts, the selection and the selected account's balances.
pub struct AccountsModule {
    shared: Arc<Shared>,
    state: watch::Sender<AccountsState>,
    fetch: Coalescer<AccountInfo>,
    write: Mutex<()>,
}

impl AccountsModule {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: watch::Sender::new(AccountsState::default()),
            fetch: Coalescer::new(),
            write: Mutex::new(()),
        }
    }

    pub fn state(&self) -> AccountsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountsState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: AccountsAction) {
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action);
        });
        let current = self.state.borrow().current().cloned();
        self.shared.set_current_account(current);
    }

    pub async fn load_cache(&self) {
        let storage = &*self.shared.storage;
        let accounts = load_json::<Vec<PublicAccount>>(storage, StorageKey::ACCOUNTS)
            .await
            .unwrap_or_else(|e| {
                warn!("ignoring cached accounts: {}", e);
                None
            })
            .unwrap_or_default();
        let selected = load_json::<String>(storage, StorageKey::SELECTED_ACCOUNT)
            .await
            .unwrap_or_else(|e| {
                warn!("ignoring cached selection: {}", e);
                None
            });
        self.dispatch(AccountsAction::CacheLoaded { accounts, selected });
    }

    /// Fetches balances of the selected account.
    pub async fn fetch_data(&self) {
        let Some(account) = self.state().current().cloned() else {
            return;
        };
        self.dispatch(AccountsAction::FetchStarted);
        let adapter = self.shared.adapter.clone();
        let address = account.address;
        let result = self
            .fetch
            .run(move || async move { adapter.fetch_account_info(&address).await }.boxed())
            .await;
        match result {
            Ok(Some(info)) => self.dispatch(AccountsAction::InfoLoaded(info)),
            Ok(None) => {}
            Err(e) => {
                warn!("fail to fetch account info: {}", e);
                self.dispatch(AccountsAction::FetchFailed(e));
            }
        }
    }

    /// Persists the account list `action` produces, then commits it.
    async fn commit(&self, action: AccountsAction) -> Result<(), OperationError> {
        let current = self.state();
        let next = reduce(current.clone(), action.clone());
        save_json(&*self.shared.storage, StorageKey::ACCOUNTS, &next.accounts).await?;
        if next.selected != current.selected {
            match &next.selected {
                Some(address) => {
                    save_json(&*self.shared.storage, StorageKey::SELECTED_ACCOUNT, address)
                        .await?
                }
                None => self.shared.storage.remove(StorageKey::SELECTED_ACCOUNT).await?,
            }
        }
        self.dispatch(action);
        Ok(())
    }

    /// Stores `mnemonic` and derives its first account.
    pub async fn create_wallet(
        &self,
        mnemonic: &str,
        name: &str,
    ) -> Result<PublicAccount, OperationError> {
        if !mnemonic::validate_mnemonic(mnemonic) {
            return Err(OperationError::Validation("invalid mnemonic".into()));
        }
        {
            let _guard = self.write.lock().await;
            if self.shared.secure.get(StorageKey::MNEMONIC).await?.is_some() {
                return Err(OperationError::Validation(
                    "a wallet already exists, reset it first".into(),
                ));
            }
            self.shared
                .secure
                .set(StorageKey::MNEMONIC, mnemonic.trim().to_owned())
                .await?;
        }
        match self.add_mnemonic_account(name).await {
            Ok(account) => Ok(account),
            Err(e) => {
                if let Err(remove) = self.shared.secure.remove(StorageKey::MNEMONIC).await {
                    warn!("fail to roll back mnemonic: {}", remove);
                }
                Err(e)
            }
        }
    }

    /// Derives the next unused mnemonic index.
    pub async fn add_mnemonic_account(&self, name: &str) -> Result<PublicAccount, OperationError> {
        let _guard = self.write.lock().await;
        let mnemonic = self
            .shared
            .secure
            .get(StorageKey::MNEMONIC)
            .await?
            .map(crypto_utils::zeroizing::ZeroizingString::new)
            .ok_or_else(|| OperationError::Validation("no wallet mnemonic stored".into()))?;
        let index = self
            .state()
            .accounts
            .iter()
            .filter_map(|a| a.index)
            .max()
            .map_or(0, |i| i + 1);
        let derived = self.shared.deriver.derive_account(
            &mnemonic,
            index,
            &self.shared.config.network_identifier,
            name,
        )?;
        let account = derived.account.clone();
        self.commit(AccountsAction::Added(account.clone())).await?;
        info!("added account {} at index {}", account.address, index);
        Ok(account)
    }

    pub async fn import_account(
        &self,
        private_key: &str,
        name: &str,
    ) -> Result<PublicAccount, OperationError> {
        let _guard = self.write.lock().await;
        let imported = self.shared.deriver.import_private_key(
            private_key,
            &self.shared.config.network_identifier,
            name,
        )?;
        if self.state().find(imported.address()).is_some() {
            return Err(OperationError::Validation(format!(
                "account {} already exists",
                imported.address()
            )));
        }
        self.shared
            .secure
            .set(
                &StorageKey::for_account(StorageKey::PRIVATE_KEY, imported.address()),
                imported.private_key().to_owned(),
            )
            .await?;
        let account = imported.account.clone();
        self.commit(AccountsAction::Added(account.clone())).await?;
        info!("imported account {}", account.address);
        Ok(account)
    }

    pub async fn rename_account(&self, address: &str, name: &str) -> Result<(), OperationError> {
        let _guard = self.write.lock().await;
        if self.state().find(address).is_none() {
            return Err(OperationError::Validation(format!("unknown account {address}")));
        }
        self.commit(AccountsAction::Renamed {
            address: address.to_owned(),
            name: name.to_owned(),
        })
        .await
    }

    /// Removes an account and its stored key. The last account cannot go.
    pub async fn remove_account(&self, address: &str) -> Result<(), OperationError> {
        let _guard = self.write.lock().await;
        let state = self.state();
        let account = state
            .find(address)
            .cloned()
            .ok_or_else(|| OperationError::Validation(format!("unknown account {address}")))?;
        if state.accounts.len() == 1 {
            return Err(OperationError::Validation(
                "cannot remove the only account".into(),
            ));
        }
        let was_selected = state
            .current()
            .is_some_and(|c| same_address(&c.address, &account.address));
        self.commit(AccountsAction::Removed(account.address.clone()))
            .await?;
        if was_selected {
            self.fetch.invalidate();
        }
        if account.account_type == AccountType::External {
            let key = StorageKey::for_account(StorageKey::PRIVATE_KEY, &account.address);
            if let Err(e) = self.shared.secure.remove(&key).await {
                warn!("fail to remove key of {}: {}", account.address, e);
            }
        }
        Ok(())
    }

    /// Returns `false` when `address` was already selected.
    pub async fn select(&self, address: &str) -> Result<bool, OperationError> {
        let _guard = self.write.lock().await;
        let state = self.state();
        let account = state
            .find(address)
            .cloned()
            .ok_or_else(|| OperationError::Validation(format!("unknown account {address}")))?;
        if state
            .selected
            .as_deref()
            .is_some_and(|s| same_address(s, &account.address))
        {
            return Ok(false);
        }
        save_json(
            &*self.shared.storage,
            StorageKey::SELECTED_ACCOUNT,
            &account.address,
        )
        .await?;
        self.dispatch(AccountsAction::Selected(account.address));
        Ok(true)
    }

    pub(crate) fn invalidate_balances(&self) {
        self.fetch.invalidate();
        self.dispatch(AccountsAction::BalancesInvalidated);
    }

    pub(crate) fn reset(&self) {
        self.fetch.invalidate();
        self.dispatch(AccountsAction::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::storage::Storage;
    use crate::store::testing::{harness, MNEMONIC};
    use crate::types::Protocol;

    fn account(address: &str, index: Option<u32>) -> PublicAccount {
        PublicAccount {
            address: address.into(),
            public_key: "PK".into(),
            network_identifier: "testnet".into(),
            account_type: if index.is_some() {
                AccountType::Mnemonic
            } else {
                AccountType::External
            },
            index,
            name: address.to_lowercase(),
        }
    }

    #[test]
    fn cache_selection_falls_back_to_first_account() {
        let state = reduce(
            AccountsState::default(),
            AccountsAction::CacheLoaded {
                accounts: vec![account("TA", Some(0)), account("TB", Some(1))],
                selected: Some("TZ".into()),
            },
        );
        assert_eq!(state.selected.as_deref(), Some("TA"));

        let state = reduce(
            state,
            AccountsAction::CacheLoaded {
                accounts: vec![account("TA", Some(0)), account("TB", Some(1))],
                selected: Some("tb".into()),
            },
        );
        assert_eq!(state.current().map(|a| a.address.as_str()), Some("TB"));
    }

    #[test]
    fn removing_selected_account_moves_selection() {
        let mut state = reduce(
            AccountsState::default(),
            AccountsAction::CacheLoaded {
                accounts: vec![account("TA", Some(0)), account("TB", None)],
                selected: Some("TB".into()),
            },
        );
        state.info = Some(AccountInfo::empty("TB"));
        let state = reduce(state, AccountsAction::Removed("TB".into()));
        assert_eq!(state.selected.as_deref(), Some("TA"));
        assert_eq!(state.info, None);
    }

    #[test]
    fn fetch_lifecycle() {
        let state = reduce(AccountsState::default(), AccountsAction::FetchStarted);
        assert!(state.loading);
        let state = reduce(state, AccountsAction::FetchFailed(OperationError::network("down")));
        assert!(!state.loading);
        assert!(state.error.is_some());
        let state = reduce(state, AccountsAction::InfoLoaded(AccountInfo::empty("TA")));
        assert_eq!(state.error, None);
        assert!(state.balances().is_empty());
    }

    #[tokio::test]
    async fn failed_create_wallet_can_be_retried() {
        let h = harness(Protocol::Symbol);
        h.storage.fail_writes(true);
        assert!(h.store.accounts.create_wallet(MNEMONIC, "main").await.is_err());
        assert_eq!(h.secure.get(StorageKey::MNEMONIC).await.unwrap(), None);
        assert!(h.store.accounts.state().accounts.is_empty());

        h.storage.fail_writes(false);
        let account = h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        assert_eq!(h.store.accounts.state().accounts, vec![account]);
    }

    #[tokio::test]
    async fn wallet_accounts_are_persisted() {
        let h = harness(Protocol::Symbol);
        let accounts = &h.store.accounts;
        let first = accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let second = accounts.add_mnemonic_account("savings").await.unwrap();
        assert_eq!(first.index, Some(0));
        assert_eq!(second.index, Some(1));
        assert_eq!(accounts.state().selected.as_deref(), Some(first.address.as_str()));

        let duplicate = accounts.create_wallet(MNEMONIC, "again").await.unwrap_err();
        assert!(matches!(duplicate, OperationError::Validation(_)));

        accounts.rename_account(&second.address, "vault").await.unwrap();

        let stored: Vec<PublicAccount> = load_json(&*h.storage, StorageKey::ACCOUNTS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].name, "vault");
    }

    #[tokio::test]
    async fn imported_keys_go_to_secure_storage() {
        let h = harness(Protocol::Symbol);
        let accounts = &h.store.accounts;
        accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let key = "575DBB3062267EFF57C970A336EBBC8FBCFE12C5BD3ED7BC11EB0481D7704CED";
        let imported = accounts.import_account(key, "cold").await.unwrap();
        assert_eq!(imported.account_type, AccountType::External);

        let secure_key = StorageKey::for_account(StorageKey::PRIVATE_KEY, &imported.address);
        assert_eq!(h.secure.get(&secure_key).await.unwrap().as_deref(), Some(key));
        assert!(h.storage.get(&secure_key).await.unwrap().is_none());

        let err = accounts.import_account(key, "again").await.unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));

        accounts.remove_account(&imported.address).await.unwrap();
        assert!(h.secure.get(&secure_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_account_cannot_be_removed() {
        let h = harness(Protocol::Symbol);
        let main = h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let err = h.store.accounts.remove_account(&main.address).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));
        assert_eq!(h.store.accounts.state().accounts.len(), 1);
    }

    #[tokio::test]
    async fn failed_persist_leaves_state_unchanged() {
        let h = harness(Protocol::Symbol);
        h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let before = h.store.accounts.state();
        h.storage.fail_writes(true);
        let err = h.store.accounts.add_mnemonic_account("second").await.unwrap_err();
        assert!(matches!(err, OperationError::Storage(_)));
        assert_eq!(h.store.accounts.state(), before);
    }

    #[tokio::test]
    async fn cache_reload_restores_selection() {
        let h = harness(Protocol::Symbol);
        h.store.accounts.create_wallet(MNEMONIC, "main").await.unwrap();
        let second = h.store.accounts.add_mnemonic_account("second").await.unwrap();
        assert!(h.store.accounts.select(&second.address).await.unwrap());
        assert!(!h.store.accounts.select(&second.address).await.unwrap());

        let reloaded = h.reopen();
        reloaded.store.accounts.load_cache().await;
        let state = reloaded.store.accounts.state();
        assert_eq!(state.accounts.len(), 2);
        assert_eq!(state.selected.as_deref(), Some(second.address.as_str()));
    }
}
