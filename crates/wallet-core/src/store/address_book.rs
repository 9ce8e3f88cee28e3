use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::warn;

use super::storage::{load_json, save_json, StorageKey};
use super::Shared;
use crate::error::OperationError;
use crate::protocol::lookup_key;
use crate::types::Contact;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressBookState {
    pub contacts: Vec<Contact>,
    pub error: Option<OperationError>,
}

impl AddressBookState {
    pub fn find(&self, address: &str) -> Option<&Contact> {
        let key = lookup_key(address);
        self.contacts.iter().find(|c| lookup_key(&c.address) == key)
    }

    pub fn whitelist(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter().filter(|c| !c.is_black_listed)
    }

    pub fn blacklist(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter().filter(|c| c.is_black_listed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddressBookAction {
    CacheLoaded(Vec<Contact>),
    Added(Contact),
    Updated { address: String, contact: Contact },
    Removed(String),
    Failed(OperationError),
}

pub fn reduce(mut state: AddressBookState, action: AddressBookAction) -> AddressBookState {
    match action {
        AddressBookAction::CacheLoaded(contacts) => {
            state.contacts = contacts;
            state.error = None;
        }
        AddressBookAction::Added(contact) => {
            if state.find(&contact.address).is_none() {
                state.contacts.push(contact);
            }
        }
        AddressBookAction::Updated { address, contact } => {
            let key = lookup_key(&address);
            if let Some(slot) = state
                .contacts
                .iter_mut()
                .find(|c| lookup_key(&c.address) == key)
            {
                *slot = contact;
            }
        }
        AddressBookAction::Removed(address) => {
            let key = lookup_key(&address);
            state.contacts.retain(|c| lookup_key(&c.address) != key);
        }
        AddressBookAction::Failed(error) => state.error = Some(error),
    }
    state
}

/// Contacts, unique by address. Local only.
pub struct AddressBookModule {
    shared: Arc<Shared>,
    state: watch::Sender<AddressBookState>,
    write: Mutex<()>,
}

impl AddressBookModule {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: watch::Sender::new(AddressBookState::default()),
            write: Mutex::new(()),
        }
    }

    pub fn state(&self) -> AddressBookState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AddressBookState> {
        self.state.subscribe()
    }

    pub(crate) fn dispatch(&self, action: AddressBookAction) {
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action);
        });
    }

    async fn read(&self) -> Result<Vec<Contact>, OperationError> {
        Ok(load_json(&*self.shared.storage, StorageKey::ADDRESS_BOOK)
            .await?
            .unwrap_or_default())
    }

    pub async fn load_cache(&self) {
        let contacts = self.read().await.unwrap_or_else(|e| {
            warn!("ignoring cached address book: {}", e);
            Vec::new()
        });
        self.dispatch(AddressBookAction::CacheLoaded(contacts));
    }

    /// Re-reads the stored book; there is no remote source.
    pub async fn fetch_data(&self) {
        match self.read().await {
            Ok(contacts) => self.dispatch(AddressBookAction::CacheLoaded(contacts)),
            Err(e) => {
                warn!("fail to read address book: {}", e);
                self.dispatch(AddressBookAction::Failed(e));
            }
        }
    }

    fn validate(&self, contact: &Contact) -> Result<(), OperationError> {
        if contact.name.trim().is_empty() {
            return Err(OperationError::Validation("contact name is empty".into()));
        }
        let network = &self.shared.config.network_identifier;
        if !self.shared.deriver.validate_address(&contact.address, network) {
            return Err(OperationError::Validation(format!(
                "{} is not a {network} address",
                contact.address
            )));
        }
        Ok(())
    }

    async fn commit(&self, action: AddressBookAction) -> Result<(), OperationError> {
        let next = reduce(self.state(), action.clone());
        save_json(&*self.shared.storage, StorageKey::ADDRESS_BOOK, &next.contacts).await?;
        self.dispatch(action);
        Ok(())
    }

    pub async fn add_contact(&self, contact: Contact) -> Result<(), OperationError> {
        self.validate(&contact)?;
        let _guard = self.write.lock().await;
        if self.state().find(&contact.address).is_some() {
            return Err(OperationError::Validation(format!(
                "{} is already in the address book",
                contact.address
            )));
        }
        self.commit(AddressBookAction::Added(contact)).await
    }

    /// Replaces the contact stored under `address`.
    pub async fn update_contact(&self, address: &str, contact: Contact) -> Result<(), OperationError> {
        self.validate(&contact)?;
        let _guard = self.write.lock().await;
        let state = self.state();
        if state.find(address).is_none() {
            return Err(OperationError::Validation(format!("unknown contact {address}")));
        }
        let clashes = state
            .find(&contact.address)
            .is_some_and(|other| lookup_key(&other.address) != lookup_key(address));
        if clashes {
            return Err(OperationError::Validation(format!(
                "{} is already in the address book",
                contact.address
            )));
        }
        self.commit(AddressBookAction::Updated {
            address: address.to_owned(),
            contact,
        })
        .await
    }

    pub async fn remove_contact(&self, address: &str) -> Result<(), OperationError> {
        let _guard = self.write.lock().await;
        if self.state().find(address).is_none() {
            return Err(OperationError::Validation(format!("unknown contact {address}")));
        }
        self.commit(AddressBookAction::Removed(address.to_owned()))
            .await
    }

    pub fn is_black_listed(&self, address: &str) -> bool {
        self.state
            .borrow()
            .find(address)
            .is_some_and(|c| c.is_black_listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{harness, symbol_account};
    use crate::types::Protocol;

    fn contact(address: &str, name: &str) -> Contact {
        Contact {
            address: address.into(),
            name: name.into(),
            notes: None,
            is_black_listed: false,
        }
    }

    #[test]
    fn reducer_keeps_addresses_unique() {
        let state = reduce(
            AddressBookState::default(),
            AddressBookAction::Added(contact("TA", "alice")),
        );
        let state = reduce(state, AddressBookAction::Added(contact("ta", "again")));
        assert_eq!(state.contacts.len(), 1);
        assert_eq!(state.contacts[0].name, "alice");
    }

    #[tokio::test]
    async fn contacts_are_validated_and_persisted() {
        let h = harness(Protocol::Symbol);
        let book = &h.store.address_book;
        let bob = symbol_account(1).address().to_owned();

        let err = book.add_contact(contact("not-an-address", "x")).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));

        book.add_contact(contact(&bob, "bob")).await.unwrap();
        let err = book.add_contact(contact(&bob, "bob again")).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));

        let mut blocked = contact(&bob, "bob");
        blocked.is_black_listed = true;
        book.update_contact(&bob, blocked).await.unwrap();
        assert!(book.is_black_listed(&bob));
        assert_eq!(book.state().blacklist().count(), 1);
        assert_eq!(book.state().whitelist().count(), 0);

        let reopened = h.reopen();
        reopened.store.address_book.load_cache().await;
        assert!(reopened.store.address_book.is_black_listed(&bob));

        book.remove_contact(&bob).await.unwrap();
        assert!(book.state().contacts.is_empty());
    }

    #[tokio::test]
    async fn write_failure_keeps_previous_book() {
        let h = harness(Protocol::Symbol);
        let bob = symbol_account(1).address().to_owned();
        h.storage.fail_writes(true);
        let err = h
            .store
            .address_book
            .add_contact(contact(&bob, "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Storage(_)));
        assert!(h.store.address_book.state().contacts.is_empty());
    }
}
