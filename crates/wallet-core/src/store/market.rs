use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use rust_decimal::Decimal;
use tokio::sync::{watch, Mutex};
use tracing::warn;

use super::storage::{load_json, save_json, StorageKey};
use super::{Coalescer, Shared};
use crate::error::OperationError;
use crate::network::client::HttpClient;
use crate::types::Protocol;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    /// ISO 4217 code prices are quoted in.
    pub currency: String,
    /// Price of one native coin.
    pub price: Option<Decimal>,
    pub loading: bool,
    pub error: Option<OperationError>,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.into(),
            price: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketAction {
    CacheLoaded(String),
    CurrencyChanged(String),
    FetchStarted,
    PriceLoaded(Decimal),
    FetchFailed(OperationError),
    Reset,
}

pub fn reduce(mut state: MarketState, action: MarketAction) -> MarketState {
    match action {
        MarketAction::CacheLoaded(currency) => state.currency = currency,
        MarketAction::CurrencyChanged(currency) => {
            if currency != state.currency {
                state.price = None;
                state.error = None;
            }
            state.currency = currency;
        }
        MarketAction::FetchStarted => state.loading = true,
        MarketAction::PriceLoaded(price) => {
            state.loading = false;
            state.error = None;
            state.price = Some(price);
        }
        MarketAction::FetchFailed(error) => {
            state.loading = false;
            state.error = Some(error);
        }
        MarketAction::Reset => return MarketState::default(),
    }
    state
}

pub fn ticker(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Symbol => "XYM",
        Protocol::Ethereum => "ETH",
        Protocol::Nem => "XEM",
    }
}

/// Native coin price in the user's currency.
pub struct MarketModule {
    shared: Arc<Shared>,
    feed: Option<HttpClient>,
    state: watch::Sender<MarketState>,
    fetch: Coalescer<Decimal>,
    write: Mutex<()>,
}

impl MarketModule {
    pub(crate) fn new(shared: Arc<Shared>) -> Result<Self, OperationError> {
        let feed = shared
            .config
            .price_feed_url
            .as_deref()
            .map(|url| HttpClient::new(url, shared.config.request_timeout()))
            .transpose()?;
        Ok(Self {
            shared,
            feed,
            state: watch::Sender::new(MarketState::default()),
            fetch: Coalescer::new(),
            write: Mutex::new(()),
        })
    }

    pub fn state(&self) -> MarketState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MarketState> {
        self.state.subscribe()
    }

    fn dispatch(&self, action: MarketAction) {
        self.state.send_modify(|state| {
            let current = std::mem::take(state);
            *state = reduce(current, action);
        });
    }

    pub async fn load_cache(&self) {
        match load_json::<String>(&*self.shared.storage, StorageKey::USER_CURRENCY).await {
            Ok(Some(currency)) => self.dispatch(MarketAction::CacheLoaded(currency)),
            Ok(None) => {}
            Err(e) => warn!("ignoring cached currency: {}", e),
        }
    }

    pub async fn fetch_data(&self) {
        let Some(feed) = self.feed.clone() else {
            self.dispatch(MarketAction::FetchFailed(OperationError::Configuration(
                "no price feed configured".into(),
            )));
            return;
        };
        let currency = self.state().currency;
        let symbol = ticker(self.shared.config.protocol);
        self.dispatch(MarketAction::FetchStarted);
        let result = self
            .fetch
            .run(move || async move { fetch_price(&feed, symbol, &currency).await }.boxed())
            .await;
        match result {
            Ok(Some(price)) => self.dispatch(MarketAction::PriceLoaded(price)),
            Ok(None) => {}
            Err(e) => {
                warn!("fail to fetch {} price: {}", symbol, e);
                self.dispatch(MarketAction::FetchFailed(e));
            }
        }
    }

    /// Persists a new quote currency. A price fetched for the old one is
    /// discarded.
    pub async fn set_currency(&self, currency: &str) -> Result<(), OperationError> {
        let currency = currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OperationError::Validation(format!(
                "'{currency}' is not a currency code"
            )));
        }
        let _guard = self.write.lock().await;
        save_json(&*self.shared.storage, StorageKey::USER_CURRENCY, &currency).await?;
        self.fetch.invalidate();
        self.dispatch(MarketAction::CurrencyChanged(currency));
        Ok(())
    }

    pub(crate) fn reset(&self) {
        self.fetch.invalidate();
        self.dispatch(MarketAction::Reset);
    }
}

async fn fetch_price(
    feed: &HttpClient,
    symbol: &str,
    currency: &str,
) -> Result<Decimal, OperationError> {
    let quotes: HashMap<String, f64> = feed
        .get(
            "",
            &[("fsym", symbol.to_owned()), ("tsyms", currency.to_owned())],
        )
        .await?;
    let quote = quotes
        .get(currency)
        .copied()
        .ok_or_else(|| OperationError::network(format!("no {currency} quote for {symbol}")))?;
    Decimal::try_from(quote)
        .map_err(|e| OperationError::network(format!("invalid {currency} quote {quote}: {e}")))
}
