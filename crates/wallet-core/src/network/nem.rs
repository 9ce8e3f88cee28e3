use async_trait::async_trait;
use chain_nem::network::{NetworkType, NEMESIS_EPOCH, XEM_DIVISIBILITY};
use chain_nem::transaction::SIGNATURE_SIZE;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::client::HttpClient;
use super::NetworkAdapter;
use crate::config::WalletConfig;
use crate::error::OperationError;
use crate::protocol::lookup_key;
use crate::types::{
    AccountInfo, FeeMultipliers, HarvestingKeys, NativeCurrency, NetworkProperties, Page,
    Protocol, SignedTransaction, Token, TokenInfo, TransactionCriteria, TransactionGroup,
    WireTransaction,
};

pub const CURRENCY_ID: &str = "nem:xem";
/// NIS answers transfer queries 25 records at a time.
pub const NIS_PAGE_SIZE: usize = 25;
/// `code` of a successful announce.
const ANNOUNCE_SUCCESS: u64 = 1;

/// NIS1 REST node.
#[derive(Debug)]
pub struct NemAdapter {
    client: HttpClient,
    network_type: NetworkType,
}

impl NemAdapter {
    pub fn new(config: &WalletConfig) -> Result<Self, OperationError> {
        let network_type = NetworkType::from_identifier(&config.network_identifier).ok_or_else(|| {
            OperationError::Configuration(format!(
                "unknown nem network '{}'",
                config.network_identifier
            ))
        })?;
        Ok(Self {
            client: HttpClient::new(&config.node_url, config.request_timeout())?,
            network_type,
        })
    }

    fn native() -> NativeCurrency {
        NativeCurrency {
            id: CURRENCY_ID.into(),
            name: CURRENCY_ID.into(),
            divisibility: XEM_DIVISIBILITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfoDto {
    meta_data: NodeMetaDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeMetaDto {
    /// Signed network byte: `104` mainnet, `-104` testnet.
    network_id: i64,
}

#[derive(Debug, Deserialize)]
struct HeightDto {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct AccountMetaDataPair {
    account: AccountDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountDto {
    address: String,
    balance: u64,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnnounceResult {
    code: u64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DataDto {
    data: Vec<Value>,
}

#[async_trait]
impl NetworkAdapter for NemAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Nem
    }

    async fn fetch_network_properties(&self) -> Result<NetworkProperties, OperationError> {
        let (node, height) = tokio::try_join!(
            self.client.get::<NodeInfoDto>("/node/info", &[]),
            self.client.get::<HeightDto>("/chain/height", &[]),
        )?;
        let served = node.meta_data.network_id as i8 as u8;
        if served != self.network_type.as_byte() {
            return Err(OperationError::Configuration(format!(
                "node serves network {}, wallet expects {}",
                node.meta_data.network_id,
                self.network_type.identifier()
            )));
        }
        Ok(NetworkProperties {
            protocol: Protocol::Nem,
            node_url: self.client.base_url().to_owned(),
            network_identifier: self.network_type.identifier().to_owned(),
            network_type: u64::from(served),
            generation_hash: None,
            epoch_adjustment: NEMESIS_EPOCH,
            chain_height: height.height,
            fee_multipliers: FeeMultipliers::default(),
            base_fee_per_gas: None,
            native_currency: Self::native(),
        })
    }

    async fn fetch_account_info(&self, address: &str) -> Result<AccountInfo, OperationError> {
        let pair: AccountMetaDataPair = self
            .client
            .get("/account/get", &[("address", lookup_key(address))])
            .await?;
        let account = pair.account;
        Ok(AccountInfo {
            address: account.address,
            public_key: account.public_key,
            tokens: vec![Token::from_absolute(
                &Self::native().token_info(),
                u128::from(account.balance),
            )?],
            importance: account.importance.and_then(|i| Decimal::try_from(i).ok()),
            nonce: None,
            harvesting_keys: HarvestingKeys::default(),
        })
    }

    async fn submit(&self, signed: &SignedTransaction) -> Result<String, OperationError> {
        let payload = &signed.wire_payload;
        if payload.len() <= SIGNATURE_SIZE {
            return Err(OperationError::Validation(
                "payload too short to carry a signature".into(),
            ));
        }
        let (data, signature) = payload.split_at(payload.len() - SIGNATURE_SIZE);
        let body = json!({
            "data": hex::encode(data),
            "signature": hex::encode(signature),
        });
        let result: AnnounceResult = self.client.post("/transaction/announce", &body).await?;
        if result.code != ANNOUNCE_SUCCESS {
            return Err(OperationError::NetworkRequest {
                status: None,
                code: Some(result.code.to_string()),
                message: result.message,
            });
        }
        info!("announced nem transaction {}", signed.hash);
        Ok(signed.hash.clone())
    }

    async fn fetch_transaction_page(
        &self,
        criteria: &TransactionCriteria,
    ) -> Result<Page<WireTransaction>, OperationError> {
        let address = lookup_key(&criteria.address);
        let (path, mut query) = match criteria.group {
            TransactionGroup::Confirmed => ("/account/transfers/all", vec![("address", address)]),
            TransactionGroup::Unconfirmed => {
                ("/account/unconfirmedTransactions", vec![("address", address)])
            }
            TransactionGroup::Partial => {
                return Err(OperationError::unsupported(Protocol::Nem, "partial transactions"))
            }
        };
        if let Some(cursor) = &criteria.cursor {
            query.push(("id", cursor.clone()));
        }

        let page: DataDto = self.client.get(path, &query).await?;
        let next_cursor = page
            .data
            .last()
            .and_then(|record| record.pointer("/meta/id"))
            .and_then(Value::as_u64)
            .map(|id| id.to_string());
        let is_last_page =
            criteria.group == TransactionGroup::Unconfirmed || page.data.len() < NIS_PAGE_SIZE;
        Ok(Page {
            items: page.data.into_iter().map(WireTransaction::Dto).collect(),
            page_number: criteria.page_number,
            is_last_page,
            next_cursor: if is_last_page { None } else { next_cursor },
        })
    }

    async fn fetch_token_info(&self, id: &str) -> Result<TokenInfo, OperationError> {
        if id.eq_ignore_ascii_case(CURRENCY_ID) {
            return Ok(Self::native().token_info());
        }
        Err(OperationError::unsupported(Protocol::Nem, "mosaic lookup"))
    }
}
