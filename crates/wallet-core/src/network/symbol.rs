use std::sync::Mutex;

use async_trait::async_trait;
use chain_symbol::address::Address;
use chain_symbol::network::NetworkType;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::client::HttpClient;
use super::{NetworkAdapter, TokenCache};
use crate::config::WalletConfig;
use crate::error::OperationError;
use crate::protocol::lookup_key;
use crate::types::{
    AccountInfo, AliasTarget, FeeMultipliers, HarvestedBlock, HarvestingKeys, NativeCurrency,
    NetworkProperties, Page, Protocol, SignedTransaction, Token, TokenInfo, TransactionCriteria,
    WireTransaction,
};

/// Receipt emitted when a block is harvested.
pub const HARVEST_FEE_RECEIPT: u16 = 8515;
pub const CURRENCY_NAME: &str = "symbol.xym";
pub const CURRENCY_DIVISIBILITY: u8 = 6;

const EMPTY_PUBLIC_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Catapult REST gateway.
#[derive(Debug)]
pub struct SymbolAdapter {
    client: HttpClient,
    network_type: NetworkType,
    tokens: TokenCache,
    native: Mutex<Option<TokenInfo>>,
}

impl SymbolAdapter {
    pub fn new(config: &WalletConfig) -> Result<Self, OperationError> {
        let network_type = NetworkType::from_identifier(&config.network_identifier).ok_or_else(|| {
            OperationError::Configuration(format!(
                "unknown symbol network '{}'",
                config.network_identifier
            ))
        })?;
        Ok(Self {
            client: HttpClient::new(&config.node_url, config.request_timeout())?,
            network_type,
            tokens: TokenCache::default(),
            native: Mutex::new(None),
        })
    }

    fn encode_address(&self, hex_or_base32: &str) -> Result<String, OperationError> {
        if hex_or_base32.len() == 48 {
            return Ok(Address::from_hex(hex_or_base32)?.encode());
        }
        Ok(hex_or_base32.to_owned())
    }

    async fn native_currency(&self) -> Result<TokenInfo, OperationError> {
        let cached = self.native.lock().ok().and_then(|native| native.clone());
        match cached {
            Some(info) => Ok(info),
            None => Ok(self.fetch_network_properties().await?.native_currency.token_info()),
        }
    }

    async fn token(&self, id: &str, absolute: u128) -> Result<Token, OperationError> {
        let info = self.fetch_token_info(id).await?;
        Token::from_absolute(&info, absolute)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfoDto {
    network_identifier: u8,
    network_generation_hash_seed: String,
}

#[derive(Debug, Deserialize)]
struct NetworkConfigDto {
    network: NetworkSectionDto,
    chain: ChainSectionDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkSectionDto {
    epoch_adjustment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainSectionDto {
    currency_mosaic_id: String,
}

#[derive(Debug, Deserialize)]
struct ChainInfoDto {
    height: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeesDto {
    average_fee_multiplier: u64,
    highest_fee_multiplier: u64,
    min_fee_multiplier: u64,
}

#[derive(Debug, Deserialize)]
struct AccountInfoDto {
    account: AccountDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountDto {
    address: String,
    public_key: String,
    #[serde(default)]
    importance: Option<String>,
    #[serde(default)]
    supplemental_public_keys: SupplementalKeysDto,
    #[serde(default)]
    mosaics: Vec<AmountDto>,
}

#[derive(Debug, Default, Deserialize)]
struct SupplementalKeysDto {
    linked: Option<KeyDto>,
    node: Option<KeyDto>,
    vrf: Option<KeyDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyDto {
    public_key: String,
}

#[derive(Debug, Deserialize)]
struct AmountDto {
    id: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct MosaicInfoDto {
    mosaic: MosaicDto,
}

#[derive(Debug, Deserialize)]
struct MosaicDto {
    id: String,
    divisibility: u8,
}

#[derive(Debug, Deserialize)]
struct NamespaceInfoDto {
    namespace: NamespaceDto,
}

#[derive(Debug, Deserialize)]
struct NamespaceDto {
    alias: AliasDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AliasDto {
    #[serde(rename = "type")]
    alias_type: u8,
    mosaic_id: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageDto<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StatementInfoDto {
    statement: StatementDto,
}

#[derive(Debug, Deserialize)]
struct StatementDto {
    height: String,
    receipts: Vec<ReceiptDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptDto {
    #[serde(rename = "type")]
    receipt_type: u16,
    target_address: Option<String>,
    amount: Option<String>,
}

#[async_trait]
impl NetworkAdapter for SymbolAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Symbol
    }

    async fn fetch_network_properties(&self) -> Result<NetworkProperties, OperationError> {
        let (node, config, chain, fees) = tokio::try_join!(
            self.client.get::<NodeInfoDto>("/node/info", &[]),
            self.client.get::<NetworkConfigDto>("/network/properties", &[]),
            self.client.get::<ChainInfoDto>("/chain/info", &[]),
            self.client.get::<FeesDto>("/network/fees/transaction", &[]),
        )?;

        if node.network_identifier != self.network_type.as_byte() {
            return Err(OperationError::Configuration(format!(
                "node serves network type {}, wallet expects {}",
                node.network_identifier,
                self.network_type.as_byte()
            )));
        }

        let epoch_adjustment = config
            .network
            .epoch_adjustment
            .trim_end_matches('s')
            .parse::<u64>()
            .map_err(|_| {
                OperationError::network(format!(
                    "invalid epoch adjustment '{}'",
                    config.network.epoch_adjustment
                ))
            })?;
        let currency_id = normalize_id(&config.chain.currency_mosaic_id);
        let native_currency = NativeCurrency {
            id: currency_id,
            name: CURRENCY_NAME.into(),
            divisibility: CURRENCY_DIVISIBILITY,
        };
        self.tokens.insert(native_currency.token_info());
        if let Ok(mut native) = self.native.lock() {
            *native = Some(native_currency.token_info());
        }

        Ok(NetworkProperties {
            protocol: Protocol::Symbol,
            node_url: self.client.base_url().to_owned(),
            network_identifier: self.network_type.identifier().to_owned(),
            network_type: u64::from(node.network_identifier),
            generation_hash: Some(node.network_generation_hash_seed.to_ascii_uppercase()),
            epoch_adjustment,
            chain_height: parse_u64(&chain.height)?,
            fee_multipliers: FeeMultipliers {
                min: fees.min_fee_multiplier,
                average: fees.average_fee_multiplier,
                highest: fees.highest_fee_multiplier,
            },
            base_fee_per_gas: None,
            native_currency,
        })
    }

    async fn fetch_account_info(&self, address: &str) -> Result<AccountInfo, OperationError> {
        let path = format!("/accounts/{}", lookup_key(address));
        let Some(dto) = self.client.get_optional::<AccountInfoDto>(&path, &[]).await? else {
            return Ok(AccountInfo::empty(address));
        };
        let account = dto.account;

        let mut tokens = Vec::with_capacity(account.mosaics.len());
        for mosaic in &account.mosaics {
            tokens.push(self.token(&mosaic.id, u128::from(parse_u64(&mosaic.amount)?)).await?);
        }
        let keys = account.supplemental_public_keys;
        Ok(AccountInfo {
            address: self.encode_address(&account.address)?,
            public_key: (account.public_key != EMPTY_PUBLIC_KEY).then_some(account.public_key),
            tokens,
            importance: account
                .importance
                .as_deref()
                .map(parse_u64)
                .transpose()?
                .map(Decimal::from),
            nonce: None,
            harvesting_keys: HarvestingKeys {
                linked: keys.linked.map(|k| k.public_key),
                node: keys.node.map(|k| k.public_key),
                vrf: keys.vrf.map(|k| k.public_key),
            },
        })
    }

    async fn submit(&self, signed: &SignedTransaction) -> Result<String, OperationError> {
        let body = json!({ "payload": hex::encode_upper(&signed.wire_payload) });
        let _: Value = self.client.put("/transactions", &body).await?;
        info!("announced symbol transaction {}", signed.hash);
        Ok(signed.hash.clone())
    }

    async fn fetch_transaction_page(
        &self,
        criteria: &TransactionCriteria,
    ) -> Result<Page<WireTransaction>, OperationError> {
        let path = format!("/transactions/{}", criteria.group.as_str());
        let query = [
            ("address", lookup_key(&criteria.address)),
            ("pageNumber", criteria.page_number.to_string()),
            ("pageSize", criteria.page_size.to_string()),
            ("order", "desc".to_owned()),
        ];
        let page: PageDto<Value> = self.client.get(&path, &query).await?;
        Ok(Page {
            is_last_page: page.data.len() < criteria.page_size as usize,
            items: page.data.into_iter().map(WireTransaction::Dto).collect(),
            page_number: criteria.page_number,
            next_cursor: None,
        })
    }

    async fn fetch_token_info(&self, id: &str) -> Result<TokenInfo, OperationError> {
        let id = normalize_id(id);
        if let Some(info) = self.tokens.get(&id) {
            return Ok(info);
        }
        let dto: MosaicInfoDto = self.client.get(&format!("/mosaics/{id}"), &[]).await?;
        let info = TokenInfo {
            id: normalize_id(&dto.mosaic.id),
            name: normalize_id(&dto.mosaic.id),
            divisibility: dto.mosaic.divisibility,
        };
        self.tokens.insert(info.clone());
        Ok(info)
    }

    async fn fetch_harvested_blocks(
        &self,
        address: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<HarvestedBlock>, OperationError> {
        let target = lookup_key(address);
        let query = [
            ("targetAddress", target.clone()),
            ("receiptType", HARVEST_FEE_RECEIPT.to_string()),
            ("pageNumber", page_number.to_string()),
            ("pageSize", page_size.to_string()),
            ("order", "desc".to_owned()),
        ];
        let page: PageDto<StatementInfoDto> =
            self.client.get("/statements/transaction", &query).await?;
        let is_last_page = page.data.len() < page_size as usize;
        let native = self.native_currency().await?;

        let mut items = Vec::with_capacity(page.data.len());
        for info in page.data {
            let mut amount: u128 = 0;
            for receipt in &info.statement.receipts {
                let to_target = match receipt.target_address.as_deref() {
                    Some(raw) => lookup_key(&self.encode_address(raw)?) == target,
                    None => false,
                };
                if receipt.receipt_type == HARVEST_FEE_RECEIPT && to_target {
                    amount += u128::from(parse_u64(receipt.amount.as_deref().unwrap_or("0"))?);
                }
            }
            items.push(HarvestedBlock {
                height: parse_u64(&info.statement.height)?,
                amount: Token::from_absolute(&native, amount)?,
                timestamp: None,
            });
        }
        Ok(Page {
            items,
            page_number,
            is_last_page,
            next_cursor: None,
        })
    }

    async fn fetch_alias_target(&self, namespace_id: &str) -> Result<AliasTarget, OperationError> {
        let path = format!("/namespaces/{}", normalize_id(namespace_id));
        let dto: NamespaceInfoDto = self.client.get(&path, &[]).await?;
        let alias = dto.namespace.alias;
        Ok(match (alias.alias_type, alias.mosaic_id, alias.address) {
            (1, Some(id), _) => AliasTarget::Token(normalize_id(&id)),
            (2, _, Some(address)) => AliasTarget::Address(self.encode_address(&address)?),
            _ => AliasTarget::None,
        })
    }
}

/// `0x72C0'212E'67A0'8BCE` → `72C0212E67A08BCE`.
fn normalize_id(id: &str) -> String {
    id.trim_start_matches("0x")
        .chars()
        .filter(|c| *c != '\'')
        .collect::<String>()
        .to_ascii_uppercase()
}

fn parse_u64(value: &str) -> Result<u64, OperationError> {
    value
        .parse()
        .map_err(|_| OperationError::network(format!("invalid integer '{value}'")))
}
