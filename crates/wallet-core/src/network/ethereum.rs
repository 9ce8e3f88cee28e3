use async_trait::async_trait;
use chain_eth::address;
use chain_eth::chains::{self, EthNetwork};
use chain_eth::erc20;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::client::{parse_quantity, HttpClient, RpcClient};
use super::{NetworkAdapter, TokenCache};
use crate::config::WalletConfig;
use crate::error::OperationError;
use crate::types::{
    AccountInfo, FeeMultipliers, HarvestingKeys, NativeCurrency, NetworkProperties, Page,
    Protocol, SignedTransaction, Token, TokenInfo, TransactionCriteria, TransactionGroup,
    WireTransaction,
};

/// Blocks sampled by `eth_feeHistory`.
const FEE_HISTORY_BLOCKS: &str = "0x14";
/// Reward percentiles mapped to the slow, medium and fast tiers.
const FEE_PERCENTILES: [u8; 3] = [10, 50, 75];

#[derive(Debug)]
pub struct EthereumAdapter {
    rpc: RpcClient,
    node_url: String,
    explorer: Option<HttpClient>,
    network: &'static EthNetwork,
    tracked_tokens: Vec<TokenInfo>,
    tokens: TokenCache,
}

impl EthereumAdapter {
    pub fn new(config: &WalletConfig) -> Result<Self, OperationError> {
        let network = chains::network_by_identifier(&config.network_identifier).ok_or_else(|| {
            OperationError::Configuration(format!(
                "unknown ethereum network '{}'",
                config.network_identifier
            ))
        })?;
        let explorer = config
            .explorer_url
            .as_deref()
            .map(|url| HttpClient::new(url, config.request_timeout()))
            .transpose()?;
        Ok(Self {
            rpc: RpcClient::new(&config.node_url, config.request_timeout())?,
            node_url: config.node_url.clone(),
            explorer,
            network,
            tracked_tokens: config.tracked_tokens.clone(),
            tokens: TokenCache::default(),
        })
    }

    fn native(&self) -> NativeCurrency {
        NativeCurrency {
            id: self.network.symbol.to_owned(),
            name: self.network.symbol.to_owned(),
            divisibility: self.network.decimals,
        }
    }

    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<u128, OperationError> {
        let raw: String = self.rpc.call(method, params).await?;
        parse_quantity(&raw)
    }

    async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, OperationError> {
        let raw: String = self
            .rpc
            .call(
                "eth_call",
                vec![json!({"to": to, "data": format!("0x{}", hex::encode(data))}), json!("latest")],
            )
            .await?;
        hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| OperationError::network(format!("eth_call returned invalid hex: {e}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeHistory {
    base_fee_per_gas: Vec<String>,
    #[serde(default)]
    reward: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    message: String,
    result: Value,
}

#[async_trait]
impl NetworkAdapter for EthereumAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Ethereum
    }

    async fn fetch_network_properties(&self) -> Result<NetworkProperties, OperationError> {
        let chain_id = self.quantity("eth_chainId", vec![]).await?;
        if chain_id != u128::from(self.network.chain_id) {
            return Err(OperationError::Configuration(format!(
                "node serves chain {chain_id}, wallet expects {}",
                self.network.chain_id
            )));
        }
        let height = self.quantity("eth_blockNumber", vec![]).await?;
        let history: FeeHistory = self
            .rpc
            .call(
                "eth_feeHistory",
                vec![json!(FEE_HISTORY_BLOCKS), json!("latest"), json!(FEE_PERCENTILES)],
            )
            .await?;

        // The last entry is the base fee of the pending block.
        let base_fee = history
            .base_fee_per_gas
            .last()
            .map(|fee| parse_quantity(fee))
            .transpose()?
            .ok_or_else(|| OperationError::network("eth_feeHistory returned no base fee"))?;
        let [slow, medium, fast] = priority_tiers(&history.reward)?;

        Ok(NetworkProperties {
            protocol: Protocol::Ethereum,
            node_url: self.node_url.clone(),
            network_identifier: self.network.identifier.to_owned(),
            network_type: self.network.chain_id,
            generation_hash: None,
            epoch_adjustment: 0,
            chain_height: to_u64(height)?,
            fee_multipliers: FeeMultipliers {
                min: slow,
                average: medium,
                highest: fast,
            },
            base_fee_per_gas: Some(to_u64(base_fee)?),
            native_currency: self.native(),
        })
    }

    async fn fetch_account_info(&self, address: &str) -> Result<AccountInfo, OperationError> {
        let address = address::checksum_address(address)?;
        let balance = self
            .quantity("eth_getBalance", vec![json!(address), json!("latest")])
            .await?;
        let nonce = self
            .quantity("eth_getTransactionCount", vec![json!(address), json!("pending")])
            .await?;

        let mut tokens = vec![Token::from_absolute(&self.native().token_info(), balance)?];
        let call_data = erc20::encode_balance_of(&address)?;
        for token in &self.tracked_tokens {
            let returned = self.eth_call(&token.id, &call_data).await?;
            tokens.push(Token::from_absolute(token, erc20::decode_balance(&returned)?)?);
        }

        Ok(AccountInfo {
            address,
            public_key: None,
            tokens,
            importance: None,
            nonce: Some(to_u64(nonce)?),
            harvesting_keys: HarvestingKeys::default(),
        })
    }

    async fn submit(&self, signed: &SignedTransaction) -> Result<String, OperationError> {
        let raw = format!("0x{}", hex::encode(&signed.wire_payload));
        let hash: String = self.rpc.call("eth_sendRawTransaction", vec![json!(raw)]).await?;
        if !hash.eq_ignore_ascii_case(&signed.hash) {
            warn!("node returned hash {} for transaction {}", hash, signed.hash);
        }
        info!("announced ethereum transaction {}", hash);
        Ok(hash)
    }

    async fn fetch_transaction_page(
        &self,
        criteria: &TransactionCriteria,
    ) -> Result<Page<WireTransaction>, OperationError> {
        let explorer = self
            .explorer
            .as_ref()
            .ok_or_else(|| OperationError::unsupported(Protocol::Ethereum, "transaction history"))?;
        match criteria.group {
            TransactionGroup::Confirmed => {}
            // Explorers only index mined transactions.
            TransactionGroup::Unconfirmed => return Ok(Page::empty(criteria.page_number)),
            TransactionGroup::Partial => {
                return Err(OperationError::unsupported(
                    Protocol::Ethereum,
                    "partial transactions",
                ))
            }
        }

        let query = [
            ("module", "account".to_owned()),
            ("action", "txlist".to_owned()),
            ("address", criteria.address.clone()),
            ("page", criteria.page_number.to_string()),
            ("offset", criteria.page_size.to_string()),
            ("sort", "desc".to_owned()),
        ];
        let response: ExplorerResponse = explorer.get("", &query).await?;
        let records = match (response.status.as_str(), response.result) {
            ("1", Value::Array(records)) => records,
            ("0", _) if response.message.starts_with("No transactions") => Vec::new(),
            (_, result) => {
                return Err(OperationError::NetworkRequest {
                    status: None,
                    code: Some(response.status),
                    message: format!("{}: {}", response.message, result),
                })
            }
        };
        Ok(Page {
            is_last_page: records.len() < criteria.page_size as usize,
            items: records.into_iter().map(WireTransaction::Dto).collect(),
            page_number: criteria.page_number,
            next_cursor: None,
        })
    }

    async fn fetch_token_info(&self, id: &str) -> Result<TokenInfo, OperationError> {
        if id.eq_ignore_ascii_case(self.network.symbol) {
            return Ok(self.native().token_info());
        }
        let contract = address::checksum_address(id)?;
        if let Some(tracked) = self
            .tracked_tokens
            .iter()
            .find(|token| token.id.eq_ignore_ascii_case(&contract))
        {
            return Ok(tracked.clone());
        }
        if let Some(cached) = self.tokens.get(&contract) {
            return Ok(cached);
        }
        let returned = self.eth_call(&contract, &erc20::encode_decimals()).await?;
        let info = TokenInfo {
            id: contract.clone(),
            name: contract,
            divisibility: erc20::decode_decimals(&returned)?,
        };
        self.tokens.insert(info.clone());
        Ok(info)
    }
}

/// Mean reward per percentile column across the sampled blocks.
fn priority_tiers(rewards: &[Vec<String>]) -> Result<[u64; 3], OperationError> {
    let mut tiers = [0u64; 3];
    if rewards.is_empty() {
        return Ok(tiers);
    }
    for (column, tier) in tiers.iter_mut().enumerate() {
        let mut sum: u128 = 0;
        for block in rewards {
            let reward = block
                .get(column)
                .ok_or_else(|| OperationError::network("eth_feeHistory reward row too short"))?;
            sum += parse_quantity(reward)?;
        }
        *tier = to_u64(sum / rewards.len() as u128)?;
    }
    Ok(tiers)
}

fn to_u64(value: u128) -> Result<u64, OperationError> {
    u64::try_from(value).map_err(|_| OperationError::network(format!("quantity {value} overflows u64")))
}
