use crate::error::EthError;

/// An Ethereum network the wallet can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthNetwork {
    pub chain_id: u64,
    /// Wallet-facing identifier, e.g. `"sepolia"`.
    pub identifier: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub is_testnet: bool,
}

/// Ethereum Mainnet (chain ID 1).
pub const MAINNET: EthNetwork = EthNetwork {
    chain_id: 1,
    identifier: "mainnet",
    name: "Ethereum",
    symbol: "ETH",
    decimals: 18,
    is_testnet: false,
};

/// Local Erigon devnet (chain ID 3151908).
pub const ERIGON_LOCAL: EthNetwork = EthNetwork {
    chain_id: 3_151_908,
    identifier: "erigon_local",
    name: "Erigon Local",
    symbol: "ETH",
    decimals: 18,
    is_testnet: true,
};

/// Sepolia Testnet (chain ID 11155111).
pub const SEPOLIA: EthNetwork = EthNetwork {
    chain_id: 11_155_111,
    identifier: "sepolia",
    name: "Sepolia",
    symbol: "ETH",
    decimals: 18,
    is_testnet: true,
};

const ALL_NETWORKS: &[&EthNetwork] = &[&MAINNET, &ERIGON_LOCAL, &SEPOLIA];

/// Looks up a network by chain id.
pub fn network_by_chain_id(chain_id: u64) -> Result<&'static EthNetwork, EthError> {
    ALL_NETWORKS
        .iter()
        .find(|n| n.chain_id == chain_id)
        .copied()
        .ok_or(EthError::UnsupportedChain(chain_id))
}

/// Looks up a network by its wallet identifier.
pub fn network_by_identifier(identifier: &str) -> Option<&'static EthNetwork> {
    ALL_NETWORKS
        .iter()
        .find(|n| n.identifier == identifier)
        .copied()
}

pub fn supported_networks() -> Vec<&'static EthNetwork> {
    ALL_NETWORKS.to_vec()
}
