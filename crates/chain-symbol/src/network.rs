use crate::error::SymbolError;

/// Symbol network type byte. It prefixes every address and is carried in
/// every transaction header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

impl NetworkType {
    pub const fn as_byte(self) -> u8 {
        match self {
            NetworkType::Mainnet => 0x68,
            NetworkType::Testnet => 0x98,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, SymbolError> {
        match byte {
            0x68 => Ok(NetworkType::Mainnet),
            0x98 => Ok(NetworkType::Testnet),
            other => Err(SymbolError::UnknownNetwork(other)),
        }
    }

    /// Wallet-facing identifier ("mainnet" / "testnet").
    pub const fn identifier(self) -> &'static str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "mainnet" => Some(NetworkType::Mainnet),
            "testnet" => Some(NetworkType::Testnet),
            _ => None,
        }
    }

    /// Network epoch as seconds since the Unix epoch. Deadlines and
    /// timestamps on chain are milliseconds relative to this instant.
    pub const fn default_epoch_adjustment(self) -> u64 {
        match self {
            NetworkType::Mainnet => 1_615_853_185,
            NetworkType::Testnet => 1_667_250_467,
        }
    }

    /// Native currency mosaic id (`symbol.xym`).
    pub const fn currency_mosaic_id(self) -> u64 {
        match self {
            NetworkType::Mainnet => 0x6BED_913F_A202_23F8,
            NetworkType::Testnet => 0x72C0_212E_67A0_8BCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        for net in [NetworkType::Mainnet, NetworkType::Testnet] {
            assert_eq!(NetworkType::from_byte(net.as_byte()).unwrap(), net);
            assert_eq!(NetworkType::from_identifier(net.identifier()), Some(net));
        }
        assert_eq!(NetworkType::Mainnet.as_byte(), 104);
        assert_eq!(NetworkType::Testnet.as_byte(), 152);
    }

    #[test]
    fn unknown_byte_is_rejected() {
        assert_eq!(NetworkType::from_byte(0), Err(SymbolError::UnknownNetwork(0)));
        assert!(NetworkType::from_identifier("devnet").is_none());
    }
}
