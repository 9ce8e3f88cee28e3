use crate::error::NemError;

/// NEM network byte (shared with addresses and the transaction version).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

/// Nemesis block time, 2015-03-29 00:06:25 UTC, in Unix seconds.
pub const NEMESIS_EPOCH: u64 = 1_427_587_585;

/// Native currency (`nem:xem`) divisibility.
pub const XEM_DIVISIBILITY: u8 = 6;

impl NetworkType {
    pub const fn as_byte(self) -> u8 {
        match self {
            NetworkType::Mainnet => 0x68,
            NetworkType::Testnet => 0x98,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, NemError> {
        match byte {
            0x68 => Ok(NetworkType::Mainnet),
            0x98 => Ok(NetworkType::Testnet),
            other => Err(NemError::UnknownNetwork(other)),
        }
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_and_identifiers() {
        assert_eq!(NetworkType::from_byte(104).unwrap(), NetworkType::Mainnet);
        assert_eq!(NetworkType::from_byte(152).unwrap(), NetworkType::Testnet);
        assert_eq!(NetworkType::from_identifier("testnet"), Some(NetworkType::Testnet));
        assert_eq!(NetworkType::from_byte(0), Err(NemError::UnknownNetwork(0)));
    }
}
