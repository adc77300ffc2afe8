//! Chain identifiers and static chain profiles.
//!
//! The engine confirms every vault predicate on three independent chains.
//! Profiles carry the chain-native metadata adapters fold into a proof's
//! chain binding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TrinityError;

/// Ethereum vault verifier contract.
pub const ETHEREUM_CONTRACT: &str = "0x1234567890123456789012345678901234567890";
/// Solana vault program.
pub const SOLANA_PROGRAM_ID: &str = "ChronoSVauLt111111111111111111111111111111111";
/// TON vault contract.
pub const TON_CONTRACT: &str = "EQAvDfYmkVV2zFXzC0Hs2e2RGWJyMXHpnMTXH4jnI2W3AwLb";

/// One of the three chains participating in threshold consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainId {
    #[serde(rename = "ETH")]
    Ethereum,
    #[serde(rename = "SOL")]
    Solana,
    #[serde(rename = "TON")]
    Ton,
}

impl ChainId {
    pub const ALL: [ChainId; 3] = [ChainId::Ethereum, ChainId::Solana, ChainId::Ton];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ETH",
            ChainId::Solana => "SOL",
            ChainId::Ton => "TON",
        }
    }

    pub fn profile(&self) -> ChainProfile {
        match self {
            ChainId::Ethereum => ChainProfile {
                chain: ChainId::Ethereum,
                display_name: "Ethereum",
                network: "ethereum",
                contract_address: ETHEREUM_CONTRACT,
                network_id: Some(1),
                required_confirmations: 12,
                sequence_label: "nonce",
            },
            ChainId::Solana => ChainProfile {
                chain: ChainId::Solana,
                display_name: "Solana",
                network: "solana",
                contract_address: SOLANA_PROGRAM_ID,
                network_id: None,
                required_confirmations: 32,
                sequence_label: "slot",
            },
            ChainId::Ton => ChainProfile {
                chain: ChainId::Ton,
                display_name: "TON",
                network: "ton",
                contract_address: TON_CONTRACT,
                network_id: None,
                required_confirmations: 16,
                sequence_label: "seqno",
            },
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = TrinityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" | "ETHEREUM" => Ok(ChainId::Ethereum),
            "SOL" | "SOLANA" => Ok(ChainId::Solana),
            "TON" => Ok(ChainId::Ton),
            _ => Err(TrinityError::UnknownChain(s.to_string())),
        }
    }
}

/// Static chain information.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    pub chain: ChainId,
    /// Human-readable chain name
    pub display_name: &'static str,
    /// Network name reported in chain params
    pub network: &'static str,
    /// Verifier contract (or program) address
    pub contract_address: &'static str,
    /// Numeric network id, EVM only
    pub network_id: Option<u64>,
    /// Confirmations before a submission counts as final
    pub required_confirmations: u32,
    /// Name of the chain-native sequence value (nonce / slot / seqno)
    pub sequence_label: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_parse() {
        assert_eq!("ETH".parse::<ChainId>().unwrap(), ChainId::Ethereum);
        assert_eq!("solana".parse::<ChainId>().unwrap(), ChainId::Solana);
        assert_eq!(" ton ".parse::<ChainId>().unwrap(), ChainId::Ton);
        assert!("btc".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_chain_serde_names() {
        let json = serde_json::to_string(&ChainId::ALL).unwrap();
        assert_eq!(json, r#"["ETH","SOL","TON"]"#);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(ChainId::Ethereum.profile().required_confirmations, 12);
        assert_eq!(ChainId::Solana.profile().required_confirmations, 32);
        assert_eq!(ChainId::Ton.profile().required_confirmations, 16);
        assert_eq!(ChainId::Solana.profile().sequence_label, "slot");
    }
}
