//! Ethereum rail.

use serde_json::json;
use sha3::{Digest, Keccak256};

use trinity_common::{ChainId, ParamBag};

use crate::adapter::{param_bag, Rail, RailAdapter};

pub struct Ethereum;

pub type EthereumAdapter = RailAdapter<Ethereum>;

impl Rail for Ethereum {
    const CHAIN: ChainId = ChainId::Ethereum;

    /// Transaction hash for a proof submission: keccak256 of the proof id.
    fn tx_reference(proof_id: &str) -> String {
        let digest = Keccak256::digest(format!("eth-proof-submission-{proof_id}").as_bytes());
        format!("0x{}", hex::encode(digest))
    }

    fn chain_params(nonce: u64) -> ParamBag {
        let profile = Self::CHAIN.profile();
        param_bag([
            ("network", json!(profile.network)),
            ("chainId", json!(profile.network_id)),
            ("contractAddress", json!(profile.contract_address)),
            ("nonce", json!(nonce.to_string())),
            ("requiredConfirmations", json!(profile.required_confirmations)),
        ])
    }
}
