//! Solana rail.

use serde_json::json;

use trinity_common::{ChainId, ParamBag};

use crate::adapter::{param_bag, Rail, RailAdapter};

/// Commitment level used for reads and confirmations.
pub const COMMITMENT: &str = "confirmed";

pub struct Solana;

pub type SolanaAdapter = RailAdapter<Solana>;

impl Rail for Solana {
    const CHAIN: ChainId = ChainId::Solana;

    fn tx_reference(proof_id: &str) -> String {
        let digest = blake3::hash(format!("sol-proof-submission-{proof_id}").as_bytes());
        format!("sol-tx-{}", &digest.to_hex()[..32])
    }

    fn chain_params(slot: u64) -> ParamBag {
        let profile = Self::CHAIN.profile();
        param_bag([
            ("network", json!(profile.network)),
            ("commitment", json!(COMMITMENT)),
            ("programId", json!(profile.contract_address)),
            ("slot", json!(slot)),
            ("requiredConfirmations", json!(profile.required_confirmations)),
        ])
    }
}
