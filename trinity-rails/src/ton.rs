//! TON rail.

use serde_json::json;

use trinity_common::{ChainId, ParamBag};

use crate::adapter::{param_bag, Rail, RailAdapter};

/// Basechain.
pub const WORKCHAIN: i32 = 0;

pub struct Ton;

pub type TonAdapter = RailAdapter<Ton>;

impl Rail for Ton {
    const CHAIN: ChainId = ChainId::Ton;

    fn tx_reference(proof_id: &str) -> String {
        let digest = blake3::hash(format!("ton-proof-submission-{proof_id}").as_bytes());
        format!("ton-tx-{}", &digest.to_hex()[..32])
    }

    fn chain_params(seqno: u64) -> ParamBag {
        let profile = Self::CHAIN.profile();
        param_bag([
            ("network", json!(profile.network)),
            ("workchain", json!(WORKCHAIN)),
            ("contractAddress", json!(profile.contract_address)),
            ("seqno", json!(seqno)),
            ("requiredConfirmations", json!(profile.required_confirmations)),
        ])
    }
}
