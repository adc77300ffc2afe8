//! Transport shapes handed to callers outside the engine.
//!
//! None of these carry private predicate parameters or proof artifacts.

use serde::{Deserialize, Serialize};

use crate::{
    ChainId, ChainVerificationStatus, ConsensusStatus, CrossChainVerification, PredicateInputs,
    PredicateType, ProofStatus, ZkProof,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProofDto {
    pub id: String,
    pub vault_id: String,
    pub predicate_type: PredicateType,
    pub status: ProofStatus,
    pub created_at: u64,
    pub expires_at: u64,
    pub public_inputs: PredicateInputs,
    pub chain: ChainId,
}

impl From<&ZkProof> for ZkProofDto {
    fn from(proof: &ZkProof) -> Self {
        Self {
            id: proof.id.clone(),
            vault_id: proof.vault_id.clone(),
            predicate_type: proof.predicate_type,
            status: proof.status,
            created_at: proof.created_at,
            expires_at: proof.expires_at,
            public_inputs: proof.public_inputs.clone(),
            chain: proof.chain(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerChainDto {
    pub chain: ChainId,
    pub status: ChainVerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_reference: Option<String>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<String>,
    pub vault_id: String,
    pub overall_status: ConsensusStatus,
    pub per_chain: Vec<PerChainDto>,
}

impl From<&CrossChainVerification> for ConsensusDto {
    fn from(verification: &CrossChainVerification) -> Self {
        let per_chain = verification
            .required_chains
            .iter()
            .filter_map(|chain| {
                verification
                    .per_chain_results
                    .get(chain)
                    .map(|result| PerChainDto {
                        chain: *chain,
                        status: result.status,
                        tx_reference: result.tx_reference.clone(),
                        timestamp: result.timestamp,
                    })
            })
            .collect();
        Self {
            id: verification.id.clone(),
            proof_id: verification.proof_id.clone(),
            vault_id: verification.vault_id.clone(),
            overall_status: verification.overall_status,
            per_chain,
        }
    }
}
