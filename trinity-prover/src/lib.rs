//! trinity-prover
//!
//! Builds predicate proofs. Generation is pure: the returned [`ZkProof`] is
//! not persisted, that is the ledger's job.

pub mod disclosure;
pub mod params;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::OsRng;
use tracing::{debug, info};

use trinity_circuit::{prove, PredicateWitness};
use trinity_common::{
    derive_proof_id, ChainBinding, ChainId, Clock, ParamBag, ProofStatus, Result, SystemClock,
    TrinityError, ZkProof, DEFAULT_VALIDITY_WINDOW_MS,
};

pub use params::{content_hash_of, PredicateParams, ProofRequest, NATIVE_TOKEN};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// `expiresAt = createdAt + validity_window_ms`
    pub validity_window_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            validity_window_ms: DEFAULT_VALIDITY_WINDOW_MS,
        }
    }
}

pub struct ProofGenerator {
    config: GeneratorConfig,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl ProofGenerator {
    pub fn new(config: GeneratorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GeneratorConfig::default(), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a proof of `request` scoped to `chain`.
    ///
    /// `chain_params` come from the chain adapter and are bound into the
    /// proof transcript alongside the public inputs.
    pub fn generate(
        &self,
        request: &ProofRequest,
        chain: ChainId,
        chain_params: ParamBag,
    ) -> Result<ZkProof> {
        if request.vault_id.trim().is_empty() {
            return Err(TrinityError::invalid_params("vaultId must not be empty"));
        }
        if !request.target_chains.is_empty() && !request.target_chains.contains(&chain) {
            return Err(TrinityError::invalid_params(format!(
                "chain {chain} is not a target of this request"
            )));
        }
        request.params.validate()?;

        let predicate_type = request.predicate_type();
        let created_at = self.clock.now_ms();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = derive_proof_id(&request.vault_id, predicate_type, created_at, chain, sequence);

        let mut proof = ZkProof {
            id,
            vault_id: request.vault_id.clone(),
            predicate_type,
            public_inputs: request.params.public_inputs(),
            chain_binding: ChainBinding::new(chain, chain_params),
            proof_artifact: Vec::new(),
            created_at,
            expires_at: created_at.saturating_add(self.config.validity_window_ms),
            status: ProofStatus::Pending,
            verified_at: None,
            verification_history: Vec::new(),
            version: 0,
        };

        let statement = proof.statement_digest()?;
        let witness =
            PredicateWitness::derive(predicate_type, &request.params.private_material()?, &mut OsRng);
        proof.proof_artifact = prove(&statement, &witness, &mut OsRng).to_bytes();

        debug!(proof_id = %proof.id, sequence, "proof artifact computed");
        info!(
            proof_id = %proof.id,
            vault_id = %proof.vault_id,
            predicate = %predicate_type,
            chain = %chain,
            "generated predicate proof"
        );
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_circuit::verify_bytes;
    use trinity_common::{ManualClock, PredicateInputs, PredicateType, TimeConditionKind};

    fn generator(clock: &ManualClock) -> ProofGenerator {
        ProofGenerator::new(GeneratorConfig::default(), Arc::new(clock.clone()))
    }

    fn ownership() -> ProofRequest {
        ProofRequest::new(
            "V1",
            PredicateParams::Ownership {
                address: "0xabc".into(),
                nonce: "1".into(),
            },
        )
    }

    #[test]
    fn test_generate_sets_expiry_and_verifiable_artifact() {
        let clock = ManualClock::new(1_000);
        let proof = generator(&clock)
            .generate(&ownership(), ChainId::Ethereum, ParamBag::new())
            .unwrap();
        assert_eq!(proof.created_at, 1_000);
        assert_eq!(proof.expires_at, 1_000 + DEFAULT_VALIDITY_WINDOW_MS);
        assert_eq!(proof.status, ProofStatus::Pending);
        assert_eq!(proof.chain(), ChainId::Ethereum);
        assert!(verify_bytes(&proof.statement_digest().unwrap(), &proof.proof_artifact));
    }

    #[test]
    fn test_ids_unique_within_one_millisecond() {
        let clock = ManualClock::new(5);
        let generator = generator(&clock);
        let a = generator
            .generate(&ownership(), ChainId::Solana, ParamBag::new())
            .unwrap();
        let b = generator
            .generate(&ownership(), ChainId::Solana, ParamBag::new())
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_target_chain_enforced() {
        let clock = ManualClock::new(0);
        let request = ownership().with_target_chains([ChainId::Ton]);
        let err = generator(&clock)
            .generate(&request, ChainId::Ethereum, ParamBag::new())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PREDICATE_PARAMS");
    }

    #[test]
    fn test_time_window_bounds_stay_private() {
        let clock = ManualClock::new(0);
        let request = ProofRequest::new(
            "V1",
            PredicateParams::TimeCondition {
                condition: TimeConditionKind::Before,
                window_start: 1_111_111,
                window_end: 2_222_222,
            },
        );
        let proof = generator(&clock)
            .generate(&request, ChainId::Ton, ParamBag::new())
            .unwrap();
        assert_eq!(
            proof.public_inputs,
            PredicateInputs::TimeCondition {
                condition: TimeConditionKind::Before,
                has_time_window: true,
            }
        );
        let json = serde_json::to_string(&proof).unwrap();
        assert!(!json.contains("1111111"));
        assert!(!json.contains("2222222"));
        assert_eq!(proof.predicate_type, PredicateType::TimeCondition);
    }
}
