//! The engine as seen by outside collaborators: every operation takes and
//! returns transport shapes, and nothing here hands out private parameters.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use trinity_common::dto::{ConsensusDto, ZkProofDto};
use trinity_common::{
    ChainId, Clock, CrossChainVerification, ParamBag, PredicateType, Result, TrinityError,
    VerificationResult, ZkProof,
};
use trinity_ledger::ProofLedger;
use trinity_prover::{GeneratorConfig, PredicateParams, ProofGenerator, ProofRequest};
use trinity_rails::AdapterRegistry;
use trinity_verifier::{DisclosureCheck, ProofVerifier, VerifierConfig};

use crate::coordinator::{ConsensusCoordinator, ConsensusRequest, CoordinatorConfig};
use crate::sink::SecurityEventSink;
use crate::threshold::chains_for_security_level;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub generator: GeneratorConfig,
    pub verifier: VerifierConfig,
    pub coordinator: CoordinatorConfig,
}

/// Outcome of a security-level driven consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLevelOutcome {
    pub vault_id: String,
    pub verified: bool,
    pub verification: ConsensusDto,
}

#[derive(Clone)]
pub struct TrinityEngine {
    generator: Arc<ProofGenerator>,
    verifier: ProofVerifier,
    ledger: ProofLedger,
    adapters: AdapterRegistry,
    coordinator: ConsensusCoordinator,
}

impl TrinityEngine {
    pub fn new(
        config: EngineConfig,
        ledger: ProofLedger,
        adapters: AdapterRegistry,
        sink: Arc<dyn SecurityEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let generator = Arc::new(ProofGenerator::new(config.generator, clock.clone()));
        let verifier = ProofVerifier::new(ledger.clone(), clock.clone(), config.verifier);
        let coordinator = ConsensusCoordinator::new(
            generator.clone(),
            verifier.clone(),
            ledger.clone(),
            adapters.clone(),
            sink,
            clock,
            config.coordinator,
        );
        Self {
            generator,
            verifier,
            ledger,
            adapters,
            coordinator,
        }
    }

    pub fn ledger(&self) -> &ProofLedger {
        &self.ledger
    }

    pub fn chains(&self) -> Vec<ChainId> {
        self.adapters.chains()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROOFS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Generate and persist a proof scoped to `chain`. The proof is not
    /// submitted anywhere.
    pub async fn generate_proof(
        &self,
        vault_id: &str,
        predicate: PredicateType,
        chain: ChainId,
        params: &ParamBag,
    ) -> Result<ZkProofDto> {
        let request = ProofRequest::from_param_bag(vault_id, predicate, params)?;
        let chain_params = self.chain_params(vault_id, predicate, chain).await?;
        let proof = self.generator.generate(&request, chain, chain_params)?;
        self.store(proof)
    }

    pub async fn selective_disclosure(
        &self,
        vault_id: &str,
        disclosed_fields: &BTreeSet<String>,
        chain: ChainId,
    ) -> Result<ZkProofDto> {
        let chain_params = self
            .chain_params(vault_id, PredicateType::ContentExistence, chain)
            .await?;
        let proof =
            self.generator
                .selective_disclosure(vault_id, disclosed_fields, chain, chain_params)?;
        self.store(proof)
    }

    pub async fn range_proof(
        &self,
        vault_id: &str,
        min: u128,
        max: u128,
        chain: ChainId,
    ) -> Result<ZkProofDto> {
        let chain_params = self
            .chain_params(vault_id, PredicateType::BalanceRange, chain)
            .await?;
        let proof = self
            .generator
            .range_proof(vault_id, min, max, chain, chain_params)?;
        self.store(proof)
    }

    pub async fn audit_proof(
        &self,
        vault_id: &str,
        audit_properties: &BTreeSet<String>,
        chain: ChainId,
    ) -> Result<ZkProofDto> {
        let chain_params = self
            .chain_params(vault_id, PredicateType::ContentExistence, chain)
            .await?;
        let proof = self
            .generator
            .audit_proof(vault_id, audit_properties, chain, chain_params)?;
        self.store(proof)
    }

    pub fn get_proof(&self, proof_id: &str) -> Result<ZkProofDto> {
        self.ledger
            .get_proof(proof_id)?
            .map(|proof| ZkProofDto::from(&proof))
            .ok_or_else(|| TrinityError::ProofNotFound(proof_id.to_string()))
    }

    pub fn proofs_for_vault(&self, vault_id: &str) -> Result<Vec<ZkProofDto>> {
        Ok(self
            .ledger
            .proofs_for_vault(vault_id)?
            .iter()
            .map(ZkProofDto::from)
            .collect())
    }

    pub fn verify_proof(&self, proof_id: &str) -> Result<VerificationResult> {
        self.verifier.verify(proof_id)
    }

    /// Local verification followed by the check on the proof's own chain.
    pub async fn verify_proof_on_chain(&self, proof_id: &str) -> Result<VerificationResult> {
        let chain = self
            .ledger
            .get_proof(proof_id)?
            .ok_or_else(|| TrinityError::ProofNotFound(proof_id.to_string()))?
            .chain();
        let adapter = self.adapters.get(chain)?;
        self.verifier.verify_on_chain(proof_id, adapter.as_ref()).await
    }

    pub fn check_disclosure(
        &self,
        proof_id: &str,
        fields: &BTreeSet<String>,
    ) -> Result<DisclosureCheck> {
        self.verifier.check_disclosure(proof_id, fields)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONSENSUS
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn request_cross_chain_consensus(
        &self,
        vault_id: &str,
        predicate: PredicateType,
        chains: &[ChainId],
        deadline_ms: Option<u64>,
        params: &ParamBag,
    ) -> Result<ConsensusDto> {
        let params = PredicateParams::from_param_bag(predicate, params)?;
        let mut request = ConsensusRequest::new(vault_id, params, chains.iter().copied());
        if let Some(ms) = deadline_ms {
            request = request.with_deadline(Duration::from_millis(ms));
        }
        let verification = self.coordinator.request_consensus(request).await?;
        Ok(ConsensusDto::from(&verification))
    }

    pub fn get_verification(&self, id: &str) -> Result<CrossChainVerification> {
        self.ledger
            .get_verification(id)?
            .ok_or_else(|| TrinityError::VerificationNotFound(id.to_string()))
    }

    pub fn verifications_for_vault(&self, vault_id: &str) -> Result<Vec<CrossChainVerification>> {
        self.ledger.verifications_for_vault(vault_id)
    }

    /// OWNERSHIP consensus over the chains `security_level` calls for.
    ///
    /// The operation name is bound into the proof as its nonce.
    pub async fn integrate_with_triple_chain_security(
        &self,
        vault_id: &str,
        operation: &str,
        security_level: u8,
    ) -> Result<SecurityLevelOutcome> {
        let chains = chains_for_security_level(security_level);
        info!(vault_id, operation, security_level, chains = ?chains, "security-level consensus");
        let params = PredicateParams::Ownership {
            address: vault_id.to_string(),
            nonce: operation.to_string(),
        };
        let verification = self
            .coordinator
            .request_consensus(ConsensusRequest::new(vault_id, params, chains))
            .await?;
        Ok(SecurityLevelOutcome {
            vault_id: vault_id.to_string(),
            verified: verification.overall_status == trinity_common::ConsensusStatus::Verified,
            verification: ConsensusDto::from(&verification),
        })
    }

    async fn chain_params(
        &self,
        vault_id: &str,
        predicate: PredicateType,
        chain: ChainId,
    ) -> Result<ParamBag> {
        self.adapters
            .get(chain)?
            .generate_chain_specific_params(vault_id, predicate)
            .await
    }

    fn store(&self, proof: ZkProof) -> Result<ZkProofDto> {
        self.ledger.insert_proof(&proof)?;
        Ok(ZkProofDto::from(&proof))
    }
}
