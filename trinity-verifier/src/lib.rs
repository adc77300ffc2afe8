//! trinity-verifier
//!
//! Checks a stored proof and moves it through its status lifecycle:
//! `PENDING -> VERIFIED | REJECTED`, and anything to `EXPIRED` once its
//! validity window closes. Expiry is checked before the artifact.
//! `EXPIRED` and `REJECTED` are final.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use trinity_circuit::verify_proof_artifact;
use trinity_common::{
    disclosure_hash, Clock, PredicateInputs, ProofStatus, Result, SystemClock, TrinityError,
    VerificationEntry, VerificationResult, ZkProof,
};
use trinity_ledger::{ProofLedger, MAX_CAS_ATTEMPTS};
use trinity_rails::ChainAdapter;

pub const DEFAULT_VERIFIER_ID: &str = "trinity-verifier";

/// Repeated successes by one verifier inside this window share a history entry.
pub const DEFAULT_HISTORY_DEDUP_WINDOW_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Name recorded in verification history entries
    pub verifier_id: String,
    pub history_dedup_window_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            verifier_id: DEFAULT_VERIFIER_ID.to_string(),
            history_dedup_window_ms: DEFAULT_HISTORY_DEDUP_WINDOW_MS,
        }
    }
}

/// Result of checking a proof against a claimed disclosed field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureCheck {
    pub proof_id: String,
    /// The proof commits to exactly the claimed fields.
    pub matches: bool,
    /// `matches` and the proof itself verifies.
    pub is_valid: bool,
    pub details: String,
}

#[derive(Clone)]
pub struct ProofVerifier {
    ledger: ProofLedger,
    clock: Arc<dyn Clock>,
    config: VerifierConfig,
}

/// What one pass over the current record decided.
struct Outcome {
    next: Option<ZkProof>,
    is_valid: bool,
    details: &'static str,
}

impl ProofVerifier {
    pub fn new(ledger: ProofLedger, clock: Arc<dyn Clock>, config: VerifierConfig) -> Self {
        Self {
            ledger,
            clock,
            config,
        }
    }

    pub fn with_defaults(ledger: ProofLedger) -> Self {
        Self::new(ledger, Arc::new(SystemClock), VerifierConfig::default())
    }

    pub fn ledger(&self) -> &ProofLedger {
        &self.ledger
    }

    /// Verify proof `proof_id` and record the resulting status transition.
    pub fn verify(&self, proof_id: &str) -> Result<VerificationResult> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .ledger
                .get_proof(proof_id)?
                .ok_or_else(|| TrinityError::ProofNotFound(proof_id.to_string()))?;
            let now = self.clock.now_ms();
            let outcome = self.evaluate(&current, now)?;

            let committed = match outcome.next {
                None => true,
                Some(next) => {
                    let status = next.status;
                    let swapped = self.ledger.compare_and_set_proof(&current, next)?;
                    if swapped && status != current.status {
                        info!(
                            proof_id,
                            from = ?current.status,
                            to = ?status,
                            "proof status transition"
                        );
                    }
                    swapped
                }
            };

            if committed {
                return Ok(VerificationResult {
                    is_valid: outcome.is_valid,
                    proof_id: current.id,
                    vault_id: current.vault_id,
                    verified_at: now,
                    chain: current.chain_binding.chain,
                    details: Some(outcome.details.to_string()),
                });
            }
            debug!(proof_id, "proof CAS lost, re-reading");
        }
        Err(TrinityError::ConcurrentModification(proof_id.to_string()))
    }

    fn evaluate(&self, current: &ZkProof, now: u64) -> Result<Outcome> {
        if current.status == ProofStatus::Expired || current.is_expired(now) {
            let next = (current.status != ProofStatus::Expired).then(|| {
                let mut next = current.clone();
                next.status = ProofStatus::Expired;
                next
            });
            return Ok(Outcome {
                next,
                is_valid: false,
                details: "expired",
            });
        }

        if current.status == ProofStatus::Rejected {
            return Ok(Outcome {
                next: None,
                is_valid: false,
                details: "previously rejected",
            });
        }

        if !verify_proof_artifact(current)? {
            warn!(proof_id = %current.id, "proof artifact failed verification");
            let mut next = current.clone();
            next.status = ProofStatus::Rejected;
            return Ok(Outcome {
                next: Some(next),
                is_valid: false,
                details: "cryptographic verification failed",
            });
        }

        let recorded = current.verification_history.iter().rev().any(|entry| {
            entry.verifier == self.config.verifier_id
                && entry.result
                && now.saturating_sub(entry.timestamp) < self.config.history_dedup_window_ms
        });
        let next = if current.status == ProofStatus::Verified && recorded {
            None
        } else {
            let mut next = current.clone();
            next.status = ProofStatus::Verified;
            next.verified_at = Some(now);
            if !recorded {
                next.verification_history.push(VerificationEntry {
                    verifier: self.config.verifier_id.clone(),
                    timestamp: now,
                    result: true,
                });
            }
            Some(next)
        };
        Ok(Outcome {
            next,
            is_valid: true,
            details: "Proof verified",
        })
    }

    /// Local verification, then the chain's own verdict.
    pub async fn verify_on_chain(
        &self,
        proof_id: &str,
        adapter: &dyn ChainAdapter,
    ) -> Result<VerificationResult> {
        let mut result = self.verify(proof_id)?;
        if result.chain != adapter.chain() {
            return Err(TrinityError::rejected(
                adapter.chain(),
                format!("proof {proof_id} is bound to {}", result.chain),
            ));
        }
        if !result.is_valid {
            return Ok(result);
        }
        if adapter.verify_proof_on_chain(proof_id).await? {
            result.details = Some("Verified both locally and on-chain".to_string());
        } else {
            warn!(proof_id, chain = %adapter.chain(), "valid proof not verified on chain");
            result.is_valid = false;
            result.details = Some("Verified locally but not on-chain".to_string());
        }
        Ok(result)
    }

    /// Whether the proof commits to exactly `fields`, and still verifies.
    pub fn check_disclosure(
        &self,
        proof_id: &str,
        fields: &BTreeSet<String>,
    ) -> Result<DisclosureCheck> {
        let proof = self
            .ledger
            .get_proof(proof_id)?
            .ok_or_else(|| TrinityError::ProofNotFound(proof_id.to_string()))?;
        let matches = match &proof.public_inputs {
            PredicateInputs::ContentExistence { content_hash, .. } => {
                *content_hash == disclosure_hash(&proof.vault_id, fields)
            }
            _ => false,
        };
        if !matches {
            return Ok(DisclosureCheck {
                proof_id: proof.id,
                matches,
                is_valid: false,
                details: "disclosed field set does not match the proof's commitment".to_string(),
            });
        }
        let result = self.verify(proof_id)?;
        Ok(DisclosureCheck {
            proof_id: result.proof_id,
            matches,
            is_valid: result.is_valid,
            details: result.details.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_common::{ChainId, ManualClock, DEFAULT_VALIDITY_WINDOW_MS};
    use trinity_prover::{GeneratorConfig, PredicateParams, ProofGenerator, ProofRequest};
    use trinity_rails::{EthereumAdapter, RetryPolicy};

    struct Harness {
        clock: ManualClock,
        ledger: ProofLedger,
        generator: ProofGenerator,
        verifier: ProofVerifier,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(1_000_000);
        let ledger = ProofLedger::in_memory();
        Harness {
            generator: ProofGenerator::new(GeneratorConfig::default(), Arc::new(clock.clone())),
            verifier: ProofVerifier::new(
                ledger.clone(),
                Arc::new(clock.clone()),
                VerifierConfig::default(),
            ),
            clock,
            ledger,
        }
    }

    fn stored_proof(h: &Harness, chain: ChainId) -> ZkProof {
        let request = ProofRequest::new(
            "V1",
            PredicateParams::BalanceRange {
                min_amount: 100,
                max_amount: 500,
                token_address: None,
            },
        );
        let proof = h.generator.generate(&request, chain, Default::default()).unwrap();
        h.ledger.insert_proof(&proof).unwrap();
        proof
    }

    #[test]
    fn test_valid_before_expiry() {
        let h = harness();
        let proof = stored_proof(&h, ChainId::Ethereum);
        let result = h.verifier.verify(&proof.id).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.chain, ChainId::Ethereum);
        assert_eq!(result.vault_id, "V1");

        let stored = h.ledger.get_proof(&proof.id).unwrap().unwrap();
        assert_eq!(stored.status, ProofStatus::Verified);
        assert_eq!(stored.verified_at, Some(1_000_000));
        assert_eq!(stored.verification_history.len(), 1);
    }

    #[test]
    fn test_expired_at_boundary_and_never_revived() {
        let h = harness();
        let proof = stored_proof(&h, ChainId::Solana);
        h.clock.advance(DEFAULT_VALIDITY_WINDOW_MS);

        let result = h.verifier.verify(&proof.id).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.details.as_deref(), Some("expired"));
        assert_eq!(
            h.ledger.get_proof(&proof.id).unwrap().unwrap().status,
            ProofStatus::Expired
        );

        h.clock.set(1_000_000);
        assert!(!h.verifier.verify(&proof.id).unwrap().is_valid);
    }

    #[test]
    fn test_tampered_inputs_rejected() {
        let h = harness();
        let mut proof = h
            .generator
            .generate(
                &ProofRequest::new(
                    "V1",
                    PredicateParams::Ownership {
                        address: "0xabc".into(),
                        nonce: "1".into(),
                    },
                ),
                ChainId::Ton,
                Default::default(),
            )
            .unwrap();
        proof.public_inputs = PredicateInputs::Ownership {
            address: "0xdef".into(),
            nonce: "1".into(),
        };
        h.ledger.insert_proof(&proof).unwrap();

        let result = h.verifier.verify(&proof.id).unwrap();
        assert!(!result.is_valid);
        let stored = h.ledger.get_proof(&proof.id).unwrap().unwrap();
        assert_eq!(stored.status, ProofStatus::Rejected);
        assert!(stored.verification_history.is_empty());
        assert_eq!(
            h.verifier.verify(&proof.id).unwrap().details.as_deref(),
            Some("previously rejected")
        );
    }

    #[test]
    fn test_reverify_deduplicates_history() {
        let h = harness();
        let proof = stored_proof(&h, ChainId::Ethereum);
        h.verifier.verify(&proof.id).unwrap();
        h.clock.advance(10);
        h.verifier.verify(&proof.id).unwrap();
        let stored = h.ledger.get_proof(&proof.id).unwrap().unwrap();
        assert_eq!(stored.verification_history.len(), 1);

        h.clock.advance(DEFAULT_HISTORY_DEDUP_WINDOW_MS);
        h.verifier.verify(&proof.id).unwrap();
        let stored = h.ledger.get_proof(&proof.id).unwrap().unwrap();
        assert_eq!(stored.verification_history.len(), 2);
    }

    #[test]
    fn test_concurrent_verify_is_consistent() {
        let h = harness();
        let proof = stored_proof(&h, ChainId::Ethereum);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert!(h.verifier.verify(&proof.id).unwrap().is_valid);
                });
            }
        });
        let stored = h.ledger.get_proof(&proof.id).unwrap().unwrap();
        assert_eq!(stored.status, ProofStatus::Verified);
        assert_eq!(stored.verification_history.len(), 1);
    }

    #[test]
    fn test_missing_proof() {
        let h = harness();
        let err = h.verifier.verify("zk-missing").unwrap_err();
        assert_eq!(err.error_code(), "PROOF_NOT_FOUND");
    }

    #[test]
    fn test_disclosure_check() {
        let h = harness();
        let fields: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let proof = h
            .generator
            .selective_disclosure("V1", &fields, ChainId::Ethereum, Default::default())
            .unwrap();
        h.ledger.insert_proof(&proof).unwrap();

        let check = h.verifier.check_disclosure(&proof.id, &fields).unwrap();
        assert!(check.matches && check.is_valid);

        let mut wider = fields.clone();
        wider.insert("C".into());
        let check = h.verifier.check_disclosure(&proof.id, &wider).unwrap();
        assert!(!check.matches);
        assert!(!check.is_valid);
    }

    #[tokio::test]
    async fn test_verify_on_chain() {
        let h = harness();
        let adapter =
            EthereumAdapter::local(RetryPolicy::none(), Arc::new(h.clock.clone())).unwrap();
        let proof = stored_proof(&h, ChainId::Ethereum);
        adapter.submit_proof(&proof).await.unwrap();

        let result = h.verifier.verify_on_chain(&proof.id, &adapter).await.unwrap();
        assert!(result.is_valid);
        assert_eq!(
            result.details.as_deref(),
            Some("Verified both locally and on-chain")
        );
    }

    #[tokio::test]
    async fn test_verify_on_chain_without_submission() {
        let h = harness();
        let adapter =
            EthereumAdapter::local(RetryPolicy::none(), Arc::new(h.clock.clone())).unwrap();
        let proof = stored_proof(&h, ChainId::Ethereum);
        let result = h.verifier.verify_on_chain(&proof.id, &adapter).await.unwrap();
        assert!(!result.is_valid);
    }
}
