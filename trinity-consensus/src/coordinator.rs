//! Fan-out / fan-in of one cross-chain verification.
//!
//! Every required chain gets its own task: fetch chain params, generate a
//! chain-scoped proof, persist it, submit it, then check it locally and on
//! chain. The coordinator joins the tasks under a single deadline and
//! finalizes the verification exactly once. Tasks still running at the
//! deadline are left alone; whatever they report later is kept as an
//! audit-only late result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use trinity_common::{
    duration_ms, ChainId, ChainVerificationStatus, Clock, CrossChainVerification, IncidentKind,
    IncidentRecord, LateChainResult, Result, SecurityNotification, TrinityError,
};
use trinity_ledger::ProofLedger;
use trinity_prover::{PredicateParams, ProofGenerator, ProofRequest};
use trinity_rails::{AdapterRegistry, ChainAdapter};
use trinity_verifier::ProofVerifier;

use crate::sink::SecurityEventSink;
use crate::threshold::{decide, ThresholdPolicy};

pub const DEFAULT_CONSENSUS_DEADLINE: Duration = Duration::from_secs(30);

const TIMEOUT_DETAIL: &str = "no report before deadline";

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub threshold: ThresholdPolicy,
    /// Used when a request carries no deadline of its own
    pub default_deadline: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdPolicy::Majority,
            default_deadline: DEFAULT_CONSENSUS_DEADLINE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusRequest {
    pub vault_id: String,
    pub params: PredicateParams,
    pub required_chains: Vec<ChainId>,
    pub deadline: Option<Duration>,
}

impl ConsensusRequest {
    pub fn new(
        vault_id: impl Into<String>,
        params: PredicateParams,
        required_chains: impl IntoIterator<Item = ChainId>,
    ) -> Self {
        Self {
            vault_id: vault_id.into(),
            params,
            required_chains: required_chains.into_iter().collect(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone)]
struct ChainOutcome {
    chain: ChainId,
    status: ChainVerificationStatus,
    proof_id: Option<String>,
    tx_reference: Option<String>,
    detail: Option<String>,
    incident: Option<IncidentKind>,
    observed_at: u64,
}

enum ChainEvent {
    ProofCreated { chain: ChainId, proof_id: String },
    Finished(ChainOutcome),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-CHAIN TASK
// ═══════════════════════════════════════════════════════════════════════════════

struct ChainTask {
    chain: ChainId,
    adapter: Arc<dyn ChainAdapter>,
    generator: Arc<ProofGenerator>,
    verifier: ProofVerifier,
    ledger: ProofLedger,
    clock: Arc<dyn Clock>,
    request: ProofRequest,
    events: mpsc::UnboundedSender<ChainEvent>,
}

impl ChainTask {
    async fn run(self) {
        let outcome = self.execute().await;
        if self.events.send(ChainEvent::Finished(outcome)).is_err() {
            debug!(chain = %self.chain, "consensus collector gone, dropping chain outcome");
        }
    }

    async fn execute(&self) -> ChainOutcome {
        let predicate = self.request.predicate_type();
        let chain_params = match self
            .adapter
            .generate_chain_specific_params(&self.request.vault_id, predicate)
            .await
        {
            Ok(params) => params,
            Err(err) => return self.failed(None, err),
        };

        let proof = match self.generator.generate(&self.request, self.chain, chain_params) {
            Ok(proof) => proof,
            Err(err) => return self.failed(None, err),
        };
        if let Err(err) = self.ledger.insert_proof(&proof) {
            return self.failed(Some(proof.id), err);
        }
        // The collector may already be gone; the proof id also reaches it via
        // the final outcome.
        let _ = self.events.send(ChainEvent::ProofCreated {
            chain: self.chain,
            proof_id: proof.id.clone(),
        });

        let observed = match self.adapter.submit_and_check(&proof, self.clock.as_ref()).await {
            Ok(observed) => observed,
            Err(err) => return self.failed(Some(proof.id), err),
        };
        let local = match self.verifier.verify(&proof.id) {
            Ok(local) => local,
            Err(err) => return self.failed(Some(proof.id), err),
        };

        let (status, incident, detail) = match (local.is_valid, observed.verified) {
            (true, true) => (ChainVerificationStatus::Verified, None, None),
            (false, false) => (
                ChainVerificationStatus::Rejected,
                Some(IncidentKind::ChainRejected),
                Some(format!(
                    "proof rejected: {}",
                    local.details.unwrap_or_default()
                )),
            ),
            (local_ok, chain_ok) => (
                ChainVerificationStatus::Rejected,
                Some(IncidentKind::VerifierDisagreement),
                Some(format!(
                    "local verification {local_ok}, on-chain verification {chain_ok}"
                )),
            ),
        };
        debug!(chain = %self.chain, proof_id = %proof.id, status = status.as_str(), "chain reported");

        ChainOutcome {
            chain: self.chain,
            status,
            proof_id: Some(proof.id),
            tx_reference: Some(observed.tx_reference),
            detail,
            incident,
            observed_at: self.clock.now_ms(),
        }
    }

    fn failed(&self, proof_id: Option<String>, err: TrinityError) -> ChainOutcome {
        let (status, incident) = match err {
            TrinityError::ChainUnavailable { .. } => (
                ChainVerificationStatus::Unavailable,
                IncidentKind::ChainUnavailable,
            ),
            _ => (ChainVerificationStatus::Rejected, IncidentKind::ChainRejected),
        };
        warn!(chain = %self.chain, code = err.error_code(), error = %err, "chain contribution failed");
        ChainOutcome {
            chain: self.chain,
            status,
            proof_id,
            tx_reference: None,
            detail: Some(err.to_string()),
            incident: Some(incident),
            observed_at: self.clock.now_ms(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COORDINATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ConsensusCoordinator {
    generator: Arc<ProofGenerator>,
    verifier: ProofVerifier,
    ledger: ProofLedger,
    adapters: AdapterRegistry,
    sink: Arc<dyn SecurityEventSink>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
}

impl ConsensusCoordinator {
    pub fn new(
        generator: Arc<ProofGenerator>,
        verifier: ProofVerifier,
        ledger: ProofLedger,
        adapters: AdapterRegistry,
        sink: Arc<dyn SecurityEventSink>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            generator,
            verifier,
            ledger,
            adapters,
            sink,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run one cross-chain verification to completion.
    ///
    /// Returns once every chain has reported or the deadline has passed.
    /// A below-threshold result is a `REJECTED` verification, not an error.
    pub async fn request_consensus(
        &self,
        request: ConsensusRequest,
    ) -> Result<CrossChainVerification> {
        let chains = self.resolve_chains(&request)?;
        let threshold = self.config.threshold.required(chains.len())?;
        let deadline = request.deadline.unwrap_or(self.config.default_deadline);
        let created_at = self.clock.now_ms();
        let id = format!("ccv-{}", Uuid::new_v4());
        let chain_ids: Vec<ChainId> = chains.iter().map(|(chain, _)| *chain).collect();

        let verification = CrossChainVerification::new(
            id.clone(),
            request.vault_id.clone(),
            request.params.predicate_type(),
            chain_ids.clone(),
            threshold,
            created_at,
            created_at.saturating_add(duration_ms(deadline)),
        );
        self.ledger.insert_verification(&verification)?;
        info!(
            verification_id = %id,
            vault_id = %request.vault_id,
            predicate = %request.params.predicate_type(),
            chains = ?chain_ids,
            threshold,
            deadline_ms = duration_ms(deadline),
            "dispatching cross-chain verification"
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let proof_request = ProofRequest::new(request.vault_id.clone(), request.params.clone())
            .with_target_chains(chain_ids.iter().copied());
        for (chain, adapter) in chains {
            let task = ChainTask {
                chain,
                adapter,
                generator: self.generator.clone(),
                verifier: self.verifier.clone(),
                ledger: self.ledger.clone(),
                clock: self.clock.clone(),
                request: proof_request.clone(),
                events: tx.clone(),
            };
            tokio::spawn(task.run());
        }
        drop(tx);

        let expires = Instant::now() + deadline;
        let mut outcomes = Vec::with_capacity(chain_ids.len());
        while outcomes.len() < chain_ids.len() {
            match timeout_at(expires, rx.recv()).await {
                Ok(Some(ChainEvent::ProofCreated { chain, proof_id })) => {
                    note_proof_id(&self.ledger, &id, chain, proof_id);
                }
                Ok(Some(ChainEvent::Finished(outcome))) => {
                    self.record_outcome(&id, &outcome);
                    outcomes.push(outcome);
                }
                Ok(None) => break,
                Err(_) => {
                    debug!(verification_id = %id, "consensus deadline reached");
                    break;
                }
            }
        }

        let finalized = self.finalize(&id, &outcomes)?;
        self.report(&finalized, &outcomes).await;
        if outcomes.len() < chain_ids.len() {
            spawn_late_collector(self.ledger.clone(), self.sink.clone(), finalized.clone(), rx);
        }
        Ok(finalized)
    }

    fn resolve_chains(
        &self,
        request: &ConsensusRequest,
    ) -> Result<Vec<(ChainId, Arc<dyn ChainAdapter>)>> {
        if request.vault_id.trim().is_empty() {
            return Err(TrinityError::invalid_params("vaultId must not be empty"));
        }
        request.params.validate()?;

        let mut chains: Vec<(ChainId, Arc<dyn ChainAdapter>)> = Vec::new();
        for chain in &request.required_chains {
            if chains.iter().all(|(seen, _)| seen != chain) {
                chains.push((*chain, self.adapters.get(*chain)?));
            }
        }
        if chains.is_empty() {
            return Err(TrinityError::invalid_params("requiredChains must not be empty"));
        }
        Ok(chains)
    }

    /// Persist a chain outcome as it arrives. A failed write is repaired by
    /// [`seal`], which replays every collected outcome.
    fn record_outcome(&self, id: &str, outcome: &ChainOutcome) {
        let updated = self.ledger.update_verification(id, |verification| {
            !verification.is_finalized() && apply_outcome(verification, outcome)
        });
        if let Err(err) = updated {
            warn!(verification_id = %id, chain = %outcome.chain, error = %err, "failed to record chain outcome");
        }
    }

    fn finalize(&self, id: &str, outcomes: &[ChainOutcome]) -> Result<CrossChainVerification> {
        let now = self.clock.now_ms();
        let finalized = self.ledger.update_verification(id, |verification| {
            if verification.is_finalized() {
                return false;
            }
            seal(verification, outcomes, now);
            true
        })?;
        info!(
            verification_id = %finalized.id,
            vault_id = %finalized.vault_id,
            overall = ?finalized.overall_status,
            verified = finalized.verified_count(),
            threshold = finalized.threshold,
            "cross-chain verification finalized"
        );
        Ok(finalized)
    }

    async fn report(&self, verification: &CrossChainVerification, outcomes: &[ChainOutcome]) {
        let now = self.clock.now_ms();
        self.sink
            .notify_consensus(&SecurityNotification::from_verification(verification, now))
            .await;

        for outcome in outcomes {
            if let Some(kind) = outcome.incident {
                self.sink
                    .record_incident(&incident(
                        verification,
                        kind,
                        outcome.chain,
                        outcome.detail.clone().unwrap_or_default(),
                        outcome.observed_at,
                    ))
                    .await;
            }
        }
        for (chain, result) in &verification.per_chain_results {
            if result.status == ChainVerificationStatus::Timeout {
                self.sink
                    .record_incident(&incident(
                        verification,
                        IncidentKind::ChainTimeout,
                        *chain,
                        TIMEOUT_DETAIL.to_string(),
                        now,
                    ))
                    .await;
            }
        }
    }
}

fn incident(
    verification: &CrossChainVerification,
    kind: IncidentKind,
    chain: ChainId,
    detail: String,
    timestamp: u64,
) -> IncidentRecord {
    IncidentRecord {
        kind,
        vault_id: verification.vault_id.clone(),
        verification_id: verification.id.clone(),
        chain: Some(chain),
        detail,
        timestamp,
    }
}

/// Copy `outcome` into its chain's entry. Only a pending entry is written.
fn apply_outcome(verification: &mut CrossChainVerification, outcome: &ChainOutcome) -> bool {
    let Some(entry) = verification.per_chain_results.get_mut(&outcome.chain) else {
        return false;
    };
    if entry.status != ChainVerificationStatus::Pending {
        return false;
    }
    entry.status = outcome.status;
    entry.timestamp = outcome.observed_at;
    entry.detail = outcome.detail.clone();
    entry.tx_reference = outcome.tx_reference.clone();
    if outcome.proof_id.is_some() {
        entry.proof_id = outcome.proof_id.clone();
    }
    true
}

/// Close a verification at `now`: replay the collected outcomes, time out
/// every chain still pending and settle the overall status.
fn seal(verification: &mut CrossChainVerification, outcomes: &[ChainOutcome], now: u64) {
    for outcome in outcomes {
        apply_outcome(verification, outcome);
    }
    for result in verification.per_chain_results.values_mut() {
        if result.status == ChainVerificationStatus::Pending {
            result.status = ChainVerificationStatus::Timeout;
            result.timestamp = now;
            result.detail = Some(TIMEOUT_DETAIL.to_string());
        }
    }
    let statuses = verification.per_chain_results.values().map(|r| r.status);
    verification.overall_status = decide(verification.threshold, statuses, true);
    verification.completed_at = Some(now);
    verification.proof_id = verification.required_chains.iter().find_map(|chain| {
        verification
            .per_chain_results
            .get(chain)
            .and_then(|r| r.proof_id.clone())
    });
}

/// Set a chain's proof id if it has none yet. Allowed after finalization.
fn note_proof_id(ledger: &ProofLedger, id: &str, chain: ChainId, proof_id: String) {
    let updated = ledger.update_verification(id, |verification| {
        match verification.per_chain_results.get_mut(&chain) {
            Some(entry) if entry.proof_id.is_none() => {
                entry.proof_id = Some(proof_id.clone());
                true
            }
            _ => false,
        }
    });
    if let Err(err) = updated {
        warn!(verification_id = %id, chain = %chain, error = %err, "failed to record proof id");
    }
}

/// Record results that arrive after finalization without touching the verdict.
fn spawn_late_collector(
    ledger: ProofLedger,
    sink: Arc<dyn SecurityEventSink>,
    verification: CrossChainVerification,
    mut events: mpsc::UnboundedReceiver<ChainEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let outcome = match event {
                ChainEvent::ProofCreated { chain, proof_id } => {
                    note_proof_id(&ledger, &verification.id, chain, proof_id);
                    continue;
                }
                ChainEvent::Finished(outcome) => outcome,
            };
            if let Some(proof_id) = outcome.proof_id.clone() {
                note_proof_id(&ledger, &verification.id, outcome.chain, proof_id);
            }
            let updated = ledger.update_verification(&verification.id, |v| {
                let Some(entry) = v.per_chain_results.get_mut(&outcome.chain) else {
                    return false;
                };
                entry.late_result = Some(LateChainResult {
                    status: outcome.status,
                    tx_reference: outcome.tx_reference.clone(),
                    timestamp: outcome.observed_at,
                });
                true
            });
            if let Err(err) = updated {
                warn!(verification_id = %verification.id, error = %err, "failed to record late result");
                continue;
            }
            info!(
                verification_id = %verification.id,
                chain = %outcome.chain,
                status = outcome.status.as_str(),
                "late chain result recorded"
            );
            sink.record_incident(&incident(
                &verification,
                IncidentKind::LateResult,
                outcome.chain,
                format!("{} after finalization", outcome.status.as_str()),
                outcome.observed_at,
            ))
            .await;
        }
    });
}
