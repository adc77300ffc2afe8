//! The chain adapter interface and the submission logic shared by every rail.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use trinity_common::{
    ChainAdapterResult, ChainId, ChainStatus, ChainSubmissionReceipt, Clock, ParamBag,
    PredicateType, Result, TrinityError, ZkProof,
};

use crate::client::{ChainClient, LocalChainClient, OnChainSubmission};
use crate::retry::RetryPolicy;

/// One blockchain as seen by the consensus coordinator.
///
/// Implementations own their network client; nothing is shared between
/// adapters.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> ChainId;

    /// Submit a proof. Resubmitting the same proof id returns the existing
    /// record instead of creating a second one.
    async fn submit_proof(&self, proof: &ZkProof) -> Result<ChainSubmissionReceipt>;

    /// Whether the chain's verifier accepted the proof. `ChainUnavailable`
    /// is reported as an error, never as `false`.
    async fn verify_proof_on_chain(&self, proof_id: &str) -> Result<bool>;

    async fn get_proof_status_from_chain(&self, proof_id: &str) -> Result<ChainStatus>;

    /// Chain-native metadata bound into proofs targeting this chain.
    async fn generate_chain_specific_params(
        &self,
        vault_id: &str,
        predicate: PredicateType,
    ) -> Result<ParamBag>;

    /// Submit, then read back the chain's verdict.
    async fn submit_and_check(
        &self,
        proof: &ZkProof,
        clock: &dyn Clock,
    ) -> Result<ChainAdapterResult> {
        let receipt = self.submit_proof(proof).await?;
        let verified = self.verify_proof_on_chain(&proof.id).await?;
        Ok(ChainAdapterResult {
            chain: self.chain(),
            tx_reference: receipt.tx_reference,
            verified,
            observed_at: clock.now_ms(),
        })
    }
}

/// What distinguishes one chain's rail from another: its id, how it names
/// submission transactions and which native parameters it binds into proofs.
pub trait Rail: Send + Sync + 'static {
    const CHAIN: ChainId;

    fn tx_reference(proof_id: &str) -> String;

    /// `head` is the chain's current block number, slot or seqno.
    fn chain_params(head: u64) -> ParamBag;
}

/// A [`ChainAdapter`] for the chain described by `R`.
pub struct RailAdapter<R: Rail> {
    core: RailCore,
    _rail: PhantomData<R>,
}

impl<R: Rail> RailAdapter<R> {
    pub fn new(
        client: Box<dyn ChainClient>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            core: RailCore::new(R::CHAIN, client, retry, clock)?,
            _rail: PhantomData,
        })
    }

    /// Adapter over an in-process chain.
    pub fn local(retry: RetryPolicy, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(Box::new(LocalChainClient::new(R::CHAIN)), retry, clock)
    }

    pub fn tx_reference(proof_id: &str) -> String {
        R::tx_reference(proof_id)
    }
}

#[async_trait]
impl<R: Rail> ChainAdapter for RailAdapter<R> {
    fn chain(&self) -> ChainId {
        R::CHAIN
    }

    async fn submit_proof(&self, proof: &ZkProof) -> Result<ChainSubmissionReceipt> {
        self.core.submit(proof, R::tx_reference(&proof.id)).await
    }

    async fn verify_proof_on_chain(&self, proof_id: &str) -> Result<bool> {
        self.core.verify(proof_id).await
    }

    async fn get_proof_status_from_chain(&self, proof_id: &str) -> Result<ChainStatus> {
        self.core.status(proof_id).await
    }

    async fn generate_chain_specific_params(
        &self,
        _vault_id: &str,
        _predicate: PredicateType,
    ) -> Result<ParamBag> {
        let head = self.core.head().await?;
        Ok(R::chain_params(head))
    }
}

pub(crate) fn param_bag<const N: usize>(entries: [(&str, Value); N]) -> ParamBag {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Client, retry policy and clock behind one adapter.
pub(crate) struct RailCore {
    chain: ChainId,
    client: Box<dyn ChainClient>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RailCore {
    pub(crate) fn new(
        chain: ChainId,
        client: Box<dyn ChainClient>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if client.chain() != chain {
            return Err(TrinityError::invalid_params(format!(
                "{} client cannot back the {chain} adapter",
                client.chain()
            )));
        }
        Ok(Self {
            chain,
            client,
            retry,
            clock,
        })
    }

    pub(crate) async fn submit(
        &self,
        proof: &ZkProof,
        tx_reference: String,
    ) -> Result<ChainSubmissionReceipt> {
        if proof.chain() != self.chain {
            return Err(TrinityError::rejected(
                self.chain,
                format!("proof {} is bound to {}", proof.id, proof.chain()),
            ));
        }

        if let Some(existing) = self.lookup(&proof.id).await? {
            debug!(chain = %self.chain, proof_id = %proof.id, "resubmission of recorded proof");
            return Ok(self.receipt(&proof.id, existing.tx_reference, true));
        }

        let submission = OnChainSubmission {
            proof_id: proof.id.clone(),
            tx_reference,
            statement: proof.statement_digest()?,
            artifact: proof.proof_artifact.clone(),
        };
        let client = &self.client;
        let receipt = self
            .retry
            .run("submit_proof", move || client.send_proof(submission.clone()))
            .await?;

        info!(
            chain = %self.chain,
            proof_id = %proof.id,
            tx = %receipt.record.tx_reference,
            duplicate = receipt.duplicate,
            "proof submitted"
        );
        Ok(self.receipt(&proof.id, receipt.record.tx_reference, receipt.duplicate))
    }

    pub(crate) async fn verify(&self, proof_id: &str) -> Result<bool> {
        Ok(self
            .lookup(proof_id)
            .await?
            .map(|record| record.verified)
            .unwrap_or(false))
    }

    pub(crate) async fn status(&self, proof_id: &str) -> Result<ChainStatus> {
        let Some(record) = self.lookup(proof_id).await? else {
            return Ok(ChainStatus::NotFound);
        };
        if !record.verified {
            return Ok(ChainStatus::Rejected);
        }
        let head = self.head().await?;
        let confirmations = head.saturating_sub(record.included_at) + 1;
        if confirmations >= u64::from(self.chain.profile().required_confirmations) {
            Ok(ChainStatus::Verified)
        } else {
            Ok(ChainStatus::Pending)
        }
    }

    pub(crate) async fn head(&self) -> Result<u64> {
        let client = &self.client;
        self.retry.run("head", move || client.head()).await
    }

    async fn lookup(&self, proof_id: &str) -> Result<Option<crate::client::OnChainRecord>> {
        let client = &self.client;
        self.retry
            .run("lookup", move || client.lookup(proof_id))
            .await
    }

    fn receipt(&self, proof_id: &str, tx_reference: String, duplicate: bool) -> ChainSubmissionReceipt {
        ChainSubmissionReceipt {
            chain: self.chain,
            proof_id: proof_id.to_string(),
            tx_reference,
            submitted_at: self.clock.now_ms(),
            duplicate,
        }
    }
}
