//! Shared fixtures for Trinity tests.
//!
//! [`ScriptedAdapter`] wraps a local chain adapter and makes it slow, down,
//! hostile or silent on demand, which is all the consensus scenarios need.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use trinity_common::{
    duration_ms, ChainId, ChainStatus, ChainSubmissionReceipt, Clock, ParamBag, PredicateType,
    Result, TrinityError, ZkProof,
};
use trinity_prover::PredicateParams;
use trinity_rails::{
    AdapterRegistry, ChainAdapter, EthereumAdapter, RetryPolicy, SolanaAdapter, TonAdapter,
};

pub const VAULT_ID: &str = "V1";

/// How a scripted chain answers a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Behave like a healthy chain.
    Verify,
    /// Record the proof but report it as not verified on chain.
    RejectOnChain,
    /// Fail with `ChainUnavailable`.
    Unavailable,
    /// Fail with `SubmissionRejected`.
    SubmissionRejected,
    /// Never answer.
    Hang,
}

pub struct ScriptedAdapter {
    script: Script,
    delay: Duration,
    inner: Arc<dyn ChainAdapter>,
    submissions: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(chain: ChainId, script: Script, clock: Arc<dyn Clock>) -> Result<Self> {
        let retry = RetryPolicy::none();
        let inner: Arc<dyn ChainAdapter> = match chain {
            ChainId::Ethereum => Arc::new(EthereumAdapter::local(retry, clock)?),
            ChainId::Solana => Arc::new(SolanaAdapter::local(retry, clock)?),
            ChainId::Ton => Arc::new(TonAdapter::local(retry, clock)?),
        };
        Ok(Self {
            script,
            delay: Duration::ZERO,
            inner,
            submissions: AtomicUsize::new(0),
        })
    }

    /// Delay every submission by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainAdapter for ScriptedAdapter {
    fn chain(&self) -> ChainId {
        self.inner.chain()
    }

    async fn submit_proof(&self, proof: &ZkProof) -> Result<ChainSubmissionReceipt> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.script {
            Script::Verify | Script::RejectOnChain => self.inner.submit_proof(proof).await,
            Script::Unavailable => Err(TrinityError::unavailable(self.chain(), "scripted outage")),
            Script::SubmissionRejected => {
                Err(TrinityError::rejected(self.chain(), "scripted rejection"))
            }
            Script::Hang => std::future::pending().await,
        }
    }

    async fn verify_proof_on_chain(&self, proof_id: &str) -> Result<bool> {
        match self.script {
            Script::RejectOnChain => Ok(false),
            _ => self.inner.verify_proof_on_chain(proof_id).await,
        }
    }

    async fn get_proof_status_from_chain(&self, proof_id: &str) -> Result<ChainStatus> {
        let status = self.inner.get_proof_status_from_chain(proof_id).await?;
        match (self.script, status) {
            (Script::RejectOnChain, ChainStatus::Pending | ChainStatus::Verified) => {
                Ok(ChainStatus::Rejected)
            }
            _ => Ok(status),
        }
    }

    async fn generate_chain_specific_params(
        &self,
        vault_id: &str,
        predicate: PredicateType,
    ) -> Result<ParamBag> {
        self.inner
            .generate_chain_specific_params(vault_id, predicate)
            .await
    }
}

/// Registry of scripted adapters, one per `(chain, script, delay)`.
///
/// The adapters are also returned so tests can inspect them.
pub fn scripted_registry(
    chains: &[(ChainId, Script, Duration)],
    clock: Arc<dyn Clock>,
) -> Result<(AdapterRegistry, Vec<Arc<ScriptedAdapter>>)> {
    let mut registry = AdapterRegistry::new();
    let mut adapters = Vec::with_capacity(chains.len());
    for (chain, script, delay) in chains {
        let adapter = Arc::new(ScriptedAdapter::new(*chain, *script, clock.clone())?.with_delay(*delay));
        registry.register(adapter.clone());
        adapters.push(adapter);
    }
    Ok((registry, adapters))
}

/// Wall clock that follows tokio's (possibly paused) time.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base_ms: u64,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base_ms: u64) -> Self {
        Self {
            base_ms,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.base_ms + duration_ms(self.start.elapsed())
    }
}

pub fn ownership_params() -> PredicateParams {
    PredicateParams::Ownership {
        address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into(),
        nonce: "42".into(),
    }
}

pub fn ownership_bag() -> ParamBag {
    ParamBag::from([
        ("address".to_string(), json!("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")),
        ("nonce".to_string(), json!("42")),
    ])
}

pub fn balance_range_params(min: u128, max: u128) -> PredicateParams {
    PredicateParams::BalanceRange {
        min_amount: min,
        max_amount: max,
        token_address: None,
    }
}
