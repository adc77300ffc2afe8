//! Chain network clients.
//!
//! A [`ChainClient`] is the adapter's exclusive handle on its chain. The
//! bundled [`LocalChainClient`] is an in-process chain: it keeps its own
//! record table and head, runs the on-chain verifier over each submitted
//! artifact, and can be taken offline or slowed down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use trinity_common::{duration_ms, ChainId, Result, TrinityError};

/// What an adapter sends to its chain.
#[derive(Debug, Clone)]
pub struct OnChainSubmission {
    pub proof_id: String,
    pub tx_reference: String,
    /// Statement digest the artifact must verify against.
    pub statement: [u8; 32],
    pub artifact: Vec<u8>,
}

/// A proof record as held by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainRecord {
    pub proof_id: String,
    pub tx_reference: String,
    pub verified: bool,
    /// Chain head at inclusion.
    pub included_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReceipt {
    pub record: OnChainRecord,
    /// The chain already held a record for this proof id.
    pub duplicate: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> ChainId;

    /// Include a proof record. At most one record exists per proof id.
    async fn send_proof(&self, submission: OnChainSubmission) -> Result<ClientReceipt>;

    async fn lookup(&self, proof_id: &str) -> Result<Option<OnChainRecord>>;

    /// Current block number / slot / seqno.
    async fn head(&self) -> Result<u64>;
}

#[async_trait]
impl<C: ChainClient + ?Sized> ChainClient for Arc<C> {
    fn chain(&self) -> ChainId {
        (**self).chain()
    }

    async fn send_proof(&self, submission: OnChainSubmission) -> Result<ClientReceipt> {
        (**self).send_proof(submission).await
    }

    async fn lookup(&self, proof_id: &str) -> Result<Option<OnChainRecord>> {
        (**self).lookup(proof_id).await
    }

    async fn head(&self) -> Result<u64> {
        (**self).head().await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCAL CHAIN
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct LocalChainState {
    records: HashMap<String, OnChainRecord>,
    head: u64,
}

pub struct LocalChainClient {
    chain: ChainId,
    state: Mutex<LocalChainState>,
    online: AtomicBool,
    latency_ms: AtomicU64,
}

impl LocalChainClient {
    pub fn new(chain: ChainId) -> Self {
        Self::with_head(chain, 0)
    }

    pub fn with_head(chain: ChainId, head: u64) -> Self {
        Self {
            chain,
            state: Mutex::new(LocalChainState {
                records: HashMap::new(),
                head,
            }),
            online: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(duration_ms(latency), Ordering::SeqCst);
    }

    /// Produce `blocks` empty blocks.
    pub async fn advance_head(&self, blocks: u64) {
        self.state.lock().await.head += blocks;
    }

    pub async fn record_count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    async fn round_trip(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(TrinityError::unavailable(self.chain, "node unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for LocalChainClient {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn send_proof(&self, submission: OnChainSubmission) -> Result<ClientReceipt> {
        self.round_trip().await?;
        let mut state = self.state.lock().await;

        if let Some(existing) = state.records.get(&submission.proof_id) {
            debug!(chain = %self.chain, proof_id = %submission.proof_id, "proof already on chain");
            return Ok(ClientReceipt {
                record: existing.clone(),
                duplicate: true,
            });
        }

        if !trinity_circuit::is_well_formed(&submission.artifact) {
            warn!(chain = %self.chain, proof_id = %submission.proof_id, "malformed proof artifact");
            return Err(TrinityError::rejected(self.chain, "malformed proof artifact"));
        }

        let verified = trinity_circuit::verify_bytes(&submission.statement, &submission.artifact);
        state.head += 1;
        let record = OnChainRecord {
            proof_id: submission.proof_id.clone(),
            tx_reference: submission.tx_reference,
            verified,
            included_at: state.head,
        };
        state.records.insert(submission.proof_id, record.clone());
        Ok(ClientReceipt {
            record,
            duplicate: false,
        })
    }

    async fn lookup(&self, proof_id: &str) -> Result<Option<OnChainRecord>> {
        self.round_trip().await?;
        Ok(self.state.lock().await.records.get(proof_id).cloned())
    }

    async fn head(&self) -> Result<u64> {
        self.round_trip().await?;
        Ok(self.state.lock().await.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, artifact: Vec<u8>) -> OnChainSubmission {
        OnChainSubmission {
            proof_id: id.into(),
            tx_reference: format!("tx-{id}"),
            statement: [0u8; 32],
            artifact,
        }
    }

    #[tokio::test]
    async fn test_malformed_artifact_rejected() {
        let client = LocalChainClient::new(ChainId::Ton);
        let err = client
            .send_proof(submission("zk-1", vec![1, 2, 3]))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "SUBMISSION_REJECTED");
        assert_eq!(client.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_offline_client_is_unavailable() {
        let client = LocalChainClient::new(ChainId::Solana);
        client.set_online(false);
        assert!(client.head().await.unwrap_err().is_retryable());
        client.set_online(true);
        assert_eq!(client.head().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_calls() {
        let client = LocalChainClient::with_head(ChainId::Ethereum, 42);
        client.set_latency(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        assert_eq!(client.head().await.unwrap(), 42);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
