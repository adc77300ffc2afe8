//! Service configuration from `TRINITY_*` environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use trinity_common::{duration_ms, ChainId};
use trinity_consensus::{EngineConfig, ThresholdPolicy, DEFAULT_CONSENSUS_DEADLINE};
use trinity_ledger::ProofLedger;
use trinity_rails::RetryPolicy;

#[derive(Debug, Clone)]
pub struct TrinityConfig {
    pub bind_addr: SocketAddr,
    /// sled directory; in-memory ledger when unset
    pub ledger_path: Option<PathBuf>,
    pub proof_validity: Duration,
    /// Used when a consensus request omits `deadlineMs`
    pub consensus_deadline: Duration,
    pub threshold: ThresholdPolicy,
    pub adapter_max_retries: u32,
    pub adapter_retry_base: Duration,
    /// Chains that get an adapter at startup
    pub chains: Vec<ChainId>,
}

impl Default for TrinityConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ledger_path: None,
            proof_validity: Duration::from_secs(3_600),
            consensus_deadline: DEFAULT_CONSENSUS_DEADLINE,
            threshold: ThresholdPolicy::Majority,
            adapter_max_retries: 2,
            adapter_retry_base: Duration::from_millis(100),
            chains: ChainId::ALL.to_vec(),
        }
    }
}

impl TrinityConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(addr) = var("TRINITY_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("TRINITY_BIND_ADDR is not a socket address: {addr}"))?;
        }
        config.ledger_path = var("TRINITY_LEDGER_PATH").map(PathBuf::from);
        if let Some(secs) = var("TRINITY_PROOF_VALIDITY_SECS") {
            let secs: u64 = secs
                .parse()
                .context("TRINITY_PROOF_VALIDITY_SECS must be an integer")?;
            config.proof_validity = Duration::from_secs(secs);
        }
        if let Some(ms) = var("TRINITY_CONSENSUS_DEADLINE_MS") {
            let ms: u64 = ms
                .parse()
                .context("TRINITY_CONSENSUS_DEADLINE_MS must be an integer")?;
            config.consensus_deadline = Duration::from_millis(ms);
        }
        if let Some(threshold) = var("TRINITY_THRESHOLD") {
            config.threshold = threshold
                .parse()
                .with_context(|| format!("invalid TRINITY_THRESHOLD {threshold}"))?;
        }
        if let Some(retries) = var("TRINITY_ADAPTER_MAX_RETRIES") {
            config.adapter_max_retries = retries
                .parse()
                .context("TRINITY_ADAPTER_MAX_RETRIES must be an integer")?;
        }
        if let Some(ms) = var("TRINITY_ADAPTER_RETRY_BASE_MS") {
            let ms: u64 = ms
                .parse()
                .context("TRINITY_ADAPTER_RETRY_BASE_MS must be an integer")?;
            config.adapter_retry_base = Duration::from_millis(ms);
        }
        if let Some(chains) = var("TRINITY_CHAINS") {
            config.chains = parse_chains(&chains)?;
        }
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default();
        engine.generator.validity_window_ms = duration_ms(self.proof_validity);
        engine.coordinator.threshold = self.threshold;
        engine.coordinator.default_deadline = self.consensus_deadline;
        engine
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.adapter_max_retries)
            .with_initial_delay(self.adapter_retry_base)
    }

    pub fn open_ledger(&self) -> Result<ProofLedger> {
        match &self.ledger_path {
            Some(path) => ProofLedger::persistent(path)
                .with_context(|| format!("failed to open ledger at {}", path.display())),
            None => Ok(ProofLedger::in_memory()),
        }
    }
}

fn parse_chains(raw: &str) -> Result<Vec<ChainId>> {
    let mut chains = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let chain: ChainId = part
            .parse()
            .with_context(|| format!("invalid chain in TRINITY_CHAINS: {part}"))?;
        if !chains.contains(&chain) {
            chains.push(chain);
        }
    }
    anyhow::ensure!(!chains.is_empty(), "TRINITY_CHAINS names no chains");
    Ok(chains)
}
