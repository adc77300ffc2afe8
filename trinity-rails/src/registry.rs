//! Lookup table from chain id to adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use trinity_common::{ChainId, Clock, Result, TrinityError};

use crate::adapter::ChainAdapter;
use crate::retry::RetryPolicy;
use crate::{EthereumAdapter, SolanaAdapter, TonAdapter};

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of in-process adapters for `chains`.
    pub fn local(
        chains: &[ChainId],
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for chain in chains {
            let adapter: Arc<dyn ChainAdapter> = match chain {
                ChainId::Ethereum => Arc::new(EthereumAdapter::local(retry.clone(), clock.clone())?),
                ChainId::Solana => Arc::new(SolanaAdapter::local(retry.clone(), clock.clone())?),
                ChainId::Ton => Arc::new(TonAdapter::local(retry.clone(), clock.clone())?),
            };
            registry.register(adapter);
        }
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same chain.
    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.insert(adapter.chain(), adapter)
    }

    pub fn with(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, chain: ChainId) -> Result<Arc<dyn ChainAdapter>> {
        self.adapters
            .get(&chain)
            .cloned()
            .ok_or_else(|| TrinityError::UnknownChain(format!("no adapter registered for {chain}")))
    }

    pub fn contains(&self, chain: ChainId) -> bool {
        self.adapters.contains_key(&chain)
    }

    pub fn chains(&self) -> Vec<ChainId> {
        self.adapters.keys().copied().collect()
    }
}
