//! trinity-rails
//!
//! Chain adapters for Ethereum, Solana and TON. Each adapter submits proof
//! artifacts to its chain, reads back the on-chain verdict and reports the
//! chain-native parameters proofs are bound to.

pub mod adapter;
pub mod client;
pub mod ethereum;
pub mod registry;
pub mod retry;
pub mod solana;
pub mod ton;

pub use adapter::{ChainAdapter, Rail, RailAdapter};
pub use client::{ChainClient, ClientReceipt, LocalChainClient, OnChainRecord, OnChainSubmission};
pub use ethereum::EthereumAdapter;
pub use registry::AdapterRegistry;
pub use retry::RetryPolicy;
pub use solana::SolanaAdapter;
pub use ton::TonAdapter;
