//! trinity-consensus
//!
//! Threshold consensus over per-chain proof verifications, the security
//! event sinks it reports to, and [`TrinityEngine`], the entry point the
//! HTTP service and other collaborators call.

pub mod coordinator;
pub mod engine;
pub mod sink;
pub mod threshold;

pub use coordinator::{
    ConsensusCoordinator, ConsensusRequest, CoordinatorConfig, DEFAULT_CONSENSUS_DEADLINE,
};
pub use engine::{EngineConfig, SecurityLevelOutcome, TrinityEngine};
pub use sink::{ChannelSink, FanoutSink, SecurityEvent, SecurityEventSink, TracingSink};
pub use threshold::{chains_for_security_level, decide, ThresholdPolicy};
