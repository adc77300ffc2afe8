//! Verification results, cross-chain verification records and the payloads
//! sent to the security event sink.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ChainId, PredicateType};

/// Outcome of verifying a single proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_valid: bool,
    pub proof_id: String,
    pub vault_id: String,
    pub verified_at: u64,
    pub chain: ChainId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN ADAPTER RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Receipt returned by a chain adapter for a submitted proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSubmissionReceipt {
    pub chain: ChainId,
    pub proof_id: String,
    pub tx_reference: String,
    pub submitted_at: u64,
    /// The chain already held a record for this proof id.
    pub duplicate: bool,
}

/// Per-chain outcome produced by the adapter that observed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAdapterResult {
    pub chain: ChainId,
    pub tx_reference: String,
    pub verified: bool,
    pub observed_at: u64,
}

/// Coarse on-chain proof status, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainStatus {
    NotFound,
    Pending,
    Verified,
    Rejected,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::NotFound => "NOT_FOUND",
            ChainStatus::Pending => "PENDING",
            ChainStatus::Verified => "VERIFIED",
            ChainStatus::Rejected => "REJECTED",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CROSS-CHAIN VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusStatus {
    Pending,
    Verified,
    Rejected,
}

/// Status of one chain's contribution to a cross-chain verification.
///
/// `Timeout` (no report before the deadline) and `Unavailable` (chain
/// unreachable after retries) both count as not verified but are kept apart
/// from `Rejected` (the proof was judged invalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainVerificationStatus {
    Pending,
    Verified,
    Rejected,
    Timeout,
    Unavailable,
}

impl ChainVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainVerificationStatus::Pending => "pending",
            ChainVerificationStatus::Verified => "verified",
            ChainVerificationStatus::Rejected => "rejected",
            ChainVerificationStatus::Timeout => "timeout",
            ChainVerificationStatus::Unavailable => "unavailable",
        }
    }

    pub fn has_reported(&self) -> bool {
        !matches!(
            self,
            ChainVerificationStatus::Pending | ChainVerificationStatus::Timeout
        )
    }
}

/// A result that arrived after its verification was finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LateChainResult {
    pub status: ChainVerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_reference: Option<String>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerChainResult {
    pub status: ChainVerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_reference: Option<String>,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Audit-only; never feeds back into `overall_status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_result: Option<LateChainResult>,
}

impl PerChainResult {
    pub fn pending(timestamp: u64) -> Self {
        Self {
            status: ChainVerificationStatus::Pending,
            proof_id: None,
            tx_reference: None,
            timestamp,
            detail: None,
            late_result: None,
        }
    }
}

/// One logical cross-chain check of a vault predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainVerification {
    pub id: String,
    /// Proof of the first required chain that produced one; every chain's
    /// own proof id is in its [`PerChainResult`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<String>,
    pub vault_id: String,
    pub predicate_type: PredicateType,
    pub required_chains: Vec<ChainId>,
    pub threshold: usize,
    pub per_chain_results: BTreeMap<ChainId, PerChainResult>,
    pub overall_status: ConsensusStatus,
    pub created_at: u64,
    pub deadline_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default)]
    pub version: u64,
}

impl CrossChainVerification {
    pub fn new(
        id: String,
        vault_id: String,
        predicate_type: PredicateType,
        required_chains: Vec<ChainId>,
        threshold: usize,
        created_at: u64,
        deadline_at: u64,
    ) -> Self {
        let per_chain_results = required_chains
            .iter()
            .map(|chain| (*chain, PerChainResult::pending(created_at)))
            .collect();
        Self {
            id,
            proof_id: None,
            vault_id,
            predicate_type,
            required_chains,
            threshold,
            per_chain_results,
            overall_status: ConsensusStatus::Pending,
            created_at,
            deadline_at,
            completed_at: None,
            version: 0,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.overall_status != ConsensusStatus::Pending
    }

    pub fn verified_count(&self) -> usize {
        self.per_chain_results
            .values()
            .filter(|r| r.status == ChainVerificationStatus::Verified)
            .count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECURITY EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatusSummary {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Consensus outcome consumed by the dashboard / alerting collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityNotification {
    pub verification_id: String,
    pub vault_id: String,
    pub verified: bool,
    pub per_chain_status: BTreeMap<ChainId, ChainStatusSummary>,
    pub overall_status: ConsensusStatus,
    pub timestamp: u64,
}

impl SecurityNotification {
    pub fn from_verification(verification: &CrossChainVerification, timestamp: u64) -> Self {
        let per_chain_status = verification
            .per_chain_results
            .iter()
            .map(|(chain, result)| {
                let reported = result.status.has_reported();
                (
                    *chain,
                    ChainStatusSummary {
                        verified: result.status == ChainVerificationStatus::Verified,
                        timestamp: reported.then_some(result.timestamp),
                    },
                )
            })
            .collect();
        Self {
            verification_id: verification.id.clone(),
            vault_id: verification.vault_id.clone(),
            verified: verification.overall_status == ConsensusStatus::Verified,
            per_chain_status,
            overall_status: verification.overall_status,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentKind {
    ChainUnavailable,
    ChainRejected,
    /// Local verification and the chain's own verifier disagreed.
    VerifierDisagreement,
    ChainTimeout,
    LateResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub kind: IncidentKind,
    pub vault_id: String,
    pub verification_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainId>,
    pub detail: String,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verification() -> CrossChainVerification {
        CrossChainVerification::new(
            "ccv-1".into(),
            "V1".into(),
            PredicateType::Ownership,
            ChainId::ALL.to_vec(),
            2,
            100,
            2_100,
        )
    }

    #[test]
    fn test_new_verification_is_pending_for_every_chain() {
        let v = verification();
        assert_eq!(v.overall_status, ConsensusStatus::Pending);
        assert_eq!(v.per_chain_results.len(), 3);
        assert!(v
            .per_chain_results
            .values()
            .all(|r| r.status == ChainVerificationStatus::Pending));
        assert!(!v.is_finalized());
    }

    #[test]
    fn test_notification_keeps_per_chain_breakdown() {
        let mut v = verification();
        v.overall_status = ConsensusStatus::Verified;
        if let Some(eth) = v.per_chain_results.get_mut(&ChainId::Ethereum) {
            eth.status = ChainVerificationStatus::Verified;
            eth.timestamp = 400;
        }
        if let Some(sol) = v.per_chain_results.get_mut(&ChainId::Solana) {
            sol.status = ChainVerificationStatus::Timeout;
        }

        let n = SecurityNotification::from_verification(&v, 2_200);
        assert!(n.verified);
        assert_eq!(n.per_chain_status.len(), 3);
        assert_eq!(
            n.per_chain_status[&ChainId::Ethereum],
            ChainStatusSummary {
                verified: true,
                timestamp: Some(400)
            }
        );
        assert!(!n.per_chain_status[&ChainId::Solana].verified);
        assert_eq!(n.per_chain_status[&ChainId::Solana].timestamp, None);

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["overallStatus"], "VERIFIED");
        assert_eq!(json["perChainStatus"]["ETH"]["verified"], true);
    }

    #[test]
    fn test_chain_status_strings() {
        let json = serde_json::to_string(&ChainVerificationStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
        assert_eq!(ChainStatus::NotFound.as_str(), "NOT_FOUND");
    }
}
