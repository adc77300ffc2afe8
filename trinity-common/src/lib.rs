//! trinity-common
//!
//! Data model shared by every crate of the Trinity verification engine:
//! predicate kinds, the secret-free public-input projection, proof records,
//! cross-chain verification records, security notifications and the error
//! taxonomy.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod chains;
pub mod clock;
pub mod dto;
pub mod error;
pub mod verification;

pub use chains::{ChainId, ChainProfile};
pub use clock::{duration_ms, Clock, ManualClock, SystemClock};
pub use error::{Result, TrinityError};
pub use verification::*;

/// Default proof validity window (1 hour).
pub const DEFAULT_VALIDITY_WINDOW_MS: u64 = 3_600_000;

/// Chain-native metadata (contract address, network id, nonce/slot/seqno).
pub type ParamBag = BTreeMap<String, serde_json::Value>;

const STATEMENT_DOMAIN: &[u8] = b"trinity.statement.v1";
const PROOF_ID_DOMAIN: &[u8] = b"trinity.proof-id.v1";
const DISCLOSURE_DOMAIN: &[u8] = b"trinity.disclosure.v1";
const AUDIT_DOMAIN: &[u8] = b"trinity.audit.v1";

// ═══════════════════════════════════════════════════════════════════════════════
// PREDICATES
// ═══════════════════════════════════════════════════════════════════════════════

/// The property a proof attests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateType {
    Ownership,
    ContentExistence,
    TimeCondition,
    BalanceRange,
    AccessRights,
    MultiParty,
    /// Recognised but carries no parameter schema; generation rejects it.
    Identity,
}

impl PredicateType {
    pub const ALL: [PredicateType; 7] = [
        PredicateType::Ownership,
        PredicateType::ContentExistence,
        PredicateType::TimeCondition,
        PredicateType::BalanceRange,
        PredicateType::AccessRights,
        PredicateType::MultiParty,
        PredicateType::Identity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateType::Ownership => "OWNERSHIP",
            PredicateType::ContentExistence => "CONTENT_EXISTENCE",
            PredicateType::TimeCondition => "TIME_CONDITION",
            PredicateType::BalanceRange => "BALANCE_RANGE",
            PredicateType::AccessRights => "ACCESS_RIGHTS",
            PredicateType::MultiParty => "MULTI_PARTY",
            PredicateType::Identity => "IDENTITY",
        }
    }

    /// Keys a proof of this kind may expose in its public inputs.
    ///
    /// This is the selective-disclosure whitelist: [`PredicateInputs`]
    /// serializes to exactly these keys plus the `predicate` tag.
    pub fn public_input_keys(&self) -> &'static [&'static str] {
        match self {
            PredicateType::Ownership => &["address", "nonce"],
            PredicateType::ContentExistence => &["contentHash", "timestamp"],
            PredicateType::TimeCondition => &["condition", "hasTimeWindow"],
            PredicateType::BalanceRange => &["tokenAddress", "hasRangeConstraint"],
            PredicateType::AccessRights => &["resourceId", "hasAccessCheck"],
            PredicateType::MultiParty => &["participantCount", "threshold", "operation"],
            PredicateType::Identity => &[],
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredicateType {
    type Err = TrinityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        PredicateType::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| TrinityError::invalid_params(format!("unknown predicate type {s}")))
    }
}

/// Which side of the hidden window a time condition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeConditionKind {
    Before,
    After,
    Between,
}

impl FromStr for TimeConditionKind {
    type Err = TrinityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(TimeConditionKind::Before),
            "after" => Ok(TimeConditionKind::After),
            "between" => Ok(TimeConditionKind::Between),
            other => Err(TrinityError::invalid_params(format!(
                "unknown time condition {other}"
            ))),
        }
    }
}

/// Secret-free projection of a predicate's parameters.
///
/// Variants carry only whitelisted fields; there is no way to place a
/// private bound or identity into a proof's public inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateInputs {
    #[serde(rename_all = "camelCase")]
    Ownership { address: String, nonce: String },
    #[serde(rename_all = "camelCase")]
    ContentExistence { content_hash: String, timestamp: u64 },
    #[serde(rename_all = "camelCase")]
    TimeCondition {
        condition: TimeConditionKind,
        has_time_window: bool,
    },
    #[serde(rename_all = "camelCase")]
    BalanceRange {
        token_address: String,
        has_range_constraint: bool,
    },
    #[serde(rename_all = "camelCase")]
    AccessRights {
        resource_id: String,
        has_access_check: bool,
    },
    #[serde(rename_all = "camelCase")]
    MultiParty {
        participant_count: u32,
        threshold: u32,
        operation: String,
    },
}

impl PredicateInputs {
    pub fn predicate_type(&self) -> PredicateType {
        match self {
            PredicateInputs::Ownership { .. } => PredicateType::Ownership,
            PredicateInputs::ContentExistence { .. } => PredicateType::ContentExistence,
            PredicateInputs::TimeCondition { .. } => PredicateType::TimeCondition,
            PredicateInputs::BalanceRange { .. } => PredicateType::BalanceRange,
            PredicateInputs::AccessRights { .. } => PredicateType::AccessRights,
            PredicateInputs::MultiParty { .. } => PredicateType::MultiParty,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROOFS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
}

/// Chain a proof is scoped to, with the chain-native params bound into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainBinding {
    pub chain: ChainId,
    #[serde(default)]
    pub params: ParamBag,
}

impl ChainBinding {
    pub fn new(chain: ChainId, params: ParamBag) -> Self {
        Self { chain, params }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEntry {
    pub verifier: String,
    pub timestamp: u64,
    pub result: bool,
}

/// A generated predicate proof as stored in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProof {
    pub id: String,
    pub vault_id: String,
    pub predicate_type: PredicateType,
    pub public_inputs: PredicateInputs,
    pub chain_binding: ChainBinding,
    /// Opaque proof artifact (see `trinity-circuit`).
    #[serde(with = "hex_bytes")]
    pub proof_artifact: Vec<u8>,
    pub created_at: u64,
    pub expires_at: u64,
    pub status: ProofStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<u64>,
    #[serde(default)]
    pub verification_history: Vec<VerificationEntry>,
    /// Optimistic-lock counter, bumped by every ledger transition.
    #[serde(default)]
    pub version: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofStatement<'a> {
    id: &'a str,
    vault_id: &'a str,
    predicate_type: PredicateType,
    public_inputs: &'a PredicateInputs,
    chain_binding: &'a ChainBinding,
    created_at: u64,
    expires_at: u64,
}

impl ZkProof {
    pub fn chain(&self) -> ChainId {
        self.chain_binding.chain
    }

    /// Expired once `now` reaches `expires_at`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Digest of everything the proof artifact is bound to.
    ///
    /// Status, history and the artifact itself are excluded so the digest
    /// is stable across ledger transitions.
    pub fn statement_digest(&self) -> Result<[u8; 32]> {
        let statement = ProofStatement {
            id: &self.id,
            vault_id: &self.vault_id,
            predicate_type: self.predicate_type,
            public_inputs: &self.public_inputs,
            chain_binding: &self.chain_binding,
            created_at: self.created_at,
            expires_at: self.expires_at,
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(STATEMENT_DOMAIN);
        serde_json::to_writer(&mut hasher, &statement)?;
        Ok(hasher.finalize().into())
    }
}

/// Derive a proof id from vault, predicate, creation time and chain.
///
/// `sequence` disambiguates proofs created by one generator within the same
/// millisecond.
pub fn derive_proof_id(
    vault_id: &str,
    predicate_type: PredicateType,
    created_at: u64,
    chain: ChainId,
    sequence: u64,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(PROOF_ID_DOMAIN);
    hasher.update(&(vault_id.len() as u64).to_be_bytes());
    hasher.update(vault_id.as_bytes());
    hasher.update(predicate_type.as_str().as_bytes());
    hasher.update(&created_at.to_be_bytes());
    hasher.update(chain.as_str().as_bytes());
    hasher.update(&sequence.to_be_bytes());
    let digest = hasher.finalize();
    format!("zk-{}", hex::encode(&digest.as_bytes()[..16]))
}

fn field_set_hash(domain: &[u8], vault_id: &str, fields: &BTreeSet<String>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&(vault_id.len() as u64).to_be_bytes());
    hasher.update(vault_id.as_bytes());
    hasher.update(&(fields.len() as u64).to_be_bytes());
    for field in fields {
        hasher.update(&(field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    format!("0x{}", hasher.finalize().to_hex())
}

/// Content hash binding exactly `fields` of `vault_id` for selective disclosure.
pub fn disclosure_hash(vault_id: &str, fields: &BTreeSet<String>) -> String {
    field_set_hash(DISCLOSURE_DOMAIN, vault_id, fields)
}

/// Content hash binding the audited property set of `vault_id`.
pub fn audit_hash(vault_id: &str, properties: &BTreeSet<String>) -> String {
    field_set_hash(AUDIT_DOMAIN, vault_id, properties)
}

/// Hex (de)serialization for byte blobs.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proof() -> ZkProof {
        ZkProof {
            id: "zk-test".into(),
            vault_id: "V1".into(),
            predicate_type: PredicateType::Ownership,
            public_inputs: PredicateInputs::Ownership {
                address: "0xabc".into(),
                nonce: "7".into(),
            },
            chain_binding: ChainBinding::new(ChainId::Ethereum, ParamBag::new()),
            proof_artifact: vec![1, 2, 3],
            created_at: 1_700_000_000_000,
            expires_at: 1_700_000_000_000 + DEFAULT_VALIDITY_WINDOW_MS,
            status: ProofStatus::Pending,
            verified_at: None,
            verification_history: vec![],
            version: 0,
        }
    }

    #[test]
    fn test_predicate_roundtrip_names() {
        for predicate in PredicateType::ALL {
            let json = serde_json::to_string(&predicate).unwrap();
            assert_eq!(json, format!("\"{}\"", predicate.as_str()));
            assert_eq!(predicate.as_str().parse::<PredicateType>().unwrap(), predicate);
        }
        assert_eq!(
            "multi-party".parse::<PredicateType>().unwrap(),
            PredicateType::MultiParty
        );
    }

    #[test]
    fn test_public_inputs_keys_match_whitelist() {
        let inputs = PredicateInputs::BalanceRange {
            token_address: "native".into(),
            has_range_constraint: true,
        };
        let value = serde_json::to_value(&inputs).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.retain(|k| k != "predicate");
        keys.sort();
        let mut expected: Vec<_> = PredicateType::BalanceRange
            .public_input_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(value["predicate"], "BALANCE_RANGE");
    }

    #[test]
    fn test_expiry_boundary() {
        let proof = sample_proof();
        assert!(!proof.is_expired(proof.expires_at - 1));
        assert!(proof.is_expired(proof.expires_at));
    }

    #[test]
    fn test_statement_digest_ignores_status() {
        let proof = sample_proof();
        let mut verified = proof.clone();
        verified.status = ProofStatus::Verified;
        verified.version = 3;
        assert_eq!(
            proof.statement_digest().unwrap(),
            verified.statement_digest().unwrap()
        );

        let mut tampered = proof.clone();
        tampered.public_inputs = PredicateInputs::Ownership {
            address: "0xdef".into(),
            nonce: "7".into(),
        };
        assert_ne!(
            proof.statement_digest().unwrap(),
            tampered.statement_digest().unwrap()
        );
    }

    #[test]
    fn test_proof_id_is_deterministic() {
        let a = derive_proof_id("V1", PredicateType::Ownership, 10, ChainId::Ethereum, 0);
        let b = derive_proof_id("V1", PredicateType::Ownership, 10, ChainId::Ethereum, 0);
        let c = derive_proof_id("V1", PredicateType::Ownership, 10, ChainId::Solana, 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("zk-"));
        assert_eq!(a.len(), 3 + 32);
    }

    #[test]
    fn test_disclosure_hash_binds_field_set() {
        let ab: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let abc: BTreeSet<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(disclosure_hash("V1", &ab), disclosure_hash("V1", &ab.clone()));
        assert_ne!(disclosure_hash("V1", &ab), disclosure_hash("V1", &abc));
        assert_ne!(disclosure_hash("V1", &ab), audit_hash("V1", &ab));
    }

    #[test]
    fn test_proof_json_uses_hex_artifact() {
        let proof = sample_proof();
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["proofArtifact"], "010203");
        let back: ZkProof = serde_json::from_value(value).unwrap();
        assert_eq!(back.proof_artifact, vec![1, 2, 3]);
    }

    mod props {
        use super::*;
        use proptest::collection::{btree_set, vec};
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_proof_json_preserves_statement(
                vault_id in "[A-Za-z0-9-]{1,24}",
                address in "0x[0-9a-f]{1,40}",
                nonce in "[0-9]{1,12}",
                artifact in vec(any::<u8>(), 0..160),
            ) {
                let mut proof = sample_proof();
                proof.vault_id = vault_id;
                proof.public_inputs = PredicateInputs::Ownership { address, nonce };
                proof.proof_artifact = artifact;

                let json = serde_json::to_string(&proof).unwrap();
                let back: ZkProof = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(&back.proof_artifact, &proof.proof_artifact);
                prop_assert_eq!(&back.public_inputs, &proof.public_inputs);
                prop_assert_eq!(back.statement_digest().unwrap(), proof.statement_digest().unwrap());
            }

            #[test]
            fn test_distinct_field_sets_hash_apart(
                a in btree_set("[a-c]{1,3}", 1..4),
                b in btree_set("[a-c]{1,3}", 1..4),
            ) {
                prop_assume!(a != b);
                prop_assert_ne!(disclosure_hash("V1", &a), disclosure_hash("V1", &b));
            }
        }
    }
}
