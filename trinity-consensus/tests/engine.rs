use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;

use trinity_common::{ChainId, ConsensusStatus, ManualClock, ParamBag, PredicateType, ProofStatus};
use trinity_consensus::{EngineConfig, TracingSink, TrinityEngine};
use trinity_ledger::ProofLedger;
use trinity_rails::{AdapterRegistry, RetryPolicy};
use trinity_test_fixtures::{ownership_bag, VAULT_ID};

fn engine() -> (TrinityEngine, ManualClock) {
    let clock = ManualClock::new(1_700_000_000_000);
    let adapters =
        AdapterRegistry::local(&ChainId::ALL, RetryPolicy::none(), Arc::new(clock.clone())).unwrap();
    let engine = TrinityEngine::new(
        EngineConfig::default(),
        ProofLedger::in_memory(),
        adapters,
        Arc::new(TracingSink),
        Arc::new(clock.clone()),
    );
    (engine, clock)
}

fn fields(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_generate_then_verify() {
    let (engine, _) = engine();
    let dto = engine
        .generate_proof(VAULT_ID, PredicateType::Ownership, ChainId::Ethereum, &ownership_bag())
        .await
        .unwrap();
    assert_eq!(dto.status, ProofStatus::Pending);
    assert_eq!(dto.expires_at - dto.created_at, 3_600_000);

    let result = engine.verify_proof(&dto.id).unwrap();
    assert!(result.is_valid);
    assert_eq!(engine.get_proof(&dto.id).unwrap().status, ProofStatus::Verified);
    assert_eq!(engine.proofs_for_vault(VAULT_ID).unwrap().len(), 1);
}

#[tokio::test]
async fn test_generated_proof_is_not_submitted() {
    let (engine, _) = engine();
    let dto = engine
        .generate_proof(VAULT_ID, PredicateType::Ownership, ChainId::Ton, &ownership_bag())
        .await
        .unwrap();
    let result = engine.verify_proof_on_chain(&dto.id).await.unwrap();
    assert!(!result.is_valid);
}

#[tokio::test]
async fn test_expired_proof_reports_expired() {
    let (engine, clock) = engine();
    let dto = engine
        .generate_proof(VAULT_ID, PredicateType::Ownership, ChainId::Solana, &ownership_bag())
        .await
        .unwrap();
    clock.set(dto.expires_at);
    let result = engine.verify_proof(&dto.id).unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.details.as_deref(), Some("expired"));
    assert_eq!(engine.get_proof(&dto.id).unwrap().status, ProofStatus::Expired);
}

#[tokio::test]
async fn test_range_proof_never_exposes_bounds() {
    let (engine, _) = engine();
    let dto = engine
        .range_proof(VAULT_ID, 123_456_789, 987_654_321, ChainId::Ethereum)
        .await
        .unwrap();
    let json = serde_json::to_string(&dto).unwrap();
    assert!(!json.contains("123456789"));
    assert!(!json.contains("987654321"));
    assert!(json.contains("hasRangeConstraint"));
}

#[tokio::test]
async fn test_selective_disclosure_round_trip() {
    let (engine, _) = engine();
    let dto = engine
        .selective_disclosure(VAULT_ID, &fields(&["A", "B"]), ChainId::Ethereum)
        .await
        .unwrap();
    assert_eq!(dto.predicate_type, PredicateType::ContentExistence);

    assert!(engine.check_disclosure(&dto.id, &fields(&["A", "B"])).unwrap().is_valid);
    let wider = engine
        .check_disclosure(&dto.id, &fields(&["A", "B", "C"]))
        .unwrap();
    assert!(!wider.matches);
    assert!(!wider.is_valid);
}

#[tokio::test]
async fn test_identity_cannot_be_generated() {
    let (engine, _) = engine();
    let err = engine
        .generate_proof(VAULT_ID, PredicateType::Identity, ChainId::Ethereum, &ParamBag::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PREDICATE_PARAMS");
}

#[tokio::test]
async fn test_consensus_over_local_chains() {
    let (engine, _) = engine();
    let dto = engine
        .request_cross_chain_consensus(
            VAULT_ID,
            PredicateType::Ownership,
            &ChainId::ALL,
            Some(5_000),
            &ownership_bag(),
        )
        .await
        .unwrap();
    assert_eq!(dto.overall_status, ConsensusStatus::Verified);
    assert_eq!(dto.per_chain.len(), 3);

    let stored = engine.get_verification(&dto.id).unwrap();
    assert_eq!(stored.proof_id, dto.proof_id);
    assert_eq!(engine.verifications_for_vault(VAULT_ID).unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_records() {
    let (engine, _) = engine();
    assert_eq!(
        engine.get_verification("ccv-missing").unwrap_err().error_code(),
        "VERIFICATION_NOT_FOUND"
    );
    assert_eq!(
        engine.get_proof("zk-missing").unwrap_err().error_code(),
        "PROOF_NOT_FOUND"
    );
}

#[tokio::test]
async fn test_security_levels_pick_chains() {
    let (engine, _) = engine();

    let high = engine
        .integrate_with_triple_chain_security(VAULT_ID, "withdraw", 4)
        .await
        .unwrap();
    assert!(high.verified);
    assert_eq!(high.verification.per_chain.len(), 3);

    let low = engine
        .integrate_with_triple_chain_security(VAULT_ID, "withdraw", 1)
        .await
        .unwrap();
    assert!(low.verified);
    assert_eq!(low.verification.per_chain.len(), 1);
    assert_eq!(low.verification.per_chain[0].chain, ChainId::Ethereum);
}

#[tokio::test]
async fn test_consensus_rejects_bad_params() {
    let (engine, _) = engine();
    let mut bag = ownership_bag();
    bag.insert("address".into(), json!(""));
    let err = engine
        .request_cross_chain_consensus(VAULT_ID, PredicateType::Ownership, &ChainId::ALL, None, &bag)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PREDICATE_PARAMS");
}
