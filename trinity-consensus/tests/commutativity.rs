//! The verdict depends on the per-chain outcomes, never on which chain
//! reports first.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use trinity_common::{ChainId, ChainVerificationStatus, Clock, ConsensusStatus};
use trinity_consensus::{
    ConsensusCoordinator, ConsensusRequest, CoordinatorConfig, TracingSink,
};
use trinity_ledger::ProofLedger;
use trinity_prover::{GeneratorConfig, ProofGenerator};
use trinity_test_fixtures::{ownership_params, scripted_registry, Script, TokioClock, VAULT_ID};
use trinity_verifier::{ProofVerifier, VerifierConfig};

fn script() -> impl Strategy<Value = Script> {
    prop_oneof![
        Just(Script::Verify),
        Just(Script::RejectOnChain),
        Just(Script::Unavailable),
        Just(Script::SubmissionRejected),
    ]
}

fn run(scripts: &[Script; 3], delays: &[u64; 3]) -> (ConsensusStatus, Vec<ChainVerificationStatus>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();
    runtime.block_on(async {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(0));
        let chains: Vec<_> = ChainId::ALL
            .iter()
            .zip(scripts.iter().zip(delays.iter()))
            .map(|(chain, (script, delay))| (*chain, *script, Duration::from_millis(*delay)))
            .collect();
        let (registry, _) = scripted_registry(&chains, clock.clone()).unwrap();
        let ledger = ProofLedger::in_memory();
        let coordinator = ConsensusCoordinator::new(
            Arc::new(ProofGenerator::new(GeneratorConfig::default(), clock.clone())),
            ProofVerifier::new(ledger.clone(), clock.clone(), VerifierConfig::default()),
            ledger,
            registry,
            Arc::new(TracingSink),
            clock,
            CoordinatorConfig::default(),
        );
        let result = coordinator
            .request_consensus(
                ConsensusRequest::new(VAULT_ID, ownership_params(), ChainId::ALL)
                    .with_deadline(Duration::from_secs(10)),
            )
            .await
            .unwrap();
        let statuses = ChainId::ALL
            .iter()
            .map(|chain| result.per_chain_results[chain].status)
            .collect();
        (result.overall_status, statuses)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_arrival_order_does_not_change_verdict(
        scripts in [script(), script(), script()],
        first in [0u64..2_000, 0u64..2_000, 0u64..2_000],
        second in [0u64..2_000, 0u64..2_000, 0u64..2_000],
    ) {
        let a = run(&scripts, &first);
        let b = run(&scripts, &second);
        prop_assert_eq!(a, b);
    }
}
