use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use trinity_circuit::{is_well_formed, prove, verify_bytes, PredicateWitness, ARTIFACT_LEN};
use trinity_common::PredicateType;

fn artifact_for(statement: &[u8; 32], seed: u64) -> Vec<u8> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let witness = PredicateWitness::derive(PredicateType::MultiParty, b"participants", &mut rng);
    prove(statement, &witness, &mut rng).to_bytes()
}

#[test]
fn seeded_artifacts_are_reproducible() {
    let statement = [9u8; 32];
    assert_eq!(artifact_for(&statement, 42), artifact_for(&statement, 42));
    assert_ne!(artifact_for(&statement, 42), artifact_for(&statement, 43));
}

#[test]
fn generated_artifacts_are_well_formed() {
    let artifact = artifact_for(&[0u8; 32], 1);
    assert_eq!(artifact.len(), ARTIFACT_LEN);
    assert!(is_well_formed(&artifact));
}

proptest! {
    #[test]
    fn any_statement_change_breaks_verification(byte in 0usize..32, bit in 0u8..8) {
        let statement = [0x5au8; 32];
        let artifact = artifact_for(&statement, 7);
        prop_assert!(verify_bytes(&statement, &artifact));

        let mut altered = statement;
        altered[byte] ^= 1 << bit;
        prop_assert!(!verify_bytes(&altered, &artifact));
    }

    #[test]
    fn any_artifact_bit_flip_breaks_verification(index in 0usize..ARTIFACT_LEN, bit in 0u8..8) {
        let statement = [0x11u8; 32];
        let mut artifact = artifact_for(&statement, 11);
        artifact[index] ^= 1 << bit;
        prop_assert!(!verify_bytes(&statement, &artifact));
    }
}
