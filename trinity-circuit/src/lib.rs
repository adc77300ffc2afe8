//! trinity-circuit
//!
//! Proof artifacts for vault predicates.
//!
//! The private predicate parameters are folded into a witness scalar `w`,
//! committed as a Pedersen commitment `C = w·G + r·H` over Ristretto255.
//! The artifact is a Schnorr proof of knowledge of the opening `(w, r)`,
//! made non-interactive with a Merlin transcript that absorbs the proof's
//! statement digest. Changing any bound public input changes the digest and
//! the challenge, so the artifact stops verifying.
//!
//! Artifact layout (128 bytes): `C ‖ R ‖ s_w ‖ s_r`.

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use merlin::Transcript;
use once_cell::sync::Lazy;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;

use trinity_common::{PredicateType, Result, TrinityError, ZkProof};

pub const ARTIFACT_LEN: usize = 128;

const TRANSCRIPT_LABEL: &[u8] = b"trinity.predicate-proof.v1";
const WITNESS_CONTEXT: &str = "trinity 2025 predicate witness v1";
const GENERATOR_H_SEED: &[u8] = b"trinity.pedersen.H";

/// Second Pedersen generator, with no known discrete log relative to `G`.
static GENERATOR_H: Lazy<RistrettoPoint> =
    Lazy::new(|| RistrettoPoint::hash_from_bytes::<Sha512>(GENERATOR_H_SEED));

fn generator_g() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

// ═══════════════════════════════════════════════════════════════════════════════
// WITNESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Opening of a predicate commitment. Never serialized.
#[derive(Clone)]
pub struct PredicateWitness {
    value: Scalar,
    blinding: Scalar,
}

impl std::fmt::Debug for PredicateWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PredicateWitness(<redacted>)")
    }
}

impl PredicateWitness {
    /// Derive a witness from the canonical encoding of the private parameters.
    ///
    /// `salt` keeps two proofs over identical parameters unlinkable.
    pub fn derive<R: RngCore + CryptoRng>(
        predicate: PredicateType,
        private_material: &[u8],
        rng: &mut R,
    ) -> Self {
        let mut salt = [0u8; 32];
        rng.fill_bytes(&mut salt);

        let mut hasher = blake3::Hasher::new_derive_key(WITNESS_CONTEXT);
        hasher.update(predicate.as_str().as_bytes());
        hasher.update(&(private_material.len() as u64).to_be_bytes());
        hasher.update(private_material);
        hasher.update(&salt);
        let mut wide = [0u8; 64];
        hasher.finalize_xof().fill(&mut wide);

        Self {
            value: Scalar::from_bytes_mod_order_wide(&wide),
            blinding: Scalar::random(rng),
        }
    }

    pub fn commitment(&self) -> RistrettoPoint {
        self.value * generator_g() + self.blinding * *GENERATOR_H
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARTIFACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofArtifact {
    pub commitment: CompressedRistretto,
    pub nonce_commitment: CompressedRistretto,
    pub response_value: Scalar,
    pub response_blinding: Scalar,
}

impl ProofArtifact {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ARTIFACT_LEN);
        out.extend_from_slice(self.commitment.as_bytes());
        out.extend_from_slice(self.nonce_commitment.as_bytes());
        out.extend_from_slice(self.response_value.as_bytes());
        out.extend_from_slice(self.response_blinding.as_bytes());
        out
    }

    /// Parse an artifact. Fails on wrong length or non-canonical scalars;
    /// point validity is checked by [`verify`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ARTIFACT_LEN {
            return Err(TrinityError::Crypto(format!(
                "artifact must be {ARTIFACT_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            commitment: CompressedRistretto(chunk(bytes, 0)),
            nonce_commitment: CompressedRistretto(chunk(bytes, 1)),
            response_value: canonical_scalar(chunk(bytes, 2))?,
            response_blinding: canonical_scalar(chunk(bytes, 3))?,
        })
    }
}

fn chunk(bytes: &[u8], index: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[index * 32..(index + 1) * 32]);
    out
}

fn canonical_scalar(bytes: [u8; 32]) -> Result<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| TrinityError::Crypto("non-canonical scalar in artifact".into()))
}

fn challenge(
    statement: &[u8; 32],
    commitment: &CompressedRistretto,
    nonce_commitment: &CompressedRistretto,
) -> Scalar {
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
    transcript.append_message(b"statement", statement);
    transcript.append_message(b"C", commitment.as_bytes());
    transcript.append_message(b"R", nonce_commitment.as_bytes());
    let mut wide = [0u8; 64];
    transcript.challenge_bytes(b"c", &mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROVE / VERIFY
// ═══════════════════════════════════════════════════════════════════════════════

/// Prove knowledge of the witness opening, bound to `statement`.
pub fn prove<R: RngCore + CryptoRng>(
    statement: &[u8; 32],
    witness: &PredicateWitness,
    rng: &mut R,
) -> ProofArtifact {
    let k_value = Scalar::random(rng);
    let k_blinding = Scalar::random(rng);

    let commitment = witness.commitment().compress();
    let nonce_commitment = (k_value * generator_g() + k_blinding * *GENERATOR_H).compress();
    let c = challenge(statement, &commitment, &nonce_commitment);

    ProofArtifact {
        commitment,
        nonce_commitment,
        response_value: k_value + c * witness.value,
        response_blinding: k_blinding + c * witness.blinding,
    }
}

/// Check `s_w·G + s_r·H == R + c·C` for the challenge derived from `statement`.
pub fn verify(statement: &[u8; 32], artifact: &ProofArtifact) -> bool {
    let (Some(commitment), Some(nonce_commitment)) = (
        artifact.commitment.decompress(),
        artifact.nonce_commitment.decompress(),
    ) else {
        return false;
    };
    let c = challenge(statement, &artifact.commitment, &artifact.nonce_commitment);
    let lhs = artifact.response_value * generator_g() + artifact.response_blinding * *GENERATOR_H;
    lhs == nonce_commitment + c * commitment
}

/// Parse and verify a serialized artifact. Malformed bytes verify as false.
pub fn verify_bytes(statement: &[u8; 32], artifact: &[u8]) -> bool {
    ProofArtifact::from_bytes(artifact)
        .map(|parsed| verify(statement, &parsed))
        .unwrap_or(false)
}

/// Verify a stored proof's artifact against its own statement digest.
pub fn verify_proof_artifact(proof: &ZkProof) -> Result<bool> {
    let statement = proof.statement_digest()?;
    Ok(verify_bytes(&statement, &proof.proof_artifact))
}

/// Structural check only: length, canonical scalars, decompressible points.
pub fn is_well_formed(artifact: &[u8]) -> bool {
    ProofArtifact::from_bytes(artifact)
        .map(|parsed| {
            parsed.commitment.decompress().is_some()
                && parsed.nonce_commitment.decompress().is_some()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn witness() -> PredicateWitness {
        PredicateWitness::derive(PredicateType::BalanceRange, b"min=100;max=500", &mut OsRng)
    }

    #[test]
    fn test_prove_then_verify() {
        let statement = [7u8; 32];
        let artifact = prove(&statement, &witness(), &mut OsRng);
        assert!(verify(&statement, &artifact));
        assert!(verify_bytes(&statement, &artifact.to_bytes()));
        assert_eq!(artifact.to_bytes().len(), ARTIFACT_LEN);
    }

    #[test]
    fn test_statement_is_bound() {
        let artifact = prove(&[1u8; 32], &witness(), &mut OsRng);
        assert!(!verify(&[2u8; 32], &artifact));
    }

    #[test]
    fn test_tampered_response_fails() {
        let statement = [3u8; 32];
        let mut artifact = prove(&statement, &witness(), &mut OsRng);
        artifact.response_value += Scalar::ONE;
        assert!(!verify(&statement, &artifact));
    }

    #[test]
    fn test_malformed_bytes() {
        assert!(ProofArtifact::from_bytes(&[0u8; 10]).is_err());
        assert!(!verify_bytes(&[0u8; 32], &[0u8; 10]));
        assert!(!is_well_formed(&[0xffu8; ARTIFACT_LEN]));
    }

    #[test]
    fn test_same_params_give_unlinkable_commitments() {
        let a = PredicateWitness::derive(PredicateType::Ownership, b"same", &mut OsRng);
        let b = PredicateWitness::derive(PredicateType::Ownership, b"same", &mut OsRng);
        assert_ne!(a.commitment().compress(), b.commitment().compress());
        assert_eq!(format!("{a:?}"), "PredicateWitness(<redacted>)");
    }
}
