//! Selective disclosure, range and audit proofs.
//!
//! These are first-class entry points rather than generic predicate
//! requests: the caller never gets to choose what goes into the public
//! inputs.

use std::collections::BTreeSet;

use trinity_common::{
    audit_hash, disclosure_hash, ChainId, ParamBag, Result, TrinityError, ZkProof,
};

use crate::{PredicateParams, ProofGenerator, ProofRequest};

impl ProofGenerator {
    /// CONTENT_EXISTENCE proof whose content hash binds exactly
    /// `disclosed_fields` of `vault_id`.
    pub fn selective_disclosure(
        &self,
        vault_id: &str,
        disclosed_fields: &BTreeSet<String>,
        chain: ChainId,
        chain_params: ParamBag,
    ) -> Result<ZkProof> {
        if disclosed_fields.is_empty() {
            return Err(TrinityError::invalid_params(
                "selective disclosure needs at least one field",
            ));
        }
        let params = PredicateParams::ContentExistence {
            content_hash: disclosure_hash(vault_id, disclosed_fields),
            timestamp: self.clock.now_ms(),
            content: None,
        };
        self.generate(&ProofRequest::new(vault_id, params), chain, chain_params)
    }

    /// BALANCE_RANGE proof over the native token; `min`/`max` stay private.
    pub fn range_proof(
        &self,
        vault_id: &str,
        min: u128,
        max: u128,
        chain: ChainId,
        chain_params: ParamBag,
    ) -> Result<ZkProof> {
        let params = PredicateParams::BalanceRange {
            min_amount: min,
            max_amount: max,
            token_address: None,
        };
        self.generate(&ProofRequest::new(vault_id, params), chain, chain_params)
    }

    /// CONTENT_EXISTENCE proof binding the audited property set.
    pub fn audit_proof(
        &self,
        vault_id: &str,
        audit_properties: &BTreeSet<String>,
        chain: ChainId,
        chain_params: ParamBag,
    ) -> Result<ZkProof> {
        if audit_properties.is_empty() {
            return Err(TrinityError::invalid_params(
                "audit proof needs at least one property",
            ));
        }
        let params = PredicateParams::ContentExistence {
            content_hash: audit_hash(vault_id, audit_properties),
            timestamp: self.clock.now_ms(),
            content: None,
        };
        self.generate(&ProofRequest::new(vault_id, params), chain, chain_params)
    }
}

/// Whether `proof` commits to exactly `fields` of its vault.
pub fn discloses_exactly(proof: &ZkProof, fields: &BTreeSet<String>) -> bool {
    match &proof.public_inputs {
        trinity_common::PredicateInputs::ContentExistence { content_hash, .. } => {
            *content_hash == disclosure_hash(&proof.vault_id, fields)
        }
        _ => false,
    }
}
