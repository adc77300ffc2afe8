//! trinity-ledger
//!
//! Append-only store for proof records and cross-chain verifications.
//!
//! Records are never deleted. Every mutation goes through a
//! compare-and-set on the record's `version`, so two writers racing on the
//! same id cannot both win.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};
use tracing::{debug, info};

use trinity_common::{CrossChainVerification, Result, TrinityError, ZkProof};

const PROOFS_TREE: &str = "proofs";
const VERIFICATIONS_TREE: &str = "verifications";
const VAULT_INDEX_TREE: &str = "vault_index";

const PROOF_INDEX_TAG: u8 = b'p';
const VERIFICATION_INDEX_TAG: u8 = b'v';

/// Attempts an [`ProofLedger::update_verification`] makes before giving up.
pub const MAX_CAS_ATTEMPTS: usize = 16;

#[derive(Clone)]
pub struct ProofLedger {
    backend: Arc<LedgerBackend>,
}

enum LedgerBackend {
    InMemory(RwLock<MemoryTables>),
    Persistent(SledTables),
}

#[derive(Default)]
struct MemoryTables {
    proofs: HashMap<String, ZkProof>,
    verifications: HashMap<String, CrossChainVerification>,
    vault_proofs: HashMap<String, Vec<String>>,
    vault_verifications: HashMap<String, Vec<String>>,
}

struct SledTables {
    db: Db,
    proofs: Tree,
    verifications: Tree,
    vault_index: Tree,
}

/// A record kind the ledger stores: proofs and cross-chain verifications.
trait LedgerRecord: Serialize + DeserializeOwned + Clone {
    const KIND: &'static str;
    const INDEX_TAG: u8;

    fn id(&self) -> &str;
    fn vault_id(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn sort_key(&self) -> u64;
    fn tree(tables: &SledTables) -> &Tree;
    fn table(tables: &MemoryTables) -> &HashMap<String, Self>;
    fn table_mut(tables: &mut MemoryTables) -> &mut HashMap<String, Self>;
    fn vault_table_mut(tables: &mut MemoryTables) -> &mut HashMap<String, Vec<String>>;
    fn vault_table(tables: &MemoryTables) -> &HashMap<String, Vec<String>>;
}

impl LedgerRecord for ZkProof {
    const KIND: &'static str = "proof";
    const INDEX_TAG: u8 = PROOF_INDEX_TAG;

    fn id(&self) -> &str {
        &self.id
    }
    fn vault_id(&self) -> &str {
        &self.vault_id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn sort_key(&self) -> u64 {
        self.created_at
    }
    fn tree(tables: &SledTables) -> &Tree {
        &tables.proofs
    }
    fn table(tables: &MemoryTables) -> &HashMap<String, Self> {
        &tables.proofs
    }
    fn table_mut(tables: &mut MemoryTables) -> &mut HashMap<String, Self> {
        &mut tables.proofs
    }
    fn vault_table_mut(tables: &mut MemoryTables) -> &mut HashMap<String, Vec<String>> {
        &mut tables.vault_proofs
    }
    fn vault_table(tables: &MemoryTables) -> &HashMap<String, Vec<String>> {
        &tables.vault_proofs
    }
}

impl LedgerRecord for CrossChainVerification {
    const KIND: &'static str = "verification";
    const INDEX_TAG: u8 = VERIFICATION_INDEX_TAG;

    fn id(&self) -> &str {
        &self.id
    }
    fn vault_id(&self) -> &str {
        &self.vault_id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn sort_key(&self) -> u64 {
        self.created_at
    }
    fn tree(tables: &SledTables) -> &Tree {
        &tables.verifications
    }
    fn table(tables: &MemoryTables) -> &HashMap<String, Self> {
        &tables.verifications
    }
    fn table_mut(tables: &mut MemoryTables) -> &mut HashMap<String, Self> {
        &mut tables.verifications
    }
    fn vault_table_mut(tables: &mut MemoryTables) -> &mut HashMap<String, Vec<String>> {
        &mut tables.vault_verifications
    }
    fn vault_table(tables: &MemoryTables) -> &HashMap<String, Vec<String>> {
        &tables.vault_verifications
    }
}

fn sled_err(context: &str, err: impl std::fmt::Display) -> TrinityError {
    TrinityError::Ledger(format!("{context}: {err}"))
}

fn index_prefix(vault_id: &str, tag: u8) -> Vec<u8> {
    let mut key = Vec::with_capacity(vault_id.len() + 2);
    key.extend_from_slice(vault_id.as_bytes());
    key.push(0);
    key.push(tag);
    key
}

impl ProofLedger {
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(LedgerBackend::InMemory(RwLock::new(MemoryTables::default()))),
        }
    }

    /// Open (or create) a sled-backed ledger at `path`.
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    sled_err(&format!("create ledger dir {}", parent.display()), err)
                })?;
            }
        }
        let db = sled::open(path_ref)
            .map_err(|err| sled_err(&format!("open ledger at {}", path_ref.display()), err))?;
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|err| sled_err(&format!("open tree {name}"), err))
        };
        let tables = SledTables {
            proofs: open_tree(PROOFS_TREE)?,
            verifications: open_tree(VERIFICATIONS_TREE)?,
            vault_index: open_tree(VAULT_INDEX_TREE)?,
            db,
        };
        info!(path = %path_ref.display(), "opened persistent proof ledger");
        Ok(Self {
            backend: Arc::new(LedgerBackend::Persistent(tables)),
        })
    }

    /// Flush pending writes to disk. No-op for the in-memory backend.
    pub fn flush(&self) -> Result<()> {
        if let LedgerBackend::Persistent(tables) = &*self.backend {
            tables
                .db
                .flush()
                .map_err(|err| sled_err("ledger flush", err))?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROOFS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Append a new proof. Fails if the id is already recorded.
    pub fn insert_proof(&self, proof: &ZkProof) -> Result<()> {
        self.insert(proof)
    }

    pub fn get_proof(&self, id: &str) -> Result<Option<ZkProof>> {
        self.get(id)
    }

    /// Replace `expected` with `next` if nobody else has written since
    /// `expected` was read. `next.version` is set by the ledger.
    pub fn compare_and_set_proof(&self, expected: &ZkProof, next: ZkProof) -> Result<bool> {
        self.compare_and_set(expected, next)
    }

    /// Proofs of `vault_id`, oldest first.
    pub fn proofs_for_vault(&self, vault_id: &str) -> Result<Vec<ZkProof>> {
        self.for_vault(vault_id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CROSS-CHAIN VERIFICATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn insert_verification(&self, verification: &CrossChainVerification) -> Result<()> {
        self.insert(verification)
    }

    pub fn get_verification(&self, id: &str) -> Result<Option<CrossChainVerification>> {
        self.get(id)
    }

    pub fn compare_and_set_verification(
        &self,
        expected: &CrossChainVerification,
        next: CrossChainVerification,
    ) -> Result<bool> {
        self.compare_and_set(expected, next)
    }

    /// Read-modify-write a verification under compare-and-set.
    ///
    /// `apply` returns `false` to leave the record untouched. Returns the
    /// record as stored after the call.
    pub fn update_verification<F>(&self, id: &str, mut apply: F) -> Result<CrossChainVerification>
    where
        F: FnMut(&mut CrossChainVerification) -> bool,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .get_verification(id)?
                .ok_or_else(|| TrinityError::VerificationNotFound(id.to_string()))?;
            let mut next = current.clone();
            if !apply(&mut next) {
                return Ok(current);
            }
            if self.compare_and_set_verification(&current, next)? {
                return self
                    .get_verification(id)?
                    .ok_or_else(|| TrinityError::VerificationNotFound(id.to_string()));
            }
            debug!(verification_id = %id, "verification CAS lost, retrying");
        }
        Err(TrinityError::ConcurrentModification(id.to_string()))
    }

    /// Verifications of `vault_id`, oldest first.
    pub fn verifications_for_vault(&self, vault_id: &str) -> Result<Vec<CrossChainVerification>> {
        self.for_vault(vault_id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GENERIC RECORD OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn insert<R: LedgerRecord>(&self, record: &R) -> Result<()> {
        match &*self.backend {
            LedgerBackend::InMemory(tables) => {
                let mut guard = tables.write();
                if R::table(&guard).contains_key(record.id()) {
                    return Err(duplicate::<R>(record.id()));
                }
                R::table_mut(&mut guard).insert(record.id().to_string(), record.clone());
                R::vault_table_mut(&mut guard)
                    .entry(record.vault_id().to_string())
                    .or_default()
                    .push(record.id().to_string());
            }
            LedgerBackend::Persistent(tables) => {
                let bytes = serde_json::to_vec(record)?;
                let swapped = R::tree(tables)
                    .compare_and_swap(record.id().as_bytes(), None as Option<&[u8]>, Some(bytes))
                    .map_err(|err| sled_err("ledger insert", err))?;
                if swapped.is_err() {
                    return Err(duplicate::<R>(record.id()));
                }
                let mut index_key = index_prefix(record.vault_id(), R::INDEX_TAG);
                index_key.extend_from_slice(record.id().as_bytes());
                tables
                    .vault_index
                    .insert(index_key, &[])
                    .map_err(|err| sled_err("ledger index insert", err))?;
            }
        }
        debug!(kind = R::KIND, id = %record.id(), vault_id = %record.vault_id(), "ledger record appended");
        Ok(())
    }

    fn get<R: LedgerRecord>(&self, id: &str) -> Result<Option<R>> {
        match &*self.backend {
            LedgerBackend::InMemory(tables) => Ok(R::table(&tables.read()).get(id).cloned()),
            LedgerBackend::Persistent(tables) => R::tree(tables)
                .get(id.as_bytes())
                .map_err(|err| sled_err("ledger get", err))?
                .map(|raw| serde_json::from_slice(&raw).map_err(TrinityError::from))
                .transpose(),
        }
    }

    fn compare_and_set<R: LedgerRecord>(&self, expected: &R, mut next: R) -> Result<bool> {
        if next.id() != expected.id() {
            return Err(TrinityError::Ledger(format!(
                "{} id changed from {} to {}",
                R::KIND,
                expected.id(),
                next.id()
            )));
        }
        next.set_version(expected.version() + 1);

        match &*self.backend {
            LedgerBackend::InMemory(tables) => {
                let mut guard = tables.write();
                let table = R::table_mut(&mut guard);
                match table.get(expected.id()).map(|current| current.version()) {
                    Some(version) if version == expected.version() => {
                        table.insert(expected.id().to_string(), next);
                        Ok(true)
                    }
                    Some(_) => Ok(false),
                    None => Err(not_found::<R>(expected.id())),
                }
            }
            LedgerBackend::Persistent(tables) => {
                let tree = R::tree(tables);
                let raw = tree
                    .get(expected.id().as_bytes())
                    .map_err(|err| sled_err("ledger get", err))?
                    .ok_or_else(|| not_found::<R>(expected.id()))?;
                let current: R = serde_json::from_slice(&raw)?;
                if current.version() != expected.version() {
                    return Ok(false);
                }
                let bytes = serde_json::to_vec(&next)?;
                let swapped = tree
                    .compare_and_swap(expected.id().as_bytes(), Some(raw), Some(bytes))
                    .map_err(|err| sled_err("ledger compare_and_swap", err))?;
                Ok(swapped.is_ok())
            }
        }
    }

    fn for_vault<R: LedgerRecord>(&self, vault_id: &str) -> Result<Vec<R>> {
        let mut records: Vec<R> = match &*self.backend {
            LedgerBackend::InMemory(tables) => {
                let guard = tables.read();
                let table = R::table(&guard);
                R::vault_table(&guard)
                    .get(vault_id)
                    .map(|ids| ids.iter().filter_map(|id| table.get(id).cloned()).collect())
                    .unwrap_or_default()
            }
            LedgerBackend::Persistent(tables) => {
                let prefix = index_prefix(vault_id, R::INDEX_TAG);
                let mut out = Vec::new();
                for entry in tables.vault_index.scan_prefix(&prefix) {
                    let (key, _) = entry.map_err(|err| sled_err("ledger index scan", err))?;
                    let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                    if let Some(record) = self.get::<R>(&id)? {
                        out.push(record);
                    }
                }
                out
            }
        };
        records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()).then_with(|| a.id().cmp(b.id())));
        Ok(records)
    }
}

fn duplicate<R: LedgerRecord>(id: &str) -> TrinityError {
    TrinityError::Ledger(format!("{} {id} already recorded", R::KIND))
}

fn not_found<R: LedgerRecord>(id: &str) -> TrinityError {
    match R::KIND {
        "proof" => TrinityError::ProofNotFound(id.to_string()),
        _ => TrinityError::VerificationNotFound(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trinity_common::{
        ChainBinding, ChainId, ConsensusStatus, ParamBag, PredicateInputs, PredicateType,
        ProofStatus,
    };

    fn proof(id: &str, vault: &str, created_at: u64) -> ZkProof {
        ZkProof {
            id: id.into(),
            vault_id: vault.into(),
            predicate_type: PredicateType::Ownership,
            public_inputs: PredicateInputs::Ownership {
                address: "0xabc".into(),
                nonce: "1".into(),
            },
            chain_binding: ChainBinding::new(ChainId::Ethereum, ParamBag::new()),
            proof_artifact: vec![0; 4],
            created_at,
            expires_at: created_at + 1_000,
            status: ProofStatus::Pending,
            verified_at: None,
            verification_history: vec![],
            version: 0,
        }
    }

    fn verification(id: &str, vault: &str) -> CrossChainVerification {
        CrossChainVerification::new(
            id.into(),
            vault.into(),
            PredicateType::Ownership,
            ChainId::ALL.to_vec(),
            2,
            0,
            2_000,
        )
    }

    fn exercise_proofs(ledger: &ProofLedger) {
        let first = proof("zk-1", "V1", 20);
        ledger.insert_proof(&first).unwrap();
        ledger.insert_proof(&proof("zk-2", "V1", 10)).unwrap();
        ledger.insert_proof(&proof("zk-3", "V2", 5)).unwrap();

        assert!(ledger.insert_proof(&first).is_err());

        let ids: Vec<_> = ledger
            .proofs_for_vault("V1")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["zk-2", "zk-1"]);

        let stored = ledger.get_proof("zk-1").unwrap().unwrap();
        let mut verified = stored.clone();
        verified.status = ProofStatus::Verified;
        assert!(ledger.compare_and_set_proof(&stored, verified.clone()).unwrap());
        // A second writer holding the stale copy loses.
        let mut rejected = stored.clone();
        rejected.status = ProofStatus::Rejected;
        assert!(!ledger.compare_and_set_proof(&stored, rejected).unwrap());

        let now = ledger.get_proof("zk-1").unwrap().unwrap();
        assert_eq!(now.status, ProofStatus::Verified);
        assert_eq!(now.version, 1);
        assert!(ledger.get_proof("zk-missing").unwrap().is_none());
    }

    fn exercise_verifications(ledger: &ProofLedger) {
        ledger.insert_verification(&verification("ccv-1", "V1")).unwrap();
        let updated = ledger
            .update_verification("ccv-1", |v| {
                v.overall_status = ConsensusStatus::Verified;
                true
            })
            .unwrap();
        assert_eq!(updated.overall_status, ConsensusStatus::Verified);
        assert_eq!(updated.version, 1);

        let untouched = ledger.update_verification("ccv-1", |_| false).unwrap();
        assert_eq!(untouched.version, 1);

        assert_eq!(ledger.verifications_for_vault("V1").unwrap().len(), 1);
        assert!(ledger.verifications_for_vault("V9").unwrap().is_empty());
        assert!(matches!(
            ledger.update_verification("ccv-none", |_| true),
            Err(TrinityError::VerificationNotFound(_))
        ));
    }

    #[test]
    fn test_in_memory_ledger() {
        let ledger = ProofLedger::in_memory();
        exercise_proofs(&ledger);
        exercise_verifications(&ledger);
    }

    #[test]
    fn test_persistent_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ProofLedger::persistent(dir.path().join("ledger")).unwrap();
        exercise_proofs(&ledger);
        exercise_verifications(&ledger);
    }

    #[test]
    fn test_persistent_ledger_flushes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger");
        let ledger = ProofLedger::persistent(&path).unwrap();
        ledger.insert_proof(&proof("zk-keep", "V1", 1)).unwrap();
        ledger.flush().unwrap();
        let handle = ledger.clone();
        assert_eq!(handle.proofs_for_vault("V1").unwrap().len(), 1);
        assert!(path.exists());
    }
}
