//! Multi-substore commit and query routing.
//!
//! The multistore owns an ordered set of named Verkle substores carved out
//! of one shared backing database. `commit` seals every substore root into
//! a per-block map, commits the map with the sorted simple-merkle scheme in
//! [`merkle`], and bumps the [`CommitId`]. Queries route `/<name>/key`
//! requests to a substore and, when asked, assemble the two-op proof chain
//! that [`verify_proof_ops`] checks against a claimed multistore root.
//!
//! Locking follows a reader/writer discipline: reads and queries share the
//! lock, mutations and commits take it exclusively.

use crate::proof::{decode_op, MultistoreOp, ProofError, ProofOperator, ProofOps, VerkleOp};
use crate::store::{KvDb, PrefixDb, StoreError, Substore};
use crate::types::{CommitId, Digest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod merkle;
pub mod snapshot;

/// Reserved metadata key holding the latest sealed commit info.
const COMMIT_INFO_KEY: &[u8] = b"m/commit-info";

fn substore_prefix(name: &str) -> Vec<u8> {
    [b"s/", name.as_bytes(), b"/"].concat()
}

/// Persisted record of one sealed commit.
#[derive(Debug, Serialize, Deserialize)]
struct CommitInfo {
    version: i64,
    store_roots: Vec<(String, Digest)>,
}

/// A commit-addressed collection of named Verkle substores.
#[derive(Debug)]
pub struct MultiStore<D> {
    inner: RwLock<Inner<D>>,
}

#[derive(Debug)]
struct Inner<D> {
    db: Arc<D>,
    substores: BTreeMap<String, Substore<PrefixDb<D>>>,
    last_commit: CommitId,
    /// Per-commit `{name -> root}` snapshot backing the binding proof op.
    sealed_roots: BTreeMap<Vec<u8>, Digest>,
}

impl<D: KvDb> MultiStore<D> {
    /// Open a multistore over `db` with the given substore registration.
    ///
    /// Substores are rebuilt from their backing buckets and the last sealed
    /// commit is restored, so reopening a committed database resumes at the
    /// same `CommitId`.
    pub fn new(db: Arc<D>, names: &[&str]) -> Result<Self, StoreError> {
        let mut substores = BTreeMap::new();
        for &name in names {
            if name.is_empty() || name.contains('/') {
                return Err(StoreError::InvalidName(name.to_string()));
            }
            let sub_db = PrefixDb::new(Arc::clone(&db), substore_prefix(name));
            substores.insert(name.to_string(), Substore::load(sub_db)?);
        }
        let (last_commit, sealed_roots) =
            match db.get(COMMIT_INFO_KEY).map_err(StoreError::backing)? {
                Some(bytes) => {
                    let (info, _): (CommitInfo, usize) =
                        bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())
                            .map_err(|e| {
                                StoreError::corruption(format!("commit info decode: {e}"))
                            })?;
                    let roots: BTreeMap<Vec<u8>, Digest> = info
                        .store_roots
                        .into_iter()
                        .map(|(name, root)| (name.into_bytes(), root))
                        .collect();
                    (
                        CommitId::new(info.version, merkle::root_of_map(&roots)),
                        roots,
                    )
                }
                None => (CommitId::default(), BTreeMap::new()),
            };
        tracing::debug!(
            stores = substores.len(),
            version = last_commit.version,
            "opened multistore"
        );
        Ok(Self {
            inner: RwLock::new(Inner {
                db,
                substores,
                last_commit,
                sealed_roots,
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<D>> {
        self.inner.read().expect("multistore lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<D>> {
        self.inner.write().expect("multistore lock poisoned")
    }

    /// Get a value from the named substore.
    pub fn get(&self, store: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.read().substore(store)?.get(key)
    }

    /// Check for a live value in the named substore.
    pub fn has(&self, store: &str, key: &[u8]) -> Result<bool, StoreError> {
        self.read().substore(store)?.has(key)
    }

    /// Set a value in the named substore.
    pub fn set(&self, store: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write().substore_mut(store)?.set(key, value)
    }

    /// Delete a key from the named substore.
    pub fn delete(&self, store: &str, key: &[u8]) -> Result<(), StoreError> {
        self.write().substore_mut(store)?.delete(key)
    }

    /// The identity of the last sealed commit, or the zero identity.
    pub fn last_commit_id(&self) -> CommitId {
        self.read().last_commit
    }

    /// Freeze every substore root, commit the root map, and bump the
    /// version.
    pub fn commit(&self) -> Result<CommitId, StoreError> {
        let mut inner = self.write();
        let store_roots: Vec<(String, Digest)> = inner
            .substores
            .iter()
            .map(|(name, sub)| (name.clone(), sub.root_commitment()))
            .collect();
        let version = inner.last_commit.version + 1;
        inner.seal(version, store_roots)
    }

    /// Answer a `/<substore-name>/key` query at the latest sealed commit.
    ///
    /// `data` carries either raw key bytes or a JSON array of string keys
    /// for a batch query over the same substore. Batch responses JSON-encode
    /// the values in request order, absent keys as empty strings. With
    /// `prove` set, the response carries the `[verkle op, binding op]`
    /// chain.
    pub fn query(&self, req: &QueryRequest) -> Result<QueryResponse, StoreError> {
        let inner = self.read();
        let name = parse_key_path(&req.path)?;
        let sub = inner.substore(name)?;

        let (keys, batch) = match serde_json::from_slice::<Vec<String>>(&req.data) {
            Ok(list) => (
                list.into_iter()
                    .map(String::into_bytes)
                    .collect::<Vec<_>>(),
                true,
            ),
            Err(_) => (vec![req.data.clone()], false),
        };
        if keys.is_empty() {
            return Err(StoreError::InvalidQuery("empty key set".to_string()));
        }

        let mut values = Vec::with_capacity(keys.len());
        for key in &keys {
            values.push(sub.get(key)?.unwrap_or_default());
        }
        let value = if batch {
            let strings: Vec<String> = values
                .iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect();
            serde_json::to_vec(&strings)
                .map_err(|e| StoreError::InvalidQuery(e.to_string()))?
        } else {
            values.swap_remove(0)
        };

        let proof_ops = if req.prove {
            let proof = sub.proof_ics23(&keys)?;
            let op_key = if batch { Vec::new() } else { keys[0].clone() };
            let verkle_op = VerkleOp::new(op_key, proof);
            let binding_op =
                MultistoreOp::new(name.as_bytes().to_vec(), inner.sealed_roots.clone());
            let mut ops = ProofOps::new();
            ops.push(verkle_op.proof_op()?);
            ops.push(binding_op.proof_op()?);
            Some(ops)
        } else {
            None
        };

        Ok(QueryResponse {
            value,
            proof_ops,
            height: inner.last_commit.version,
        })
    }
}

impl<D: KvDb> Inner<D> {
    fn substore(&self, name: &str) -> Result<&Substore<PrefixDb<D>>, StoreError> {
        self.substores
            .get(name)
            .ok_or_else(|| StoreError::UnknownSubstore(name.to_string()))
    }

    fn substore_mut(&mut self, name: &str) -> Result<&mut Substore<PrefixDb<D>>, StoreError> {
        self.substores
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownSubstore(name.to_string()))
    }

    fn seal(&mut self, version: i64, store_roots: Vec<(String, Digest)>) -> Result<CommitId, StoreError> {
        let info = CommitInfo {
            version,
            store_roots,
        };
        let bytes = bincode::serde::encode_to_vec(&info, bincode::config::legacy())
            .map_err(|e| StoreError::corruption(format!("commit info encode: {e}")))?;
        self.db
            .put(COMMIT_INFO_KEY, &bytes)
            .map_err(StoreError::backing)?;
        self.sealed_roots = info
            .store_roots
            .into_iter()
            .map(|(name, root)| (name.into_bytes(), root))
            .collect();
        let hash = merkle::root_of_map(&self.sealed_roots);
        self.last_commit = CommitId::new(version, hash);
        tracing::debug!(version, root = %hex::encode(hash), "sealed commit");
        Ok(self.last_commit)
    }
}

/// A `/<substore-name>/key` query.
#[derive(Clone, Debug)]
pub struct QueryRequest {
    /// Query path; only the `key` operation is supported.
    pub path: String,
    /// Raw key bytes, or a JSON array of string keys for a batch query.
    pub data: Vec<u8>,
    /// Request a proof chain alongside the value.
    pub prove: bool,
}

/// The answer to a [`QueryRequest`].
#[derive(Clone, Debug, Default)]
pub struct QueryResponse {
    /// The raw value (single query) or JSON-encoded value list (batch).
    /// Absent keys answer as empty.
    pub value: Vec<u8>,
    /// The proof chain, when requested.
    pub proof_ops: Option<ProofOps>,
    /// The sealed version the answer reflects.
    pub height: i64,
}

fn parse_key_path(path: &str) -> Result<&str, StoreError> {
    let malformed = || StoreError::InvalidQuery(path.to_string());
    let rest = path.strip_prefix('/').ok_or_else(malformed)?;
    let (name, op) = rest.split_once('/').ok_or_else(malformed)?;
    if name.is_empty() || op != "key" {
        return Err(malformed());
    }
    Ok(name)
}

/// Verify a proof chain against a claimed multistore root.
///
/// `expected` maps 32-byte hashed key paths to the expected value digest,
/// or `None` to assert absence; the digests are compared to the committed
/// leaves directly. `expected_name` is checked against the binding op. The
/// chain must open with the Verkle op and may bind at most one substore.
pub fn verify_proof_ops(
    ops: &ProofOps,
    claimed_root: &Digest,
    expected_name: &[u8],
    expected: &BTreeMap<Vec<u8>, Option<Digest>>,
) -> Result<(), StoreError> {
    let (first, rest) = ops.split_first().ok_or_else(|| {
        StoreError::from(ProofError::VerifyFailed("empty proof op chain".to_string()))
    })?;
    if rest.len() > 1 {
        return Err(ProofError::VerifyFailed(
            "proof chain binds more than one substore".to_string(),
        )
        .into());
    }
    let ProofOperator::Verkle(verkle_op) = decode_op(first)? else {
        return Err(ProofError::VerifyFailed(
            "first proof op must be the verkle operator".to_string(),
        )
        .into());
    };
    let mut root = verkle_op.verify_membership_map(expected)?;
    for op in rest {
        let ProofOperator::Multistore(binding) = decode_op(op)? else {
            return Err(ProofError::VerifyFailed(
                "subsequent proof ops must bind a substore".to_string(),
            )
            .into());
        };
        if binding.name() != expected_name {
            tracing::warn!(
                expected = %String::from_utf8_lossy(expected_name),
                got = %String::from_utf8_lossy(binding.name()),
                "proof chain bound the wrong substore"
            );
            return Err(ProofError::invalid(expected_name, "substore name mismatch").into());
        }
        root = binding.run(&[root.to_vec()])?;
    }
    if &root != claimed_root {
        return Err(ProofError::VerifyFailed(format!(
            "calculated root hash is invalid: expected {} but got {}",
            hex::encode(claimed_root),
            hex::encode(root)
        ))
        .into());
    }
    Ok(())
}
