//! The Verkle proof operator, the substore-binding operator, and their
//! wire codec.

use crate::hash::hash;
use crate::multistore::merkle;
use crate::proof::{
    CommitmentProof, ProofError, ProofOp, VerkleProof, PROOF_TYPE_IPA, PROOF_TYPE_SIMPLE,
};
use crate::types::{Digest, TreePath};
use crate::verkle::{proof::check_multiproof, VerkleTree};
use std::collections::BTreeMap;

/// A decoded proof operator.
#[derive(Debug)]
pub enum ProofOperator {
    /// Proves keys inside one Verkle substore.
    Verkle(VerkleOp),
    /// Binds a substore root into the multistore root.
    Multistore(MultistoreOp),
}

impl ProofOperator {
    /// Run the operator on the previous op's output.
    pub fn run(&self, args: &[Vec<u8>]) -> Result<Digest, ProofError> {
        match self {
            ProofOperator::Verkle(op) => op.run(args),
            ProofOperator::Multistore(op) => op.run(args),
        }
    }

    /// The key the operator binds.
    pub fn key(&self) -> &[u8] {
        match self {
            ProofOperator::Verkle(op) => op.key(),
            ProofOperator::Multistore(op) => op.name(),
        }
    }
}

/// Decode a wire [`ProofOp`] by its type tag.
pub fn decode_op(op: &ProofOp) -> Result<ProofOperator, ProofError> {
    match op.op_type.as_str() {
        PROOF_TYPE_IPA => Ok(ProofOperator::Verkle(VerkleOp::decode(op)?)),
        PROOF_TYPE_SIMPLE => Ok(ProofOperator::Multistore(MultistoreOp::decode(op)?)),
        other => Err(ProofError::Decode(format!("unknown proof op type {other:?}"))),
    }
}

/// Proof operator for keys in a Verkle substore.
///
/// The wire payload is the ICS-23 [`CommitmentProof`] envelope; the key
/// under proof travels in the op's key field. The in-memory tree reference
/// is not serialized: decoders may attach one afterwards, and `run` falls
/// back to rebuilding the throwaway witness tree when none is attached.
#[derive(Debug)]
pub struct VerkleOp {
    key: Vec<u8>,
    proof: CommitmentProof,
    tree: Option<VerkleTree>,
}

impl VerkleOp {
    /// Wrap a commitment proof for `key`.
    pub fn new(key: impl Into<Vec<u8>>, proof: CommitmentProof) -> Self {
        Self {
            key: key.into(),
            proof,
            tree: None,
        }
    }

    /// Attach a tree to run against instead of the rebuilt witness tree.
    pub fn attach_tree(&mut self, tree: VerkleTree) {
        self.tree = Some(tree);
    }

    /// The key under proof.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Encode to the wire record.
    pub fn proof_op(&self) -> Result<ProofOp, ProofError> {
        Ok(ProofOp {
            op_type: PROOF_TYPE_IPA.to_string(),
            key: self.key.clone(),
            data: self.proof.encode()?,
        })
    }

    /// Decode from the wire record. No tree is attached.
    pub fn decode(op: &ProofOp) -> Result<Self, ProofError> {
        if op.op_type != PROOF_TYPE_IPA {
            return Err(ProofError::Decode(format!(
                "expected op type {PROOF_TYPE_IPA:?}, got {:?}",
                op.op_type
            )));
        }
        Ok(Self {
            key: op.key.clone(),
            proof: CommitmentProof::decode(&op.data)?,
            tree: None,
        })
    }

    fn witness(&self) -> &VerkleProof {
        let CommitmentProof::Verkle(verkle) = &self.proof;
        verkle
    }

    /// Assert membership or absence of the op's own key and return the
    /// reconstructed root.
    ///
    /// No args asserts absence; a single arg asserts membership of that
    /// value. The opening proof must cover exactly the op's key.
    pub fn run(&self, args: &[Vec<u8>]) -> Result<Digest, ProofError> {
        let verkle = self.witness();
        let rebuilt;
        let tree = match &self.tree {
            Some(tree) => tree,
            None => {
                rebuilt = verkle.witness_tree();
                &rebuilt
            }
        };
        let path = hash(&self.key);
        match args {
            [] => {
                if tree.get(&path).is_some() {
                    return Err(ProofError::invalid(
                        &self.key,
                        "proof did not verify absence of key",
                    ));
                }
            }
            [value] => {
                if tree.get(&path) != Some(hash(value)) {
                    return Err(ProofError::invalid(
                        &self.key,
                        "proof did not verify existence of key with given value",
                    ));
                }
            }
            _ => {
                return Err(ProofError::invalid(
                    &self.key,
                    format!("args must be length 0 or 1, got {}", args.len()),
                ));
            }
        }
        check_multiproof(tree, &[path], &verkle.proof)
            .map_err(|e| ProofError::invalid(&self.key, e.to_string()))?;
        Ok(tree.root_commitment())
    }

    /// Check every expected `{path -> leaf digest or absent}` entry against
    /// the witness, verify the opening proof over exactly those paths, and
    /// return the reconstructed root.
    ///
    /// The digests in the map are compared to the committed leaves
    /// directly; callers pass `hash(value)`, never raw values.
    pub fn verify_membership_map(
        &self,
        expected: &BTreeMap<Vec<u8>, Option<Digest>>,
    ) -> Result<Digest, ProofError> {
        if expected.is_empty() {
            return Err(ProofError::VerifyFailed(
                "empty expected key set".to_string(),
            ));
        }
        let verkle = self.witness();
        let rebuilt;
        let tree = match &self.tree {
            Some(tree) => tree,
            None => {
                rebuilt = verkle.witness_tree();
                &rebuilt
            }
        };
        let mut paths = Vec::with_capacity(expected.len());
        for (path_bytes, want) in expected {
            let path: TreePath = path_bytes.as_slice().try_into().map_err(|_| {
                ProofError::Decode(format!(
                    "expected key path must be 32 bytes, got {}",
                    path_bytes.len()
                ))
            })?;
            let got = tree.get(&path);
            let matches = match want {
                None => got.is_none(),
                Some(digest) => got == Some(*digest),
            };
            if !matches {
                return Err(ProofError::invalid(path_bytes, "witness value mismatch"));
            }
            paths.push(path);
        }
        check_multiproof(tree, &paths, &verkle.proof)
            .map_err(|e| ProofError::invalid(&self.key, e.to_string()))?;
        Ok(tree.root_commitment())
    }
}

/// Proof operator binding a substore root into the multistore root.
///
/// The payload is the per-commit `{name -> root}` snapshot, so the verifier
/// can reproduce both the map commitment and the inclusion of the named
/// substore.
#[derive(Debug)]
pub struct MultistoreOp {
    name: Vec<u8>,
    roots: BTreeMap<Vec<u8>, Digest>,
}

impl MultistoreOp {
    /// Bind `name` within a sealed root map.
    pub fn new(name: impl Into<Vec<u8>>, roots: BTreeMap<Vec<u8>, Digest>) -> Self {
        Self {
            name: name.into(),
            roots,
        }
    }

    /// The substore name the op binds.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Encode to the wire record.
    pub fn proof_op(&self) -> Result<ProofOp, ProofError> {
        let data = bincode::serde::encode_to_vec(&self.roots, bincode::config::legacy())
            .map_err(|e| ProofError::Decode(e.to_string()))?;
        Ok(ProofOp {
            op_type: PROOF_TYPE_SIMPLE.to_string(),
            key: self.name.clone(),
            data,
        })
    }

    /// Decode from the wire record.
    pub fn decode(op: &ProofOp) -> Result<Self, ProofError> {
        if op.op_type != PROOF_TYPE_SIMPLE {
            return Err(ProofError::Decode(format!(
                "expected op type {PROOF_TYPE_SIMPLE:?}, got {:?}",
                op.op_type
            )));
        }
        let (roots, _): (BTreeMap<Vec<u8>, Digest>, usize) =
            bincode::serde::decode_from_slice(&op.data, bincode::config::legacy())
                .map_err(|e| ProofError::Decode(e.to_string()))?;
        Ok(Self {
            name: op.key.clone(),
            roots,
        })
    }

    /// Check the argument root against the map's entry for the bound name
    /// and return the multistore root committing the whole map.
    pub fn run(&self, args: &[Vec<u8>]) -> Result<Digest, ProofError> {
        let [root] = args else {
            return Err(ProofError::invalid(
                &self.name,
                format!("args must be length 1, got {}", args.len()),
            ));
        };
        let sealed = self.roots.get(&self.name).ok_or_else(|| {
            ProofError::invalid(&self.name, "substore not present in commitment map")
        })?;
        if sealed[..] != root[..] {
            return Err(ProofError::invalid(
                &self.name,
                "substore root does not match committed root",
            ));
        }
        Ok(merkle::root_of_map(&self.roots))
    }
}
