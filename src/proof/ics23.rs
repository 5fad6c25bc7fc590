//! ICS-23 style commitment proof envelope.
//!
//! The envelope is the self-describing wire form of a substore proof. The
//! Verkle variant carries the proven tree's full key/value witness plus the
//! opaque multipoint opening blob; the witness key and value arrays must
//! have equal length or the receiver rejects the proof.

use crate::proof::ProofError;
use crate::types::{TreeLeaf, TreePath};
use crate::verkle::VerkleTree;
use serde::{Deserialize, Serialize};

/// Commitment proof envelope. Only the Verkle variant is produced by this
/// crate; the enum keeps the variant tag on the wire so other commitment
/// schemes can share the envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentProof {
    /// A Verkle tree proof with its full witness.
    Verkle(VerkleProof),
}

impl CommitmentProof {
    /// Serialize the envelope for embedding in a proof op.
    pub fn encode(&self) -> Result<Vec<u8>, ProofError> {
        bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| ProofError::Decode(e.to_string()))
    }

    /// Decode an envelope, re-validating the witness shape.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProofError> {
        let (proof, _): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
                .map_err(|e| ProofError::Decode(e.to_string()))?;
        let CommitmentProof::Verkle(verkle) = &proof;
        verkle.validate()?;
        Ok(proof)
    }
}

/// Verkle commitment proof: witness paths, witness leaves, opening blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerkleProof {
    /// Tree paths of the witness, one per entry.
    pub keys: Vec<TreePath>,
    /// Tree leaves of the witness, matching `keys` by index.
    pub values: Vec<TreeLeaf>,
    /// Serialized multipoint opening proof.
    pub proof: Vec<u8>,
}

impl VerkleProof {
    /// Assemble a proof, rejecting mismatched witness arrays.
    pub fn new(
        keys: Vec<TreePath>,
        values: Vec<TreeLeaf>,
        proof: Vec<u8>,
    ) -> Result<Self, ProofError> {
        let out = Self {
            keys,
            values,
            proof,
        };
        out.validate()?;
        Ok(out)
    }

    fn validate(&self) -> Result<(), ProofError> {
        if self.keys.len() != self.values.len() {
            return Err(ProofError::Decode(format!(
                "witness key/value length mismatch: {} keys, {} values",
                self.keys.len(),
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Rebuild the throwaway witness tree the proof was generated against.
    pub fn witness_tree(&self) -> VerkleTree {
        let mut tree = VerkleTree::new();
        for (path, leaf) in self.keys.iter().zip(self.values.iter()) {
            tree.insert(*path, *leaf);
        }
        tree
    }
}
