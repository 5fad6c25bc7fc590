//! Proof operators chaining a substore commitment into the multistore root.
//!
//! A query with proof returns an ordered [`ProofOps`] chain. Ops are
//! consumed left to right; each op's output root is the next op's sole
//! input. The first op must be the Verkle operator (type tag [`PROOF_TYPE_IPA`])
//! proving keys inside one substore; any subsequent op must be the
//! substore-binding operator committing that substore's root into the
//! multistore root.

use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ics23;
pub mod op;

pub use ics23::{CommitmentProof, VerkleProof};
pub use op::{decode_op, MultistoreOp, ProofOperator, VerkleOp};

/// Op type tag of the Verkle Pedersen+IPA proof operator.
pub const PROOF_TYPE_IPA: &str = "ipa";

/// Op type tag of the simple-merkle substore-binding operator.
pub const PROOF_TYPE_SIMPLE: &str = "simple:v";

/// Error type for proof construction, codec, and verification.
///
/// `InvalidProof` echoes the operand key for diagnostics but never carries
/// witness contents.
#[derive(Debug, Error)]
pub enum ProofError {
    /// Prove error.
    #[error("prove failed: {0}")]
    ProveFailed(String),
    /// Verify error.
    #[error("verify failed: {0}")]
    VerifyFailed(String),
    /// A proof op ran but did not verify its claim.
    #[error("invalid proof for key {key}: {reason}")]
    InvalidProof { key: String, reason: String },
    /// A proof op or envelope failed to decode.
    #[error("malformed proof: {0}")]
    Decode(String),
}

impl ProofError {
    pub(crate) fn invalid(key: &[u8], reason: impl Into<String>) -> Self {
        ProofError::InvalidProof {
            key: hex::encode(key),
            reason: reason.into(),
        }
    }
}

/// Wire record for one link of a proof chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOp {
    /// Operator type tag; selects the decoder.
    pub op_type: String,
    /// The key the op binds: the key under proof for the Verkle op, the
    /// substore name for the binding op.
    pub key: Vec<u8>,
    /// Operator payload, self-describing under the type tag.
    pub data: Vec<u8>,
}

/// Ordered list of proof ops, consumed left to right.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
pub struct ProofOps(pub Vec<ProofOp>);

impl ProofOps {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }
}
