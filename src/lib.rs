#![doc = include_str!("../README.md")]

pub mod hash;
pub mod multistore;
pub mod proof;
pub mod store;
pub mod types;
pub mod verkle;

pub use multistore::{
    snapshot::{SnapshotItem, SNAPSHOT_FORMAT},
    verify_proof_ops, MultiStore, QueryRequest, QueryResponse,
};
pub use proof::{
    decode_op, CommitmentProof, MultistoreOp, ProofError, ProofOp, ProofOperator, ProofOps,
    VerkleOp, VerkleProof, PROOF_TYPE_IPA, PROOF_TYPE_SIMPLE,
};
pub use store::{KvDb, KvStore, MemDb, PrefixDb, ProvableStore, StoreError, Substore};
pub use types::{CommitId, Digest, TreeLeaf, TreePath, ZERO_LEAF};
pub use verkle::{TreeError, VerkleTree};
