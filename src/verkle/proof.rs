//! Multipoint opening proofs over tree paths.
//!
//! A proof opens every node polynomial traversed on the walk from the root
//! to each proven path. Prover and verifier derive the opening set with the
//! same deterministic walk (paths sorted byte-lexicographically, one query
//! per traversed node position, first-seen wins on shared prefixes), so a
//! verifier holding an equal tree reproduces the prover's transcript
//! exactly. A verifier opening a different path set, or holding different
//! contents, fails the check.

use super::{Node, NodeCommitments, VerkleTree, PRECOMPUTED_WEIGHTS, TREE_CRS, TREE_WIDTH};
use crate::proof::ProofError;
use crate::types::{TreePath, STEM_LEN};
use ipa_multipoint::{
    lagrange_basis::LagrangeBasis,
    multiproof::{MultiPoint, MultiPointProof, ProverQuery, VerifierQuery},
    transcript::Transcript,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

/// Domain separation label for proof transcripts.
const TRANSCRIPT_LABEL: &[u8] = b"vks";

/// Create an opening proof for `paths` against the current tree contents.
pub fn make_multiproof(tree: &VerkleTree, paths: &[TreePath]) -> Result<Vec<u8>, ProofError> {
    let queries = opening_queries(tree, paths)?;
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
    let proof = MultiPoint::open(
        TREE_CRS.clone(),
        &PRECOMPUTED_WEIGHTS,
        &mut transcript,
        queries,
    );
    proof
        .to_bytes()
        .map_err(|e| ProofError::ProveFailed(e.to_string()))
}

/// Check an opening proof for `paths` against the given tree contents.
pub fn check_multiproof(
    tree: &VerkleTree,
    paths: &[TreePath],
    proof_bytes: &[u8],
) -> Result<(), ProofError> {
    let queries: Vec<VerifierQuery> = opening_queries(tree, paths)?
        .into_iter()
        .map(Into::into)
        .collect();
    if proof_bytes.len() < 32 {
        return Err(ProofError::VerifyFailed("proof blob too short".to_string()));
    }
    let proof = MultiPointProof::from_bytes(proof_bytes, TREE_WIDTH)
        .map_err(|e| ProofError::VerifyFailed(e.to_string()))?;
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
    if proof.check(&TREE_CRS, &PRECOMPUTED_WEIGHTS, &queries, &mut transcript) {
        Ok(())
    } else {
        Err(ProofError::VerifyFailed(
            "multipoint proof check failed".to_string(),
        ))
    }
}

/// Openings for a set of proven paths, in the deterministic order shared by
/// prover and verifier.
fn opening_queries(
    tree: &VerkleTree,
    paths: &[TreePath],
) -> Result<Vec<ProverQuery>, ProofError> {
    let mut paths = paths.to_vec();
    if paths.is_empty() {
        return Err(ProofError::ProveFailed("empty path set".to_string()));
    }
    let needs_sorting = paths.windows(2).any(|w| w[0] > w[1]);
    if needs_sorting {
        paths.par_sort_unstable();
    }
    paths.dedup();

    let commits = tree.commitments();
    let mut queries = Vec::new();
    let mut seen = FxHashSet::default();
    for path in &paths {
        path_queries(tree, &commits, path, &mut queries, &mut seen);
    }
    Ok(queries)
}

fn path_queries(
    tree: &VerkleTree,
    commits: &NodeCommitments,
    path: &TreePath,
    queries: &mut Vec<ProverQuery>,
    seen: &mut FxHashSet<(Vec<u8>, usize)>,
) {
    let mut children = &tree.root;
    let mut prefix: Vec<u8> = Vec::new();
    let mut depth = 0usize;
    loop {
        push_query(queries, seen, commits, &prefix, path[depth] as usize);
        match children.get(&path[depth]) {
            // The walk opened a zero slot: absence is proven at this level.
            None => return,
            Some(Node::Internal(next)) => {
                prefix.push(path[depth]);
                children = next;
                depth += 1;
            }
            Some(Node::Stem { .. }) => {
                prefix.push(path[depth]);
                // Open the stem polynomial at the proven suffix. For a
                // divergent stem this reveals the occupant's slot value;
                // the witness tree walk on the verifier side lands on the
                // same opening.
                push_query(queries, seen, commits, &prefix, path[STEM_LEN] as usize);
                return;
            }
        }
    }
}

fn push_query(
    queries: &mut Vec<ProverQuery>,
    seen: &mut FxHashSet<(Vec<u8>, usize)>,
    commits: &NodeCommitments,
    prefix: &[u8],
    point: usize,
) {
    if !seen.insert((prefix.to_vec(), point)) {
        return;
    }
    let (commitment, poly) = commits.node(prefix);
    queries.push(ProverQuery {
        commitment: *commitment,
        poly: LagrangeBasis::new(poly.clone()),
        point,
        result: poly[point],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn seeded_tree(n: u64) -> (VerkleTree, Vec<TreePath>) {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = VerkleTree::new();
        let mut paths = Vec::new();
        for _ in 0..n {
            let path: TreePath = rng.gen();
            tree.insert(path, rng.gen());
            paths.push(path);
        }
        (tree, paths)
    }

    #[test]
    fn test_single_membership_proof() {
        let (tree, paths) = seeded_tree(8);
        let proof = make_multiproof(&tree, &paths[..1]).unwrap();
        check_multiproof(&tree, &paths[..1], &proof).unwrap();
    }

    #[test]
    fn test_absence_proof() {
        let (tree, _) = seeded_tree(8);
        let absent = hash(b"MYABSENTKEY");
        let proof = make_multiproof(&tree, &[absent]).unwrap();
        check_multiproof(&tree, &[absent], &proof).unwrap();
    }

    #[test]
    fn test_absence_proof_on_empty_tree() {
        let tree = VerkleTree::new();
        let absent = hash(b"MYABSENTKEY");
        let proof = make_multiproof(&tree, &[absent]).unwrap();
        check_multiproof(&tree, &[absent], &proof).unwrap();
    }

    #[test]
    fn test_batch_proof_mixed_membership() {
        let (tree, mut paths) = seeded_tree(16);
        paths.push(hash(b"MYABSENTKEY"));
        let proof = make_multiproof(&tree, &paths).unwrap();
        check_multiproof(&tree, &paths, &proof).unwrap();
    }

    #[test]
    fn test_path_order_does_not_matter() {
        let (tree, paths) = seeded_tree(6);
        let proof = make_multiproof(&tree, &paths).unwrap();
        let mut reversed = paths.clone();
        reversed.reverse();
        check_multiproof(&tree, &reversed, &proof).unwrap();
    }

    #[test]
    fn test_wrong_path_set_rejected() {
        let (tree, paths) = seeded_tree(4);
        let proof = make_multiproof(&tree, &paths[..2]).unwrap();
        // Opening fewer or different paths than proven diverges the
        // transcript.
        assert!(check_multiproof(&tree, &paths[..1], &proof).is_err());
        assert!(check_multiproof(&tree, &paths[1..3], &proof).is_err());
    }

    #[test]
    fn test_mutated_tree_rejected() {
        let (mut tree, paths) = seeded_tree(4);
        let proof = make_multiproof(&tree, &paths).unwrap();
        tree.insert(paths[0], [0xAAu8; 32]);
        assert!(check_multiproof(&tree, &paths, &proof).is_err());
    }

    #[test]
    fn test_corrupted_proof_rejected() {
        let (tree, paths) = seeded_tree(2);
        let mut proof = make_multiproof(&tree, &paths).unwrap();
        proof[0] ^= 1;
        assert!(check_multiproof(&tree, &paths, &proof).is_err());
        assert!(check_multiproof(&tree, &paths, &[]).is_err());
    }

    #[test]
    fn test_empty_path_set_rejected() {
        let (tree, _) = seeded_tree(2);
        assert!(make_multiproof(&tree, &[]).is_err());
    }
}
