//! Merkle Tree over Block Evidence
//!
//! Binary hash tree over an ordered list of leaf digests. At every level an
//! unpaired last node is paired with itself, so the root, and every proof,
//! is fully determined by the leaf order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::digest::{hash_pair, Digest};
use crate::error::{LedgerError, Result};

/// Root of an empty leaf list.
pub const EMPTY_ROOT: Digest = Digest::ZERO;

/// Side of the path node on which a proof sibling sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Left,
    Right,
}

/// One step of a Merkle proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub position: Position,
}

impl ProofStep {
    fn apply(&self, current: &Digest) -> Digest {
        match self.position {
            Position::Left => hash_pair(&self.sibling, current),
            Position::Right => hash_pair(current, &self.sibling),
        }
    }
}

/// Sibling path from a leaf up to the root, ordered bottom-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root this proof leads to from `leaf`.
    pub fn compute_root(&self, leaf: &Digest) -> Digest {
        self.steps
            .iter()
            .fold(*leaf, |current, step| step.apply(&current))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn next_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two nodes"),
        })
        .collect()
}

/// Build the Merkle root of `leaves`.
pub fn build_root(leaves: &[Digest]) -> Digest {
    if leaves.is_empty() {
        return EMPTY_ROOT;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }

    debug!("Merkle root over {} leaves: {}", leaves.len(), level[0]);
    level[0]
}

/// Build the proof for the first occurrence of `target` in `leaves`.
pub fn build_proof(leaves: &[Digest], target: &Digest) -> Result<MerkleProof> {
    let mut index = leaves
        .iter()
        .position(|leaf| leaf == target)
        .ok_or_else(|| LedgerError::leaf_not_found(target))?;

    let mut steps = Vec::new();
    let mut level = leaves.to_vec();

    while level.len() > 1 {
        let step = if index % 2 == 0 {
            // A node without a right neighbour is paired with itself.
            let sibling = level.get(index + 1).copied().unwrap_or(level[index]);
            ProofStep {
                sibling,
                position: Position::Right,
            }
        } else {
            ProofStep {
                sibling: level[index - 1],
                position: Position::Left,
            }
        };
        steps.push(step);

        level = next_level(&level);
        index /= 2;
    }

    Ok(MerkleProof { steps })
}

/// Replay `proof` from `leaf` and compare against `claimed_root`.
pub fn verify_proof(leaf: &Digest, proof: &MerkleProof, claimed_root: &Digest) -> bool {
    proof.compute_root(leaf) == *claimed_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::digest::digest;

    fn leaves(count: usize) -> Vec<Digest> {
        (0..count)
            .map(|i| digest(format!("leaf-{}", i).as_bytes()))
            .collect()
    }

    #[test]
    fn test_empty_and_single_leaf() {
        assert_eq!(build_root(&[]), EMPTY_ROOT);

        let only = digest(b"only");
        assert_eq!(build_root(&[only]), only);

        let proof = build_proof(&[only], &only).unwrap();
        assert!(proof.is_empty());
        assert!(verify_proof(&only, &proof, &only));
    }

    #[test]
    fn test_two_leaves() {
        let l = leaves(2);
        assert_eq!(build_root(&l), hash_pair(&l[0], &l[1]));
    }

    #[test]
    fn test_three_leaves_duplicate_last() {
        let l = leaves(3);
        let expected = hash_pair(&hash_pair(&l[0], &l[1]), &hash_pair(&l[2], &l[2]));
        assert_eq!(build_root(&l), expected);
    }

    #[test]
    fn test_odd_rule_applies_at_every_level() {
        // 5 leaves: level1 has 3 nodes, so the odd rule fires twice.
        let l = leaves(5);
        let a = hash_pair(&l[0], &l[1]);
        let b = hash_pair(&l[2], &l[3]);
        let c = hash_pair(&l[4], &l[4]);
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(build_root(&l), expected);
    }

    #[test]
    fn test_proof_for_every_leaf() {
        for count in 1..=17 {
            let l = leaves(count);
            let root = build_root(&l);
            for leaf in &l {
                let proof = build_proof(&l, leaf).unwrap();
                assert!(
                    verify_proof(leaf, &proof, &root),
                    "proof failed for {} leaves",
                    count
                );
            }
        }
    }

    #[test]
    fn test_proof_length_is_logarithmic() {
        let l = leaves(9);
        let proof = build_proof(&l, &l[8]).unwrap();
        assert_eq!(proof.len(), 4);
    }

    #[test]
    fn test_self_paired_step_is_right() {
        let l = leaves(3);
        let proof = build_proof(&l, &l[2]).unwrap();
        assert_eq!(
            proof.steps[0],
            ProofStep {
                sibling: l[2],
                position: Position::Right
            }
        );
        assert_eq!(proof.steps[1].position, Position::Left);
    }

    #[test]
    fn test_missing_leaf() {
        let l = leaves(4);
        let err = build_proof(&l, &digest(b"absent")).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(build_proof(&[], &l[0]).is_err());
    }

    #[test]
    fn test_tampered_proof_fails() {
        let l = leaves(6);
        let root = build_root(&l);
        let mut proof = build_proof(&l, &l[3]).unwrap();
        proof.steps[1].sibling = digest(b"forged");
        assert!(!verify_proof(&l[3], &proof, &root));

        let mut flipped = build_proof(&l, &l[3]).unwrap();
        flipped.steps[0].position = Position::Right;
        assert!(!verify_proof(&l[3], &flipped, &root));
    }

    #[test]
    fn test_proof_serializes_positions() {
        let l = leaves(2);
        let proof = build_proof(&l, &l[1]).unwrap();
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["steps"][0]["position"], "LEFT");
        assert_eq!(json["steps"][0]["sibling"], l[0].to_hex());
    }
}
