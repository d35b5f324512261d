//! Binary Merkle tree over Blake2b-256.
//!
//! Leaves and interior nodes are domain-separated (`0x00` / `0x01`
//! prefixes) so a leaf can never be passed off as an interior node. An odd
//! node at the end of a level is promoted unchanged to the next level.
//!
//! The tree keeps every level in memory and updates only the rightmost
//! path on append, so appends cost `O(log n)` hashes and proofs for
//! earlier positions stay available after any number of later appends.

use edgevote_crypto::blake2b_256_multi;
use edgevote_types::MerkleHash;
use serde::{Deserialize, Serialize};

/// Root of a tree with no leaves.
pub const EMPTY_ROOT: MerkleHash = MerkleHash::ZERO;

const LEAF_PREFIX: &[u8] = &[0x00];
const NODE_PREFIX: &[u8] = &[0x01];

pub fn leaf_hash(data: &[u8]) -> MerkleHash {
    MerkleHash::new(blake2b_256_multi(&[LEAF_PREFIX, data]))
}

pub fn node_hash(left: &MerkleHash, right: &MerkleHash) -> MerkleHash {
    MerkleHash::new(blake2b_256_multi(&[
        NODE_PREFIX,
        left.as_bytes(),
        right.as_bytes(),
    ]))
}

/// Root over already-hashed leaves, in order.
pub fn merkle_root(leaves: impl IntoIterator<Item = MerkleHash>) -> MerkleHash {
    let mut tree = MerkleTree::new();
    for leaf in leaves {
        tree.push(leaf);
    }
    tree.root()
}

/// Which side of the running hash a proof sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: MerkleHash,
    pub side: Side,
}

/// Inclusion proof for one leaf against a root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    pub position: u64,
    pub leaf: MerkleHash,
    pub siblings: Vec<ProofStep>,
    pub root: MerkleHash,
}

impl MerkleProof {
    /// Recompute the root from the leaf and siblings and compare.
    pub fn verify(&self) -> bool {
        self.computed_root() == self.root
    }

    /// Like [`verify`](Self::verify), and also check the proof is for
    /// `data` rather than some other leaf.
    pub fn verify_leaf_data(&self, data: &[u8]) -> bool {
        leaf_hash(data) == self.leaf && self.verify()
    }

    fn computed_root(&self) -> MerkleHash {
        self.siblings
            .iter()
            .fold(self.leaf, |acc, step| match step.side {
                Side::Left => node_hash(&step.hash, &acc),
                Side::Right => node_hash(&acc, &step.hash),
            })
    }
}

/// Incrementally built Merkle tree.
#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves; the last level holds the root.
    levels: Vec<Vec<MerkleHash>>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leaves(leaves: impl IntoIterator<Item = MerkleHash>) -> Self {
        let mut tree = Self::new();
        for leaf in leaves {
            tree.push(leaf);
        }
        tree
    }

    pub fn len(&self) -> u64 {
        self.levels.first().map_or(0, |l| l.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> MerkleHash {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or(EMPTY_ROOT)
    }

    pub fn leaf(&self, position: u64) -> Option<MerkleHash> {
        self.levels.first()?.get(position as usize).copied()
    }

    /// Append a leaf hash and return its position.
    pub fn push(&mut self, leaf: MerkleHash) -> u64 {
        if self.levels.is_empty() {
            self.levels.push(Vec::new());
        }
        self.levels[0].push(leaf);
        let position = self.levels[0].len() as u64 - 1;

        // Only the rightmost node of each level can change.
        let mut level = 0;
        while self.levels[level].len() > 1 {
            let idx = self.levels[level].len() - 1;
            let parent = if idx % 2 == 1 {
                node_hash(&self.levels[level][idx - 1], &self.levels[level][idx])
            } else {
                self.levels[level][idx]
            };
            if self.levels.len() == level + 1 {
                self.levels.push(Vec::new());
            }
            let above = &mut self.levels[level + 1];
            let parent_idx = idx / 2;
            if parent_idx == above.len() {
                above.push(parent);
            } else {
                above[parent_idx] = parent;
            }
            level += 1;
        }
        position
    }

    /// Proof for `position` against the current root.
    pub fn proof(&self, position: u64) -> Option<MerkleProof> {
        let leaf = self.leaf(position)?;
        let mut siblings = Vec::new();
        let mut idx = position as usize;
        for level in &self.levels {
            if level.len() <= 1 {
                break;
            }
            if idx % 2 == 1 {
                siblings.push(ProofStep {
                    hash: level[idx - 1],
                    side: Side::Left,
                });
            } else if idx + 1 < level.len() {
                siblings.push(ProofStep {
                    hash: level[idx + 1],
                    side: Side::Right,
                });
            }
            idx /= 2;
        }
        Some(MerkleProof {
            position,
            leaf,
            siblings,
            root: self.root(),
        })
    }
}
