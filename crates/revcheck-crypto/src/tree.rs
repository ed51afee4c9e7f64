use revcheck_types::LedgerHash;

use crate::combine::HashCombiner;
use crate::error::VerifyResult;
use crate::proof::Proof;

/// Binary hash tree over revision hashes, built with the order-normalizing
/// combiner.
///
/// Because the combiner sorts each pair, proofs need no left/right
/// markers: a proof is just the sibling hashes from the leaf upward. An odd
/// node at the end of a level is promoted unchanged (the same as combining
/// it with the empty hash).
#[derive(Clone, Debug)]
pub struct ProofTree {
    /// The root hash of the tree.
    root: LedgerHash,
    /// All tree nodes, stored level by level.
    /// Level 0 = leaves, last element = root.
    levels: Vec<Vec<LedgerHash>>,
}

impl ProofTree {
    /// Build a tree from leaf hashes.
    ///
    /// An empty list produces an empty root. A single leaf is its own root.
    pub fn from_leaves(leaves: Vec<LedgerHash>, combiner: &HashCombiner) -> VerifyResult<Self> {
        if leaves.is_empty() {
            return Ok(Self {
                root: LedgerHash::empty(),
                levels: vec![],
            });
        }

        let mut levels: Vec<Vec<LedgerHash>> = vec![leaves];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let node = match pair {
                    [left, right] => combiner.combine(left.as_bytes(), right.as_bytes())?,
                    _ => pair[0].clone(),
                };
                next.push(node);
            }
            levels.push(next);
        }

        let root = levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_default();
        Ok(Self { root, levels })
    }

    /// The root hash of the tree.
    pub fn root(&self) -> &LedgerHash {
        &self.root
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Sibling path for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<Proof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            // A promoted odd node has no sibling at this level.
            if let Some(sibling) = level.get(sibling_idx) {
                path.push(sibling.clone());
            }
            idx /= 2;
        }

        Some(Proof::new(path))
    }
}
