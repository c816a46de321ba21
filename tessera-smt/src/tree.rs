use std::collections::BTreeMap;

use num_bigint::BigUint;
use thiserror::Error;

use tessera_crypto::hash::DataHash;

use crate::hashing;
use crate::path::{MerkleTreePath, MerkleTreeStep};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("leaf path must carry at least one bit beyond the sentinel")]
    InvalidPath,

    #[error("leaf {0} already present")]
    DuplicateLeaf(BigUint),

    #[error("leaf {0} is a bit-suffix of leaf {1}")]
    LeafCollision(BigUint, BigUint),
}

/// Sparse merkle tree over sentinelized big-uint paths.
///
/// Leaves accumulate and the node structure is derived on demand: the
/// tree anchors a handful of leaves on the client side, so rebuilding per
/// query stays cheap and keeps the stored state minimal.
#[derive(Clone, Debug, Default)]
pub struct SparseMerkleTree {
    leaves: BTreeMap<BigUint, Vec<u8>>,
}

struct Node {
    label: BigUint,
    hash: DataHash,
    kind: NodeKind,
}

enum NodeKind {
    Leaf {
        value: Vec<u8>,
    },
    Fork {
        children: DataHash,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn add_leaf(&mut self, path: BigUint, value: Vec<u8>) -> Result<(), TreeError> {
        check_placement(self.leaves.keys(), &path)?;
        self.leaves.insert(path, value);
        Ok(())
    }

    pub fn root(&self) -> DataHash {
        let (left, right) = self.subtrees();
        hashing::children_hash(
            left.as_ref().map(|n| &n.hash),
            right.as_ref().map(|n| &n.hash),
        )
    }

    /// Extract the path for `key`: an inclusion path when a leaf sits at
    /// `key`, otherwise a non-inclusion path proving what the walk hit.
    pub fn get_path(&self, key: &BigUint) -> MerkleTreePath {
        let root = self.root();
        let (left, right) = self.subtrees();

        let (entry, other) = if key.bit(0) {
            (right, left)
        } else {
            (left, right)
        };
        let sibling = other.map(|n| n.hash);

        let steps = match entry {
            None => vec![MerkleTreeStep {
                path: key.clone(),
                value: None,
                children: None,
                sibling,
            }],
            Some(node) => walk(node, key.clone(), sibling),
        };

        MerkleTreePath { root, steps }
    }

    fn subtrees(&self) -> (Option<Node>, Option<Node>) {
        let mut left = Vec::new();
        let mut right = Vec::new();

        for (path, value) in &self.leaves {
            if path.bit(0) {
                right.push((path.clone(), value.clone()));
            } else {
                left.push((path.clone(), value.clone()));
            }
        }

        (build(left), build(right))
    }
}

pub(crate) fn check_placement<'a>(
    existing: impl Iterator<Item = &'a BigUint>,
    path: &BigUint,
) -> Result<(), TreeError> {
    if hashing::payload_bits(path) == 0 {
        return Err(TreeError::InvalidPath);
    }

    for present in existing {
        if present == path {
            return Err(TreeError::DuplicateLeaf(path.clone()));
        }
        if hashing::is_bit_suffix(path, present) {
            return Err(TreeError::LeafCollision(path.clone(), present.clone()));
        }
        if hashing::is_bit_suffix(present, path) {
            return Err(TreeError::LeafCollision(present.clone(), path.clone()));
        }
    }

    Ok(())
}

fn build(entries: Vec<(BigUint, Vec<u8>)>) -> Option<Node> {
    if entries.is_empty() {
        return None;
    }

    if entries.len() == 1 {
        let (label, value) = entries.into_iter().next().expect("one entry");
        let hash = hashing::leaf_hash(&label, &value);
        return Some(Node {
            label,
            hash,
            kind: NodeKind::Leaf { value },
        });
    }

    // all entries share their lowest bits up to the first divergence;
    // that shared run becomes this fork's edge label
    let split = divergence_bit(&entries);
    let label = {
        let mut label = hashing::low_bits(&entries[0].0, split);
        label.set_bit(split, true);
        label
    };

    let mut left = Vec::new();
    let mut right = Vec::new();

    for (path, value) in entries {
        let rest = path >> split;
        if rest.bit(0) {
            right.push((rest, value));
        } else {
            left.push((rest, value));
        }
    }

    let left = build(left).expect("divergence puts entries on both sides");
    let right = build(right).expect("divergence puts entries on both sides");
    let children = hashing::children_hash(Some(&left.hash), Some(&right.hash));
    let hash = hashing::fork_hash(&label, &children);

    Some(Node {
        label,
        hash,
        kind: NodeKind::Fork {
            children,
            left: Box::new(left),
            right: Box::new(right),
        },
    })
}

fn divergence_bit(entries: &[(BigUint, Vec<u8>)]) -> u64 {
    let probe = &entries[0].0;
    let limit = entries
        .iter()
        .map(|(path, _)| hashing::payload_bits(path))
        .min()
        .unwrap_or(0);

    for i in 0..limit {
        let bit = probe.bit(i);
        if entries.iter().any(|(path, _)| path.bit(i) != bit) {
            return i;
        }
    }

    // unreachable with suffix-checked leaves
    limit
}

fn walk(top: Node, key: BigUint, top_sibling: Option<DataHash>) -> Vec<MerkleTreeStep> {
    let mut steps = Vec::new();
    let mut node = top;
    let mut sibling = top_sibling;
    let mut remaining = key;

    loop {
        let span = hashing::payload_bits(&node.label);
        let matches = hashing::payload_bits(&remaining) >= span
            && hashing::low_bits(&remaining, span) == hashing::payload(&node.label);

        match node.kind {
            NodeKind::Leaf { value } => {
                // terminal either way; a mismatching label turns this
                // into a non-inclusion path
                steps.push(MerkleTreeStep {
                    path: node.label,
                    value: Some(value),
                    children: None,
                    sibling,
                });
                break;
            }
            NodeKind::Fork {
                children,
                left,
                right,
            } => {
                if !matches || hashing::payload_bits(&remaining) == span {
                    // the key diverges from this edge or dies on it
                    steps.push(MerkleTreeStep {
                        path: node.label,
                        value: None,
                        children: Some(children),
                        sibling,
                    });
                    break;
                }

                steps.push(MerkleTreeStep {
                    path: node.label,
                    value: None,
                    children: None,
                    sibling,
                });

                remaining >>= span;
                let (next, next_sibling) = if remaining.bit(0) {
                    (right, left)
                } else {
                    (left, right)
                };

                sibling = Some(next_sibling.hash);
                node = *next;
            }
        }
    }

    steps.reverse();
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf_path;

    fn tree(entries: &[(&[u8], &[u8])]) -> SparseMerkleTree {
        let mut tree = SparseMerkleTree::new();
        for (path, value) in entries {
            tree.add_leaf(leaf_path(path), value.to_vec()).unwrap();
        }
        tree
    }

    #[test]
    fn empty_tree_serves_non_inclusion() {
        let tree = SparseMerkleTree::new();
        let key = leaf_path(&[0x42]);

        let path = tree.get_path(&key);
        let result = path.verify(&key).unwrap();

        assert!(result.path_valid);
        assert!(!result.path_included);
    }

    #[test]
    fn single_leaf_inclusion() {
        let tree = tree(&[(&[0xaa; 32], b"value")]);
        let key = leaf_path(&[0xaa; 32]);

        let path = tree.get_path(&key);
        assert_eq!(path.leaf_value(), Some(b"value".as_ref()));

        let result = path.verify(&key).unwrap();
        assert!(result.path_valid);
        assert!(result.path_included);
    }

    #[test]
    fn many_leaves_all_verify() {
        let entries: Vec<[u8; 32]> = (1u8..=16).map(|i| [i; 32]).collect();
        let mut tree = SparseMerkleTree::new();
        for entry in &entries {
            tree.add_leaf(leaf_path(entry), entry.to_vec()).unwrap();
        }

        for entry in &entries {
            let key = leaf_path(entry);
            let path = tree.get_path(&key);
            let result = path.verify(&key).unwrap();

            assert!(result.path_valid);
            assert!(result.path_included);
            assert_eq!(path.leaf_value(), Some(entry.as_ref()));
        }
    }

    #[test]
    fn absent_key_is_not_included() {
        let tree = tree(&[(&[0xaa; 32], b"a"), (&[0xbb; 32], b"b")]);
        let key = leaf_path(&[0xcc; 32]);

        let result = tree.get_path(&key).verify(&key).unwrap();
        assert!(result.path_valid);
        assert!(!result.path_included);
    }

    #[test]
    fn path_does_not_verify_under_another_root() {
        let one = tree(&[(&[0xaa; 32], b"a")]);
        let two = tree(&[(&[0xaa; 32], b"tampered")]);

        let key = leaf_path(&[0xaa; 32]);
        let mut path = one.get_path(&key);
        path.root = two.root();

        let result = path.verify(&key).unwrap();
        assert!(!result.path_valid);
        assert!(!result.path_included);
    }

    #[test]
    fn duplicate_leaf_is_rejected() {
        let mut tree = tree(&[(&[0xaa; 32], b"a")]);
        assert_eq!(
            tree.add_leaf(leaf_path(&[0xaa; 32]), b"b".to_vec()),
            Err(TreeError::DuplicateLeaf(leaf_path(&[0xaa; 32])))
        );
    }

    #[test]
    fn suffix_leaf_is_rejected() {
        // "u" is a bit-suffix of "au": both end in the same low byte
        let mut tree = SparseMerkleTree::new();
        tree.add_leaf(leaf_path(b"u"), b"a".to_vec()).unwrap();

        let result = tree.add_leaf(leaf_path(b"au"), b"b".to_vec());
        assert!(matches!(result, Err(TreeError::LeafCollision(_, _))));
    }

    #[test]
    fn roots_differ_per_content() {
        let one = tree(&[(&[0xaa; 32], b"a")]);
        let two = tree(&[(&[0xaa; 32], b"b")]);
        let three = tree(&[(&[0xab; 32], b"a")]);

        assert_ne!(one.root(), two.root());
        assert_ne!(one.root(), three.root());
    }
}
