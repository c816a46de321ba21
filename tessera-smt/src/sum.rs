use std::collections::BTreeMap;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::{Bytes, Uint};
use tessera_crypto::hash::DataHash;

use crate::hashing;
use crate::path::{
    decode_optional_bytes, decode_optional_hash, PathError, PathVerificationResult,
};
use crate::tree::{check_placement, TreeError};

/// Sparse merkle tree whose leaves carry a numeric value next to their
/// byte value; every node commits to the sum of the numeric values below
/// it, so an inclusion path also proves one addend of the root sum.
#[derive(Clone, Debug, Default)]
pub struct SparseMerkleSumTree {
    leaves: BTreeMap<BigUint, (Vec<u8>, BigUint)>,
}

struct Node {
    label: BigUint,
    hash: DataHash,
    sum: BigUint,
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

impl SparseMerkleSumTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn add_leaf(
        &mut self,
        path: BigUint,
        value: Vec<u8>,
        sum: BigUint,
    ) -> Result<(), TreeError> {
        check_placement(self.leaves.keys(), &path)?;
        self.leaves.insert(path, (value, sum));
        Ok(())
    }

    pub fn root(&self) -> DataHash {
        let (left, right) = self.subtrees();
        let zero = BigUint::default();

        hashing::sum_children_hash(
            left.as_ref().map(|n| &n.hash),
            left.as_ref().map(|n| &n.sum).unwrap_or(&zero),
            right.as_ref().map(|n| &n.hash),
            right.as_ref().map(|n| &n.sum).unwrap_or(&zero),
        )
    }

    /// Total of the numeric values across all leaves.
    pub fn sum(&self) -> BigUint {
        self.leaves.values().map(|(_, sum)| sum).sum()
    }

    /// Extract the path for `key`, inclusion or non-inclusion.
    pub fn get_path(&self, key: &BigUint) -> SumTreePath {
        let root = self.root();
        let sum = self.sum();
        let (left, right) = self.subtrees();

        let (entry, other) = if key.bit(0) {
            (right, left)
        } else {
            (left, right)
        };
        let sibling = other.map(|n| (n.hash, n.sum));

        let steps = match entry {
            None => vec![SumTreeStep {
                path: key.clone(),
                value: None,
                sum: None,
                children: None,
                sibling,
            }],
            Some(node) => walk(node, key.clone(), sibling),
        };

        SumTreePath { root, sum, steps }
    }

    fn subtrees(&self) -> (Option<Node>, Option<Node>) {
        let mut left = Vec::new();
        let mut right = Vec::new();

        for (path, (value, sum)) in &self.leaves {
            if path.bit(0) {
                right.push((path.clone(), value.clone(), sum.clone()));
            } else {
                left.push((path.clone(), value.clone(), sum.clone()));
            }
        }

        (build(left), build(right))
    }
}

fn build(entries: Vec<(BigUint, Vec<u8>, BigUint)>) -> Option<Node> {
    if entries.is_empty() {
        return None;
    }

    if entries.len() == 1 {
        let (label, value, sum) = entries.into_iter().next().expect("one entry");
        let hash = hashing::sum_leaf_hash(&label, &value, &sum);
        return Some(Node {
            label,
            hash,
            sum,
            kind: NodeKind::Leaf { value },
        });
    }

    let split = divergence_bit(&entries);
    let label = {
        let mut label = hashing::low_bits(&entries[0].0, split);
        label.set_bit(split, true);
        label
    };

    let mut left = Vec::new();
    let mut right = Vec::new();

    for (path, value, sum) in entries {
        let rest = path >> split;
        if rest.bit(0) {
            right.push((rest, value, sum));
        } else {
            left.push((rest, value, sum));
        }
    }

    let left = build(left).expect("divergence puts entries on both sides");
    let right = build(right).expect("divergence puts entries on both sides");
    let children =
        hashing::sum_children_hash(Some(&left.hash), &left.sum, Some(&right.hash), &right.sum);
    let sum = &left.sum + &right.sum;
    let hash = hashing::fork_hash(&label, &children);

    Some(Node {
        label,
        hash,
        sum,
        kind: NodeKind::Fork {
            children,
            left: Box::new(left),
            right: Box::new(right),
        },
    })
}

fn divergence_bit(entries: &[(BigUint, Vec<u8>, BigUint)]) -> u64 {
    let probe = &entries[0].0;
    let limit = entries
        .iter()
        .map(|(path, _, _)| hashing::payload_bits(path))
        .min()
        .unwrap_or(0);

    for i in 0..limit {
        let bit = probe.bit(i);
        if entries.iter().any(|(path, _, _)| path.bit(i) != bit) {
            return i;
        }
    }

    // unreachable with suffix-checked leaves
    limit
}

fn walk(top: Node, key: BigUint, top_sibling: Option<(DataHash, BigUint)>) -> Vec<SumTreeStep> {
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
                steps.push(SumTreeStep {
                    path: node.label,
                    value: Some(value),
                    sum: Some(node.sum),
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
                    steps.push(SumTreeStep {
                        path: node.label,
                        value: None,
                        sum: Some(node.sum),
                        children: Some(children),
                        sibling,
                    });
                    break;
                }

                steps.push(SumTreeStep {
                    path: node.label,
                    value: None,
                    sum: None,
                    children: None,
                    sibling,
                });

                remaining >>= span;
                let (next, next_sibling) = if remaining.bit(0) {
                    (right, left)
                } else {
                    (left, right)
                };

                sibling = Some((next_sibling.hash, next_sibling.sum));
                node = *next;
            }
        }
    }

    steps.reverse();
    steps
}

/// One level of a [`SumTreePath`], deepest level first; the same layout
/// as a plain merkle step with the node and sibling sums alongside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumTreeStep {
    pub(crate) path: BigUint,
    pub(crate) value: Option<Vec<u8>>,
    pub(crate) sum: Option<BigUint>,
    pub(crate) children: Option<DataHash>,
    pub(crate) sibling: Option<(DataHash, BigUint)>,
}

/// Path through a sparse merkle sum tree, re-verifiable without the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumTreePath {
    pub(crate) root: DataHash,
    pub(crate) sum: BigUint,
    pub(crate) steps: Vec<SumTreeStep>,
}

impl SumTreePath {
    pub fn root(&self) -> &DataHash {
        &self.root
    }

    /// The committed total across all leaves.
    pub fn sum(&self) -> &BigUint {
        &self.sum
    }

    /// Numeric value of the terminal leaf, when the walk ended in one.
    pub fn leaf_sum(&self) -> Option<&BigUint> {
        self.steps.first().and_then(|step| {
            if step.value.is_some() {
                step.sum.as_ref()
            } else {
                None
            }
        })
    }

    /// Byte value of the terminal leaf, when the walk ended in one.
    pub fn leaf_value(&self) -> Option<&[u8]> {
        self.steps.first().and_then(|step| step.value.as_deref())
    }

    /// Recompute root hash and root sum from the steps.
    pub fn verify(&self, key: &BigUint) -> Result<PathVerificationResult, PathError> {
        self.root.algorithm()?;

        let first = match self.steps.first() {
            Some(step) => step,
            None => return Ok(PathVerificationResult::invalid()),
        };

        let zero = BigUint::default();

        let mut node: Option<(DataHash, BigUint)> = match (&first.value, &first.children) {
            (Some(value), None) => {
                let sum = first.sum.clone().unwrap_or_default();
                Some((hashing::sum_leaf_hash(&first.path, value, &sum), sum))
            }
            (None, Some(children)) => {
                let sum = first.sum.clone().unwrap_or_default();
                Some((hashing::fork_hash(&first.path, children), sum))
            }
            (None, None) => None,
            (Some(_), Some(_)) => return Ok(PathVerificationResult::invalid()),
        };

        let mut location = first.path.clone();
        let mut prev = first;

        for step in &self.steps[1..] {
            let (children, sum) = combine(prev, node.as_ref(), &zero);
            node = Some((hashing::fork_hash(&step.path, &children), sum));
            location = hashing::merge(&step.path, &location);
            prev = step;
        }

        let (top, total) = combine(prev, node.as_ref(), &zero);
        let path_valid = top == self.root && total == self.sum;
        let path_included = path_valid && first.value.is_some() && location == *key;

        Ok(PathVerificationResult {
            path_valid,
            path_included,
        })
    }
}

fn combine(
    step: &SumTreeStep,
    node: Option<&(DataHash, BigUint)>,
    zero: &BigUint,
) -> (DataHash, BigUint) {
    let node_hash = node.map(|(hash, _)| hash);
    let node_sum = node.map(|(_, sum)| sum).unwrap_or(zero);
    let sibling_hash = step.sibling.as_ref().map(|(hash, _)| hash);
    let sibling_sum = step.sibling.as_ref().map(|(_, sum)| sum).unwrap_or(zero);

    let hash = if step.path.bit(0) {
        hashing::sum_children_hash(sibling_hash, sibling_sum, node_hash, node_sum)
    } else {
        hashing::sum_children_hash(node_hash, node_sum, sibling_hash, sibling_sum)
    };

    (hash, node_sum + sibling_sum)
}

/* Wire forms ************************************************************** */

#[derive(Serialize, Deserialize)]
struct SumStepJson {
    path: Uint,
    value: Option<Bytes>,
    sum: Option<Uint>,
    children: Option<DataHash>,
    sibling: Option<(DataHash, Uint)>,
}

#[derive(Serialize, Deserialize)]
struct SumPathJson {
    root: DataHash,
    sum: Uint,
    steps: Vec<SumStepJson>,
}

impl Serialize for SumTreePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let dto = SumPathJson {
            root: self.root.clone(),
            sum: Uint::new(self.sum.clone()),
            steps: self
                .steps
                .iter()
                .map(|step| SumStepJson {
                    path: Uint::new(step.path.clone()),
                    value: step.value.clone().map(Bytes::from),
                    sum: step.sum.clone().map(Uint::new),
                    children: step.children.clone(),
                    sibling: step
                        .sibling
                        .clone()
                        .map(|(hash, sum)| (hash, Uint::new(sum))),
                })
                .collect(),
        };

        dto.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SumTreePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dto = SumPathJson::deserialize(deserializer)?;

        Ok(SumTreePath {
            root: dto.root,
            sum: dto.sum.into(),
            steps: dto
                .steps
                .into_iter()
                .map(|step| SumTreeStep {
                    path: step.path.into(),
                    value: step.value.map(Vec::from),
                    sum: step.sum.map(BigUint::from),
                    children: step.children,
                    sibling: step.sibling.map(|(hash, sum)| (hash, sum.into())),
                })
                .collect(),
        })
    }
}

impl<C> minicbor::Encode<C> for SumTreeStep {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(5)?;
        e.bytes(&self.path.to_bytes_be())?;

        match &self.value {
            Some(value) => e.bytes(value)?,
            None => e.null()?,
        };

        match &self.sum {
            Some(sum) => e.bytes(&sum.to_bytes_be())?,
            None => e.null()?,
        };

        match &self.children {
            Some(children) => e.bytes(&children.imprint())?,
            None => e.null()?,
        };

        match &self.sibling {
            Some((hash, sum)) => {
                e.array(2)?;
                e.bytes(&hash.imprint())?;
                e.bytes(&sum.to_bytes_be())?
            }
            None => e.null()?,
        };

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for SumTreeStep {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let len = d.array()?;
        if len != Some(5) {
            return Err(minicbor::decode::Error::message("expected 5-element step"));
        }

        let path = BigUint::from_bytes_be(d.bytes()?);
        let value = decode_optional_bytes(d)?;
        let sum = decode_optional_bytes(d)?.map(|bytes| BigUint::from_bytes_be(&bytes));
        let children = decode_optional_hash(d)?;

        let sibling = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            let len = d.array()?;
            if len != Some(2) {
                return Err(minicbor::decode::Error::message(
                    "expected 2-element sibling",
                ));
            }
            let hash = DataHash::from_imprint(d.bytes()?)
                .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;
            let sum = BigUint::from_bytes_be(d.bytes()?);
            Some((hash, sum))
        };

        Ok(SumTreeStep {
            path,
            value,
            sum,
            children,
            sibling,
        })
    }
}

impl<C> minicbor::Encode<C> for SumTreePath {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(3)?;
        e.bytes(&self.root.imprint())?;
        e.bytes(&self.sum.to_bytes_be())?;
        e.array(self.steps.len() as u64)?;

        for step in &self.steps {
            step.encode(e, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for SumTreePath {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let len = d.array()?;
        if len != Some(3) {
            return Err(minicbor::decode::Error::message("expected 3-element path"));
        }

        let root = DataHash::from_imprint(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;
        let sum = BigUint::from_bytes_be(d.bytes()?);

        let count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected definite step list"))?;

        let mut steps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            steps.push(SumTreeStep::decode(d, ctx)?);
        }

        Ok(SumTreePath { root, sum, steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf_path;

    fn entries() -> Vec<([u8; 32], u64)> {
        vec![([0x11; 32], 10), ([0x22; 32], 20), ([0x33; 32], 5)]
    }

    fn tree() -> SparseMerkleSumTree {
        let mut tree = SparseMerkleSumTree::new();
        for (path, sum) in entries() {
            tree.add_leaf(leaf_path(&path), Vec::new(), BigUint::from(sum))
                .unwrap();
        }
        tree
    }

    #[test]
    fn root_sum_is_the_total() {
        assert_eq!(tree().sum(), BigUint::from(35u8));
    }

    #[test]
    fn leaves_prove_their_addend() {
        let tree = tree();

        for (path, sum) in entries() {
            let key = leaf_path(&path);
            let path = tree.get_path(&key);
            let result = path.verify(&key).unwrap();

            assert!(result.path_valid);
            assert!(result.path_included);
            assert_eq!(path.leaf_sum(), Some(&BigUint::from(sum)));
            assert_eq!(path.sum(), &BigUint::from(35u8));
        }
    }

    #[test]
    fn absent_key_is_not_included() {
        let tree = tree();
        let key = leaf_path(&[0x44; 32]);

        let result = tree.get_path(&key).verify(&key).unwrap();
        assert!(result.path_valid);
        assert!(!result.path_included);
    }

    #[test]
    fn tampered_sum_invalidates_the_path() {
        let tree = tree();
        let key = leaf_path(&[0x11; 32]);

        let mut path = tree.get_path(&key);
        path.sum = BigUint::from(36u8);

        let result = path.verify(&key).unwrap();
        assert!(!result.path_valid);
    }

    #[test]
    fn json_round_trip() {
        let tree = tree();
        let key = leaf_path(&[0x22; 32]);
        let path = tree.get_path(&key);

        let json = serde_json::to_string(&path).unwrap();
        let back: SumTreePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
