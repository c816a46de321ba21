use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::{Bytes, Uint};
use tessera_crypto::hash::{DataHash, UnsupportedHashAlgorithm};

use crate::hashing;

#[derive(Debug, Error)]
pub enum PathError {
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedHashAlgorithm),
}

/// Outcome of re-verifying a [`MerkleTreePath`] against a requested key.
///
/// `path_valid` states that the steps hash back to the committed root;
/// `path_included` additionally states that the path terminates in a leaf
/// at exactly the requested key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathVerificationResult {
    pub path_valid: bool,
    pub path_included: bool,
}

impl PathVerificationResult {
    pub(crate) fn invalid() -> Self {
        Self {
            path_valid: false,
            path_included: false,
        }
    }
}

/// One level of a [`MerkleTreePath`], deepest level first.
///
/// The first step describes the node where the walk ended: a leaf
/// (`value` set), a diverging fork (`children` set), or an absent branch
/// (neither set). Later steps describe the ancestor forks up to the root;
/// for those only the edge label and the sibling digest matter. The side
/// a node takes under its parent is the lowest bit of its own label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTreeStep {
    pub(crate) path: BigUint,
    pub(crate) value: Option<Vec<u8>>,
    pub(crate) children: Option<DataHash>,
    pub(crate) sibling: Option<DataHash>,
}

/// Path through a sparse merkle tree, re-verifiable without the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTreePath {
    pub(crate) root: DataHash,
    pub(crate) steps: Vec<MerkleTreeStep>,
}

impl MerkleTreePath {
    pub fn root(&self) -> &DataHash {
        &self.root
    }

    /// Value of the terminal leaf, when the walk ended in one.
    pub fn leaf_value(&self) -> Option<&[u8]> {
        self.steps.first().and_then(|step| step.value.as_deref())
    }

    /// Recompute the root from the steps and compare positions.
    ///
    /// Fails only when the committed root names an algorithm this engine
    /// cannot apply; structural defects degrade to `path_valid: false`.
    pub fn verify(&self, key: &BigUint) -> Result<PathVerificationResult, PathError> {
        self.root.algorithm()?;

        let first = match self.steps.first() {
            Some(step) => step,
            None => return Ok(PathVerificationResult::invalid()),
        };

        let mut node = match (&first.value, &first.children) {
            (Some(value), None) => Some(hashing::leaf_hash(&first.path, value)),
            (None, Some(children)) => Some(hashing::fork_hash(&first.path, children)),
            (None, None) => None,
            (Some(_), Some(_)) => return Ok(PathVerificationResult::invalid()),
        };

        let mut location = first.path.clone();
        let mut prev = first;

        for step in &self.steps[1..] {
            let children = combine(prev, node.as_ref());
            node = Some(hashing::fork_hash(&step.path, &children));
            location = hashing::merge(&step.path, &location);
            prev = step;
        }

        let top = combine(prev, node.as_ref());
        let path_valid = top == self.root;
        let path_included = path_valid && first.value.is_some() && location == *key;

        Ok(PathVerificationResult {
            path_valid,
            path_included,
        })
    }
}

fn combine(step: &MerkleTreeStep, node: Option<&DataHash>) -> DataHash {
    if step.path.bit(0) {
        hashing::children_hash(step.sibling.as_ref(), node)
    } else {
        hashing::children_hash(node, step.sibling.as_ref())
    }
}

/* Wire forms ************************************************************** */

#[derive(Serialize, Deserialize)]
struct StepJson {
    path: Uint,
    value: Option<Bytes>,
    children: Option<DataHash>,
    sibling: Option<DataHash>,
}

#[derive(Serialize, Deserialize)]
struct PathJson {
    root: DataHash,
    steps: Vec<StepJson>,
}

impl Serialize for MerkleTreePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let dto = PathJson {
            root: self.root.clone(),
            steps: self
                .steps
                .iter()
                .map(|step| StepJson {
                    path: Uint::new(step.path.clone()),
                    value: step.value.clone().map(Bytes::from),
                    children: step.children.clone(),
                    sibling: step.sibling.clone(),
                })
                .collect(),
        };

        dto.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MerkleTreePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dto = PathJson::deserialize(deserializer)?;

        Ok(MerkleTreePath {
            root: dto.root,
            steps: dto
                .steps
                .into_iter()
                .map(|step| MerkleTreeStep {
                    path: step.path.into(),
                    value: step.value.map(Vec::from),
                    children: step.children,
                    sibling: step.sibling,
                })
                .collect(),
        })
    }
}

impl<C> minicbor::Encode<C> for MerkleTreeStep {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(4)?;
        e.bytes(&self.path.to_bytes_be())?;

        match &self.value {
            Some(value) => e.bytes(value)?,
            None => e.null()?,
        };

        match &self.children {
            Some(children) => e.bytes(&children.imprint())?,
            None => e.null()?,
        };

        match &self.sibling {
            Some(sibling) => e.bytes(&sibling.imprint())?,
            None => e.null()?,
        };

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for MerkleTreeStep {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let len = d.array()?;
        if len != Some(4) {
            return Err(minicbor::decode::Error::message("expected 4-element step"));
        }

        let path = BigUint::from_bytes_be(d.bytes()?);
        let value = decode_optional_bytes(d)?;
        let children = decode_optional_hash(d)?;
        let sibling = decode_optional_hash(d)?;

        Ok(MerkleTreeStep {
            path,
            value,
            children,
            sibling,
        })
    }
}

impl<C> minicbor::Encode<C> for MerkleTreePath {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.bytes(&self.root.imprint())?;
        e.array(self.steps.len() as u64)?;

        for step in &self.steps {
            step.encode(e, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for MerkleTreePath {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let len = d.array()?;
        if len != Some(2) {
            return Err(minicbor::decode::Error::message("expected 2-element path"));
        }

        let root = DataHash::from_imprint(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;

        let count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected definite step list"))?;

        let mut steps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            steps.push(MerkleTreeStep::decode(d, ctx)?);
        }

        Ok(MerkleTreePath { root, steps })
    }
}

pub(crate) fn decode_optional_bytes(
    d: &mut minicbor::Decoder<'_>,
) -> Result<Option<Vec<u8>>, minicbor::decode::Error> {
    if d.datatype()? == minicbor::data::Type::Null {
        d.null()?;
        Ok(None)
    } else {
        Ok(Some(d.bytes()?.to_vec()))
    }
}

pub(crate) fn decode_optional_hash(
    d: &mut minicbor::Decoder<'_>,
) -> Result<Option<DataHash>, minicbor::decode::Error> {
    if d.datatype()? == minicbor::data::Type::Null {
        d.null()?;
        Ok(None)
    } else {
        let hash = DataHash::from_imprint(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;
        Ok(Some(hash))
    }
}
