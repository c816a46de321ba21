//! Split proofs: the cryptographic link between a burned token and the
//! successor tokens minted from it.
//!
//! At burn time the owner commits to an outer sparse merkle tree keyed by
//! coin id, whose leaves commit to inner sum trees keyed by successor
//! token id. The commitment (the outer root) rides inside the burn
//! predicate's reference, on-ledger. Each successor mint then proves its
//! own slice of every coin it claims, and the sum-tree roots enforce coin
//! conservation across all successors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_crypto::hash::DataHash;
use tessera_smt::{MerkleTreePath, PathError, SparseMerkleSumTree, SparseMerkleTree, SumTreePath};

use crate::coin::TokenCoinData;
use crate::identifiers::{CoinId, TokenId};
use crate::token::{Token, TokenJson};

#[derive(Debug, Error)]
pub enum SplitProofError {
    #[error("burned token state is not a burn predicate")]
    NotBurned,

    #[error("split mint declares no coins")]
    MissingCoinData,

    #[error("no burn proof for coin {0}")]
    MissingCoin(CoinId),

    #[error("burn proof for coin {0} is not part of the minted coin data")]
    ExtraCoin(CoinId),

    #[error("outer path for coin {0} does not include the coin")]
    OuterPathNotIncluded(CoinId),

    #[error("inner path for coin {0} does not include the minted token")]
    InnerPathNotIncluded(CoinId),

    #[error("outer leaf for coin {0} does not commit to the inner sum root")]
    RootBindingMismatch(CoinId),

    #[error("inner leaf for coin {0} does not carry the minted amount")]
    AmountMismatch(CoinId),

    #[error("outer root does not match the burn commitment")]
    BurnCommitmentMismatch,

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Commitment a burn predicate carries: the root of the outer tree over
/// the successor tokens' coin allocations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnReason {
    new_tokens_tree_hash: DataHash,
}

impl BurnReason {
    pub fn new(new_tokens_tree_hash: DataHash) -> Self {
        Self {
            new_tokens_tree_hash,
        }
    }

    pub fn new_tokens_tree_hash(&self) -> &DataHash {
        &self.new_tokens_tree_hash
    }
}

impl<C> minicbor::Encode<C> for BurnReason {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(1)?;
        self.new_tokens_tree_hash.encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for BurnReason {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(1) {
            return Err(minicbor::decode::Error::message(
                "expected 1-element burn reason",
            ));
        }

        Ok(Self {
            new_tokens_tree_hash: DataHash::decode(d, ctx)?,
        })
    }
}

/// The outer-leaf byte value committing to an inner sum tree: the hex
/// text of the inner root imprint.
pub fn coin_tree_leaf(inner_root: &DataHash) -> Vec<u8> {
    inner_root.to_string().into_bytes()
}

/// Per-coin pair of paths carried by a split mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitProofPaths {
    outer: MerkleTreePath,
    inner: SumTreePath,
}

impl SplitProofPaths {
    pub fn outer(&self) -> &MerkleTreePath {
        &self.outer
    }

    pub fn inner(&self) -> &SumTreePath {
        &self.inner
    }
}

/// Proof that a minted token is a legitimate successor of a burned one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitProof {
    burned_token: Box<Token>,
    proofs: Vec<(CoinId, SplitProofPaths)>,
}

impl SplitProof {
    /// Collect the paths for one successor out of the trees built at burn
    /// time. Consistency with the minted coin data is *not* checked here;
    /// that is the verifier's job.
    pub fn create(
        burned_token: Token,
        new_token_id: &TokenId,
        coins: &TokenCoinData,
        all_coins_tree: &SparseMerkleTree,
        coin_trees: &BTreeMap<CoinId, SparseMerkleSumTree>,
    ) -> Result<Self, SplitProofError> {
        let mut proofs = Vec::with_capacity(coins.len());

        for (coin_id, _) in coins.coins() {
            let tree = coin_trees
                .get(coin_id)
                .ok_or_else(|| SplitProofError::MissingCoin(coin_id.clone()))?;

            proofs.push((
                coin_id.clone(),
                SplitProofPaths {
                    outer: all_coins_tree.get_path(&coin_id.to_path()),
                    inner: tree.get_path(&new_token_id.to_path()),
                },
            ));
        }

        Ok(Self {
            burned_token: Box::new(burned_token),
            proofs,
        })
    }

    pub fn new(burned_token: Token, proofs: Vec<(CoinId, SplitProofPaths)>) -> Self {
        Self {
            burned_token: Box::new(burned_token),
            proofs,
        }
    }

    pub fn burned_token(&self) -> &Token {
        &self.burned_token
    }

    pub fn proofs(&self) -> &[(CoinId, SplitProofPaths)] {
        &self.proofs
    }

    /// Check a successor mint against the burn commitment:
    ///
    /// (a) the outer path includes the coin id;
    /// (b) the inner path includes the minted token id;
    /// (c) the outer leaf commits to the inner sum root;
    /// (d) the inner leaf carries exactly the minted amount;
    /// (e) the outer root equals the burned token's commitment;
    /// (f) proved coin ids and minted coin ids coincide.
    pub fn verify(
        &self,
        token_id: &TokenId,
        coin_data: Option<&TokenCoinData>,
    ) -> Result<(), SplitProofError> {
        let reason = self
            .burned_token
            .state()
            .unlock_predicate()
            .as_burn()
            .ok_or(SplitProofError::NotBurned)?
            .reason();

        let coins = match coin_data {
            Some(coins) if !coins.is_empty() => coins,
            _ => return Err(SplitProofError::MissingCoinData),
        };

        for (coin_id, amount) in coins.coins() {
            let paths = self
                .proofs
                .iter()
                .find(|(id, _)| id == coin_id)
                .map(|(_, paths)| paths)
                .ok_or_else(|| SplitProofError::MissingCoin(coin_id.clone()))?;

            let outer = paths.outer.verify(&coin_id.to_path())?;
            if !outer.path_included {
                return Err(SplitProofError::OuterPathNotIncluded(coin_id.clone()));
            }

            let inner = paths.inner.verify(&token_id.to_path())?;
            if !inner.path_included {
                return Err(SplitProofError::InnerPathNotIncluded(coin_id.clone()));
            }

            let expected_leaf = coin_tree_leaf(paths.inner.root());
            if paths.outer.leaf_value() != Some(expected_leaf.as_slice()) {
                return Err(SplitProofError::RootBindingMismatch(coin_id.clone()));
            }

            if paths.inner.leaf_sum() != Some(amount.as_biguint()) {
                return Err(SplitProofError::AmountMismatch(coin_id.clone()));
            }

            if paths.outer.root() != reason.new_tokens_tree_hash() {
                return Err(SplitProofError::BurnCommitmentMismatch);
            }
        }

        for (coin_id, _) in &self.proofs {
            if coins.get(coin_id).is_none() {
                return Err(SplitProofError::ExtraCoin(coin_id.clone()));
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> SplitProofJson {
        SplitProofJson {
            burned_token: self.burned_token.to_json(),
            proofs: self
                .proofs
                .iter()
                .map(|(coin_id, paths)| SplitProofEntryJson {
                    coin_id: coin_id.clone(),
                    outer: paths.outer.clone(),
                    inner: paths.inner.clone(),
                })
                .collect(),
        }
    }

    pub(crate) fn decode_cbor(
        d: &mut minicbor::Decoder<'_>,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "expected 2-element split proof",
            ));
        }

        let burned_token = Token::decode_cbor(d)?;

        let count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected definite proof list"))?;

        let mut proofs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if d.array()? != Some(3) {
                return Err(minicbor::decode::Error::message("expected proof triple"));
            }

            let coin_id = CoinId::decode(d, &mut ())?;
            let outer = MerkleTreePath::decode(d, &mut ())?;
            let inner = SumTreePath::decode(d, &mut ())?;
            proofs.push((coin_id, SplitProofPaths { outer, inner }));
        }

        Ok(Self {
            burned_token: Box::new(burned_token),
            proofs,
        })
    }
}

impl<C> minicbor::Encode<C> for SplitProof {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.burned_token.encode(e, ctx)?;
        e.array(self.proofs.len() as u64)?;

        for (coin_id, paths) in &self.proofs {
            e.array(3)?;
            coin_id.encode(e, ctx)?;
            paths.outer.encode(e, ctx)?;
            paths.inner.encode(e, ctx)?;
        }

        Ok(())
    }
}

/// Wire form of a split proof.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitProofJson {
    pub burned_token: TokenJson,
    pub proofs: Vec<SplitProofEntryJson>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitProofEntryJson {
    pub coin_id: CoinId,
    pub outer: MerkleTreePath,
    pub inner: SumTreePath,
}

impl SplitProofJson {
    /// Paths-only reconstruction; the burned token itself is replayed by
    /// the token factory, which owns ledger validation.
    pub(crate) fn paths(&self) -> Vec<(CoinId, SplitProofPaths)> {
        self.proofs
            .iter()
            .map(|entry| {
                (
                    entry.coin_id.clone(),
                    SplitProofPaths {
                        outer: entry.outer.clone(),
                        inner: entry.inner.clone(),
                    },
                )
            })
            .collect()
    }
}
