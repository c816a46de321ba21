//! The burn-for-split flow.
//!
//! Splitting a token burns it behind a commitment to the successor coin
//! allocations, then mints each successor with a proof tying it back to
//! that commitment. This module builds the trees, the burn predicate and
//! the burn transfer; the successor mints reuse the returned trees.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use rand::RngCore;
use tracing::debug;

use tessera_codec::utils::{Bytes, Uint};
use tessera_crypto::hash::DataHash;
use tessera_crypto::key::SigningKey;
use tessera_primitives::address::{Address, DirectAddress};
use tessera_primitives::coin::TokenCoinData;
use tessera_primitives::identifiers::{CoinId, TokenId};
use tessera_primitives::predicate::BurnPredicate;
use tessera_primitives::split::{coin_tree_leaf, BurnReason, SplitProof};
use tessera_primitives::token::Token;
use tessera_primitives::transaction::{MintReason, TransactionData};
use tessera_smt::{SparseMerkleSumTree, SparseMerkleTree};

use crate::api::AggregatorClient;
use crate::client::{ClientError, Commitment, StateTransitionClient};

/// Everything a caller needs to finish a split: the burn commitment and
/// the trees the successor mints take their proofs from.
pub struct SplitResult {
    pub commitment: Commitment<TransactionData>,
    pub burn_predicate: BurnPredicate,
    pub new_token_ids: Vec<TokenId>,
    pub all_coins_tree: SparseMerkleTree,
    pub coin_trees: BTreeMap<CoinId, SparseMerkleSumTree>,
}

impl SplitResult {
    /// Mint reason for the successor at `index` claiming `coins`.
    pub fn mint_reason(
        &self,
        burned_token: &Token,
        index: usize,
        coins: &TokenCoinData,
    ) -> Result<MintReason, ClientError> {
        Ok(MintReason::Split(SplitProof::create(
            burned_token.clone(),
            &self.new_token_ids[index],
            coins,
            &self.all_coins_tree,
            &self.coin_trees,
        )?))
    }
}

impl<A: AggregatorClient> StateTransitionClient<A> {
    /// Burn `token` for a split into `coins_per_new_token` successors.
    ///
    /// Builds the per-coin sum trees and the outer tree over them,
    /// derives the burn predicate from the outer root, and submits a
    /// regular transfer whose recipient is the burn predicate's address.
    /// The allocation must redistribute the token's coins exactly.
    pub async fn submit_burn_transaction_for_split(
        &self,
        token: &Token,
        coins_per_new_token: &[Vec<(CoinId, Uint)>],
        signing_key: &SigningKey,
        salt: Bytes,
        data_hash: Option<DataHash>,
        message: Option<Bytes>,
    ) -> Result<SplitResult, ClientError> {
        let source_coins = token.coins().ok_or(ClientError::NoCoinsToSplit)?;

        check_allocation(source_coins, coins_per_new_token)?;

        let (new_token_ids, burn_predicate, all_coins_tree, coin_trees) = {
            let mut rng = rand::rng();

            let new_token_ids: Vec<TokenId> = (0..coins_per_new_token.len())
                .map(|_| {
                    let mut id = [0u8; 32];
                    rng.fill_bytes(&mut id);
                    TokenId::new(id)
                })
                .collect();

            let mut coin_trees: BTreeMap<CoinId, SparseMerkleSumTree> = BTreeMap::new();
            for (index, allocation) in coins_per_new_token.iter().enumerate() {
                for (coin_id, amount) in allocation {
                    coin_trees.entry(coin_id.clone()).or_default().add_leaf(
                        new_token_ids[index].to_path(),
                        Vec::new(),
                        BigUint::from(amount.clone()),
                    )?;
                }
            }

            let mut all_coins_tree = SparseMerkleTree::new();
            for (coin_id, tree) in &coin_trees {
                all_coins_tree.add_leaf(coin_id.to_path(), coin_tree_leaf(&tree.root()))?;
            }

            let mut nonce = [0u8; 32];
            rng.fill_bytes(&mut nonce);

            let burn_predicate = BurnPredicate::new(
                *token.id(),
                token.token_type().clone(),
                Bytes::from(nonce),
                BurnReason::new(all_coins_tree.root()),
            );

            (new_token_ids, burn_predicate, all_coins_tree, coin_trees)
        };

        debug!(
            token = %token.id(),
            successors = new_token_ids.len(),
            "burning token for split"
        );

        let recipient: Address =
            DirectAddress::create(burn_predicate.reference().clone()).into();

        let data = TransactionData::create(
            token.state().clone(),
            recipient,
            salt,
            data_hash,
            message,
            Vec::new(),
        );

        let commitment = self.submit_transaction(data, signing_key).await?;

        Ok(SplitResult {
            commitment,
            burn_predicate,
            new_token_ids,
            all_coins_tree,
            coin_trees,
        })
    }
}

/// The allocation must cover exactly the source coins: same coin ids,
/// same totals, at least one successor.
fn check_allocation(
    source: &TokenCoinData,
    coins_per_new_token: &[Vec<(CoinId, Uint)>],
) -> Result<(), ClientError> {
    if coins_per_new_token.is_empty() {
        return Err(ClientError::SplitAllocationMismatch);
    }

    let mut totals: BTreeMap<CoinId, BigUint> = BTreeMap::new();
    for allocation in coins_per_new_token {
        for (coin_id, amount) in allocation {
            *totals.entry(coin_id.clone()).or_default() += amount.as_biguint();
        }
    }

    if totals.len() != source.len() {
        return Err(ClientError::SplitAllocationMismatch);
    }

    for (coin_id, amount) in source.coins() {
        if totals.get(coin_id) != Some(amount.as_biguint()) {
            return Err(ClientError::SplitAllocationMismatch);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(byte: u8) -> CoinId {
        CoinId::new(vec![byte; 32])
    }

    fn source() -> TokenCoinData {
        TokenCoinData::new(vec![(coin(1), Uint::from(10)), (coin(2), Uint::from(20))]).unwrap()
    }

    #[test]
    fn exact_redistribution_passes() {
        let allocation = vec![
            vec![(coin(1), Uint::from(10)), (coin(2), Uint::from(5))],
            vec![(coin(2), Uint::from(15))],
        ];

        assert!(check_allocation(&source(), &allocation).is_ok());
    }

    #[test]
    fn shortfall_is_rejected() {
        let allocation = vec![vec![(coin(1), Uint::from(10)), (coin(2), Uint::from(19))]];

        assert!(matches!(
            check_allocation(&source(), &allocation),
            Err(ClientError::SplitAllocationMismatch)
        ));
    }

    #[test]
    fn foreign_coin_is_rejected() {
        let allocation = vec![vec![
            (coin(1), Uint::from(10)),
            (coin(2), Uint::from(20)),
            (coin(3), Uint::from(1)),
        ]];

        assert!(matches!(
            check_allocation(&source(), &allocation),
            Err(ClientError::SplitAllocationMismatch)
        ));
    }

    #[test]
    fn empty_split_is_rejected() {
        assert!(matches!(
            check_allocation(&source(), &[]),
            Err(ClientError::SplitAllocationMismatch)
        ));
    }
}
