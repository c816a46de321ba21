//! In-memory aggregator and flow helpers shared by the scenario tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;

use tessera_client::{
    wait_inclusion_proof, AggregatorClient, AggregatorError, StateTransitionClient,
    SubmitCommitmentResponse, SubmitCommitmentStatus,
};
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::DataHash;
use tessera_primitives::address::{Address, DirectAddress};
use tessera_primitives::authenticator::Authenticator;
use tessera_primitives::coin::TokenCoinData;
use tessera_primitives::identifiers::{TokenId, TokenType};
use tessera_primitives::inclusion_proof::{leaf_value, InclusionProof};
use tessera_primitives::request_id::RequestId;
use tessera_primitives::state::TokenState;
use tessera_primitives::token::Token;
use tessera_primitives::transaction::MintReason;
use tessera_smt::SparseMerkleTree;

pub const POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const POLL_DEADLINE: Duration = Duration::from_secs(2);

/// Aggregator double backed by a real sparse merkle tree, so every
/// served proof re-verifies exactly like a production one.
#[derive(Default)]
pub struct TestAggregator {
    state: Mutex<AggregatorState>,
}

#[derive(Default)]
struct AggregatorState {
    leaves: BTreeMap<BigUint, Vec<u8>>,
    records: HashMap<String, (Authenticator, DataHash)>,
}

#[async_trait]
impl AggregatorClient for TestAggregator {
    async fn submit_commitment(
        &self,
        request_id: &RequestId,
        transaction_hash: &DataHash,
        authenticator: &Authenticator,
        _receipt: bool,
    ) -> Result<SubmitCommitmentResponse, AggregatorError> {
        if !authenticator.verify(transaction_hash) {
            return Ok(response(SubmitCommitmentStatus::AuthenticatorVerificationFailed));
        }

        if authenticator.request_id() != *request_id {
            return Ok(response(SubmitCommitmentStatus::RequestIdMismatch));
        }

        let mut state = self.state.lock().unwrap();
        let key = request_id.to_string();

        if let Some((_, existing)) = state.records.get(&key) {
            if existing == transaction_hash {
                return Ok(response(SubmitCommitmentStatus::Success));
            }
            return Ok(response(SubmitCommitmentStatus::RequestIdExists));
        }

        state
            .leaves
            .insert(request_id.to_path(), leaf_value(authenticator, transaction_hash));
        state
            .records
            .insert(key, (authenticator.clone(), transaction_hash.clone()));

        Ok(response(SubmitCommitmentStatus::Success))
    }

    async fn get_inclusion_proof(
        &self,
        request_id: &RequestId,
        _block_num: Option<u64>,
    ) -> Result<Option<InclusionProof>, AggregatorError> {
        let state = self.state.lock().unwrap();

        let mut tree = SparseMerkleTree::new();
        for (path, value) in &state.leaves {
            tree.add_leaf(path.clone(), value.clone())
                .expect("request paths are fixed-width and unique");
        }

        let path = tree.get_path(&request_id.to_path());

        let proof = match state.records.get(&request_id.to_string()) {
            Some((authenticator, transaction_hash)) => InclusionProof::new(
                path,
                Some(authenticator.clone()),
                Some(transaction_hash.clone()),
            ),
            None => InclusionProof::new(path, None, None),
        }
        .expect("authenticator and hash travel together");

        Ok(Some(proof))
    }

    async fn get_no_deletion_proof(
        &self,
        _request_id: &RequestId,
    ) -> Result<Vec<u8>, AggregatorError> {
        Ok(Vec::new())
    }
}

/// Aggregator double that never answers, for deadline tests.
pub struct SilentAggregator;

#[async_trait]
impl AggregatorClient for SilentAggregator {
    async fn submit_commitment(
        &self,
        _request_id: &RequestId,
        _transaction_hash: &DataHash,
        _authenticator: &Authenticator,
        _receipt: bool,
    ) -> Result<SubmitCommitmentResponse, AggregatorError> {
        Ok(response(SubmitCommitmentStatus::Success))
    }

    async fn get_inclusion_proof(
        &self,
        _request_id: &RequestId,
        _block_num: Option<u64>,
    ) -> Result<Option<InclusionProof>, AggregatorError> {
        Ok(None)
    }

    async fn get_no_deletion_proof(
        &self,
        _request_id: &RequestId,
    ) -> Result<Vec<u8>, AggregatorError> {
        Ok(Vec::new())
    }
}

fn response(status: SubmitCommitmentStatus) -> SubmitCommitmentResponse {
    SubmitCommitmentResponse { status }
}

/// Mint a token paying into `state` and assemble the token value.
#[allow(clippy::too_many_arguments)]
pub async fn mint(
    client: &StateTransitionClient<TestAggregator>,
    state: TokenState,
    token_id: TokenId,
    token_type: TokenType,
    token_data: Bytes,
    coin_data: Option<TokenCoinData>,
    salt: Bytes,
    reason: Option<MintReason>,
) -> Token {
    let recipient: Address =
        DirectAddress::create(state.unlock_predicate().reference().clone()).into();

    let commitment = client
        .submit_mint_transaction(
            recipient, token_id, token_type, token_data, coin_data, salt, None, reason,
        )
        .await
        .expect("mint submission");

    let proof = wait_inclusion_proof(
        client.aggregator(),
        commitment.request_id(),
        POLL_INTERVAL,
        POLL_DEADLINE,
    )
    .await
    .expect("mint inclusion");

    let genesis = client
        .create_transaction(commitment, proof)
        .expect("mint transaction");

    Token::create(state, genesis, Vec::new()).expect("mint token")
}
