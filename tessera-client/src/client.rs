use thiserror::Error;
use tracing::debug;

use tessera_codec::utils::Bytes;
use tessera_crypto::hash::DataHash;
use tessera_crypto::key::ed25519::PublicKey;
use tessera_crypto::key::SigningKey;
use tessera_primitives::address::Address;
use tessera_primitives::authenticator::Authenticator;
use tessera_primitives::coin::TokenCoinData;
use tessera_primitives::identifiers::{TokenId, TokenType};
use tessera_primitives::inclusion_proof::{InclusionProof, InclusionProofStatus, ProofError};
use tessera_primitives::minter::{mint_source, minter_key};
use tessera_primitives::request_id::RequestId;
use tessera_primitives::split::SplitProofError;
use tessera_primitives::state::TokenState;
use tessera_primitives::token::{Token, TokenError};
use tessera_primitives::transaction::{
    MintReason, MintTransactionData, Transaction, TransactionData, TransactionPayload,
};
use tessera_smt::TreeError;

use crate::api::{AggregatorClient, AggregatorError, SubmitCommitmentStatus};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to unlock token")]
    FailedToUnlock,

    #[error("Invalid inclusion proof hash algorithm.")]
    InvalidHashAlgorithm,

    #[error("Payload hash mismatch")]
    PayloadHashMismatch,

    #[error("inclusion proof is not usable: {0:?}")]
    ProofStatus(InclusionProofStatus),

    #[error("aggregator rejected the commitment: {0:?}")]
    Rejected(SubmitCommitmentStatus),

    #[error("token carries no coins to split")]
    NoCoinsToSplit,

    #[error("split allocation does not redistribute the token's coins")]
    SplitAllocationMismatch,

    #[error("inclusion proof polling timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Split(#[from] SplitProofError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// The pre-inclusion artifact: request identity, payload and the
/// authenticator the aggregator accepted.
#[derive(Clone, Debug)]
pub struct Commitment<T> {
    pub(crate) request_id: RequestId,
    pub(crate) data: T,
    pub(crate) authenticator: Authenticator,
}

impl<T> Commitment<T> {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

/// Orchestrates mint, transfer and burn-for-split flows against an
/// aggregator endpoint.
pub struct StateTransitionClient<A> {
    pub(crate) aggregator: A,
}

impl<A: AggregatorClient> StateTransitionClient<A> {
    pub fn new(aggregator: A) -> Self {
        Self { aggregator }
    }

    pub fn aggregator(&self) -> &A {
        &self.aggregator
    }

    /// Build, authenticate and submit a mint. The signing key is the
    /// canonical minter for the token id, so any verifier can replay
    /// the derivation.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_mint_transaction(
        &self,
        recipient: Address,
        token_id: TokenId,
        token_type: TokenType,
        token_data: Bytes,
        coin_data: Option<TokenCoinData>,
        salt: Bytes,
        data_hash: Option<DataHash>,
        reason: Option<MintReason>,
    ) -> Result<Commitment<MintTransactionData>, ClientError> {
        let signing_key = minter_key(&token_id);
        let source = mint_source(&token_id);

        let data = MintTransactionData::create(
            token_id, token_type, token_data, coin_data, recipient, salt, data_hash, reason,
        );

        let authenticator = Authenticator::create(&signing_key, data.hash(), source.hash().clone());
        let request_id = RequestId::create(signing_key.public_key().as_ref(), source.hash());

        self.submit(request_id, data, authenticator).await
    }

    /// Authenticate and submit a transfer. Fails when the signer does
    /// not own the source state's unlock predicate.
    pub async fn submit_transaction(
        &self,
        data: TransactionData,
        signing_key: &SigningKey,
    ) -> Result<Commitment<TransactionData>, ClientError> {
        if !data
            .source_state()
            .unlock_predicate()
            .is_owner(signing_key.public_key())
        {
            return Err(ClientError::FailedToUnlock);
        }

        let authenticator =
            Authenticator::create(signing_key, data.hash(), data.source_state().hash().clone());
        let request_id = authenticator.request_id();

        self.submit(request_id, data, authenticator).await
    }

    async fn submit<T: TransactionPayload>(
        &self,
        request_id: RequestId,
        data: T,
        authenticator: Authenticator,
    ) -> Result<Commitment<T>, ClientError> {
        debug!(request_id = %request_id, "submitting commitment");

        let response = self
            .aggregator
            .submit_commitment(&request_id, data.hash(), &authenticator, false)
            .await?;

        if response.status != SubmitCommitmentStatus::Success {
            return Err(ClientError::Rejected(response.status));
        }

        Ok(Commitment {
            request_id,
            data,
            authenticator,
        })
    }

    /// Pair a commitment with the inclusion proof the aggregator
    /// returned for it, rejecting anything that does not verify.
    pub fn create_transaction<T: TransactionPayload>(
        &self,
        commitment: Commitment<T>,
        proof: InclusionProof,
    ) -> Result<Transaction<T>, ClientError> {
        proof
            .check_hash_algorithms()
            .map_err(|_| ClientError::InvalidHashAlgorithm)?;

        if proof.transaction_hash() != Some(commitment.data.hash()) {
            return Err(ClientError::PayloadHashMismatch);
        }

        match proof.verify(&commitment.request_id) {
            Ok(InclusionProofStatus::Ok) => {}
            Ok(status) => return Err(ClientError::ProofStatus(status)),
            Err(ProofError::UnsupportedHashAlgorithm(_)) => {
                return Err(ClientError::InvalidHashAlgorithm)
            }
            Err(e) => return Err(ClientError::Proof(e)),
        }

        Ok(Transaction::new(commitment.data, proof))
    }

    /// Append a verified transfer to a token, installing its new state.
    pub fn finish_transaction(
        &self,
        token: Token,
        new_state: TokenState,
        transaction: Transaction<TransactionData>,
        nametag_tokens: Vec<Token>,
    ) -> Result<Token, ClientError> {
        Ok(token.update(transaction, new_state, nametag_tokens)?)
    }

    /// Status of the commitment (if any) spending the token's current
    /// state under the given owner key.
    pub async fn get_token_status(
        &self,
        token: &Token,
        public_key: &PublicKey,
    ) -> Result<InclusionProofStatus, ClientError> {
        let request_id = RequestId::create(public_key.as_ref(), token.state().hash());

        match self.aggregator.get_inclusion_proof(&request_id, None).await? {
            Some(proof) => Ok(proof.verify(&request_id)?),
            None => Ok(InclusionProofStatus::PathNotIncluded),
        }
    }

    /// Opaque pass-through of the aggregator's no-deletion proof.
    pub async fn get_no_deletion_proof(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<u8>, ClientError> {
        Ok(self.aggregator.get_no_deletion_proof(request_id).await?)
    }
}
