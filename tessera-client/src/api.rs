//! The aggregator contract, abstracted away from any transport.

use async_trait::async_trait;
use thiserror::Error;

use tessera_crypto::hash::DataHash;
use tessera_primitives::authenticator::Authenticator;
use tessera_primitives::inclusion_proof::InclusionProof;
use tessera_primitives::request_id::RequestId;

/// Outcome of a commitment submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitCommitmentStatus {
    Success,
    AuthenticatorVerificationFailed,
    RequestIdMismatch,
    RequestIdExists,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitCommitmentResponse {
    pub status: SubmitCommitmentStatus,
}

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("aggregator transport failure: {0}")]
    Transport(String),
}

/// An aggregator endpoint. Implementations wrap whatever transport the
/// deployment uses; the engine only relies on these three calls.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Submit `{requestId, transactionHash, authenticator}`. With
    /// `receipt`, the aggregator is asked to countersign; the engine
    /// passes the flag through without interpreting the result.
    async fn submit_commitment(
        &self,
        request_id: &RequestId,
        transaction_hash: &DataHash,
        authenticator: &Authenticator,
        receipt: bool,
    ) -> Result<SubmitCommitmentResponse, AggregatorError>;

    /// Fetch the inclusion (or non-inclusion) proof for a request id,
    /// optionally pinned to a block. `None` means the aggregator has not
    /// processed the request yet.
    async fn get_inclusion_proof(
        &self,
        request_id: &RequestId,
        block_num: Option<u64>,
    ) -> Result<Option<InclusionProof>, AggregatorError>;

    /// Opaque pass-through of the aggregator's no-deletion proof.
    async fn get_no_deletion_proof(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<u8>, AggregatorError>;
}
