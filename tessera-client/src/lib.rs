//! State transition client for the Tessera token engine
//!
//! Wraps an abstract aggregator endpoint with the mint / transfer /
//! burn-for-split flows: it derives request identities, authenticates
//! payload hashes, submits commitments and turns returned inclusion
//! proofs into verified transactions. The client holds no state of its
//! own; concurrent use is safe as long as the aggregator tolerates
//! concurrent submissions.

pub mod api;

mod client;
mod poll;
mod split;

pub use api::{AggregatorClient, AggregatorError, SubmitCommitmentResponse, SubmitCommitmentStatus};
pub use client::{ClientError, Commitment, StateTransitionClient};
pub use poll::wait_inclusion_proof;
pub use split::SplitResult;
