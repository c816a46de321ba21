use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::debug;

use tessera_primitives::inclusion_proof::{InclusionProof, InclusionProofStatus};
use tessera_primitives::request_id::RequestId;

use crate::api::AggregatorClient;
use crate::client::ClientError;

/// Poll the aggregator until the request id is included.
///
/// A missing response or a not-yet-included path sleeps `interval` and
/// retries; a proof that verifies with any other non-OK status is
/// surfaced immediately, since waiting cannot repair it. Hitting
/// `deadline` aborts with [`ClientError::Timeout`].
pub async fn wait_inclusion_proof<A: AggregatorClient>(
    aggregator: &A,
    request_id: &RequestId,
    interval: Duration,
    deadline: Duration,
) -> Result<InclusionProof, ClientError> {
    let fetch = async {
        loop {
            if let Some(proof) = aggregator.get_inclusion_proof(request_id, None).await? {
                match proof.verify(request_id)? {
                    InclusionProofStatus::Ok => return Ok(proof),
                    InclusionProofStatus::PathNotIncluded => {
                        debug!(request_id = %request_id, "not included yet");
                    }
                    status => return Err(ClientError::ProofStatus(status)),
                }
            }

            sleep(interval).await;
        }
    };

    match timeout(deadline, fetch).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(deadline)),
    }
}
