use tessera_codec::minicbor::bytes::ByteSlice;
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::{DataHash, Hasher};

use crate::identifiers::{TokenId, TokenType};
use crate::predicate::BURN_TAG;
use crate::split::BurnReason;

/// Terminal predicate: the reference commits to the successor-token coin
/// allocations, which turns the burn itself into a verifiable commitment.
/// It owns nothing and verifies nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnPredicate {
    token_id: TokenId,
    token_type: TokenType,
    nonce: Bytes,
    reason: BurnReason,
    reference: DataHash,
    hash: DataHash,
}

impl BurnPredicate {
    pub fn new(token_id: TokenId, token_type: TokenType, nonce: Bytes, reason: BurnReason) -> Self {
        let reference = {
            let id: &ByteSlice = token_id.as_bytes().into();
            let ty: &ByteSlice = token_type.as_bytes().into();

            DataHash::sha256(Hasher::hash_cbor(&(
                BURN_TAG,
                id,
                ty,
                reason.new_tokens_tree_hash(),
            )))
        };

        let hash = {
            let nonce: &ByteSlice = nonce.as_slice().into();
            DataHash::sha256(Hasher::hash_cbor(&(&reference, nonce)))
        };

        Self {
            token_id,
            token_type,
            nonce,
            reason,
            reference,
            hash,
        }
    }

    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn nonce(&self) -> &Bytes {
        &self.nonce
    }

    pub fn reason(&self) -> &BurnReason {
        &self.reason
    }

    pub fn reference(&self) -> &DataHash {
        &self.reference
    }

    pub fn hash(&self) -> &DataHash {
        &self.hash
    }
}
