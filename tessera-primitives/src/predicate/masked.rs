use tessera_codec::minicbor::bytes::ByteSlice;
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::{DataHash, HashAlgorithm, Hasher};
use tessera_crypto::key::ed25519::PublicKey;
use tessera_crypto::key::SigningKey;

use crate::identifiers::TokenId;
use crate::predicate::MASKED_TAG;

/// Predicate whose address hides the public key behind a nonce.
///
/// The reference is independent of the token id, so one address serves
/// every token of a given owner and nonce; the hash binds the token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskedPredicate {
    public_key: PublicKey,
    algorithm: String,
    hash_algorithm: HashAlgorithm,
    nonce: Bytes,
    reference: DataHash,
    hash: DataHash,
}

impl MaskedPredicate {
    pub fn new(
        token_id: &TokenId,
        public_key: PublicKey,
        algorithm: String,
        hash_algorithm: HashAlgorithm,
        nonce: Bytes,
    ) -> Self {
        let reference = calculate_reference(&algorithm, hash_algorithm, &public_key, &nonce);

        let token_id_bytes: &ByteSlice = token_id.as_bytes().into();
        let hash = DataHash::sha256(Hasher::hash_cbor(&(&reference, token_id_bytes)));

        Self {
            public_key,
            algorithm,
            hash_algorithm,
            nonce,
            reference,
            hash,
        }
    }

    pub fn create(
        token_id: &TokenId,
        signing_key: &SigningKey,
        hash_algorithm: HashAlgorithm,
        nonce: Bytes,
    ) -> Self {
        Self::new(
            token_id,
            *signing_key.public_key(),
            signing_key.algorithm().to_owned(),
            hash_algorithm,
            nonce,
        )
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn nonce(&self) -> &Bytes {
        &self.nonce
    }

    pub fn reference(&self) -> &DataHash {
        &self.reference
    }

    pub fn hash(&self) -> &DataHash {
        &self.hash
    }

    pub fn is_owner(&self, public_key: &PublicKey) -> bool {
        self.public_key == *public_key
    }
}

fn calculate_reference(
    algorithm: &str,
    hash_algorithm: HashAlgorithm,
    public_key: &PublicKey,
    nonce: &Bytes,
) -> DataHash {
    let public_key: &ByteSlice = public_key.as_ref().into();
    let nonce: &ByteSlice = nonce.as_slice().into();

    DataHash::sha256(Hasher::hash_cbor(&(
        MASKED_TAG,
        algorithm,
        hash_algorithm.label(),
        public_key,
        nonce,
    )))
}
