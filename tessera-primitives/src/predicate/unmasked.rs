use tessera_codec::minicbor::bytes::ByteSlice;
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::{DataHash, HashAlgorithm, Hasher};
use tessera_crypto::key::ed25519::{PublicKey, Signature};
use tessera_crypto::key::SigningKey;

use crate::identifiers::{TokenId, TokenType};
use crate::predicate::UNMASKED_TAG;

/// Predicate whose address exposes the public key.
///
/// The nonce is the owner's signature over `H(salt)`, so only the key
/// holder can reproduce it; the hash binds token id and nonce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmaskedPredicate {
    public_key: PublicKey,
    algorithm: String,
    hash_algorithm: HashAlgorithm,
    nonce: Bytes,
    reference: DataHash,
    hash: DataHash,
}

impl UnmaskedPredicate {
    pub fn new(
        token_id: &TokenId,
        token_type: &TokenType,
        public_key: PublicKey,
        algorithm: String,
        hash_algorithm: HashAlgorithm,
        nonce: Bytes,
    ) -> Self {
        let reference =
            calculate_reference(token_type, &algorithm, hash_algorithm, &public_key);

        let token_id_bytes: &ByteSlice = token_id.as_bytes().into();
        let nonce_bytes: &ByteSlice = nonce.as_slice().into();
        let hash = DataHash::sha256(Hasher::hash_cbor(&(&reference, token_id_bytes, nonce_bytes)));

        Self {
            public_key,
            algorithm,
            hash_algorithm,
            nonce,
            reference,
            hash,
        }
    }

    /// Create with a fresh nonce: the owner's signature over `H(salt)`.
    pub fn create(
        token_id: &TokenId,
        token_type: &TokenType,
        signing_key: &SigningKey,
        hash_algorithm: HashAlgorithm,
        salt: &[u8],
    ) -> Self {
        let digest = DataHash::sha256(Hasher::hash(salt));
        let nonce = Bytes::from(signing_key.sign(digest.imprint()).as_ref());

        Self::new(
            token_id,
            token_type,
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

    /// The nonce as a signature, when it has the right size.
    pub fn nonce_signature(&self) -> Option<Signature> {
        Signature::try_from(self.nonce.as_slice()).ok()
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
    token_type: &TokenType,
    algorithm: &str,
    hash_algorithm: HashAlgorithm,
    public_key: &PublicKey,
) -> DataHash {
    let token_type: &ByteSlice = token_type.as_bytes().into();
    let public_key: &ByteSlice = public_key.as_ref().into();

    DataHash::sha256(Hasher::hash_cbor(&(
        UNMASKED_TAG,
        token_type,
        algorithm,
        hash_algorithm.label(),
        public_key,
    )))
}
