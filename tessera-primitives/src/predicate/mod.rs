//! Ownership rules bound into token states.
//!
//! Three variants share one surface: a `reference` seeding the recipient
//! address, a `hash` binding the predicate to a concrete token, an
//! `is_owner` check against a public key, and a `verify` over a whole
//! transaction. Verification never raises; `false` is the only failure
//! channel.

mod burn;
mod masked;
mod unmasked;

pub use burn::BurnPredicate;
pub use masked::MaskedPredicate;
pub use unmasked::UnmaskedPredicate;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode as _};
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::{DataHash, UnsupportedHashAlgorithm};
use tessera_crypto::key::ed25519::{PublicKey, TryFromPublicKeyError};

use crate::identifiers::{TokenId, TokenType};
use crate::inclusion_proof::InclusionProofStatus;
use crate::request_id::RequestId;
use crate::split::BurnReason;
use crate::transaction::{Transaction, TransactionData, TransactionPayload};

pub(crate) const MASKED_TAG: &str = "MASKED";
pub(crate) const UNMASKED_TAG: &str = "UNMASKED";
pub(crate) const BURN_TAG: &str = "BURN";

#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("unknown predicate type {0}")]
    UnknownType(String),

    #[error(transparent)]
    BadKey(#[from] TryFromPublicKeyError),

    #[error(transparent)]
    UnsupportedHashAlgorithm(#[from] UnsupportedHashAlgorithm),
}

/// A predicate variant, dispatched by its textual type tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Masked(MaskedPredicate),
    Unmasked(UnmaskedPredicate),
    Burn(BurnPredicate),
}

/// Wire form of a predicate, without the token binding that only the
/// surrounding token supplies.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PredicateJson {
    #[serde(rename = "MASKED", rename_all = "camelCase")]
    Masked {
        public_key: Bytes,
        algorithm: String,
        hash_algorithm: String,
        nonce: Bytes,
    },

    #[serde(rename = "UNMASKED", rename_all = "camelCase")]
    Unmasked {
        public_key: Bytes,
        algorithm: String,
        hash_algorithm: String,
        nonce: Bytes,
    },

    #[serde(rename = "BURN", rename_all = "camelCase")]
    Burn { nonce: Bytes, reason: BurnReason },
}

impl Predicate {
    /// Address seed; independent of the token id for ownable predicates.
    pub fn reference(&self) -> &DataHash {
        match self {
            Predicate::Masked(x) => x.reference(),
            Predicate::Unmasked(x) => x.reference(),
            Predicate::Burn(x) => x.reference(),
        }
    }

    /// State binding; commits to the concrete token.
    pub fn hash(&self) -> &DataHash {
        match self {
            Predicate::Masked(x) => x.hash(),
            Predicate::Unmasked(x) => x.hash(),
            Predicate::Burn(x) => x.hash(),
        }
    }

    pub fn nonce(&self) -> &Bytes {
        match self {
            Predicate::Masked(x) => x.nonce(),
            Predicate::Unmasked(x) => x.nonce(),
            Predicate::Burn(x) => x.nonce(),
        }
    }

    pub fn is_owner(&self, public_key: &PublicKey) -> bool {
        match self {
            Predicate::Masked(x) => x.is_owner(public_key),
            Predicate::Unmasked(x) => x.is_owner(public_key),
            Predicate::Burn(_) => false,
        }
    }

    /// Check that `transaction` was authorized by this predicate's owner
    /// and anchored by the aggregator. Burn predicates verify nothing.
    pub fn verify(&self, transaction: &Transaction<TransactionData>) -> bool {
        match self {
            Predicate::Masked(x) => verify_ownership(x.public_key(), transaction),
            Predicate::Unmasked(x) => verify_ownership(x.public_key(), transaction),
            Predicate::Burn(_) => false,
        }
    }

    pub fn as_burn(&self) -> Option<&BurnPredicate> {
        match self {
            Predicate::Burn(x) => Some(x),
            _ => None,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Predicate::Masked(_) => MASKED_TAG,
            Predicate::Unmasked(_) => UNMASKED_TAG,
            Predicate::Burn(_) => BURN_TAG,
        }
    }

    pub fn to_json(&self) -> PredicateJson {
        match self {
            Predicate::Masked(x) => PredicateJson::Masked {
                public_key: Bytes::from(x.public_key().as_ref()),
                algorithm: x.algorithm().to_owned(),
                hash_algorithm: x.hash_algorithm().label().to_owned(),
                nonce: x.nonce().clone(),
            },
            Predicate::Unmasked(x) => PredicateJson::Unmasked {
                public_key: Bytes::from(x.public_key().as_ref()),
                algorithm: x.algorithm().to_owned(),
                hash_algorithm: x.hash_algorithm().label().to_owned(),
                nonce: x.nonce().clone(),
            },
            Predicate::Burn(x) => PredicateJson::Burn {
                nonce: x.nonce().clone(),
                reason: x.reason().clone(),
            },
        }
    }

    /// Rebuild a predicate from its wire form and the owning token's
    /// identity.
    pub fn from_json(
        token_id: &TokenId,
        token_type: &TokenType,
        json: &PredicateJson,
    ) -> Result<Self, PredicateError> {
        match json {
            PredicateJson::Masked {
                public_key,
                algorithm,
                hash_algorithm,
                nonce,
            } => {
                let public_key = PublicKey::try_from(public_key.as_slice())?;
                let hash_algorithm = hash_algorithm.parse()?;

                Ok(Predicate::Masked(MaskedPredicate::new(
                    token_id,
                    public_key,
                    algorithm.clone(),
                    hash_algorithm,
                    nonce.clone(),
                )))
            }
            PredicateJson::Unmasked {
                public_key,
                algorithm,
                hash_algorithm,
                nonce,
            } => {
                let public_key = PublicKey::try_from(public_key.as_slice())?;
                let hash_algorithm = hash_algorithm.parse()?;

                Ok(Predicate::Unmasked(UnmaskedPredicate::new(
                    token_id,
                    token_type,
                    public_key,
                    algorithm.clone(),
                    hash_algorithm,
                    nonce.clone(),
                )))
            }
            PredicateJson::Burn { nonce, reason } => Ok(Predicate::Burn(BurnPredicate::new(
                *token_id,
                token_type.clone(),
                nonce.clone(),
                reason.clone(),
            ))),
        }
    }

    pub(crate) fn decode_in(
        d: &mut minicbor::Decoder<'_>,
        token_id: &TokenId,
        token_type: &TokenType,
    ) -> Result<Self, minicbor::decode::Error> {
        let len = d.array()?;
        let tag = d.str()?.to_owned();

        match (tag.as_str(), len) {
            (MASKED_TAG, Some(5)) | (UNMASKED_TAG, Some(5)) => {
                let public_key = PublicKey::try_from(d.bytes()?)
                    .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;
                let algorithm = d.str()?.to_owned();
                let hash_algorithm = d
                    .str()?
                    .parse()
                    .map_err(|e: UnsupportedHashAlgorithm| {
                        minicbor::decode::Error::message(e.to_string())
                    })?;
                let nonce = Bytes::decode(d, &mut ())?;

                if tag == MASKED_TAG {
                    Ok(Predicate::Masked(MaskedPredicate::new(
                        token_id,
                        public_key,
                        algorithm,
                        hash_algorithm,
                        nonce,
                    )))
                } else {
                    Ok(Predicate::Unmasked(UnmaskedPredicate::new(
                        token_id,
                        token_type,
                        public_key,
                        algorithm,
                        hash_algorithm,
                        nonce,
                    )))
                }
            }
            (BURN_TAG, Some(3)) => {
                let nonce = Bytes::decode(d, &mut ())?;
                let reason = BurnReason::decode(d, &mut ())?;

                Ok(Predicate::Burn(BurnPredicate::new(
                    *token_id,
                    token_type.clone(),
                    nonce,
                    reason,
                )))
            }
            _ => Err(minicbor::decode::Error::message("bad predicate shape")),
        }
    }
}

impl<C> minicbor::Encode<C> for Predicate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Predicate::Masked(x) => {
                e.array(5)?;
                e.str(MASKED_TAG)?;
                e.bytes(x.public_key().as_ref())?;
                e.str(x.algorithm())?;
                e.str(x.hash_algorithm().label())?;
                x.nonce().encode(e, ctx)?;
            }
            Predicate::Unmasked(x) => {
                e.array(5)?;
                e.str(UNMASKED_TAG)?;
                e.bytes(x.public_key().as_ref())?;
                e.str(x.algorithm())?;
                e.str(x.hash_algorithm().label())?;
                x.nonce().encode(e, ctx)?;
            }
            Predicate::Burn(x) => {
                e.array(3)?;
                e.str(BURN_TAG)?;
                x.nonce().encode(e, ctx)?;
                x.reason().encode(e, ctx)?;
            }
        }

        Ok(())
    }
}

/// The shared ownable-predicate verification:
///
/// 1. the inclusion proof carries an authenticator and transaction hash;
/// 2. the authenticator's key equals the predicate's key;
/// 3. the authenticator's state hash equals the source state's hash;
/// 4. the authenticator verifies over the transaction data hash;
/// 5. the proof verifies against the derived request id with status OK.
fn verify_ownership(public_key: &PublicKey, transaction: &Transaction<TransactionData>) -> bool {
    let proof = transaction.inclusion_proof();

    let (authenticator, _transaction_hash) =
        match (proof.authenticator(), proof.transaction_hash()) {
            (Some(authenticator), Some(transaction_hash)) => (authenticator, transaction_hash),
            _ => return false,
        };

    if authenticator.public_key() != public_key {
        return false;
    }

    if authenticator.state_hash() != transaction.data().source_state().hash() {
        return false;
    }

    if !authenticator.verify(transaction.data().hash()) {
        return false;
    }

    let request_id = RequestId::create(
        public_key.as_ref(),
        transaction.data().source_state().hash(),
    );

    matches!(
        proof.verify(&request_id),
        Ok(InclusionProofStatus::Ok)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::hash::{HashAlgorithm, Hasher};
    use tessera_crypto::key::SigningKey;

    fn token_id() -> TokenId {
        TokenId::new([0xaa; 32])
    }

    fn token_type() -> TokenType {
        TokenType::new(vec![0xbb; 32])
    }

    #[test]
    fn masked_hides_the_key_behind_the_nonce() {
        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let one = MaskedPredicate::create(&token_id(), &key, HashAlgorithm::Sha256, Bytes::from(vec![3; 32]));
        let two = MaskedPredicate::create(&token_id(), &key, HashAlgorithm::Sha256, Bytes::from(vec![4; 32]));

        assert_ne!(one.reference(), two.reference());
        assert!(one.is_owner(key.public_key()));
    }

    #[test]
    fn masked_reference_is_token_independent_but_hash_is_not() {
        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let nonce = Bytes::from(vec![3; 32]);
        let one = MaskedPredicate::create(&token_id(), &key, HashAlgorithm::Sha256, nonce.clone());
        let two = MaskedPredicate::create(
            &TokenId::new([0xac; 32]),
            &key,
            HashAlgorithm::Sha256,
            nonce,
        );

        assert_eq!(one.reference(), two.reference());
        assert_ne!(one.hash(), two.hash());
    }

    #[test]
    fn unmasked_nonce_is_a_signature_over_the_salt_hash() {
        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let predicate =
            UnmaskedPredicate::create(&token_id(), &token_type(), &key, HashAlgorithm::Sha256, b"salt");

        let digest = DataHash::sha256(Hasher::hash(b"salt"));
        assert!(key
            .public_key()
            .verify(digest.imprint(), &predicate.nonce_signature().unwrap()));
    }

    #[test]
    fn burn_predicates_own_nothing() {
        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let reason = BurnReason::new(DataHash::sha256(Hasher::hash(b"tree")));
        let predicate = Predicate::Burn(BurnPredicate::new(
            token_id(),
            token_type(),
            Bytes::from(vec![9; 32]),
            reason,
        ));

        assert!(!predicate.is_owner(key.public_key()));
    }

    #[test]
    fn json_round_trip_is_identity() {
        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let predicate = Predicate::Masked(MaskedPredicate::create(
            &token_id(),
            &key,
            HashAlgorithm::Sha256,
            Bytes::from(vec![3; 32]),
        ));

        let json = predicate.to_json();
        let back = Predicate::from_json(&token_id(), &token_type(), &json).unwrap();

        assert_eq!(back, predicate);
        assert_eq!(
            serde_json::to_value(back.to_json()).unwrap(),
            serde_json::to_value(&json).unwrap()
        );
    }

    #[test]
    fn verify_returns_false_on_hostile_input() {
        use crate::address::DirectAddress;
        use crate::authenticator::Authenticator;
        use crate::inclusion_proof::InclusionProof;
        use crate::state::TokenState;
        use crate::transaction::TransactionData;
        use tessera_crypto::hash::Hasher;
        use tessera_smt::SparseMerkleTree;

        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let predicate = Predicate::Masked(MaskedPredicate::create(
            &token_id(),
            &key,
            HashAlgorithm::Sha256,
            Bytes::from(vec![3; 32]),
        ));

        let state = TokenState::new(predicate.clone(), None);
        let recipient = DirectAddress::create(predicate.reference().clone()).into();
        let data = TransactionData::create(
            state,
            recipient,
            Bytes::from(vec![7; 32]),
            None,
            None,
            vec![],
        );

        // no authenticator at all
        let tree = SparseMerkleTree::new();
        let bare = InclusionProof::new(tree.get_path(&tessera_smt::leaf_path(b"x")), None, None)
            .unwrap();
        assert!(!predicate.verify(&Transaction::new(data.clone(), bare)));

        // authenticator from a foreign key over a foreign state
        let stranger = SigningKey::from_secret(b"stranger", &[9; 32]);
        let foreign_state = DataHash::sha256(Hasher::hash(b"foreign"));
        let authenticator = Authenticator::create(&stranger, data.hash(), foreign_state.clone());
        let forged = InclusionProof::new(
            tree.get_path(&tessera_smt::leaf_path(b"x")),
            Some(authenticator),
            Some(data.hash().clone()),
        )
        .unwrap();
        assert!(!predicate.verify(&Transaction::new(data, forged)));
    }

    #[test]
    fn burn_json_round_trip_is_identity() {
        use tessera_crypto::hash::Hasher;

        let reason = BurnReason::new(DataHash::sha256(Hasher::hash(b"tree")));
        let predicate = Predicate::Burn(BurnPredicate::new(
            token_id(),
            token_type(),
            Bytes::from(vec![9; 32]),
            reason,
        ));

        let json = predicate.to_json();
        let back = Predicate::from_json(&token_id(), &token_type(), &json).unwrap();
        assert_eq!(back, predicate);
    }

    #[test]
    fn unknown_hash_algorithm_label_is_rejected() {
        let json = PredicateJson::Masked {
            public_key: Bytes::from(vec![0; 32]),
            algorithm: "ed25519".to_owned(),
            hash_algorithm: "SHA-512".to_owned(),
            nonce: Bytes::from(vec![1; 32]),
        };

        assert!(Predicate::from_json(&token_id(), &token_type(), &json).is_err());
    }
}
