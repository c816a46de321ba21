//! Inclusion proofs served by the aggregator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_crypto::hash::{DataHash, Hasher, UnsupportedHashAlgorithm};
use tessera_smt::{MerkleTreePath, PathError};

use crate::authenticator::Authenticator;
use crate::request_id::RequestId;

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("inclusion proof carries only one of authenticator and transaction hash")]
    PartialAuthenticator,

    #[error("Invalid inclusion proof hash algorithm.")]
    UnsupportedHashAlgorithm(#[source] UnsupportedHashAlgorithm),
}

/// Verdict of checking an inclusion proof against a request id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InclusionProofStatus {
    Ok,
    NotAuthenticated,
    PathNotIncluded,
    PathInvalid,
}

/// Path through the aggregator tree, optionally paired with the
/// authenticator and transaction hash committed at the leaf.
///
/// The pair travels together or not at all: a proof with only one of the
/// two is rejected at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InclusionProof {
    merkle_tree_path: MerkleTreePath,
    authenticator: Option<Authenticator>,
    transaction_hash: Option<DataHash>,
}

/// The aggregator leaf committed for a submission: the imprint of
/// `H([authenticator, transactionHash])`.
pub fn leaf_value(authenticator: &Authenticator, transaction_hash: &DataHash) -> Vec<u8> {
    DataHash::sha256(Hasher::hash_cbor(&(authenticator, transaction_hash))).imprint()
}

impl InclusionProof {
    pub fn new(
        merkle_tree_path: MerkleTreePath,
        authenticator: Option<Authenticator>,
        transaction_hash: Option<DataHash>,
    ) -> Result<Self, ProofError> {
        if authenticator.is_some() != transaction_hash.is_some() {
            return Err(ProofError::PartialAuthenticator);
        }

        Ok(Self {
            merkle_tree_path,
            authenticator,
            transaction_hash,
        })
    }

    pub fn path(&self) -> &MerkleTreePath {
        &self.merkle_tree_path
    }

    pub fn authenticator(&self) -> Option<&Authenticator> {
        self.authenticator.as_ref()
    }

    pub fn transaction_hash(&self) -> Option<&DataHash> {
        self.transaction_hash.as_ref()
    }

    /// Reject any hash algorithm in the proof this engine cannot apply.
    pub fn check_hash_algorithms(&self) -> Result<(), ProofError> {
        self.merkle_tree_path
            .root()
            .algorithm()
            .map_err(ProofError::UnsupportedHashAlgorithm)?;

        if let Some(authenticator) = &self.authenticator {
            authenticator
                .state_hash()
                .algorithm()
                .map_err(ProofError::UnsupportedHashAlgorithm)?;
        }

        if let Some(transaction_hash) = &self.transaction_hash {
            transaction_hash
                .algorithm()
                .map_err(ProofError::UnsupportedHashAlgorithm)?;
        }

        Ok(())
    }

    /// Verify the proof against the request id it was fetched for.
    pub fn verify(&self, request_id: &RequestId) -> Result<InclusionProofStatus, ProofError> {
        self.check_hash_algorithms()?;

        if let (Some(authenticator), Some(transaction_hash)) =
            (&self.authenticator, &self.transaction_hash)
        {
            if !authenticator.verify(transaction_hash) {
                return Ok(InclusionProofStatus::NotAuthenticated);
            }

            let expected = leaf_value(authenticator, transaction_hash);
            match self.merkle_tree_path.leaf_value() {
                Some(actual) if actual == expected.as_slice() => {}
                Some(_) => return Ok(InclusionProofStatus::PathInvalid),
                // the path decides below whether this is non-inclusion
                None => {}
            }
        }

        let result = self
            .merkle_tree_path
            .verify(&request_id.to_path())
            .map_err(|e| match e {
                PathError::UnsupportedAlgorithm(e) => ProofError::UnsupportedHashAlgorithm(e),
            })?;

        if !result.path_valid {
            Ok(InclusionProofStatus::PathInvalid)
        } else if !result.path_included {
            Ok(InclusionProofStatus::PathNotIncluded)
        } else {
            Ok(InclusionProofStatus::Ok)
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InclusionProofJson {
    merkle_tree_path: MerkleTreePath,
    authenticator: Option<Authenticator>,
    transaction_hash: Option<DataHash>,
}

impl Serialize for InclusionProof {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let dto = InclusionProofJson {
            merkle_tree_path: self.merkle_tree_path.clone(),
            authenticator: self.authenticator.clone(),
            transaction_hash: self.transaction_hash.clone(),
        };

        dto.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InclusionProof {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dto = InclusionProofJson::deserialize(deserializer)?;

        InclusionProof::new(dto.merkle_tree_path, dto.authenticator, dto.transaction_hash)
            .map_err(serde::de::Error::custom)
    }
}

impl<C> minicbor::Encode<C> for InclusionProof {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(3)?;
        self.merkle_tree_path.encode(e, ctx)?;

        match &self.authenticator {
            Some(authenticator) => authenticator.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        match &self.transaction_hash {
            Some(transaction_hash) => transaction_hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for InclusionProof {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(3) {
            return Err(minicbor::decode::Error::message(
                "expected 3-element inclusion proof",
            ));
        }

        let merkle_tree_path = MerkleTreePath::decode(d, ctx)?;

        let authenticator = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(Authenticator::decode(d, ctx)?)
        };

        let transaction_hash = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(DataHash::decode(d, ctx)?)
        };

        InclusionProof::new(merkle_tree_path, authenticator, transaction_hash)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::key::SigningKey;
    use tessera_smt::SparseMerkleTree;

    fn setup() -> (RequestId, InclusionProof) {
        let key = SigningKey::from_secret(b"secret", b"nonce");
        let state_hash = DataHash::sha256(Hasher::hash(b"state"));
        let transaction_hash = DataHash::sha256(Hasher::hash(b"transaction"));

        let authenticator = Authenticator::create(&key, &transaction_hash, state_hash);
        let request_id = authenticator.request_id();

        let mut tree = SparseMerkleTree::new();
        tree.add_leaf(
            request_id.to_path(),
            leaf_value(&authenticator, &transaction_hash),
        )
        .unwrap();

        let proof = InclusionProof::new(
            tree.get_path(&request_id.to_path()),
            Some(authenticator),
            Some(transaction_hash),
        )
        .unwrap();

        (request_id, proof)
    }

    #[test]
    fn committed_leaf_verifies_ok() {
        let (request_id, proof) = setup();
        assert_eq!(
            proof.verify(&request_id).unwrap(),
            InclusionProofStatus::Ok
        );
    }

    #[test]
    fn foreign_request_id_is_not_included() {
        let (_, proof) = setup();
        let other = RequestId::create_from_imprint(b"someone", b"else");

        assert_eq!(
            proof.verify(&other).unwrap(),
            InclusionProofStatus::PathNotIncluded
        );
    }

    #[test]
    fn tampered_signature_is_not_authenticated() {
        let (request_id, proof) = setup();
        let forged = Authenticator::new(
            proof.authenticator().unwrap().algorithm().to_owned(),
            *proof.authenticator().unwrap().public_key(),
            *proof.authenticator().unwrap().signature(),
            DataHash::sha256(Hasher::hash(b"other state")),
        );

        // same signature over a different claimed transaction hash
        let tampered = InclusionProof::new(
            proof.path().clone(),
            Some(forged),
            Some(DataHash::sha256(Hasher::hash(b"other transaction"))),
        )
        .unwrap();

        assert_eq!(
            tampered.verify(&request_id).unwrap(),
            InclusionProofStatus::NotAuthenticated
        );
    }

    #[test]
    fn partial_authenticator_is_rejected() {
        let (_, proof) = setup();
        let result = InclusionProof::new(proof.path().clone(), None, proof.transaction_hash().cloned());
        assert!(matches!(result, Err(ProofError::PartialAuthenticator)));
    }

    #[test]
    fn json_round_trip() {
        let (_, proof) = setup();
        let json = serde_json::to_string(&proof).unwrap();
        let back: InclusionProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
    }
}
