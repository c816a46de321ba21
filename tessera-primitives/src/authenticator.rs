//! Signature bundle proving that the holder of a key authorized a
//! transition from a specific source state to a specific transaction.

use serde::{Deserialize, Serialize};

use tessera_codec::minicbor;
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::DataHash;
use tessera_crypto::key::ed25519::{PublicKey, Signature};
use tessera_crypto::key::{SigningKey, SIGNING_ALGORITHM};

use crate::request_id::RequestId;

/// `{algorithm, publicKey, signature, stateHash}` as consumed by the
/// aggregator. The signature covers the transaction hash imprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authenticator {
    algorithm: String,
    public_key: PublicKey,
    signature: Signature,
    state_hash: DataHash,
}

impl Authenticator {
    pub fn create(
        signing_key: &SigningKey,
        transaction_hash: &DataHash,
        state_hash: DataHash,
    ) -> Self {
        Self {
            algorithm: signing_key.algorithm().to_owned(),
            public_key: *signing_key.public_key(),
            signature: signing_key.sign(transaction_hash.imprint()),
            state_hash,
        }
    }

    pub fn new(
        algorithm: String,
        public_key: PublicKey,
        signature: Signature,
        state_hash: DataHash,
    ) -> Self {
        Self {
            algorithm,
            public_key,
            signature,
            state_hash,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn state_hash(&self) -> &DataHash {
        &self.state_hash
    }

    /// The request id this authenticator commits under.
    pub fn request_id(&self) -> RequestId {
        RequestId::create(self.public_key.as_ref(), &self.state_hash)
    }

    /// Check the signature over a transaction hash. An algorithm this
    /// engine does not implement verifies as `false`, never as an error.
    pub fn verify(&self, transaction_hash: &DataHash) -> bool {
        if self.algorithm != SIGNING_ALGORITHM {
            return false;
        }

        self.public_key
            .verify(transaction_hash.imprint(), &self.signature)
    }
}

impl<C> minicbor::Encode<C> for Authenticator {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(4)?;
        e.str(&self.algorithm)?;
        e.bytes(self.public_key.as_ref())?;
        e.bytes(self.signature.as_ref())?;
        e.bytes(&self.state_hash.imprint())?;

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Authenticator {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(4) {
            return Err(minicbor::decode::Error::message(
                "expected 4-element authenticator",
            ));
        }

        let algorithm = d.str()?.to_owned();
        let public_key = PublicKey::try_from(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;
        let signature = Signature::try_from(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;
        let state_hash = DataHash::from_imprint(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))?;

        Ok(Self {
            algorithm,
            public_key,
            signature,
            state_hash,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatorJson {
    algorithm: String,
    public_key: Bytes,
    signature: Bytes,
    state_hash: DataHash,
}

impl Serialize for Authenticator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let dto = AuthenticatorJson {
            algorithm: self.algorithm.clone(),
            public_key: Bytes::from(self.public_key.as_ref()),
            signature: Bytes::from(self.signature.as_ref()),
            state_hash: self.state_hash.clone(),
        };

        dto.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Authenticator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dto = AuthenticatorJson::deserialize(deserializer)?;

        let public_key =
            PublicKey::try_from(dto.public_key.as_slice()).map_err(serde::de::Error::custom)?;
        let signature =
            Signature::try_from(dto.signature.as_slice()).map_err(serde::de::Error::custom)?;

        Ok(Self {
            algorithm: dto.algorithm,
            public_key,
            signature,
            state_hash: dto.state_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::hash::Hasher;

    fn transaction_hash() -> DataHash {
        DataHash::sha256(Hasher::hash(b"transaction"))
    }

    fn authenticator() -> Authenticator {
        let key = SigningKey::from_secret(b"secret", b"nonce");
        let state = DataHash::sha256(Hasher::hash(b"state"));
        Authenticator::create(&key, &transaction_hash(), state)
    }

    #[test]
    fn verifies_over_the_signed_hash() {
        let auth = authenticator();
        assert!(auth.verify(&transaction_hash()));
        assert!(!auth.verify(&DataHash::sha256(Hasher::hash(b"other"))));
    }

    #[test]
    fn unknown_algorithm_verifies_false() {
        let auth = authenticator();
        let forged = Authenticator::new(
            "secp256k1".to_owned(),
            *auth.public_key(),
            *auth.signature(),
            auth.state_hash().clone(),
        );

        assert!(!forged.verify(&transaction_hash()));
    }

    #[test]
    fn json_round_trip() {
        let auth = authenticator();
        let json = serde_json::to_string(&auth).unwrap();
        let back: Authenticator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, auth);
    }

    #[test]
    fn cbor_round_trip() {
        let auth = authenticator();
        let cbor = minicbor::to_vec(&auth).unwrap();
        let back: Authenticator = minicbor::decode(&cbor).unwrap();
        assert_eq!(back, auth);
    }
}
