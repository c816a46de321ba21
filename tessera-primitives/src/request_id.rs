//! Request identity: the leaf path a commitment occupies in the
//! aggregator's sparse merkle tree.

use std::{fmt, str::FromStr};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_crypto::hash::{DataHash, Hasher, ImprintError};

/// `H(publicKey || stateHash.imprint)`, exposed as a big integer for use
/// as a sparse merkle path.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(DataHash);

impl RequestId {
    pub fn create(public_key: &[u8], state_hash: &DataHash) -> Self {
        Self::create_from_imprint(public_key, &state_hash.imprint())
    }

    /// Derivation over raw imprint bytes; backs both the regular form and
    /// the pseudo-state anchoring mint transactions.
    pub fn create_from_imprint(bytes: &[u8], suffix: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.input(bytes);
        hasher.input(suffix);

        Self(DataHash::sha256(hasher.finalize()))
    }

    pub fn hash(&self) -> &DataHash {
        &self.0
    }

    /// Sentinelized path in the aggregator tree: `0x01 || digest`.
    pub fn to_path(&self) -> BigUint {
        tessera_smt::leaf_path(self.0.digest())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestId").field(&self.0.to_string()).finish()
    }
}

impl FromStr for RequestId {
    type Err = ImprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl<C> minicbor::Encode<C> for RequestId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        self.0.encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for RequestId {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Self(DataHash::decode(d, ctx)?))
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        DataHash::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let state = DataHash::sha256(Hasher::hash(b"state"));
        let a = RequestId::create(&[1; 32], &state);
        let b = RequestId::create(&[1; 32], &state);
        let c = RequestId::create(&[2; 32], &state);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn path_is_sentinelized_digest() {
        let state = DataHash::sha256(Hasher::hash(b"state"));
        let id = RequestId::create(&[1; 32], &state);

        // 256 digest bits plus the sentinel
        assert_eq!(id.to_path().bits(), 257);
    }
}
