use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{Hash, HashAlgorithm, UnsupportedHashAlgorithm};

use tessera_codec::minicbor;

/// An algorithm-tagged digest.
///
/// The canonical cross-object form is the *imprint*: the big-endian `u16`
/// algorithm code followed by the digest bytes. Whenever a hash is fed into
/// another hash, it is the imprint that gets encoded.
///
/// Parsing accepts codes the engine does not implement; the code is only
/// rejected at the point where the algorithm must actually be applied
/// (see [`DataHash::algorithm`]). This keeps foreign ledgers readable up
/// to the first operation that would need the missing digest.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataHash {
    code: u16,
    digest: Vec<u8>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImprintError {
    #[error("imprint too short: {0} bytes")]
    TooShort(usize),

    #[error("error decoding hex imprint")]
    BadHex,
}

impl DataHash {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Self {
        Self {
            code: algorithm.code(),
            digest,
        }
    }

    pub fn sha256(digest: Hash<32>) -> Self {
        Self {
            code: HashAlgorithm::Sha256.code(),
            digest: digest.as_ref().to_vec(),
        }
    }

    /// The wire code, which may or may not name a supported algorithm.
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn algorithm(&self) -> Result<HashAlgorithm, UnsupportedHashAlgorithm> {
        HashAlgorithm::try_from(self.code)
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn imprint(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.digest.len());
        out.extend_from_slice(&self.code.to_be_bytes());
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn from_imprint(bytes: &[u8]) -> Result<Self, ImprintError> {
        if bytes.len() < 3 {
            return Err(ImprintError::TooShort(bytes.len()));
        }

        let code = u16::from_be_bytes([bytes[0], bytes[1]]);

        Ok(Self {
            code,
            digest: bytes[2..].to_vec(),
        })
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.imprint()))
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataHash")
            .field(&hex::encode(self.imprint()))
            .finish()
    }
}

impl FromStr for DataHash {
    type Err = ImprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ImprintError::BadHex)?;
        Self::from_imprint(&bytes)
    }
}

impl<C> minicbor::Encode<C> for DataHash {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.imprint())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for DataHash {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let bytes = d.bytes()?;
        Self::from_imprint(bytes)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))
    }
}

impl Serialize for DataHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DataHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hasher;

    #[test]
    fn imprint_round_trip() {
        let hash = DataHash::sha256(Hasher::hash(b"tessera"));
        let imprint = hash.imprint();

        assert_eq!(imprint.len(), 34);
        assert_eq!(&imprint[..2], &[0, 0]);
        assert_eq!(DataHash::from_imprint(&imprint).unwrap(), hash);
    }

    #[test]
    fn unknown_code_parses_but_does_not_resolve() {
        let mut imprint = vec![0x00, 0x07];
        imprint.extend_from_slice(&[0xab; 32]);

        let hash = DataHash::from_imprint(&imprint).unwrap();
        assert_eq!(hash.code(), 7);
        assert!(hash.algorithm().is_err());
    }

    #[test]
    fn short_imprint_is_rejected() {
        assert_eq!(
            DataHash::from_imprint(&[0x00, 0x00]),
            Err(ImprintError::TooShort(2))
        );
    }

    #[test]
    fn hex_text_form() {
        let hash = DataHash::sha256(Hasher::hash(b"abc"));
        let text = hash.to_string();
        let back: DataHash = text.parse().unwrap();
        assert_eq!(back, hash);
    }
}
