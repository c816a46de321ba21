//! Recipient addresses derived from predicate references.
//!
//! A [`DirectAddress`] binds a predicate reference and a 4-byte checksum
//! into the literal string `DIRECT://<hex reference imprint><hex checksum>`.
//! A [`ProxyAddress`] points at a name-tag token instead; resolving one is
//! a separate step no resolver implements yet.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_crypto::hash::{DataHash, Hasher, ImprintError};

use crate::identifiers::{TokenId, TryFromTokenIdError};

pub const DIRECT_SCHEME: &str = "DIRECT";
pub const PROXY_SCHEME: &str = "PROXY";

const CHECKSUM_SIZE: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("unknown or bad string format for address {0}")]
    UnknownStringFormat(String),

    #[error("unknown address scheme {0}")]
    UnknownScheme(String),

    #[error("error decoding hex value")]
    BadHex,

    #[error("address checksum mismatch")]
    ChecksumMismatch,

    #[error(transparent)]
    BadReference(#[from] ImprintError),

    #[error(transparent)]
    BadTokenId(#[from] TryFromTokenIdError),
}

/// Recipient address of a state transition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Direct(DirectAddress),
    Proxy(ProxyAddress),
}

/// Address derived from a predicate reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DirectAddress {
    reference: DataHash,
    checksum: [u8; CHECKSUM_SIZE],
}

/// Address pointing at a name-tag token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyAddress {
    id: TokenId,
    checksum: [u8; CHECKSUM_SIZE],
}

fn checksum(cbor: impl minicbor::Encode<()>) -> [u8; CHECKSUM_SIZE] {
    let digest = Hasher::hash_cbor(&cbor);
    let mut checksum = [0; CHECKSUM_SIZE];
    checksum.copy_from_slice(&digest[..CHECKSUM_SIZE]);
    checksum
}

impl DirectAddress {
    /// Derive the address for a predicate reference.
    pub fn create(reference: DataHash) -> Self {
        let checksum = checksum(&reference);
        Self {
            reference,
            checksum,
        }
    }

    pub fn reference(&self) -> &DataHash {
        &self.reference
    }
}

impl ProxyAddress {
    pub fn create(id: TokenId) -> Self {
        let checksum = checksum(&id);
        Self { id, checksum }
    }

    pub fn id(&self) -> &TokenId {
        &self.id
    }
}

impl Address {
    pub fn scheme(&self) -> &'static str {
        match self {
            Address::Direct(_) => DIRECT_SCHEME,
            Address::Proxy(_) => PROXY_SCHEME,
        }
    }
}

impl From<DirectAddress> for Address {
    fn from(address: DirectAddress) -> Self {
        Address::Direct(address)
    }
}

impl From<ProxyAddress> for Address {
    fn from(address: ProxyAddress) -> Self {
        Address::Proxy(address)
    }
}

impl fmt::Display for DirectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DIRECT_SCHEME}://{}{}",
            hex::encode(self.reference.imprint()),
            hex::encode(self.checksum)
        )
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PROXY_SCHEME}://{}{}",
            self.id,
            hex::encode(self.checksum)
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Direct(x) => fmt::Display::fmt(x, f),
            Address::Proxy(x) => fmt::Display::fmt(x, f),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, payload) = s
            .split_once("://")
            .ok_or_else(|| AddressError::UnknownStringFormat(s.to_owned()))?;

        if !payload.is_ascii() || payload.len() <= CHECKSUM_SIZE * 2 {
            return Err(AddressError::UnknownStringFormat(s.to_owned()));
        }

        let (body, tail) = payload.split_at(payload.len() - CHECKSUM_SIZE * 2);
        let mut claimed = [0; CHECKSUM_SIZE];
        hex::decode_to_slice(tail, &mut claimed).map_err(|_| AddressError::BadHex)?;

        match scheme {
            DIRECT_SCHEME => {
                let reference: DataHash = body.parse()?;
                let address = DirectAddress::create(reference);

                if address.checksum != claimed {
                    return Err(AddressError::ChecksumMismatch);
                }

                Ok(Address::Direct(address))
            }
            PROXY_SCHEME => {
                let id: TokenId = body.parse()?;
                let address = ProxyAddress::create(id);

                if address.checksum != claimed {
                    return Err(AddressError::ChecksumMismatch);
                }

                Ok(Address::Proxy(address))
            }
            other => Err(AddressError::UnknownScheme(other.to_owned())),
        }
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<C> minicbor::Encode<C> for Address {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Address {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        d.str()?
            .parse()
            .map_err(|e: AddressError| minicbor::decode::Error::message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use tessera_crypto::hash::Hasher;

    fn reference() -> DataHash {
        DataHash::sha256(Hasher::hash(b"some predicate reference"))
    }

    #[test]
    fn direct_address_round_trip() {
        let address = DirectAddress::create(reference());
        let text = address.to_string();

        assert!(text.starts_with("DIRECT://"));
        assert_eq!(text.parse::<Address>().unwrap(), Address::Direct(address));
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let mut text = DirectAddress::create(reference()).to_string();

        // flip the last hex nibble
        let last = text.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        text.push(flipped);

        assert_eq!(
            text.parse::<Address>().unwrap_err(),
            AddressError::ChecksumMismatch
        );
    }

    #[test]
    fn tampered_reference_is_rejected() {
        let text = DirectAddress::create(reference()).to_string();

        // corrupt a nibble inside the reference body instead
        let mut chars: Vec<char> = text.chars().collect();
        let i = "DIRECT://".len() + 6;
        chars[i] = if chars[i] == 'a' { 'b' } else { 'a' };
        let text: String = chars.into_iter().collect();

        assert_eq!(
            text.parse::<Address>().unwrap_err(),
            AddressError::ChecksumMismatch
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let text = DirectAddress::create(reference())
            .to_string()
            .replace("DIRECT", "TUNNEL");

        assert_eq!(
            text.parse::<Address>().unwrap_err(),
            AddressError::UnknownScheme("TUNNEL".to_owned())
        );
    }

    #[test]
    fn proxy_address_round_trip() {
        let address = ProxyAddress::create(TokenId::new([0x17; 32]));
        let text = address.to_string();

        assert!(text.starts_with("PROXY://"));
        assert_eq!(text.parse::<Address>().unwrap(), Address::Proxy(address));
    }

    #[quickcheck]
    fn any_reference_round_trips(bytes: Vec<u8>) -> bool {
        let reference = DataHash::sha256(Hasher::hash(&bytes));
        let address = DirectAddress::create(reference);
        address.to_string().parse::<Address>() == Ok(Address::Direct(address))
    }
}
