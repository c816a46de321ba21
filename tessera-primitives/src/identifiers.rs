//! Opaque identifiers for tokens, token classes and coin classes.

use std::{fmt, str::FromStr};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::Bytes;

/// Globally unique token identifier, 32 opaque bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId([u8; Self::SIZE]);

/// Identifier of a token class, opaque bytes chosen by the issuer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenType(Bytes);

/// Identifier of a fungible coin class, opaque bytes shared by holders.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoinId(Bytes);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size, expecting {}", TokenId::SIZE)]
pub struct TryFromTokenIdError;

impl TokenId {
    pub const SIZE: usize = 32;

    pub const fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Sentinelized path of this id in split sum trees.
    pub fn to_path(&self) -> BigUint {
        tessera_smt::leaf_path(&self.0)
    }
}

impl From<[u8; TokenId::SIZE]> for TokenId {
    fn from(bytes: [u8; TokenId::SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for TokenId {
    type Error = TryFromTokenIdError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; Self::SIZE] = value.try_into().map_err(|_| TryFromTokenIdError)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TokenId").field(&hex::encode(self.0)).finish()
    }
}

impl FromStr for TokenId {
    type Err = TryFromTokenIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; Self::SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| TryFromTokenIdError)?;
        Ok(Self(bytes))
    }
}

impl<C> minicbor::Encode<C> for TokenId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TokenId {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        TokenId::try_from(d.bytes()?)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))
    }
}

impl Serialize for TokenId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl TokenType {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<C> minicbor::Encode<C> for TokenType {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        self.0.encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TokenType {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Self(Bytes::decode(d, ctx)?))
    }
}

impl CoinId {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Sentinelized path of this id in the outer split tree.
    pub fn to_path(&self) -> BigUint {
        tessera_smt::leaf_path(&self.0)
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CoinId").field(&self.0.to_string()).finish()
    }
}

impl<C> minicbor::Encode<C> for CoinId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        self.0.encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for CoinId {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Self(Bytes::decode(d, ctx)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_round_trips_through_hex() {
        let id = TokenId::new([0xaa; 32]);
        let parsed: TokenId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn token_id_rejects_wrong_size() {
        assert_eq!(TokenId::try_from([1u8; 16].as_ref()), Err(TryFromTokenIdError));
    }

    #[test]
    fn ids_map_to_distinct_paths() {
        let a = CoinId::new(vec![0x01]);
        let b = CoinId::new(vec![0x00, 0x01]);
        assert_ne!(a.to_path(), b.to_path());
    }
}
