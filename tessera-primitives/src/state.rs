//! Token state: an unlock predicate plus optional opaque state data.

use serde::{Deserialize, Serialize};

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::{DataHash, Hasher};

use crate::identifiers::{TokenId, TokenType};
use crate::predicate::{Predicate, PredicateJson};

/// A `(predicate, state data)` pair with its bound hash:
/// `H([predicate.hash, data?])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenState {
    unlock_predicate: Predicate,
    data: Option<Bytes>,
    hash: DataHash,
}

impl TokenState {
    pub fn new(unlock_predicate: Predicate, data: Option<Bytes>) -> Self {
        let hash = DataHash::sha256(Hasher::hash_cbor(&(unlock_predicate.hash(), data.as_ref())));

        Self {
            unlock_predicate,
            data,
            hash,
        }
    }

    pub fn unlock_predicate(&self) -> &Predicate {
        &self.unlock_predicate
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn hash(&self) -> &DataHash {
        &self.hash
    }

    pub fn to_json(&self) -> TokenStateJson {
        TokenStateJson {
            unlock_predicate: self.unlock_predicate.to_json(),
            data: self.data.clone(),
        }
    }

    pub(crate) fn decode_in(
        d: &mut minicbor::Decoder<'_>,
        token_id: &TokenId,
        token_type: &TokenType,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message("expected 2-element state"));
        }

        let unlock_predicate = Predicate::decode_in(d, token_id, token_type)?;

        let data = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(Bytes::decode(d, &mut ())?)
        };

        Ok(Self::new(unlock_predicate, data))
    }
}

impl<C> minicbor::Encode<C> for TokenState {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.unlock_predicate.encode(e, ctx)?;

        match &self.data {
            Some(data) => data.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        Ok(())
    }
}

/// Wire form of a token state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStateJson {
    pub unlock_predicate: PredicateJson,
    pub data: Option<Bytes>,
}

impl Serialize for TokenState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
