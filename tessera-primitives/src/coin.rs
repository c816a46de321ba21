//! Fungible coin balances carried by a token.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::Uint;
use tessera_crypto::hash::{DataHash, Hasher};

use crate::identifiers::CoinId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoinDataError {
    #[error("duplicate coin id {0}")]
    DuplicateCoin(CoinId),
}

/// Ordered list of `(coin id, amount)` pairs.
///
/// The order is the issuer's and is preserved through all encodings so
/// the hash stays stable; lookups are by coin id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenCoinData {
    coins: Vec<(CoinId, Uint)>,
}

impl TokenCoinData {
    pub fn new(coins: Vec<(CoinId, Uint)>) -> Result<Self, CoinDataError> {
        for (i, (id, _)) in coins.iter().enumerate() {
            if coins[..i].iter().any(|(seen, _)| seen == id) {
                return Err(CoinDataError::DuplicateCoin(id.clone()));
            }
        }

        Ok(Self { coins })
    }

    pub fn coins(&self) -> &[(CoinId, Uint)] {
        &self.coins
    }

    pub fn get(&self, id: &CoinId) -> Option<&Uint> {
        self.coins
            .iter()
            .find(|(coin, _)| coin == id)
            .map(|(_, amount)| amount)
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn hash(&self) -> DataHash {
        DataHash::sha256(Hasher::hash_cbor(self))
    }
}

impl<C> minicbor::Encode<C> for TokenCoinData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(self.coins.len() as u64)?;

        for (id, amount) in &self.coins {
            e.array(2)?;
            id.encode(e, ctx)?;
            amount.encode(e, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TokenCoinData {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected definite coin list"))?;

        let mut coins = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if d.array()? != Some(2) {
                return Err(minicbor::decode::Error::message("expected coin pair"));
            }
            let id = CoinId::decode(d, ctx)?;
            let amount = Uint::decode(d, ctx)?;
            coins.push((id, amount));
        }

        TokenCoinData::new(coins).map_err(|e| minicbor::decode::Error::message(e.to_string()))
    }
}

impl Serialize for TokenCoinData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.coins.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TokenCoinData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let coins = Vec::<(CoinId, Uint)>::deserialize(deserializer)?;
        TokenCoinData::new(coins).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> TokenCoinData {
        TokenCoinData::new(vec![
            (CoinId::new(vec![0x01; 32]), Uint::from(10)),
            (CoinId::new(vec![0x02; 32]), Uint::from(20)),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_coins_are_rejected() {
        let result = TokenCoinData::new(vec![
            (CoinId::new(vec![0x01]), Uint::from(1)),
            (CoinId::new(vec![0x01]), Uint::from(2)),
        ]);

        assert!(matches!(result, Err(CoinDataError::DuplicateCoin(_))));
    }

    #[test]
    fn lookup_by_coin_id() {
        let coins = data();
        assert_eq!(coins.get(&CoinId::new(vec![0x02; 32])), Some(&Uint::from(20)));
        assert_eq!(coins.get(&CoinId::new(vec![0x03; 32])), None);
    }

    #[test]
    fn hash_tracks_order_and_amounts() {
        let reordered = TokenCoinData::new(vec![
            (CoinId::new(vec![0x02; 32]), Uint::from(20)),
            (CoinId::new(vec![0x01; 32]), Uint::from(10)),
        ])
        .unwrap();

        assert_ne!(data().hash(), reordered.hash());
        assert_eq!(data().hash(), data().hash());
    }

    #[test]
    fn json_is_pairs_of_hex_and_decimal() {
        let json = serde_json::to_string(&data()).unwrap();
        assert!(json.contains("\"0101010101010101010101010101010101010101010101010101010101010101\""));
        assert!(json.contains("\"10\""));
    }
}
