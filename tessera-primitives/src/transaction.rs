//! Canonical, hashable descriptions of state changes, and the
//! transaction pairing them with their inclusion proof.

use serde::{Deserialize, Serialize};

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::Bytes;
use tessera_crypto::hash::{DataHash, HashAlgorithm, Hasher};

use crate::address::Address;
use crate::coin::TokenCoinData;
use crate::identifiers::{TokenId, TokenType};
use crate::inclusion_proof::InclusionProof;
use crate::split::{SplitProof, SplitProofJson};
use crate::state::{TokenState, TokenStateJson};
use crate::token::{Token, TokenJson};

pub(crate) const SPLIT_TAG: &str = "SPLIT";

/// Common surface of mint and transfer payloads.
pub trait TransactionPayload {
    /// Memoized hash of the payload.
    fn hash(&self) -> &DataHash;

    /// Commitment to the recipient's next state data, when any.
    fn data_hash(&self) -> Option<&DataHash>;

    fn recipient(&self) -> &Address;
}

/// A payload and the inclusion proof anchoring it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction<T> {
    data: T,
    inclusion_proof: InclusionProof,
}

impl<T> Transaction<T> {
    pub fn new(data: T, inclusion_proof: InclusionProof) -> Self {
        Self {
            data,
            inclusion_proof,
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn inclusion_proof(&self) -> &InclusionProof {
        &self.inclusion_proof
    }
}

impl<T: TransactionPayload> Transaction<T> {
    /// Whether `state_data` is the data this transaction committed to:
    /// either both sides are absent, or the bytes hash to the committed
    /// `dataHash` under its own algorithm.
    pub fn contains_data(&self, state_data: Option<&[u8]>) -> bool {
        match (self.data.data_hash(), state_data) {
            (None, None) => true,
            (Some(expected), Some(bytes)) => match expected.algorithm() {
                Ok(HashAlgorithm::Sha256) => {
                    DataHash::sha256(Hasher::hash(bytes)) == *expected
                }
                Err(_) => false,
            },
            _ => false,
        }
    }
}

/* Transfer **************************************************************** */

/// Payload of a non-mint step. The hash covers
/// `(sourceState.hash, dataHash?, recipient, salt, message?)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionData {
    source_state: TokenState,
    recipient: Address,
    salt: Bytes,
    data_hash: Option<DataHash>,
    message: Option<Bytes>,
    nametag_tokens: Vec<Token>,
    hash: DataHash,
}

struct TransferHashPayload<'a> {
    source_state_hash: &'a DataHash,
    data_hash: Option<&'a DataHash>,
    recipient: String,
    salt: &'a Bytes,
    message: Option<&'a Bytes>,
}

impl<C> minicbor::Encode<C> for TransferHashPayload<'_> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(5)?;
        self.source_state_hash.encode(e, ctx)?;

        match self.data_hash {
            Some(hash) => hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        e.str(&self.recipient)?;
        self.salt.encode(e, ctx)?;

        match self.message {
            Some(message) => message.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        Ok(())
    }
}

impl TransactionData {
    pub fn create(
        source_state: TokenState,
        recipient: Address,
        salt: Bytes,
        data_hash: Option<DataHash>,
        message: Option<Bytes>,
        nametag_tokens: Vec<Token>,
    ) -> Self {
        let hash = DataHash::sha256(Hasher::hash_cbor(&TransferHashPayload {
            source_state_hash: source_state.hash(),
            data_hash: data_hash.as_ref(),
            recipient: recipient.to_string(),
            salt: &salt,
            message: message.as_ref(),
        }));

        Self {
            source_state,
            recipient,
            salt,
            data_hash,
            message,
            nametag_tokens,
            hash,
        }
    }

    pub fn source_state(&self) -> &TokenState {
        &self.source_state
    }

    pub fn salt(&self) -> &Bytes {
        &self.salt
    }

    pub fn message(&self) -> Option<&Bytes> {
        self.message.as_ref()
    }

    pub fn nametag_tokens(&self) -> &[Token] {
        &self.nametag_tokens
    }

    pub fn to_json(&self) -> TransactionDataJson {
        TransactionDataJson {
            source_state: self.source_state.to_json(),
            recipient: self.recipient.to_string(),
            salt: self.salt.clone(),
            data_hash: self.data_hash.clone(),
            message: self.message.clone(),
            nametag_tokens: self
                .nametag_tokens
                .iter()
                .map(|token| token.to_json())
                .collect(),
        }
    }
}

impl TransactionPayload for TransactionData {
    fn hash(&self) -> &DataHash {
        &self.hash
    }

    fn data_hash(&self) -> Option<&DataHash> {
        self.data_hash.as_ref()
    }

    fn recipient(&self) -> &Address {
        &self.recipient
    }
}

/* Mint ******************************************************************** */

/// Payload of the first transaction of a token. The hash covers
/// `(tokenId, tokenType, H(tokenData), dataHash?, coinData, recipient,
/// salt, reason)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintTransactionData {
    token_id: TokenId,
    token_type: TokenType,
    token_data: Bytes,
    coin_data: Option<TokenCoinData>,
    recipient: Address,
    salt: Bytes,
    data_hash: Option<DataHash>,
    reason: Option<MintReason>,
    hash: DataHash,
}

struct MintHashPayload<'a> {
    token_id: &'a TokenId,
    token_type: &'a TokenType,
    token_data_hash: DataHash,
    data_hash: Option<&'a DataHash>,
    coin_hash: Option<DataHash>,
    recipient: String,
    salt: &'a Bytes,
    reason_hash: Option<DataHash>,
}

impl<C> minicbor::Encode<C> for MintHashPayload<'_> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(8)?;
        self.token_id.encode(e, ctx)?;
        self.token_type.encode(e, ctx)?;
        self.token_data_hash.encode(e, ctx)?;

        match &self.data_hash {
            Some(hash) => hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        match &self.coin_hash {
            Some(hash) => hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        e.str(&self.recipient)?;
        self.salt.encode(e, ctx)?;

        match &self.reason_hash {
            Some(hash) => hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        Ok(())
    }
}

impl MintTransactionData {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        token_id: TokenId,
        token_type: TokenType,
        token_data: Bytes,
        coin_data: Option<TokenCoinData>,
        recipient: Address,
        salt: Bytes,
        data_hash: Option<DataHash>,
        reason: Option<MintReason>,
    ) -> Self {
        let hash = DataHash::sha256(Hasher::hash_cbor(&MintHashPayload {
            token_id: &token_id,
            token_type: &token_type,
            token_data_hash: DataHash::sha256(Hasher::hash(&token_data)),
            data_hash: data_hash.as_ref(),
            coin_hash: coin_data.as_ref().map(|coins| coins.hash()),
            recipient: recipient.to_string(),
            salt: &salt,
            reason_hash: reason.as_ref().map(|reason| reason.hash()),
        }));

        Self {
            token_id,
            token_type,
            token_data,
            coin_data,
            recipient,
            salt,
            data_hash,
            reason,
            hash,
        }
    }

    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn token_data(&self) -> &Bytes {
        &self.token_data
    }

    pub fn coin_data(&self) -> Option<&TokenCoinData> {
        self.coin_data.as_ref()
    }

    pub fn salt(&self) -> &Bytes {
        &self.salt
    }

    pub fn reason(&self) -> Option<&MintReason> {
        self.reason.as_ref()
    }

    pub fn to_json(&self) -> MintTransactionDataJson {
        MintTransactionDataJson {
            token_id: self.token_id,
            token_type: self.token_type.clone(),
            token_data: self.token_data.clone(),
            coin_data: self.coin_data.clone(),
            recipient: self.recipient.to_string(),
            salt: self.salt.clone(),
            data_hash: self.data_hash.clone(),
            reason: self.reason.as_ref().map(|reason| reason.to_json()),
        }
    }
}

impl TransactionPayload for MintTransactionData {
    fn hash(&self) -> &DataHash {
        &self.hash
    }

    fn data_hash(&self) -> Option<&DataHash> {
        self.data_hash.as_ref()
    }

    fn recipient(&self) -> &Address {
        &self.recipient
    }
}

/// Why a token came into existence beyond plain issuance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MintReason {
    Split(SplitProof),
}

impl MintReason {
    /// Hash binding the reason into the mint payload hash.
    pub fn hash(&self) -> DataHash {
        DataHash::sha256(Hasher::hash_cbor(self))
    }

    pub fn as_split(&self) -> Option<&SplitProof> {
        match self {
            MintReason::Split(proof) => Some(proof),
        }
    }

    pub fn to_json(&self) -> MintReasonJson {
        match self {
            MintReason::Split(proof) => MintReasonJson::Split(proof.to_json()),
        }
    }

    pub(crate) fn decode_cbor(
        d: &mut minicbor::Decoder<'_>,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "expected 2-element mint reason",
            ));
        }

        match d.str()? {
            SPLIT_TAG => Ok(MintReason::Split(SplitProof::decode_cbor(d)?)),
            other => Err(minicbor::decode::Error::message(format!(
                "unknown mint reason {other}"
            ))),
        }
    }
}

impl<C> minicbor::Encode<C> for MintReason {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            MintReason::Split(proof) => {
                e.array(2)?;
                e.str(SPLIT_TAG)?;
                proof.encode(e, ctx)?;
            }
        }

        Ok(())
    }
}

/* CBOR ******************************************************************** */

impl<C> minicbor::Encode<C> for TransactionData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(6)?;
        self.source_state.encode(e, ctx)?;
        self.recipient.encode(e, ctx)?;
        self.salt.encode(e, ctx)?;

        match &self.data_hash {
            Some(hash) => hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        match &self.message {
            Some(message) => message.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        e.array(self.nametag_tokens.len() as u64)?;
        for token in &self.nametag_tokens {
            token.encode(e, ctx)?;
        }

        Ok(())
    }
}

impl TransactionData {
    pub(crate) fn decode_in(
        d: &mut minicbor::Decoder<'_>,
        token_id: &TokenId,
        token_type: &TokenType,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(6) {
            return Err(minicbor::decode::Error::message(
                "expected 6-element transaction data",
            ));
        }

        let source_state = TokenState::decode_in(d, token_id, token_type)?;
        let recipient = Address::decode(d, &mut ())?;
        let salt = Bytes::decode(d, &mut ())?;

        let data_hash = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(DataHash::decode(d, &mut ())?)
        };

        let message = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(Bytes::decode(d, &mut ())?)
        };

        let count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected definite nametag list"))?;
        let mut nametag_tokens = Vec::with_capacity(count as usize);
        for _ in 0..count {
            nametag_tokens.push(Token::decode_cbor(d)?);
        }

        Ok(Self::create(
            source_state,
            recipient,
            salt,
            data_hash,
            message,
            nametag_tokens,
        ))
    }
}

impl<C> minicbor::Encode<C> for MintTransactionData {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(8)?;
        self.token_id.encode(e, ctx)?;
        self.token_type.encode(e, ctx)?;
        self.token_data.encode(e, ctx)?;

        match &self.coin_data {
            Some(coins) => coins.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        self.recipient.encode(e, ctx)?;
        self.salt.encode(e, ctx)?;

        match &self.data_hash {
            Some(hash) => hash.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        match &self.reason {
            Some(reason) => reason.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        Ok(())
    }
}

impl MintTransactionData {
    pub(crate) fn decode_cbor(
        d: &mut minicbor::Decoder<'_>,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(8) {
            return Err(minicbor::decode::Error::message(
                "expected 8-element mint data",
            ));
        }

        let token_id = TokenId::decode(d, &mut ())?;
        let token_type = TokenType::decode(d, &mut ())?;
        let token_data = Bytes::decode(d, &mut ())?;

        let coin_data = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(TokenCoinData::decode(d, &mut ())?)
        };

        let recipient = Address::decode(d, &mut ())?;
        let salt = Bytes::decode(d, &mut ())?;

        let data_hash = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(DataHash::decode(d, &mut ())?)
        };

        let reason = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(MintReason::decode_cbor(d)?)
        };

        Ok(Self::create(
            token_id,
            token_type,
            token_data,
            coin_data,
            recipient,
            salt,
            data_hash,
            reason,
        ))
    }
}

impl<C, T: minicbor::Encode<C>> minicbor::Encode<C> for Transaction<T> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        self.data.encode(e, ctx)?;
        self.inclusion_proof.encode(e, ctx)?;

        Ok(())
    }
}

impl Transaction<MintTransactionData> {
    pub fn to_json(&self) -> MintTransactionJson {
        MintTransactionJson {
            data: self.data.to_json(),
            inclusion_proof: self.inclusion_proof.clone(),
        }
    }

    pub(crate) fn decode_cbor(
        d: &mut minicbor::Decoder<'_>,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "expected 2-element transaction",
            ));
        }

        let data = MintTransactionData::decode_cbor(d)?;
        let inclusion_proof = InclusionProof::decode(d, &mut ())?;

        Ok(Self::new(data, inclusion_proof))
    }
}

impl Transaction<TransactionData> {
    pub fn to_json(&self) -> TransferTransactionJson {
        TransferTransactionJson {
            data: self.data.to_json(),
            inclusion_proof: self.inclusion_proof.clone(),
        }
    }

    pub(crate) fn decode_in(
        d: &mut minicbor::Decoder<'_>,
        token_id: &TokenId,
        token_type: &TokenType,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(2) {
            return Err(minicbor::decode::Error::message(
                "expected 2-element transaction",
            ));
        }

        let data = TransactionData::decode_in(d, token_id, token_type)?;
        let inclusion_proof = InclusionProof::decode(d, &mut ())?;

        Ok(Self::new(data, inclusion_proof))
    }
}

/* Wire forms ************************************************************** */

/// Wire form of a transfer payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDataJson {
    pub source_state: TokenStateJson,
    pub recipient: String,
    pub salt: Bytes,
    pub data_hash: Option<DataHash>,
    pub message: Option<Bytes>,
    pub nametag_tokens: Vec<TokenJson>,
}

/// Wire form of a mint payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransactionDataJson {
    pub token_id: TokenId,
    pub token_type: TokenType,
    pub token_data: Bytes,
    pub coin_data: Option<TokenCoinData>,
    pub recipient: String,
    pub salt: Bytes,
    pub data_hash: Option<DataHash>,
    pub reason: Option<MintReasonJson>,
}

/// Wire form of a mint reason, dispatched by its `type` tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MintReasonJson {
    #[serde(rename = "SPLIT")]
    Split(SplitProofJson),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransactionJson {
    pub data: MintTransactionDataJson,
    pub inclusion_proof: InclusionProof,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransactionJson {
    pub data: TransactionDataJson,
    pub inclusion_proof: InclusionProof,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::hash::HashAlgorithm;
    use tessera_crypto::key::SigningKey;
    use tessera_smt::SparseMerkleTree;

    use crate::predicate::{MaskedPredicate, Predicate};

    fn proof() -> InclusionProof {
        let tree = SparseMerkleTree::new();
        let key = tessera_smt::leaf_path(&[0x01]);
        InclusionProof::new(tree.get_path(&key), None, None).unwrap()
    }

    fn state() -> TokenState {
        let key = SigningKey::from_secret(b"secret", &[3; 32]);
        let predicate = Predicate::Masked(MaskedPredicate::create(
            &TokenId::new([0xaa; 32]),
            &key,
            HashAlgorithm::Sha256,
            Bytes::from(vec![3; 32]),
        ));
        TokenState::new(predicate, None)
    }

    fn recipient() -> Address {
        crate::address::DirectAddress::create(state().unlock_predicate().reference().clone())
            .into()
    }

    #[test]
    fn contains_data_matches_absent_sides() {
        let data = TransactionData::create(
            state(),
            recipient(),
            Bytes::from(vec![7; 32]),
            None,
            None,
            vec![],
        );
        let transaction = Transaction::new(data, proof());

        assert!(transaction.contains_data(None));
        assert!(!transaction.contains_data(Some(b"anything")));
    }

    #[test]
    fn contains_data_checks_the_committed_hash() {
        let committed = DataHash::sha256(Hasher::hash(b"next state data"));
        let data = TransactionData::create(
            state(),
            recipient(),
            Bytes::from(vec![7; 32]),
            Some(committed),
            None,
            vec![],
        );
        let transaction = Transaction::new(data, proof());

        assert!(transaction.contains_data(Some(b"next state data")));
        assert!(!transaction.contains_data(Some(b"other data")));
        assert!(!transaction.contains_data(None));
    }

    #[test]
    fn transfer_hash_covers_the_recipient() {
        let salt = Bytes::from(vec![7; 32]);
        let one = TransactionData::create(state(), recipient(), salt.clone(), None, None, vec![]);

        let other_key = SigningKey::from_secret(b"other", &[5; 32]);
        let other_predicate = Predicate::Masked(MaskedPredicate::create(
            &TokenId::new([0xaa; 32]),
            &other_key,
            HashAlgorithm::Sha256,
            Bytes::from(vec![5; 32]),
        ));
        let other_recipient: Address =
            crate::address::DirectAddress::create(other_predicate.reference().clone()).into();
        let two = TransactionData::create(state(), other_recipient, salt, None, None, vec![]);

        assert_ne!(one.hash(), two.hash());
    }

    #[test]
    fn mint_hash_covers_coins_and_payload() {
        let coins = TokenCoinData::new(vec![(
            crate::identifiers::CoinId::new(vec![0x01; 32]),
            tessera_codec::utils::Uint::from(10),
        )])
        .unwrap();

        let base = MintTransactionData::create(
            TokenId::new([0xaa; 32]),
            TokenType::new(vec![0xbb; 32]),
            Bytes::from(b"hello".as_ref()),
            Some(coins.clone()),
            recipient(),
            Bytes::from(vec![9; 32]),
            None,
            None,
        );

        let no_coins = MintTransactionData::create(
            TokenId::new([0xaa; 32]),
            TokenType::new(vec![0xbb; 32]),
            Bytes::from(b"hello".as_ref()),
            None,
            recipient(),
            Bytes::from(vec![9; 32]),
            None,
            None,
        );

        let other_payload = MintTransactionData::create(
            TokenId::new([0xaa; 32]),
            TokenType::new(vec![0xbb; 32]),
            Bytes::from(b"goodbye".as_ref()),
            Some(coins),
            recipient(),
            Bytes::from(vec![9; 32]),
            None,
            None,
        );

        assert_ne!(base.hash(), no_coins.hash());
        assert_ne!(base.hash(), other_payload.hash());
    }
}
