//! The token value: identity, immutable payload, coins, current state
//! and the ordered transaction history anchoring every transition.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_codec::minicbor;
use tessera_codec::minicbor::{Decode, Encode};
use tessera_codec::utils::Bytes;

use crate::address::{Address, AddressError, DirectAddress};
use crate::coin::{CoinDataError, TokenCoinData};
use crate::identifiers::{TokenId, TokenType};
use crate::inclusion_proof::ProofError;
use crate::predicate::PredicateError;
use crate::split::SplitProofError;
use crate::state::{TokenState, TokenStateJson};
use crate::transaction::{
    MintTransactionData, MintTransactionJson, Transaction, TransactionData,
    TransactionPayload, TransferTransactionJson,
};
use crate::TOKEN_VERSION;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unsupported token version {0}")]
    VersionMismatch(String),

    #[error("malformed token ledger: {0}")]
    InputShape(String),

    #[error("recipient does not match the next state's predicate address")]
    RecipientMismatch,

    #[error("transaction data does not match the next state's data")]
    StateDataMismatch,

    #[error("transaction does not spend the token's current state")]
    SourceStateMismatch,

    #[error("unlock predicate rejected the transaction")]
    PredicateVerificationFailed,

    #[error("mint transaction is not anchored by the canonical minter")]
    MintVerificationFailed,

    #[error("transaction hash does not match the inclusion proof")]
    TransactionHashMismatch,

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Split(#[from] SplitProofError),

    #[error(transparent)]
    CoinData(#[from] CoinDataError),
}

/// A token and its verifiable history. The mint sits at position 0 of
/// the serialized transaction list; `state` is the tip.
///
/// Tokens are immutable; a transfer produces a successor value via
/// [`Token::update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub(crate) id: TokenId,
    pub(crate) token_type: TokenType,
    pub(crate) data: Bytes,
    pub(crate) coins: Option<TokenCoinData>,
    pub(crate) state: TokenState,
    pub(crate) genesis: Transaction<MintTransactionData>,
    pub(crate) transactions: Vec<Transaction<TransactionData>>,
    pub(crate) nametag_tokens: Vec<Token>,
    pub(crate) version: String,
}

impl Token {
    /// Assemble a freshly minted token: the genesis transaction plus the
    /// state it pays into.
    pub fn create(
        state: TokenState,
        genesis: Transaction<MintTransactionData>,
        nametag_tokens: Vec<Token>,
    ) -> Result<Self, TokenError> {
        check_recipient(genesis.data().recipient(), &state)?;

        if !genesis.contains_data(state.data().map(|data| data.as_ref())) {
            return Err(TokenError::StateDataMismatch);
        }

        Ok(Self {
            id: *genesis.data().token_id(),
            token_type: genesis.data().token_type().clone(),
            data: genesis.data().token_data().clone(),
            coins: genesis.data().coin_data().cloned(),
            state,
            genesis,
            transactions: Vec::new(),
            nametag_tokens,
            version: TOKEN_VERSION.to_owned(),
        })
    }

    /// Append a verified transfer and install its destination state,
    /// yielding the successor token value.
    pub fn update(
        mut self,
        transaction: Transaction<TransactionData>,
        new_state: TokenState,
        nametag_tokens: Vec<Token>,
    ) -> Result<Self, TokenError> {
        if transaction.data().source_state().hash() != self.state.hash() {
            return Err(TokenError::SourceStateMismatch);
        }

        if !self.state.unlock_predicate().verify(&transaction) {
            return Err(TokenError::PredicateVerificationFailed);
        }

        check_recipient(transaction.data().recipient(), &new_state)?;

        if !transaction.contains_data(new_state.data().map(|data| data.as_ref())) {
            return Err(TokenError::StateDataMismatch);
        }

        self.transactions.push(transaction);
        self.state = new_state;
        self.nametag_tokens = nametag_tokens;

        Ok(self)
    }

    pub fn id(&self) -> &TokenId {
        &self.id
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn coins(&self) -> Option<&TokenCoinData> {
        self.coins.as_ref()
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    pub fn genesis(&self) -> &Transaction<MintTransactionData> {
        &self.genesis
    }

    pub fn transactions(&self) -> &[Transaction<TransactionData>] {
        &self.transactions
    }

    /// Mint plus transfers.
    pub fn transaction_count(&self) -> usize {
        1 + self.transactions.len()
    }

    pub fn nametag_tokens(&self) -> &[Token] {
        &self.nametag_tokens
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn to_json(&self) -> TokenJson {
        let mut transactions = Vec::with_capacity(self.transaction_count());
        transactions.push(TransactionEntryJson::Mint(Box::new(self.genesis.to_json())));
        transactions.extend(
            self.transactions
                .iter()
                .map(|transaction| TransactionEntryJson::Transfer(Box::new(transaction.to_json()))),
        );

        TokenJson {
            version: self.version.clone(),
            id: self.id,
            token_type: self.token_type.clone(),
            data: self.data.clone(),
            coins: self.coins.clone(),
            state: self.state.to_json(),
            transactions,
            nametag_tokens: self
                .nametag_tokens
                .iter()
                .map(|token| token.to_json())
                .collect(),
        }
    }

    /// Canonical CBOR of the whole token.
    pub fn to_cbor(&self) -> Vec<u8> {
        minicbor::to_vec(self).expect("Infallible")
    }

    /// Structural CBOR reconstruction. Hashes are recomputed on the way
    /// in, so a corrupted byte shows up as a mismatch downstream; full
    /// chain replay stays with the token factory.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, minicbor::decode::Error> {
        let mut decoder = minicbor::Decoder::new(bytes);
        Self::decode_cbor(&mut decoder)
    }

    pub(crate) fn decode_cbor(
        d: &mut minicbor::Decoder<'_>,
    ) -> Result<Self, minicbor::decode::Error> {
        if d.array()? != Some(8) {
            return Err(minicbor::decode::Error::message("expected 8-element token"));
        }

        let version = d.str()?.to_owned();
        let id = TokenId::decode(d, &mut ())?;
        let token_type = TokenType::decode(d, &mut ())?;
        let data = Bytes::decode(d, &mut ())?;

        let coins = if d.datatype()? == minicbor::data::Type::Null {
            d.null()?;
            None
        } else {
            Some(TokenCoinData::decode(d, &mut ())?)
        };

        let state = TokenState::decode_in(d, &id, &token_type)?;

        let count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected transaction list"))?;
        if count == 0 {
            return Err(minicbor::decode::Error::message("empty transaction list"));
        }

        let genesis = Transaction::<MintTransactionData>::decode_cbor(d)?;
        let mut transactions = Vec::with_capacity(count as usize - 1);
        for _ in 1..count {
            transactions.push(Transaction::<TransactionData>::decode_in(
                d,
                &id,
                &token_type,
            )?);
        }

        let nametag_count = d
            .array()?
            .ok_or_else(|| minicbor::decode::Error::message("expected nametag list"))?;
        let mut nametag_tokens = Vec::with_capacity(nametag_count as usize);
        for _ in 0..nametag_count {
            nametag_tokens.push(Token::decode_cbor(d)?);
        }

        Ok(Self {
            id,
            token_type,
            data,
            coins,
            state,
            genesis,
            transactions,
            nametag_tokens,
            version,
        })
    }
}

pub(crate) fn check_recipient(recipient: &Address, state: &TokenState) -> Result<(), TokenError> {
    let expected: Address =
        DirectAddress::create(state.unlock_predicate().reference().clone()).into();

    if *recipient != expected {
        return Err(TokenError::RecipientMismatch);
    }

    Ok(())
}

impl<C> minicbor::Encode<C> for Token {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(8)?;
        e.str(&self.version)?;
        self.id.encode(e, ctx)?;
        self.token_type.encode(e, ctx)?;
        self.data.encode(e, ctx)?;

        match &self.coins {
            Some(coins) => coins.encode(e, ctx)?,
            None => e.null()?.ok()?,
        };

        self.state.encode(e, ctx)?;

        e.array(1 + self.transactions.len() as u64)?;
        self.genesis.encode(e, ctx)?;
        for transaction in &self.transactions {
            transaction.encode(e, ctx)?;
        }

        e.array(self.nametag_tokens.len() as u64)?;
        for token in &self.nametag_tokens {
            token.encode(e, ctx)?;
        }

        Ok(())
    }
}

impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/* Wire forms ************************************************************** */

/// Wire form of a token ledger (`.txf`): the portable, verifiable
/// representation. Import goes through the token factory, which replays
/// every transition before handing out a [`Token`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenJson {
    pub version: String,
    pub id: TokenId,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub data: Bytes,
    pub coins: Option<TokenCoinData>,
    pub state: TokenStateJson,
    pub transactions: Vec<TransactionEntryJson>,
    pub nametag_tokens: Vec<TokenJson>,
}

/// One element of the serialized transaction list; the mint comes first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionEntryJson {
    Mint(Box<MintTransactionJson>),
    Transfer(Box<TransferTransactionJson>),
}
