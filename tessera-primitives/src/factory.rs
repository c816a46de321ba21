//! Ledger import: rebuild a token from its wire form and re-validate
//! every transaction, address, predicate and split proof on the way.

use tracing::debug;

use tessera_crypto::hash::{DataHash, HashAlgorithm, Hasher};
use tessera_codec::utils::Bytes;

use crate::address::{Address, DirectAddress};
use crate::identifiers::{TokenId, TokenType};
use crate::inclusion_proof::InclusionProofStatus;
use crate::minter::{mint_source, minter_key};
use crate::predicate::{Predicate, PredicateError, PredicateJson};
use crate::request_id::RequestId;
use crate::split::{SplitProof, SplitProofJson};
use crate::state::{TokenState, TokenStateJson};
use crate::token::{Token, TokenError, TokenJson, TransactionEntryJson};
use crate::transaction::{
    MintReason, MintReasonJson, MintTransactionData, MintTransactionJson, Transaction,
    TransactionData, TransactionPayload, TransferTransactionJson,
};
use crate::TOKEN_VERSION;

/// Rebuilds predicates from their wire form. The engine ships a tag
/// dispatcher; callers with custom predicate schemes supply their own.
pub trait PredicateFactory {
    fn create(
        &self,
        token_id: &TokenId,
        token_type: &TokenType,
        json: &PredicateJson,
    ) -> Result<Predicate, PredicateError>;
}

/// Dispatch on the textual `type` tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPredicateFactory;

impl PredicateFactory for DefaultPredicateFactory {
    fn create(
        &self,
        token_id: &TokenId,
        token_type: &TokenType,
        json: &PredicateJson,
    ) -> Result<Predicate, PredicateError> {
        Predicate::from_json(token_id, token_type, json)
    }
}

/// Deserializes a token ledger, replaying the full transaction chain.
#[derive(Clone, Debug, Default)]
pub struct TokenFactory<F = DefaultPredicateFactory> {
    predicates: F,
}

impl<F: PredicateFactory> TokenFactory<F> {
    pub fn new(predicates: F) -> Self {
        Self { predicates }
    }

    /// Parse and validate a `.txf` document.
    pub fn from_json_str(&self, json: &str) -> Result<Token, TokenError> {
        let dto: TokenJson =
            serde_json::from_str(json).map_err(|e| TokenError::InputShape(e.to_string()))?;
        self.create(&dto)
    }

    /// Rebuild a token, enforcing the chain invariants transaction by
    /// transaction. Any failed check aborts the import.
    pub fn create(&self, json: &TokenJson) -> Result<Token, TokenError> {
        if json.version != TOKEN_VERSION {
            return Err(TokenError::VersionMismatch(json.version.clone()));
        }

        let token_id = json.id;
        let token_type = json.token_type.clone();

        debug!(token = %token_id, "replaying token ledger");

        let mut entries = json.transactions.iter();
        let genesis = match entries.next() {
            Some(TransactionEntryJson::Mint(mint)) => {
                self.mint_transaction(&token_id, &token_type, mint)?
            }
            _ => {
                return Err(TokenError::InputShape(
                    "first transaction must be the mint".to_owned(),
                ))
            }
        };

        if json.data != *genesis.data().token_data() {
            return Err(TokenError::InputShape(
                "token data does not match the mint".to_owned(),
            ));
        }

        if json.coins.as_ref() != genesis.data().coin_data() {
            return Err(TokenError::InputShape(
                "token coins do not match the mint".to_owned(),
            ));
        }

        let mut prev_recipient = genesis.data().recipient().clone();
        let mut prev_data_hash = TransactionPayload::data_hash(genesis.data()).cloned();
        let mut transactions = Vec::new();

        for (index, entry) in entries.enumerate() {
            let transfer = match entry {
                TransactionEntryJson::Transfer(transfer) => transfer,
                TransactionEntryJson::Mint(_) => {
                    return Err(TokenError::InputShape(
                        "mint transaction out of position".to_owned(),
                    ))
                }
            };

            let transaction =
                self.transfer_transaction(&token_id, &token_type, transfer)?;

            let source_state = transaction.data().source_state();

            let source_address: Address =
                DirectAddress::create(source_state.unlock_predicate().reference().clone()).into();
            if source_address != prev_recipient {
                return Err(TokenError::RecipientMismatch);
            }

            if !covers(prev_data_hash.as_ref(), source_state.data()) {
                return Err(TokenError::StateDataMismatch);
            }

            if !source_state.unlock_predicate().verify(&transaction) {
                return Err(TokenError::PredicateVerificationFailed);
            }

            debug!(index = index + 1, "transaction verified");

            prev_recipient = transaction.data().recipient().clone();
            prev_data_hash = TransactionPayload::data_hash(transaction.data()).cloned();
            transactions.push(transaction);
        }

        let state = self.state(&token_id, &token_type, &json.state)?;

        let state_address: Address =
            DirectAddress::create(state.unlock_predicate().reference().clone()).into();
        if state_address != prev_recipient {
            return Err(TokenError::RecipientMismatch);
        }

        if !covers(prev_data_hash.as_ref(), state.data()) {
            return Err(TokenError::StateDataMismatch);
        }

        let nametag_tokens = json
            .nametag_tokens
            .iter()
            .map(|nametag| self.create(nametag))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Token {
            id: token_id,
            token_type,
            data: json.data.clone(),
            coins: json.coins.clone(),
            state,
            genesis,
            transactions,
            nametag_tokens,
            version: json.version.clone(),
        })
    }

    fn state(
        &self,
        token_id: &TokenId,
        token_type: &TokenType,
        json: &TokenStateJson,
    ) -> Result<TokenState, TokenError> {
        let predicate = self
            .predicates
            .create(token_id, token_type, &json.unlock_predicate)?;

        Ok(TokenState::new(predicate, json.data.clone()))
    }

    fn mint_transaction(
        &self,
        token_id: &TokenId,
        token_type: &TokenType,
        json: &MintTransactionJson,
    ) -> Result<Transaction<MintTransactionData>, TokenError> {
        if json.data.token_id != *token_id || json.data.token_type != *token_type {
            return Err(TokenError::InputShape(
                "mint identity does not match the token".to_owned(),
            ));
        }

        let recipient: Address = json.data.recipient.parse()?;

        let reason = match &json.data.reason {
            None => None,
            Some(MintReasonJson::Split(split)) => {
                Some(MintReason::Split(self.split_proof(split)?))
            }
        };

        let data = MintTransactionData::create(
            *token_id,
            token_type.clone(),
            json.data.token_data.clone(),
            json.data.coin_data.clone(),
            recipient,
            json.data.salt.clone(),
            json.data.data_hash.clone(),
            reason,
        );

        let proof = json.inclusion_proof.clone();

        if proof.transaction_hash() != Some(data.hash()) {
            return Err(TokenError::TransactionHashMismatch);
        }

        // anyone can derive the canonical minter for this token id and
        // check the anchor end to end
        let minter = minter_key(token_id);
        let source = mint_source(token_id);

        let authenticator = proof
            .authenticator()
            .ok_or(TokenError::MintVerificationFailed)?;

        if authenticator.public_key() != minter.public_key()
            || authenticator.state_hash() != source.hash()
            || !authenticator.verify(data.hash())
        {
            return Err(TokenError::MintVerificationFailed);
        }

        let request_id = RequestId::create(minter.public_key().as_ref(), source.hash());
        if proof.verify(&request_id)? != InclusionProofStatus::Ok {
            return Err(TokenError::MintVerificationFailed);
        }

        if let Some(MintReason::Split(split)) = data.reason() {
            split.verify(token_id, data.coin_data())?;
        }

        Ok(Transaction::new(data, proof))
    }

    fn transfer_transaction(
        &self,
        token_id: &TokenId,
        token_type: &TokenType,
        json: &TransferTransactionJson,
    ) -> Result<Transaction<TransactionData>, TokenError> {
        let source_state = self.state(token_id, token_type, &json.data.source_state)?;
        let recipient: Address = json.data.recipient.parse()?;

        let nametag_tokens = json
            .data
            .nametag_tokens
            .iter()
            .map(|nametag| self.create(nametag))
            .collect::<Result<Vec<_>, _>>()?;

        let data = TransactionData::create(
            source_state,
            recipient,
            json.data.salt.clone(),
            json.data.data_hash.clone(),
            json.data.message.clone(),
            nametag_tokens,
        );

        let proof = json.inclusion_proof.clone();

        if proof.transaction_hash() != Some(data.hash()) {
            return Err(TokenError::TransactionHashMismatch);
        }

        Ok(Transaction::new(data, proof))
    }

    fn split_proof(&self, json: &SplitProofJson) -> Result<SplitProof, TokenError> {
        let burned_token = self.create(&json.burned_token)?;
        Ok(SplitProof::new(burned_token, json.paths()))
    }
}

/// The `containsData` relation over a bare data-hash commitment.
fn covers(data_hash: Option<&DataHash>, state_data: Option<&Bytes>) -> bool {
    match (data_hash, state_data) {
        (None, None) => true,
        (Some(expected), Some(bytes)) => match expected.algorithm() {
            Ok(HashAlgorithm::Sha256) => DataHash::sha256(Hasher::hash(bytes)) == *expected,
            Err(_) => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gate() {
        let factory: TokenFactory = TokenFactory::default();
        let id = "00".repeat(32);
        let tree_hash = format!("0000{}", "00".repeat(32));
        let json = format!(
            r#"{{"version":"1.0","id":"{id}","type":"{id}","data":"","coins":null,
            "state":{{"unlockPredicate":{{"type":"BURN","nonce":"00","reason":{{"newTokensTreeHash":"{tree_hash}"}}}},"data":null}},
            "transactions":[],"nametagTokens":[]}}"#
        );

        assert!(matches!(
            factory.from_json_str(&json),
            Err(TokenError::VersionMismatch(_))
        ));
    }

    #[test]
    fn covers_requires_matching_sides() {
        let digest = DataHash::sha256(Hasher::hash(b"payload"));
        assert!(covers(None, None));
        assert!(covers(Some(&digest), Some(&Bytes::from(b"payload".as_ref()))));
        assert!(!covers(Some(&digest), None));
        assert!(!covers(None, Some(&Bytes::from(b"payload".as_ref()))));
        assert!(!covers(
            Some(&digest),
            Some(&Bytes::from(b"other".as_ref()))
        ));
    }
}
