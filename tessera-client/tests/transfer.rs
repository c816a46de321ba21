//! Mint → transfer scenarios against the in-memory aggregator.

mod common;

use common::{mint, SilentAggregator, TestAggregator, POLL_DEADLINE, POLL_INTERVAL};

use std::time::Duration;

use tessera_client::{wait_inclusion_proof, ClientError, StateTransitionClient};
use tessera_codec::utils::{Bytes, Uint};
use tessera_crypto::hash::{DataHash, HashAlgorithm, Hasher};
use tessera_crypto::key::SigningKey;
use tessera_primitives::address::{Address, DirectAddress};
use tessera_primitives::authenticator::Authenticator;
use tessera_primitives::coin::TokenCoinData;
use tessera_primitives::factory::TokenFactory;
use tessera_primitives::identifiers::{CoinId, TokenId, TokenType};
use tessera_primitives::inclusion_proof::{InclusionProof, InclusionProofStatus};
use tessera_primitives::predicate::{MaskedPredicate, Predicate};
use tessera_primitives::state::TokenState;
use tessera_primitives::token::Token;
use tessera_primitives::transaction::TransactionData;

fn token_id() -> TokenId {
    TokenId::new([0xaa; 32])
}

fn token_type() -> TokenType {
    TokenType::new(vec![0xbb; 32])
}

fn coins() -> TokenCoinData {
    TokenCoinData::new(vec![
        (CoinId::new(vec![0x01; 32]), Uint::from(10)),
        (CoinId::new(vec![0x02; 32]), Uint::from(20)),
    ])
    .unwrap()
}

fn owner() -> SigningKey {
    SigningKey::from_secret(b"secret", &[0x03; 32])
}

fn owner_state() -> TokenState {
    let predicate = Predicate::Masked(MaskedPredicate::create(
        &token_id(),
        &owner(),
        HashAlgorithm::Sha256,
        Bytes::from([0x03; 32]),
    ));
    TokenState::new(predicate, None)
}

async fn mint_source_token(client: &StateTransitionClient<TestAggregator>) -> Token {
    mint(
        client,
        owner_state(),
        token_id(),
        token_type(),
        Bytes::from(b"hello".as_ref()),
        Some(coins()),
        Bytes::from([0x09; 32]),
        None,
    )
    .await
}

#[tokio::test]
async fn mint_then_transfer() {
    let client = StateTransitionClient::new(TestAggregator::default());
    let token = mint_source_token(&client).await;

    assert_eq!(token.transaction_count(), 1);
    assert!(token.state().unlock_predicate().is_owner(owner().public_key()));

    let receiver = SigningKey::from_secret(b"tere", &[0x04; 32]);
    let receiver_predicate = Predicate::Masked(MaskedPredicate::create(
        &token_id(),
        &receiver,
        HashAlgorithm::Sha256,
        Bytes::from([0x04; 32]),
    ));
    let new_state = TokenState::new(receiver_predicate, None);
    let recipient: Address =
        DirectAddress::create(new_state.unlock_predicate().reference().clone()).into();

    let data = TransactionData::create(
        token.state().clone(),
        recipient,
        Bytes::from([0x07; 32]),
        None,
        None,
        Vec::new(),
    );

    let commitment = client.submit_transaction(data, &owner()).await.unwrap();
    let proof = wait_inclusion_proof(
        client.aggregator(),
        commitment.request_id(),
        POLL_INTERVAL,
        POLL_DEADLINE,
    )
    .await
    .unwrap();

    let transaction = client.create_transaction(commitment, proof).unwrap();
    let updated = client
        .finish_transaction(token.clone(), new_state, transaction, Vec::new())
        .unwrap();

    assert_eq!(updated.transaction_count(), 2);
    assert!(updated
        .state()
        .unlock_predicate()
        .is_owner(receiver.public_key()));

    // the old state is spent and anchored, the new one not yet
    assert_eq!(
        client
            .get_token_status(&token, owner().public_key())
            .await
            .unwrap(),
        InclusionProofStatus::Ok
    );
    assert_eq!(
        client
            .get_token_status(&updated, receiver.public_key())
            .await
            .unwrap(),
        InclusionProofStatus::PathNotIncluded
    );
}

#[tokio::test]
async fn foreign_key_cannot_unlock() {
    let client = StateTransitionClient::new(TestAggregator::default());
    let token = mint_source_token(&client).await;

    let thief = SigningKey::from_secret(b"thief", &[0x05; 32]);
    let recipient: Address =
        DirectAddress::create(token.state().unlock_predicate().reference().clone()).into();

    let data = TransactionData::create(
        token.state().clone(),
        recipient,
        Bytes::from([0x07; 32]),
        None,
        None,
        Vec::new(),
    );

    let err = client.submit_transaction(data, &thief).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to unlock token");
}

#[tokio::test]
async fn double_spend_is_rejected() {
    let client = StateTransitionClient::new(TestAggregator::default());
    let token = mint_source_token(&client).await;

    let transfer = |nonce: u8| {
        let receiver = SigningKey::from_secret(b"receiver", &[nonce; 32]);
        let predicate = Predicate::Masked(MaskedPredicate::create(
            &token_id(),
            &receiver,
            HashAlgorithm::Sha256,
            Bytes::from([nonce; 32]),
        ));
        let recipient: Address = DirectAddress::create(predicate.reference().clone()).into();
        TransactionData::create(
            token.state().clone(),
            recipient,
            Bytes::from([nonce; 32]),
            None,
            None,
            Vec::new(),
        )
    };

    client.submit_transaction(transfer(0x11), &owner()).await.unwrap();

    let err = client
        .submit_transaction(transfer(0x12), &owner())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Rejected(tessera_client::SubmitCommitmentStatus::RequestIdExists)
    ));
}

#[tokio::test]
async fn unknown_hash_algorithm_is_rejected() {
    let client = StateTransitionClient::new(TestAggregator::default());

    let recipient: Address =
        DirectAddress::create(owner_state().unlock_predicate().reference().clone()).into();
    let commitment = client
        .submit_mint_transaction(
            recipient,
            token_id(),
            token_type(),
            Bytes::from(b"hello".as_ref()),
            None,
            Bytes::from([0x09; 32]),
            None,
            None,
        )
        .await
        .unwrap();

    let proof = wait_inclusion_proof(
        client.aggregator(),
        commitment.request_id(),
        POLL_INTERVAL,
        POLL_DEADLINE,
    )
    .await
    .unwrap();

    // re-tag the authenticator's state hash with an unknown algorithm
    let original = proof.authenticator().unwrap();
    let mut imprint = vec![0x00, 0x05];
    imprint.extend_from_slice(original.state_hash().digest());

    let forged = Authenticator::new(
        original.algorithm().to_owned(),
        *original.public_key(),
        *original.signature(),
        DataHash::from_imprint(&imprint).unwrap(),
    );

    let tampered = InclusionProof::new(
        proof.path().clone(),
        Some(forged),
        proof.transaction_hash().cloned(),
    )
    .unwrap();

    let err = client.create_transaction(commitment, tampered).unwrap_err();
    assert_eq!(err.to_string(), "Invalid inclusion proof hash algorithm.");
}

#[tokio::test]
async fn transaction_hash_mismatch_is_rejected() {
    let client = StateTransitionClient::new(TestAggregator::default());

    let recipient: Address =
        DirectAddress::create(owner_state().unlock_predicate().reference().clone()).into();
    let commitment = client
        .submit_mint_transaction(
            recipient,
            token_id(),
            token_type(),
            Bytes::from(b"hello".as_ref()),
            None,
            Bytes::from([0x09; 32]),
            None,
            None,
        )
        .await
        .unwrap();

    let proof = wait_inclusion_proof(
        client.aggregator(),
        commitment.request_id(),
        POLL_INTERVAL,
        POLL_DEADLINE,
    )
    .await
    .unwrap();

    let tampered = InclusionProof::new(
        proof.path().clone(),
        proof.authenticator().cloned(),
        Some(DataHash::sha256(Hasher::hash(b"someone else's payload"))),
    )
    .unwrap();

    let err = client.create_transaction(commitment, tampered).unwrap_err();
    assert_eq!(err.to_string(), "Payload hash mismatch");
}

#[tokio::test]
async fn ledger_round_trip_and_replay() {
    let client = StateTransitionClient::new(TestAggregator::default());
    let token = mint_source_token(&client).await;

    let receiver = SigningKey::from_secret(b"tere", &[0x04; 32]);
    let receiver_predicate = Predicate::Masked(MaskedPredicate::create(
        &token_id(),
        &receiver,
        HashAlgorithm::Sha256,
        Bytes::from([0x04; 32]),
    ));
    let new_state = TokenState::new(receiver_predicate, None);
    let recipient: Address =
        DirectAddress::create(new_state.unlock_predicate().reference().clone()).into();

    let data = TransactionData::create(
        token.state().clone(),
        recipient,
        Bytes::from([0x07; 32]),
        None,
        None,
        Vec::new(),
    );

    let commitment = client.submit_transaction(data, &owner()).await.unwrap();
    let proof = wait_inclusion_proof(
        client.aggregator(),
        commitment.request_id(),
        POLL_INTERVAL,
        POLL_DEADLINE,
    )
    .await
    .unwrap();
    let transaction = client.create_transaction(commitment, proof).unwrap();
    let updated = client
        .finish_transaction(token, new_state, transaction, Vec::new())
        .unwrap();

    // JSON round trip is identity, and the factory replays the chain
    let text = serde_json::to_string(&updated).unwrap();
    let factory: TokenFactory = TokenFactory::default();
    let replayed = factory.from_json_str(&text).unwrap();

    assert_eq!(replayed, updated);
    assert_eq!(
        serde_json::to_value(&replayed).unwrap(),
        serde_json::to_value(&updated).unwrap()
    );

    // CBOR round trips byte for byte
    let cbor = updated.to_cbor();
    assert_eq!(Token::from_cbor(&cbor).unwrap().to_cbor(), cbor);
}

#[tokio::test]
async fn tampered_ledger_recipient_fails_replay() {
    let client = StateTransitionClient::new(TestAggregator::default());
    let token = mint_source_token(&client).await;

    let mut json = serde_json::to_value(&token).unwrap();

    // point the current state at a different predicate nonce
    json["state"]["unlockPredicate"]["nonce"] =
        serde_json::Value::String("ff".repeat(32));

    let factory: TokenFactory = TokenFactory::default();
    let err = factory.from_json_str(&json.to_string()).unwrap_err();

    assert!(err
        .to_string()
        .contains("recipient does not match the next state's predicate address"));
}

#[tokio::test]
async fn polling_times_out_without_an_answer() {
    let request_id = tessera_primitives::request_id::RequestId::create_from_imprint(b"any", b"one");

    let err = wait_inclusion_proof(
        &SilentAggregator,
        &request_id,
        Duration::from_millis(1),
        Duration::from_millis(20),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::Timeout(_)));
}
