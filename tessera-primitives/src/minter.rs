//! The universal minter.
//!
//! Mint transactions are anchored by a key anyone can derive from the
//! token id alone, so any verifier can check that a mint authenticator
//! was produced by the canonical minter for that token.

use tessera_crypto::hash::{DataHash, Hasher};
use tessera_crypto::key::SigningKey;

use crate::identifiers::TokenId;
use crate::request_id::RequestId;

/// Secret prefix of the universal minter key derivation.
pub const MINTER_SECRET: &[u8] = b"I_AM_UNIVERSAL_MINTER_FOR_";

/// Suffix anchoring mint request ids: `SHA-256("TOKENID")`.
pub fn mint_suffix() -> DataHash {
    DataHash::sha256(Hasher::hash(b"TOKENID"))
}

/// The canonical minter key for a token id.
pub fn minter_key(token_id: &TokenId) -> SigningKey {
    SigningKey::from_secret(MINTER_SECRET, token_id.as_bytes())
}

/// The deterministic pseudo-state a mint transaction spends from.
pub fn mint_source(token_id: &TokenId) -> RequestId {
    RequestId::create_from_imprint(token_id.as_bytes(), &mint_suffix().imprint())
}
