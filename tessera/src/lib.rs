//! Rust-native engine for off-chain, aggregator-anchored tokens
//!
//! Tessera is a collection of crates implementing the client side of an
//! off-chain token system: deterministic encodings and hashes for every
//! domain object, the predicate algebra governing ownership, inclusion
//! proof verification against an external aggregator, full-chain replay
//! validation on import, and the split proof tying minted successor
//! tokens to a prior burn. This crate re-exports the pieces under one
//! roof; it provides no application of its own.

#[doc(inline)]
pub use tessera_codec as codec;

#[doc(inline)]
pub use tessera_crypto as crypto;

#[doc(inline)]
pub use tessera_smt as smt;

pub mod ledger {
    //! Domain objects and ledger import

    #[doc(inline)]
    pub use tessera_primitives as primitives;
}

#[doc(inline)]
pub use tessera_client as client;
