//! Domain model for the Tessera off-chain token engine
//!
//! Tokens live off-chain; only a commitment per state change reaches the
//! aggregator, which anchors it in a sparse merkle tree. This crate holds
//! the deterministic encodings and hashes of every domain object, the
//! predicate algebra governing ownership, the token chain invariants, and
//! the split proof binding minted successors to a prior burn. The
//! aggregator-facing orchestration lives in `tessera-client`.

pub mod address;
pub mod authenticator;
pub mod coin;
pub mod factory;
pub mod identifiers;
pub mod inclusion_proof;
pub mod minter;
pub mod predicate;
pub mod request_id;
pub mod split;
pub mod state;
pub mod token;
pub mod transaction;

/// Ledger format version understood by this engine.
pub const TOKEN_VERSION: &str = "2.0";
