pub mod ed25519;

mod signer;

pub use signer::{SigningKey, SIGNING_ALGORITHM};
