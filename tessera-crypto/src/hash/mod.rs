mod algorithm;
mod data_hash;
#[allow(clippy::module_inception)]
mod hash;
mod hasher;

pub use algorithm::{HashAlgorithm, UnsupportedHashAlgorithm};
pub use data_hash::{DataHash, ImprintError};
pub use hash::Hash;
pub use hasher::Hasher;
