use std::{fmt, str::FromStr};

use thiserror::Error;

/// Registry of digest algorithms carried on the wire.
///
/// Every tagged digest travels with a big-endian `u16` code; the textual
/// label appears wherever a human-readable form is serialized (predicate
/// JSON, CBOR reference tuples).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Sha256,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported hash algorithm {0:#06x}")]
pub struct UnsupportedHashAlgorithm(pub u16);

impl HashAlgorithm {
    pub const fn code(&self) -> u16 {
        match self {
            HashAlgorithm::Sha256 => 0,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA-256",
        }
    }

    pub const fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
        }
    }
}

impl TryFrom<u16> for HashAlgorithm {
    type Error = UnsupportedHashAlgorithm;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HashAlgorithm::Sha256),
            other => Err(UnsupportedHashAlgorithm(other)),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnsupportedHashAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHA-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(UnsupportedHashAlgorithm(u16::MAX)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trip() {
        let alg = HashAlgorithm::try_from(0u16).unwrap();
        assert_eq!(alg, HashAlgorithm::Sha256);
        assert_eq!(alg.code(), 0);
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            HashAlgorithm::try_from(5u16),
            Err(UnsupportedHashAlgorithm(5))
        );
    }
}
