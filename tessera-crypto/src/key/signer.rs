use rand_core::{CryptoRng, RngCore};

use crate::hash::Hasher;
use crate::key::ed25519::{PublicKey, SecretKey, Signature};

/// Label carried in authenticators and predicates for this signing scheme.
pub const SIGNING_ALGORITHM: &str = "ed25519";

/// A secret key bundled with its public half.
///
/// Keys are derived from a caller secret and a per-use nonce:
/// `seed = SHA-256(secret || nonce)`. The same derivation backs both user
/// wallets and the universal minter key, which makes a minter key
/// recomputable by any verifier that knows the token id.
#[derive(Clone)]
pub struct SigningKey {
    secret: SecretKey,
    public: PublicKey,
}

impl SigningKey {
    /// generate a throwaway [`SigningKey`] with the given random number
    /// generator
    pub fn new<Rng>(rng: Rng) -> Self
    where
        Rng: RngCore + CryptoRng,
    {
        let secret = SecretKey::new(rng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// derive a [`SigningKey`] from a caller secret and a nonce
    pub fn from_secret(secret: &[u8], nonce: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.input(secret);
        hasher.input(nonce);

        Self::from_seed(*hasher.finalize())
    }

    pub fn from_seed(seed: [u8; SecretKey::SIZE]) -> Self {
        let secret = SecretKey::from(seed);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn algorithm(&self) -> &'static str {
        SIGNING_ALGORITHM
    }

    pub fn sign<T>(&self, msg: T) -> Signature
    where
        T: AsRef<[u8]>,
    {
        self.secret.sign(msg)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = SigningKey::from_secret(b"secret", &[3; 32]);
        let b = SigningKey::from_secret(b"secret", &[3; 32]);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn nonce_separates_keys() {
        let a = SigningKey::from_secret(b"secret", &[3; 32]);
        let b = SigningKey::from_secret(b"secret", &[4; 32]);
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn signatures_verify_under_public_half() {
        let key = SigningKey::from_secret(b"secret", b"nonce");
        let signature = key.sign(b"payload");
        assert!(key.public_key().verify(b"payload", &signature));
    }
}
