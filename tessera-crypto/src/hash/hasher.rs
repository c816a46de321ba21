use cryptoxide::digest::Digest as _;
use cryptoxide::sha2::Sha256;

use crate::hash::Hash;

use tessera_codec::minicbor;

/// Incremental SHA-256 hasher.
///
/// Implements [`minicbor::encode::Write`] so CBOR items can be hashed
/// without materializing the encoded buffer:
///
/// ```
/// # use tessera_crypto::hash::Hasher;
/// let digest = Hasher::hash(b"My transaction");
/// # assert_eq!(
/// #   "e00403c1e19bd8dd3d1a343232a1c4ae5d47c19dbeb2d1362bd2b15c92fcf1b9".len(),
/// #   hex::encode(digest).len()
/// # );
/// ```
pub struct Hasher(Sha256);

impl Hasher {
    #[inline]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// update the [`Hasher`] with the given input
    #[inline]
    pub fn input(&mut self, bytes: &[u8]) {
        self.0.input(bytes);
    }

    /// convenient function to directly generate the digest of the given
    /// bytes without handling the intermediary [`Hasher`] state
    #[inline]
    pub fn hash(bytes: &[u8]) -> Hash<32> {
        let mut hasher = Self::new();
        hasher.input(bytes);
        hasher.finalize()
    }

    /// convenient function to directly generate the digest of the given
    /// [`minicbor::Encode`] data object
    #[inline]
    pub fn hash_cbor(data: &impl minicbor::Encode<()>) -> Hash<32> {
        let mut hasher = Self::new();
        let () = minicbor::encode(data, &mut hasher).expect("Infallible");
        hasher.finalize()
    }

    /// consume the [`Hasher`] and return the computed digest
    pub fn finalize(mut self) -> Hash<32> {
        let mut hash = [0; 32];
        self.0.result(&mut hash);
        Hash::new(hash)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> minicbor::encode::Write for &'a mut Hasher {
    type Error = std::convert::Infallible;

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.input(buf);
        Ok(())
    }
}
