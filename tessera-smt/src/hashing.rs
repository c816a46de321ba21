//! Node hashing shared by tree construction and path verification.
//!
//! Every node digest is SHA-256 over a definite-length CBOR array whose
//! first element is a node-kind discriminant, so leaves, child combines
//! and forks can never alias each other. Edge labels enter as the
//! big-endian bytes of the sentinelized fragment, child digests as their
//! imprint byte strings, absent children as `null`.

use num_bigint::BigUint;
use tessera_codec::minicbor::bytes::ByteSlice;
use tessera_crypto::hash::{DataHash, Hasher};

const LEAF_KIND: u8 = 0;
const CHILDREN_KIND: u8 = 1;
const FORK_KIND: u8 = 2;

pub(crate) fn leaf_hash(label: &BigUint, value: &[u8]) -> DataHash {
    let label = label.to_bytes_be();
    let label: &ByteSlice = label.as_slice().into();
    let value: &ByteSlice = value.into();

    DataHash::sha256(Hasher::hash_cbor(&(LEAF_KIND, label, value)))
}

pub(crate) fn children_hash(left: Option<&DataHash>, right: Option<&DataHash>) -> DataHash {
    DataHash::sha256(Hasher::hash_cbor(&(CHILDREN_KIND, left, right)))
}

pub(crate) fn fork_hash(label: &BigUint, children: &DataHash) -> DataHash {
    let label = label.to_bytes_be();
    let label: &ByteSlice = label.as_slice().into();

    DataHash::sha256(Hasher::hash_cbor(&(FORK_KIND, label, children)))
}

pub(crate) fn sum_leaf_hash(label: &BigUint, value: &[u8], sum: &BigUint) -> DataHash {
    let label = label.to_bytes_be();
    let label: &ByteSlice = label.as_slice().into();
    let value: &ByteSlice = value.into();
    let sum = sum.to_bytes_be();
    let sum: &ByteSlice = sum.as_slice().into();

    DataHash::sha256(Hasher::hash_cbor(&(LEAF_KIND, label, value, sum)))
}

pub(crate) fn sum_children_hash(
    left: Option<&DataHash>,
    left_sum: &BigUint,
    right: Option<&DataHash>,
    right_sum: &BigUint,
) -> DataHash {
    let left_sum = left_sum.to_bytes_be();
    let left_sum: &ByteSlice = left_sum.as_slice().into();
    let right_sum = right_sum.to_bytes_be();
    let right_sum: &ByteSlice = right_sum.as_slice().into();

    DataHash::sha256(Hasher::hash_cbor(&(
        CHILDREN_KIND,
        left,
        left_sum,
        right,
        right_sum,
    )))
}

/// Number of path bits below the sentinel.
pub(crate) fn payload_bits(label: &BigUint) -> u64 {
    label.bits().saturating_sub(1)
}

/// The label with its sentinel bit cleared.
pub(crate) fn payload(label: &BigUint) -> BigUint {
    let mut p = label.clone();
    p.set_bit(payload_bits(label), false);
    p
}

/// The lowest `count` bits of `value`.
pub(crate) fn low_bits(value: &BigUint, count: u64) -> BigUint {
    value % (BigUint::from(1u8) << count)
}

/// Stack `upper` (sentinel kept) on top of the payload of `lower`.
pub(crate) fn merge(lower: &BigUint, upper: &BigUint) -> BigUint {
    (upper << payload_bits(lower)) | payload(lower)
}

/// Whether the payload of `a` equals the low bits of the payload of `b`.
///
/// Two such paths cannot coexist in a compressed trie whose values live
/// only at leaves: the shorter one would terminate in the middle of the
/// longer one's edge.
pub(crate) fn is_bit_suffix(a: &BigUint, b: &BigUint) -> bool {
    let la = payload_bits(a);
    la <= payload_bits(b) && payload(a) == low_bits(&payload(b), la)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(value: u64) -> BigUint {
        BigUint::from(value)
    }

    #[test]
    fn payload_strips_sentinel() {
        assert_eq!(payload(&big(0b1_0110)), big(0b0110));
        assert_eq!(payload_bits(&big(0b1_0110)), 4);
        assert_eq!(payload(&big(1)), big(0));
    }

    #[test]
    fn merge_restacks_fragments() {
        // payload of the merged value reads lower-bits-first
        let lower = big(0b1_01);
        let upper = big(0b1_11);
        assert_eq!(merge(&lower, &upper), big(0b1_11_01));
    }

    #[test]
    fn suffix_detection() {
        assert!(is_bit_suffix(&big(0b1_01), &big(0b1_1101)));
        assert!(!is_bit_suffix(&big(0b1_10), &big(0b1_1101)));
        assert!(is_bit_suffix(&big(0b1_01), &big(0b1_01)));
    }

    #[test]
    fn node_hashes_are_domain_separated() {
        let label = big(0b1_01);
        let child = leaf_hash(&label, b"x");

        // a leaf whose value happens to equal a children digest must not
        // alias the fork committing to those children
        assert_ne!(
            fork_hash(&label, &child),
            leaf_hash(&label, &child.imprint())
        );
    }
}
